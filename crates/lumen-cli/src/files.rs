use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use image::ImageReader;
use lumen_contracts::media::{mime_for_path, ImageReference, MediaItem};
use sha2::{Digest, Sha256};

/// A loaded attachment plus its pixel size when the image crate can read it.
pub struct Attachment {
    pub item: MediaItem,
    pub dimensions: Option<(u32, u32)>,
}

/// Reads an image attachment. Files without a known extension are sniffed.
pub fn load_attachment(path: &Path) -> Result<Attachment> {
    let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    if bytes.is_empty() {
        bail!("attachment is empty: {}", path.display());
    }
    let mime_type = match mime_for_path(path) {
        Some(mime_type) => mime_type.to_string(),
        None => match image::guess_format(&bytes) {
            Ok(format) => format.to_mime_type().to_string(),
            Err(_) => bail!("unsupported attachment type: {}", path.display()),
        },
    };
    let dimensions = image_dimensions(&bytes);
    Ok(Attachment {
        item: MediaItem::from_bytes(&bytes, mime_type),
        dimensions,
    })
}

/// Pixel size of an encoded image, if decodable.
pub fn image_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

pub struct SavedImage {
    pub path: PathBuf,
    pub dimensions: Option<(u32, u32)>,
}

/// Writes a rendered image as `lumen-<timestamp>-<hash>.<ext>` under `dir`.
pub fn save_generated_image(dir: &Path, image: &ImageReference) -> Result<SavedImage> {
    let bytes = image.decode()?;
    fs::create_dir_all(dir).with_context(|| format!("failed creating {}", dir.display()))?;
    let name = format!(
        "lumen-{}-{}.{}",
        compact_timestamp(),
        short_hash(&bytes),
        image.file_extension()
    );
    let path = dir.join(name);
    fs::write(&path, &bytes).with_context(|| format!("failed writing {}", path.display()))?;
    Ok(SavedImage {
        path,
        dimensions: image_dimensions(&bytes),
    })
}

/// Writes a rendered image to an explicit path, creating parent directories.
pub fn save_image_to(path: &Path, image: &ImageReference) -> Result<()> {
    let bytes = image.decode()?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes).with_context(|| format!("failed writing {}", path.display()))
}

fn compact_timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

fn short_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    hex::encode(&digest[..4])
}
