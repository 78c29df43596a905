use std::fmt;
use std::path::Path;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// An attachment forwarded unmodified into every remote request of its turn.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub mime_type: String,
    /// Base64 payload.
    pub data: String,
}

impl MediaItem {
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: BASE64.encode(bytes),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let Some(mime_type) = mime_for_path(path) else {
            bail!("unsupported attachment type: {}", path.display());
        };
        let bytes = std::fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
        if bytes.is_empty() {
            bail!("attachment is empty: {}", path.display());
        }
        Ok(Self::from_bytes(&bytes, mime_type))
    }

    pub fn from_data_uri(uri: &str) -> Option<Self> {
        let (mime_type, data) = parse_data_uri(uri)?;
        Some(Self {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }

    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Approximate decoded size in bytes.
    pub fn byte_len(&self) -> usize {
        self.data.len() / 4 * 3
    }
}

// Keeps base64 blobs out of logs.
impl fmt::Debug for MediaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaItem")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.byte_len())
            .finish()
    }
}

/// A directly displayable `data:` URI for a rendered image.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageReference(String);

impl ImageReference {
    pub fn from_inline(mime_type: &str, data: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(data.trim().as_bytes())
            .context("image base64 decode failed")?;
        if bytes.is_empty() {
            bail!("image payload is empty");
        }
        let mime_type = if mime_type.trim().is_empty() {
            "image/png"
        } else {
            mime_type.trim()
        };
        Ok(Self(format!("data:{mime_type};base64,{}", data.trim())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn mime_type(&self) -> &str {
        parse_data_uri(&self.0)
            .map(|(mime, _)| mime)
            .unwrap_or("application/octet-stream")
    }

    pub fn decode(&self) -> Result<Vec<u8>> {
        let Some((_, data)) = parse_data_uri(&self.0) else {
            bail!("image reference is not a base64 data URI");
        };
        Ok(BASE64.decode(data.as_bytes())?)
    }

    pub fn file_extension(&self) -> &'static str {
        let lowered = self.mime_type().to_ascii_lowercase();
        if lowered.contains("jpeg") || lowered.contains("jpg") {
            return "jpg";
        }
        if lowered.contains("webp") {
            return "webp";
        }
        "png"
    }
}

impl fmt::Debug for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImageReference({}, {} chars)", self.mime_type(), self.0.len())
    }
}

/// Splits `data:<mime>;base64,<data>` into its parts.
pub fn parse_data_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = uri.trim().strip_prefix("data:")?;
    let (header, data) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    if mime.is_empty() || data.is_empty() {
        return None;
    }
    Some((mime, data))
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{mime_for_path, parse_data_uri, ImageReference, MediaItem};

    #[test]
    fn media_item_round_trips_through_data_uri() {
        let item = MediaItem::from_bytes(b"\x89PNG fake", "image/png");
        let uri = item.data_uri();
        assert!(uri.starts_with("data:image/png;base64,"));
        assert_eq!(MediaItem::from_data_uri(&uri), Some(item));
    }

    #[test]
    fn media_item_from_path_infers_mime() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("sketch.JPG");
        std::fs::write(&path, b"jpeg-bytes")?;
        let item = MediaItem::from_path(&path)?;
        assert_eq!(item.mime_type, "image/jpeg");

        let unknown = temp.path().join("notes.txt");
        std::fs::write(&unknown, b"hello")?;
        assert!(MediaItem::from_path(&unknown).is_err());
        Ok(())
    }

    #[test]
    fn image_reference_validates_and_decodes() -> anyhow::Result<()> {
        let reference = ImageReference::from_inline("image/jpeg", "aGVsbG8=")?;
        assert_eq!(reference.as_str(), "data:image/jpeg;base64,aGVsbG8=");
        assert_eq!(reference.mime_type(), "image/jpeg");
        assert_eq!(reference.file_extension(), "jpg");
        assert_eq!(reference.decode()?, b"hello");

        assert!(ImageReference::from_inline("image/png", "").is_err());
        assert!(ImageReference::from_inline("image/png", "not base64!").is_err());
        Ok(())
    }

    #[test]
    fn parse_data_uri_rejects_non_base64_uris() {
        assert_eq!(
            parse_data_uri("data:image/png;base64,AAAA"),
            Some(("image/png", "AAAA"))
        );
        assert_eq!(parse_data_uri("data:text/plain,hello"), None);
        assert_eq!(parse_data_uri("https://example.test/a.png"), None);
    }

    #[test]
    fn debug_output_omits_payload() {
        let item = MediaItem::from_bytes(&[0u8; 30], "image/png");
        let rendered = format!("{item:?}");
        assert!(!rendered.contains(&item.data));
        assert!(mime_for_path(Path::new("a.webp")).is_some());
    }
}
