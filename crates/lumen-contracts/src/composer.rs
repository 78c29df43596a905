use std::fmt;

use serde::{Deserialize, Serialize};

use crate::media::MediaItem;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait3x4,
    #[serde(rename = "4:3")]
    Landscape4x3,
    #[serde(rename = "9:16")]
    Portrait9x16,
    #[serde(rename = "16:9")]
    Landscape16x9,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Portrait3x4,
        AspectRatio::Landscape4x3,
        AspectRatio::Portrait9x16,
        AspectRatio::Landscape16x9,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait3x4 => "3:4",
            AspectRatio::Landscape4x3 => "4:3",
            AspectRatio::Portrait9x16 => "9:16",
            AspectRatio::Landscape16x9 => "16:9",
        }
    }

    fn value(self) -> f64 {
        match self {
            AspectRatio::Square => 1.0,
            AspectRatio::Portrait3x4 => 3.0 / 4.0,
            AspectRatio::Landscape4x3 => 4.0 / 3.0,
            AspectRatio::Portrait9x16 => 9.0 / 16.0,
            AspectRatio::Landscape16x9 => 16.0 / 9.0,
        }
    }

    pub fn parse(raw: &str) -> Option<AspectRatio> {
        let normalized = raw.trim();
        AspectRatio::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == normalized)
    }

    /// Resolves keywords, `W:H` ratios and `WxH` sizes to the nearest
    /// supported ratio. The second element is set when the value was snapped.
    pub fn snap(raw: &str) -> Option<(AspectRatio, Option<String>)> {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return None;
        }
        if let Some(exact) = AspectRatio::parse(&normalized) {
            return Some((exact, None));
        }
        match normalized.as_str() {
            "square" => return Some((AspectRatio::Square, None)),
            "portrait" | "tall" | "story" => return Some((AspectRatio::Portrait9x16, None)),
            "landscape" | "wide" | "widescreen" => {
                return Some((AspectRatio::Landscape16x9, None))
            }
            _ => {}
        }

        let target = parse_pair(&normalized, ':')
            .or_else(|| parse_pair(&normalized, 'x'))
            .map(|(left, right)| left as f64 / right as f64)?;

        let mut best = AspectRatio::Square;
        let mut best_delta = f64::MAX;
        for ratio in AspectRatio::ALL {
            let delta = (ratio.value() - target).abs();
            if delta < best_delta {
                best = ratio;
                best_delta = delta;
            }
        }
        Some((best, Some(format!("Aspect ratio snapped to {best}."))))
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageSize {
    #[serde(rename = "1K")]
    OneK,
    #[default]
    #[serde(rename = "2K")]
    TwoK,
    #[serde(rename = "4K")]
    FourK,
}

impl ImageSize {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageSize::OneK => "1K",
            ImageSize::TwoK => "2K",
            ImageSize::FourK => "4K",
        }
    }

    /// Accepts `1K`/`2K`/`4K` or a `WxH` size, tiered by its longest edge.
    pub fn from_hint(raw: &str) -> Option<ImageSize> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "1k" => return Some(ImageSize::OneK),
            "2k" => return Some(ImageSize::TwoK),
            "4k" => return Some(ImageSize::FourK),
            _ => {}
        }
        let (width, height) = parse_pair(&normalized, 'x')?;
        let longest = width.max(height);
        Some(if longest >= 3600 {
            ImageSize::FourK
        } else if longest >= 1800 {
            ImageSize::TwoK
        } else {
            ImageSize::OneK
        })
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parse_pair(raw: &str, separator: char) -> Option<(u32, u32)> {
    let (left, right) = raw.split_once(separator)?;
    let left = left.trim().parse::<u32>().ok()?;
    let right = right.trim().parse::<u32>().ok()?;
    if left == 0 || right == 0 {
        return None;
    }
    Some((left, right))
}

/// What the user sends in one turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Submission {
    pub text: String,
    pub media: Vec<MediaItem>,
    pub aspect_ratio: AspectRatio,
}

impl Submission {
    pub fn new(text: impl Into<String>, media: Vec<MediaItem>, aspect_ratio: AspectRatio) -> Self {
        Self {
            text: text.into(),
            media,
            aspect_ratio,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.media.is_empty()
    }
}

/// The pending draft: typed text, attachments and the aspect-ratio setting.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    text: String,
    media: Vec<MediaItem>,
    aspect_ratio: AspectRatio,
}

impl Composer {
    pub fn new(aspect_ratio: AspectRatio) -> Self {
        Self {
            aspect_ratio,
            ..Self::default()
        }
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attach(&mut self, item: MediaItem) {
        self.media.push(item);
    }

    pub fn pending_media(&self) -> &[MediaItem] {
        &self.media
    }

    pub fn clear_media(&mut self) -> usize {
        let count = self.media.len();
        self.media.clear();
        count
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: AspectRatio) {
        self.aspect_ratio = aspect_ratio;
    }

    pub fn aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratio
    }

    /// Clears text and attachments together and snapshots the aspect ratio.
    /// An empty draft yields `None` and is left untouched.
    pub fn take_submission(&mut self) -> Option<Submission> {
        if self.text.trim().is_empty() && self.media.is_empty() {
            return None;
        }
        Some(Submission {
            text: std::mem::take(&mut self.text),
            media: std::mem::take(&mut self.media),
            aspect_ratio: self.aspect_ratio,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{AspectRatio, Composer, ImageSize, Submission};
    use crate::media::MediaItem;

    #[test]
    fn aspect_ratio_parses_supported_values_only() {
        assert_eq!(AspectRatio::parse("16:9"), Some(AspectRatio::Landscape16x9));
        assert_eq!(AspectRatio::parse(" 3:4 "), Some(AspectRatio::Portrait3x4));
        assert_eq!(AspectRatio::parse("21:9"), None);
        assert_eq!(AspectRatio::default().as_str(), "1:1");
    }

    #[test]
    fn aspect_ratio_snaps_keywords_and_sizes() {
        assert_eq!(AspectRatio::snap("portrait"), Some((AspectRatio::Portrait9x16, None)));
        assert_eq!(AspectRatio::snap("9:16"), Some((AspectRatio::Portrait9x16, None)));

        let (ratio, warning) = AspectRatio::snap("1920x1080").unwrap_or_default();
        assert_eq!(ratio, AspectRatio::Landscape16x9);
        assert_eq!(warning.as_deref(), Some("Aspect ratio snapped to 16:9."));

        let (ratio, _) = AspectRatio::snap("2:3").unwrap_or_default();
        assert_eq!(ratio, AspectRatio::Portrait3x4);

        assert_eq!(AspectRatio::snap("banana"), None);
        assert_eq!(AspectRatio::snap("0x10"), None);
    }

    #[test]
    fn aspect_ratio_serializes_as_wire_value() -> anyhow::Result<()> {
        assert_eq!(serde_json::to_string(&AspectRatio::Landscape4x3)?, "\"4:3\"");
        Ok(())
    }

    #[test]
    fn image_size_hints_tier_by_longest_edge() {
        assert_eq!(ImageSize::from_hint("4k"), Some(ImageSize::FourK));
        assert_eq!(ImageSize::from_hint("1200x800"), Some(ImageSize::OneK));
        assert_eq!(ImageSize::from_hint("2048x1024"), Some(ImageSize::TwoK));
        assert_eq!(ImageSize::from_hint("4096x2048"), Some(ImageSize::FourK));
        assert_eq!(ImageSize::from_hint("huge"), None);
    }

    #[test]
    fn submission_emptiness_ignores_whitespace() {
        assert!(Submission::new("  \n", Vec::new(), AspectRatio::Square).is_empty());
        assert!(!Submission::new("a cat", Vec::new(), AspectRatio::Square).is_empty());
        let media = vec![MediaItem::from_bytes(b"img", "image/png")];
        assert!(!Submission::new("", media, AspectRatio::Square).is_empty());
    }

    #[test]
    fn take_submission_clears_draft_atomically() {
        let mut composer = Composer::new(AspectRatio::Portrait3x4);
        composer.set_text("poster for a jazz night");
        composer.attach(MediaItem::from_bytes(b"ref", "image/png"));

        let submission = composer.take_submission();
        let Some(submission) = submission else {
            panic!("expected a submission");
        };
        assert_eq!(submission.text, "poster for a jazz night");
        assert_eq!(submission.media.len(), 1);
        assert_eq!(submission.aspect_ratio, AspectRatio::Portrait3x4);

        assert!(composer.text().is_empty());
        assert!(composer.pending_media().is_empty());
        assert_eq!(composer.aspect_ratio(), AspectRatio::Portrait3x4);
    }

    #[test]
    fn take_submission_on_empty_draft_is_a_noop() {
        let mut composer = Composer::default();
        composer.set_text("   ");
        assert!(composer.take_submission().is_none());
        assert_eq!(composer.text(), "   ");
    }
}
