use std::env;

use lumen_contracts::composer::ImageSize;
use tracing::warn;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_REASONING_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_SELECTOR_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_SYNTHESIZER_TEMPERATURE: f32 = 0.9;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub api_base: String,
    pub reasoning_model: String,
    pub image_model: String,
    pub image_size: ImageSize,
    pub selector_temperature: f32,
    pub synthesizer_temperature: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            reasoning_model: DEFAULT_REASONING_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            image_size: ImageSize::default(),
            selector_temperature: DEFAULT_SELECTOR_TEMPERATURE,
            synthesizer_temperature: DEFAULT_SYNTHESIZER_TEMPERATURE,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `LUMEN_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let api_base = read("LUMEN_API_BASE")
            .or_else(|| read("GEMINI_API_BASE"))
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base);
        let image_size = match read("LUMEN_IMAGE_SIZE") {
            Some(raw) => ImageSize::from_hint(&raw).unwrap_or_else(|| {
                warn!(value = %raw, "ignoring unrecognised LUMEN_IMAGE_SIZE");
                defaults.image_size
            }),
            None => defaults.image_size,
        };

        Self {
            api_base,
            reasoning_model: read("LUMEN_REASONING_MODEL").unwrap_or(defaults.reasoning_model),
            image_model: read("LUMEN_IMAGE_MODEL").unwrap_or(defaults.image_model),
            image_size,
            selector_temperature: read_temperature(
                read("LUMEN_SELECTOR_TEMPERATURE"),
                defaults.selector_temperature,
            ),
            synthesizer_temperature: read_temperature(
                read("LUMEN_SYNTHESIZER_TEMPERATURE"),
                defaults.synthesizer_temperature,
            ),
        }
    }
}

fn read_temperature(raw: Option<String>, default: f32) -> f32 {
    raw.and_then(|value| value.parse::<f32>().ok())
        .filter(|value| value.is_finite())
        .map(|value| value.clamp(0.0, 2.0))
        .unwrap_or(default)
}
