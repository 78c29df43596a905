use std::fmt;

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Text reasoning with structured JSON output.
    Reasoning,
    Image,
    /// The model honours `imageConfig.imageSize`.
    ImageSize,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reasoning => "reasoning",
            Self::Image => "image",
            Self::ImageSize => "image_size",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub label: String,
    pub capabilities: Vec<Capability>,
}

impl ModelSpec {
    fn new(name: &str, label: &str, capabilities: &[Capability]) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            capabilities: capabilities.to_vec(),
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Known Gemini models, in preference order per capability.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::from_models([
            ModelSpec::new("gemini-2.5-flash", "Gemini 2.5 Flash", &[Capability::Reasoning]),
            ModelSpec::new("gemini-2.5-pro", "Gemini 2.5 Pro", &[Capability::Reasoning]),
            ModelSpec::new("gemini-3-pro-preview", "Gemini 3 Pro", &[Capability::Reasoning]),
            ModelSpec::new(
                "gemini-3-pro-image-preview",
                "Gemini 3 Pro Image",
                &[Capability::Image, Capability::ImageSize],
            ),
            ModelSpec::new("gemini-2.5-flash-image", "Gemini 2.5 Flash Image", &[Capability::Image]),
        ])
    }
}

impl ModelRegistry {
    pub fn from_models(models: impl IntoIterator<Item = ModelSpec>) -> Self {
        Self {
            models: models
                .into_iter()
                .map(|model| (model.name.clone(), model))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(normalize_model_name(name))
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn preferred(&self, capability: Capability) -> Option<&ModelSpec> {
        self.models.values().find(|model| model.supports(capability))
    }
}

/// Accepts both `gemini-x` and `models/gemini-x`.
pub fn normalize_model_name(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_prefix("models/").unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::{Capability, ModelRegistry};

    #[test]
    fn default_registry_prefers_flash_and_pro_image() {
        let registry = ModelRegistry::default();
        assert_eq!(
            registry.preferred(Capability::Reasoning).map(|model| model.name.as_str()),
            Some("gemini-2.5-flash")
        );
        assert_eq!(
            registry.preferred(Capability::Image).map(|model| model.name.as_str()),
            Some("gemini-3-pro-image-preview")
        );
        assert_eq!(registry.list().count(), 5);
    }

    #[test]
    fn lookup_accepts_models_prefix() {
        let registry = ModelRegistry::default();
        let spec = registry.get("models/gemini-3-pro-image-preview");
        assert!(spec.is_some_and(|spec| spec.supports(Capability::ImageSize)));
        assert!(registry
            .get("gemini-2.5-flash-image")
            .is_some_and(|spec| !spec.supports(Capability::ImageSize)));
    }
}
