use std::fmt;

use super::registry::{Capability, ModelRegistry, ModelSpec};

/// Why the preferred model was used instead of the requested one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    Unspecified,
    Unavailable { requested: String, capability: Capability },
}

impl fmt::Display for Fallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unspecified => f.write_str("No model specified; using default."),
            Self::Unavailable {
                requested,
                capability,
            } => write!(
                f,
                "Requested model '{requested}' unavailable for capability '{capability}'."
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub fallback: Option<Fallback>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no models available for capability '{0}'")]
pub struct NoModelForCapability(pub Capability);

impl ModelRegistry {
    /// Resolves `requested` for `capability`, falling back to the preferred model.
    pub fn select(
        &self,
        requested: Option<&str>,
        capability: Capability,
    ) -> Result<ModelSelection, NoModelForCapability> {
        let fallback = match requested {
            Some(name) => match self.get(name).filter(|model| model.supports(capability)) {
                Some(model) => {
                    return Ok(ModelSelection {
                        model: model.clone(),
                        fallback: None,
                    })
                }
                None => Fallback::Unavailable {
                    requested: name.trim().to_string(),
                    capability,
                },
            },
            None => Fallback::Unspecified,
        };
        let model = self
            .preferred(capability)
            .ok_or(NoModelForCapability(capability))?;
        Ok(ModelSelection {
            model: model.clone(),
            fallback: Some(fallback),
        })
    }
}
