mod registry;
mod selection;

pub use registry::{normalize_model_name, Capability, ModelRegistry, ModelSpec};
pub use selection::{Fallback, ModelSelection, NoModelForCapability};
