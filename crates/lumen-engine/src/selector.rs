use std::sync::Arc;

use anyhow::Result;
use lumen_contracts::fields::RequiredFields;
use lumen_contracts::media::MediaItem;
use lumen_contracts::response::parse_field_names;
use lumen_contracts::schema::field_selection_schema;
use tracing::{debug, warn};

use crate::errors::EngineError;
use crate::instructions::field_selection_instruction;
use crate::services::{request_parts, ReasoningRequest, ReasoningService};

/// Decides which vocabulary fields a request needs.
#[derive(Clone)]
pub struct FieldSelector {
    service: Arc<dyn ReasoningService>,
    model: String,
    temperature: f32,
}

impl FieldSelector {
    pub fn new(service: Arc<dyn ReasoningService>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            service,
            model: model.into(),
            temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    /// The result always contains `master_prompt`.
    pub async fn select_fields(&self, text: &str, media: &[MediaItem]) -> Result<RequiredFields> {
        let request = ReasoningRequest {
            model: self.model.clone(),
            system_instruction: field_selection_instruction(),
            parts: request_parts(text, media),
            response_schema: field_selection_schema(),
            temperature: self.temperature,
        };
        let raw = self.service.generate_json(request).await?;
        let names = parse_field_names(&raw).map_err(EngineError::from)?;
        let (fields, unknown) = RequiredFields::from_names(&names);
        if !unknown.is_empty() {
            warn!(?unknown, "discarding field names outside the vocabulary");
        }
        debug!(fields = ?fields.names(), "fields selected");
        Ok(fields)
    }
}
