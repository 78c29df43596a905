use std::sync::Arc;

use anyhow::Result;
use lumen_contracts::media::MediaItem;
use lumen_contracts::payload::{parse_structured_payload, StructuredPayload};
use lumen_contracts::schema::SchemaNode;
use tracing::debug;

use crate::errors::EngineError;
use crate::instructions::prompt_synthesis_instruction;
use crate::services::{request_parts, ReasoningRequest, ReasoningService};

/// Produces the structured payload for a request against a response schema.
#[derive(Clone)]
pub struct PromptSynthesizer {
    service: Arc<dyn ReasoningService>,
    model: String,
    temperature: f32,
}

impl PromptSynthesizer {
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

    pub async fn synthesize(
        &self,
        text: &str,
        media: &[MediaItem],
        schema: &SchemaNode,
    ) -> Result<StructuredPayload> {
        let request = ReasoningRequest {
            model: self.model.clone(),
            system_instruction: prompt_synthesis_instruction(),
            parts: request_parts(text, media),
            response_schema: schema.clone(),
            temperature: self.temperature,
        };
        let raw = self.service.generate_json(request).await?;
        let payload = parse_structured_payload(&raw).map_err(EngineError::from)?;
        debug!(
            fields = ?payload.present_fields(),
            master_prompt_chars = payload.master_prompt.chars().count(),
            "payload synthesized"
        );
        Ok(payload)
    }
}
