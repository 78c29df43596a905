use anyhow::Result;
use async_trait::async_trait;
use lumen_contracts::composer::{AspectRatio, ImageSize};
use lumen_contracts::media::MediaItem;
use lumen_contracts::schema::SchemaNode;

/// One content part of an outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestPart {
    Text(String),
    InlineData(MediaItem),
}

/// Builds the parts for a user request: media first, then the text.
pub fn request_parts(text: &str, media: &[MediaItem]) -> Vec<RequestPart> {
    let mut parts: Vec<RequestPart> = media.iter().cloned().map(RequestPart::InlineData).collect();
    let text = text.trim();
    if !text.is_empty() {
        parts.push(RequestPart::Text(text.to_string()));
    }
    parts
}

#[derive(Debug, Clone)]
pub struct ReasoningRequest {
    pub model: String,
    pub system_instruction: String,
    pub parts: Vec<RequestPart>,
    pub response_schema: SchemaNode,
    pub temperature: f32,
}

/// A remote structured-reasoning service.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Returns the raw response text, expected to be JSON (possibly fenced).
    async fn generate_json(&self, request: ReasoningRequest) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageGenerationRequest {
    pub model: String,
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub image_size: ImageSize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePart {
    Text(String),
    InlineImage { mime_type: String, data: String },
}

/// A remote image-generation service.
#[async_trait]
pub trait ImageService: Send + Sync {
    async fn generate_image(&self, request: ImageGenerationRequest) -> Result<Vec<ResponsePart>>;
}
