use std::sync::Arc;

use anyhow::Result;
use lumen_contracts::composer::{AspectRatio, ImageSize};
use lumen_contracts::media::ImageReference;
use tracing::debug;

use crate::errors::EngineError;
use crate::services::{ImageGenerationRequest, ImageService, ResponsePart};

/// Renders the master instruction into an image.
#[derive(Clone)]
pub struct ImageRenderer {
    service: Arc<dyn ImageService>,
    model: String,
    image_size: ImageSize,
}

impl ImageRenderer {
    pub fn new(service: Arc<dyn ImageService>, model: impl Into<String>, image_size: ImageSize) -> Self {
        Self {
            service,
            model: model.into(),
            image_size,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    pub fn image_size(&self) -> ImageSize {
        self.image_size
    }

    pub fn set_image_size(&mut self, image_size: ImageSize) {
        self.image_size = image_size;
    }

    /// Only the instruction text is sent. The first inline image wins.
    pub async fn render(
        &self,
        master_instruction: &str,
        aspect_ratio: AspectRatio,
    ) -> Result<ImageReference> {
        let request = ImageGenerationRequest {
            model: self.model.clone(),
            prompt: master_instruction.to_string(),
            aspect_ratio,
            image_size: self.image_size,
        };
        let parts = self.service.generate_image(request).await?;
        let first_image = parts.into_iter().find_map(|part| match part {
            ResponsePart::InlineImage { mime_type, data } => Some((mime_type, data)),
            ResponsePart::Text(text) => {
                debug!(chars = text.chars().count(), "image model returned text alongside");
                None
            }
        });
        let Some((mime_type, data)) = first_image else {
            return Err(EngineError::NoImage.into());
        };
        ImageReference::from_inline(&mime_type, &data)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lumen_contracts::composer::{AspectRatio, ImageSize};

    use super::ImageRenderer;
    use crate::errors::NO_IMAGE_MESSAGE;
    use crate::services::ResponsePart;
    use crate::test_support::ScriptedImages;

    #[tokio::test]
    async fn first_inline_image_wins() -> anyhow::Result<()> {
        let service = Arc::new(ScriptedImages::replying(vec![
            ResponsePart::Text("Sure".to_string()),
            ResponsePart::InlineImage {
                mime_type: "image/jpeg".to_string(),
                data: "Zmlyc3Q=".to_string(),
            },
            ResponsePart::InlineImage {
                mime_type: "image/png".to_string(),
                data: "c2Vjb25k".to_string(),
            },
        ]));
        let renderer = ImageRenderer::new(service.clone(), "gemini-3-pro-image-preview", ImageSize::OneK);
        let image = renderer.render("A cat astronaut.", AspectRatio::Portrait9x16).await?;
        assert_eq!(image.as_str(), "data:image/jpeg;base64,Zmlyc3Q=");

        let requests = service.requests();
        assert_eq!(requests[0].prompt, "A cat astronaut.");
        assert_eq!(requests[0].aspect_ratio, AspectRatio::Portrait9x16);
        assert_eq!(requests[0].image_size, ImageSize::OneK);
        Ok(())
    }

    #[tokio::test]
    async fn text_only_response_is_no_image() {
        let service = Arc::new(ScriptedImages::replying(vec![ResponsePart::Text(
            "I can't draw that".to_string(),
        )]));
        let renderer = ImageRenderer::new(service, "gemini-3-pro-image-preview", ImageSize::TwoK);
        let err = renderer.render("x", AspectRatio::Square).await.err();
        assert_eq!(err.map(|err| err.to_string()).as_deref(), Some(NO_IMAGE_MESSAGE));
    }

    #[tokio::test]
    async fn service_failure_propagates_unchanged() {
        let service = Arc::new(ScriptedImages::failing("Gemini request failed (500): overloaded"));
        let renderer = ImageRenderer::new(service, "gemini-3-pro-image-preview", ImageSize::TwoK);
        let err = renderer.render("x", AspectRatio::Square).await.err();
        assert_eq!(
            err.map(|err| err.to_string()).as_deref(),
            Some("Gemini request failed (500): overloaded")
        );
    }
}
