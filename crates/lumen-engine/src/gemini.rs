use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lumen_contracts::models::{normalize_model_name, Capability, ModelRegistry};
use reqwest::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::credentials::CredentialProvider;
use crate::errors::{truncate_text, EngineError};
use crate::services::{
    ImageGenerationRequest, ImageService, ReasoningRequest, ReasoningService, RequestPart,
    ResponsePart,
};

const SERVICE: &str = "Gemini";

/// REST client for the Generative Language API.
///
/// No timeout and no retry are applied here; a failed call fails the turn.
pub struct GeminiClient {
    api_base: String,
    http: HttpClient,
    credentials: Arc<dyn CredentialProvider>,
    registry: ModelRegistry,
}

impl GeminiClient {
    pub fn new(api_base: impl Into<String>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            api_base: api_base.into().trim().trim_end_matches('/').to_string(),
            http: HttpClient::new(),
            credentials,
            registry: ModelRegistry::default(),
        }
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base,
            normalize_model_name(model)
        )
    }

    async fn post(&self, model: &str, payload: &Value) -> Result<Value> {
        let api_key = self
            .credentials
            .api_key()
            .ok_or(EngineError::CredentialMissing)?;
        let endpoint = self.endpoint_for_model(model);
        debug!(%endpoint, "posting generateContent request");
        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", api_key.as_str())])
            .json(payload)
            .send()
            .await
            .with_context(|| format!("{SERVICE} request failed ({endpoint})"))?;
        response_json_or_error(response).await
    }
}

#[async_trait]
impl ReasoningService for GeminiClient {
    async fn generate_json(&self, request: ReasoningRequest) -> Result<String> {
        let payload = reasoning_payload(&request);
        let response = self.post(&request.model, &payload).await?;
        Ok(extract_response_text(&response))
    }
}

#[async_trait]
impl ImageService for GeminiClient {
    async fn generate_image(&self, request: ImageGenerationRequest) -> Result<Vec<ResponsePart>> {
        let send_image_size = self
            .registry
            .get(&request.model)
            .map(|spec| spec.supports(Capability::ImageSize))
            // Unknown models get the field too; the API ignores it where unsupported.
            .unwrap_or(true);
        let payload = image_payload(&request, send_image_size);
        let response = self.post(&request.model, &payload).await?;
        extract_response_parts(&response)
    }
}

pub(crate) fn reasoning_payload(request: &ReasoningRequest) -> Value {
    json!({
        "systemInstruction": {
            "parts": [{ "text": request.system_instruction }],
        },
        "contents": [{
            "role": "user",
            "parts": request.parts.iter().map(part_value).collect::<Vec<Value>>(),
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": request.response_schema.to_value(),
            "temperature": request.temperature,
        },
    })
}

pub(crate) fn image_payload(request: &ImageGenerationRequest, send_image_size: bool) -> Value {
    let mut image_config = Map::new();
    image_config.insert(
        "aspectRatio".to_string(),
        Value::String(request.aspect_ratio.as_str().to_string()),
    );
    if send_image_size {
        image_config.insert(
            "imageSize".to_string(),
            Value::String(request.image_size.as_str().to_string()),
        );
    }
    json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": request.prompt }],
        }],
        "generationConfig": {
            "responseModalities": ["IMAGE", "TEXT"],
            "imageConfig": Value::Object(image_config),
        },
    })
}

fn part_value(part: &RequestPart) -> Value {
    match part {
        RequestPart::Text(text) => json!({ "text": text }),
        RequestPart::InlineData(item) => json!({
            "inlineData": {
                "mimeType": item.mime_type,
                "data": item.data,
            }
        }),
    }
}

fn candidate_parts(response: &Value) -> Vec<Value> {
    response
        .get("candidates")
        .and_then(Value::as_array)
        .map(|candidates| {
            candidates
                .iter()
                .filter_map(|candidate| {
                    candidate
                        .get("content")
                        .and_then(|content| content.get("parts"))
                        .and_then(Value::as_array)
                })
                .flatten()
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// Concatenated text of the first candidate. Empty when there is none.
pub(crate) fn extract_response_text(response: &Value) -> String {
    response
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|candidates| candidates.first())
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter(|part| !part.get("thought").and_then(Value::as_bool).unwrap_or(false))
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

pub(crate) fn extract_response_parts(response: &Value) -> Result<Vec<ResponsePart>> {
    let mut out = Vec::new();
    for part in candidate_parts(response) {
        let inline = part
            .get("inlineData")
            .or_else(|| part.get("inline_data"))
            .and_then(Value::as_object);
        if let Some(inline) = inline {
            let data = inline
                .get("data")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if data.is_empty() {
                continue;
            }
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .unwrap_or("image/png");
            out.push(ResponsePart::InlineImage {
                mime_type: mime_type.to_string(),
                data: data.to_string(),
            });
            continue;
        }
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            out.push(ResponsePart::Text(text.to_string()));
        }
    }
    Ok(out)
}

async fn response_json_or_error(response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let body = response
        .text()
        .await
        .with_context(|| format!("{SERVICE} response body read failed"))?;
    if !status.is_success() {
        return Err(status_error(status.as_u16(), &body).into());
    }
    serde_json::from_str(&body).with_context(|| format!("{SERVICE} returned invalid JSON payload"))
}

fn status_error(status: u16, body: &str) -> EngineError {
    EngineError::RemoteStatus {
        service: SERVICE,
        status,
        body: truncate_text(&remote_error_message(body), 512),
    }
}

/// Prefers `error.message` from a JSON error body, else the raw body.
fn remote_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|error| error.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
