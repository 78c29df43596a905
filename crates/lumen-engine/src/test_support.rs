//! Scripted stand-ins for the remote services and the credential provider.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::credentials::CredentialProvider;
use crate::services::{
    ImageGenerationRequest, ImageService, ReasoningRequest, ReasoningService, ResponsePart,
};

enum Script<T> {
    Replies(Mutex<VecDeque<T>>),
    Fail(String),
}

/// Replies with queued texts in order; fails once the queue is empty.
pub(crate) struct ScriptedReasoning {
    script: Script<String>,
    requests: Mutex<Vec<ReasoningRequest>>,
}

impl ScriptedReasoning {
    pub(crate) fn replying<'a>(replies: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            script: Script::Replies(Mutex::new(
                replies.into_iter().map(str::to_string).collect(),
            )),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            script: Script::Fail(message.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<ReasoningRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ReasoningService for ScriptedReasoning {
    async fn generate_json(&self, request: ReasoningRequest) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        // Lets concurrently running turns interleave.
        tokio::task::yield_now().await;
        match &self.script {
            Script::Fail(message) => bail!("{message}"),
            Script::Replies(queue) => queue
                .lock()
                .map_err(|_| anyhow!("script lock poisoned"))?
                .pop_front()
                .ok_or_else(|| anyhow!("no scripted reasoning reply left")),
        }
    }
}

/// Returns the same parts for every request, or always fails.
pub(crate) struct ScriptedImages {
    script: Script<Vec<ResponsePart>>,
    requests: Mutex<Vec<ImageGenerationRequest>>,
}

impl ScriptedImages {
    pub(crate) fn replying(parts: Vec<ResponsePart>) -> Self {
        Self {
            script: Script::Replies(Mutex::new(VecDeque::from([parts]))),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn png() -> Self {
        Self::replying(vec![ResponsePart::InlineImage {
            mime_type: "image/png".to_string(),
            data: "iVBORw0KGgo=".to_string(),
        }])
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            script: Script::Fail(message.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<ImageGenerationRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ImageService for ScriptedImages {
    async fn generate_image(&self, request: ImageGenerationRequest) -> Result<Vec<ResponsePart>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        tokio::task::yield_now().await;
        match &self.script {
            Script::Fail(message) => bail!("{message}"),
            Script::Replies(queue) => Ok(queue
                .lock()
                .map_err(|_| anyhow!("script lock poisoned"))?
                .front()
                .cloned()
                .unwrap_or_default()),
        }
    }
}

pub(crate) struct StaticCredentials {
    key: Option<String>,
    grant_on_request: bool,
}

impl StaticCredentials {
    pub(crate) fn present(key: &str) -> Self {
        Self {
            key: Some(key.to_string()),
            grant_on_request: true,
        }
    }

    pub(crate) fn absent() -> Self {
        Self {
            key: None,
            grant_on_request: false,
        }
    }

    /// No key at startup, but `request_credential` succeeds.
    pub(crate) fn grantable() -> Self {
        Self {
            key: None,
            grant_on_request: true,
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn has_credential(&self) -> bool {
        self.key.is_some()
    }

    async fn request_credential(&self) -> Result<()> {
        if !self.grant_on_request {
            bail!("credential picker dismissed");
        }
        Ok(())
    }

    fn api_key(&self) -> Option<String> {
        self.key.clone()
    }
}
