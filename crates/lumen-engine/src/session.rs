use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::conversation::{Conversation, TurnPipeline};
use crate::credentials::{CredentialProvider, CredentialState};
use crate::errors::SessionError;
use crate::events::{EventBus, EventPayload};

/// Owns the credential gate in front of the conversation.
pub struct SessionController {
    credentials: Arc<dyn CredentialProvider>,
    state: Arc<watch::Sender<CredentialState>>,
    events: EventBus,
    conversation: Conversation,
}

impl SessionController {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        pipeline: TurnPipeline,
        events: EventBus,
    ) -> Self {
        let (sender, _) = watch::channel(CredentialState::Unknown);
        let state = Arc::new(sender);
        let conversation = Conversation::new(pipeline, state.clone(), events.clone());
        Self {
            credentials,
            state,
            events,
            conversation,
        }
    }

    /// Queries the provider once and settles `Unknown` into a definite state.
    pub async fn initialize(&self) -> CredentialState {
        let state = if self.credentials.has_credential().await {
            CredentialState::Present
        } else {
            CredentialState::Absent
        };
        publish_credential_state(&self.state, &self.events, state);
        state
    }

    /// Asks for a credential. Success is trusted without re-querying.
    pub async fn connect(&self) -> Result<CredentialState> {
        if let Err(err) = self.credentials.request_credential().await {
            warn!(error = %err, "credential request failed");
            if self.state() == CredentialState::Unknown {
                publish_credential_state(&self.state, &self.events, CredentialState::Absent);
            }
            return Err(err);
        }
        info!("credential connected");
        publish_credential_state(&self.state, &self.events, CredentialState::Present);
        Ok(CredentialState::Present)
    }

    pub fn state(&self) -> CredentialState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<CredentialState> {
        self.state.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Only reachable while a credential is present.
    pub fn conversation(&self) -> Result<&Conversation, SessionError> {
        match self.state() {
            CredentialState::Present => Ok(&self.conversation),
            CredentialState::Unknown | CredentialState::Absent => {
                Err(SessionError::CredentialRequired)
            }
        }
    }
}

pub(crate) fn publish_credential_state(
    sender: &watch::Sender<CredentialState>,
    events: &EventBus,
    state: CredentialState,
) {
    let previous = sender.send_replace(state);
    if previous == state {
        return;
    }
    let mut payload = EventPayload::new();
    payload.insert(
        "state".to_string(),
        Value::String(state.as_str().to_string()),
    );
    payload.insert(
        "previous".to_string(),
        Value::String(previous.as_str().to_string()),
    );
    events.notify("credential_state", payload);
}
