use lumen_contracts::response::ResponseParseError;

/// Remote-service messages that mean the credential itself is unusable.
pub const CREDENTIAL_REJECTION_MARKERS: &[&str] = &[
    "Requested entity was not found",
    "API_KEY_INVALID",
    "API key not valid",
];

pub const NO_IMAGE_MESSAGE: &str = "No image was returned by the model.";

const TURN_ERROR_MAX_CHARS: usize = 600;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No image was returned by the model.")]
    NoImage,
    #[error("no API key is available for the remote service")]
    CredentialMissing,
    #[error("{service} request failed ({status}): {body}")]
    RemoteStatus {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error(transparent)]
    Parse(#[from] ResponseParseError),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("connect a credential before submitting")]
    CredentialRequired,
}

/// How a failed turn is surfaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnFailure {
    /// Drop the placeholder and go back to the credential screen.
    CredentialRejected,
    /// Show the message inline on an errored turn.
    Recoverable(String),
}

pub fn classify_failure(err: &anyhow::Error) -> TurnFailure {
    let credential_missing = err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<EngineError>(),
            Some(EngineError::CredentialMissing)
        )
    });
    if credential_missing || is_credential_rejection(err) {
        return TurnFailure::CredentialRejected;
    }
    TurnFailure::Recoverable(error_chain_text(err, TURN_ERROR_MAX_CHARS))
}

fn is_credential_rejection(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        let text = cause.to_string();
        CREDENTIAL_REJECTION_MARKERS
            .iter()
            .any(|marker| text.contains(marker))
    })
}

pub fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
