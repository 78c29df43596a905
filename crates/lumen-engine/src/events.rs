use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

pub type EventPayload = Map<String, Value>;

const CHANNEL_CAPACITY: usize = 256;

/// Fan-out for session notifications.
///
/// - default fields are `type`, `session_id`, `ts`
/// - caller payload is merged last and can override defaults
/// - when a log path is set, one compact JSON object per line is appended
#[derive(Debug, Clone)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

#[derive(Debug)]
struct EventBusInner {
    session_id: String,
    log_path: Option<PathBuf>,
    lock: Mutex<()>,
    sender: broadcast::Sender<Value>,
}

impl EventBus {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self::build(session_id.into(), None)
    }

    pub fn with_log(session_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::build(session_id.into(), Some(path.into()))
    }

    fn build(session_id: String, log_path: Option<PathBuf>) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(EventBusInner {
                session_id,
                log_path,
                lock: Mutex::new(()),
                sender,
            }),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.inner.log_path.as_deref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.inner.sender.subscribe()
    }

    pub fn emit(&self, event_type: &str, payload: EventPayload) -> Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(event_type.to_string()));
        event.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        for (key, value) in payload {
            event.insert(key, value);
        }
        let event = Value::Object(event);

        if let Some(path) = &self.inner.log_path {
            self.append_line(path, &event)?;
        }
        // No subscribers is fine.
        let _ = self.inner.sender.send(event.clone());
        Ok(event)
    }

    /// Like [`EventBus::emit`] but a failed log append is only logged.
    pub(crate) fn notify(&self, event_type: &str, payload: EventPayload) {
        if let Err(err) = self.emit(event_type, payload) {
            warn!(event_type, error = %err, "event log append failed");
        }
    }

    fn append_line(&self, path: &Path, event: &Value) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(event)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow!("event log lock poisoned"))?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }
}

pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
