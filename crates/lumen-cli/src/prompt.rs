use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use lumen_engine::{CredentialProvider, EnvCredentialProvider};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

/// Stdin closed while a line was expected.
#[derive(Debug, thiserror::Error)]
#[error("input closed")]
pub struct InputClosed;

/// Line reader shared by the REPL and the connect screen.
#[derive(Clone)]
pub struct InputLines {
    inner: Arc<Mutex<Lines<BufReader<Stdin>>>>,
}

impl InputLines {
    pub fn stdin() -> Self {
        Self {
            inner: Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines())),
        }
    }

    /// Prints `prompt` and waits for the next line.
    pub async fn read_line(&self, prompt: &str) -> Result<String> {
        print!("{prompt}");
        io::stdout().flush()?;
        let mut lines = self.inner.lock().await;
        match lines.next_line().await? {
            Some(line) => Ok(line),
            None => Err(InputClosed.into()),
        }
    }
}

/// Environment key first; otherwise asks for one on the terminal.
pub struct PromptCredentials {
    env: EnvCredentialProvider,
    input: InputLines,
}

impl PromptCredentials {
    pub fn new(input: InputLines) -> Self {
        Self {
            env: EnvCredentialProvider::new(),
            input,
        }
    }
}

#[async_trait]
impl CredentialProvider for PromptCredentials {
    async fn has_credential(&self) -> bool {
        self.env.has_credential().await
    }

    async fn request_credential(&self) -> Result<()> {
        let key = self.input.read_line("Gemini API key: ").await?;
        let key = key.trim();
        if key.is_empty() {
            bail!("no API key entered");
        }
        self.env.set_api_key(key);
        Ok(())
    }

    fn api_key(&self) -> Option<String> {
        self.env.api_key()
    }
}
