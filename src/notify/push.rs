//! Push delivery behind a transport trait: the Expo push API in
//! production, an in-memory recorder for development and tests.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

const EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";

#[derive(Debug, Error)]
pub enum PushError {
    #[error("push request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("push rejected: {0}")]
    Rejected(String),
}

pub trait PushTransport: Send + Sync {
    fn send(&self, token: &str, title: &str, body: &str) -> Result<(), PushError>;
}

#[derive(Serialize)]
struct ExpoMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    sound: &'a str,
}

/// Live transport against the Expo push API.
pub struct ExpoPush {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl ExpoPush {
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            endpoint: EXPO_PUSH_URL.to_string(),
        }
    }
}

impl Default for ExpoPush {
    fn default() -> Self {
        Self::new()
    }
}

impl PushTransport for ExpoPush {
    fn send(&self, token: &str, title: &str, body: &str) -> Result<(), PushError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ExpoMessage {
                to: token,
                title,
                body,
                sound: "default",
            })
            .send()?;
        if !response.status().is_success() {
            return Err(PushError::Rejected(format!(
                "expo returned {}",
                response.status()
            )));
        }
        debug!(token, "push delivered");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushRecord {
    pub token: String,
    pub title: String,
    pub body: String,
}

/// Records every send instead of delivering. Tests inspect `sent`.
#[derive(Debug, Default)]
pub struct SimulatedPush {
    pub sent: Mutex<Vec<PushRecord>>,
}

impl SimulatedPush {
    pub fn sent_count(&self) -> usize {
        self.sent.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl PushTransport for SimulatedPush {
    fn send(&self, token: &str, title: &str, body: &str) -> Result<(), PushError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(PushRecord {
                token: token.to_string(),
                title: title.to_string(),
                body: body.to_string(),
            });
        }
        debug!(token, "push recorded (simulated)");
        Ok(())
    }
}

// Lets tests keep a handle on the recorder while the dispatcher owns
// the transport.
impl PushTransport for Arc<SimulatedPush> {
    fn send(&self, token: &str, title: &str, body: &str) -> Result<(), PushError> {
        self.as_ref().send(token, title, body)
    }
}
