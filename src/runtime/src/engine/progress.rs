//! Decoding of the engine's newline-delimited JSON progress streams.
//!
//! Build and pull responses are streams of JSON objects, one per line. Each
//! line is decoded on its own: a malformed line is logged and skipped, while a
//! line carrying an error payload aborts the operation with the engine's
//! message.

use std::marker::PhantomData;

use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use d2w_core::error::Result;

use super::ByteStream;

/// Structured error payload attached to a progress line.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub code: Option<i64>,
}

/// One line of an image build log.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildMessage {
    /// Build output text (usually ends with a newline)
    #[serde(default)]
    pub stream: Option<String>,
    /// Legacy flat error string
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, rename = "errorDetail")]
    pub error_detail: Option<ErrorDetail>,
}

/// One line of an image pull log.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullMessage {
    #[serde(default)]
    pub status: Option<String>,
    /// Layer ID the status refers to
    #[serde(default)]
    pub id: Option<String>,
    /// Rendered progress bar
    #[serde(default)]
    pub progress: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, rename = "errorDetail")]
    pub error_detail: Option<ErrorDetail>,
}

/// Messages that may carry an engine error payload.
pub trait EngineMessage {
    /// The error message, if this line reports a failure.
    fn error_message(&self) -> Option<String>;
}

fn pick_error(detail: &Option<ErrorDetail>, error: &Option<String>) -> Option<String> {
    detail
        .as_ref()
        .map(|d| d.message.clone())
        .filter(|m| !m.is_empty())
        .or_else(|| error.clone())
}

impl EngineMessage for BuildMessage {
    fn error_message(&self) -> Option<String> {
        pick_error(&self.error_detail, &self.error)
    }
}

impl EngineMessage for PullMessage {
    fn error_message(&self) -> Option<String> {
        pick_error(&self.error_detail, &self.error)
    }
}

impl PullMessage {
    /// Render the message as a single human-readable line.
    pub fn render(&self) -> Option<String> {
        let status = self.status.as_deref()?;
        let mut line = String::new();
        if let Some(id) = &self.id {
            line.push_str(id);
            line.push_str(": ");
        }
        line.push_str(status);
        if let Some(progress) = self.progress.as_deref().filter(|p| !p.is_empty()) {
            line.push(' ');
            line.push_str(progress);
        }
        Some(line)
    }
}

/// Incremental splitter/decoder for newline-delimited JSON.
#[derive(Debug)]
pub struct JsonLines<T> {
    buffer: Vec<u8>,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> Default for JsonLines<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> JsonLines<T> {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Feed a chunk and return every record completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<T> {
        self.buffer.extend_from_slice(chunk);

        let mut records = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(record) = decode_line(&line) {
                records.push(record);
            }
        }
        records
    }

    /// Decode whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<T> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&rest)
    }
}

fn decode_line<T: DeserializeOwned>(line: &[u8]) -> Option<T> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    match serde_json::from_str(text) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(error = %e, line = %text, "Skipping malformed progress line");
            None
        }
    }
}

/// Consume a progress stream, handing each decoded message to `on_message`.
///
/// Stops at the first message carrying an error payload and returns it via
/// `on_error`; transport errors from the stream are returned as-is.
pub async fn drain<T, F, E>(mut stream: ByteStream, mut on_message: F, on_error: E) -> Result<()>
where
    T: DeserializeOwned + EngineMessage,
    F: FnMut(&T),
    E: Fn(String) -> d2w_core::ConvertError,
{
    let mut lines = JsonLines::<T>::new();

    while let Some(chunk) = stream.next().await {
        for message in lines.push(&chunk?) {
            if let Some(err) = message.error_message() {
                return Err(on_error(err));
            }
            on_message(&message);
        }
    }

    if let Some(message) = lines.finish() {
        if let Some(err) = message.error_message() {
            return Err(on_error(err));
        }
        on_message(&message);
    }

    Ok(())
}
