//! Decoding of `receive --output=json` lines.
//!
//! signal-cli emits one JSON object per line:
//!
//! ```json
//! {"envelope":{"sourceNumber":"+14155551234","source":"+14155551234",
//!   "dataMessage":{"message":"join"}},"account":"+14155550100"}
//! ```
//!
//! Only the sender and message text matter here. Everything else is ignored.

use serde::Deserialize;

use crate::error::ChannelError;

/// Top-level frame wrapping an envelope.
#[derive(Debug, Default, Deserialize)]
struct Frame {
    #[serde(default)]
    envelope: Option<Envelope>,
}

/// One decoded unit from the event stream.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default)]
    source_number: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    data_message: Option<DataMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DataMessage {
    #[serde(default)]
    message: Option<String>,
}

impl Envelope {
    /// Decode a single stream line.
    ///
    /// A well-formed frame without an `envelope` key yields an empty envelope
    /// (no sender, no text) rather than an error.
    pub fn parse(line: &str) -> Result<Self, ChannelError> {
        let frame: Frame = serde_json::from_str(line.trim())
            .map_err(|e| ChannelError::InvalidMessage(e.to_string()))?;
        Ok(frame.envelope.unwrap_or_default())
    }

    /// Requester identity: `sourceNumber` when present, else `source`.
    ///
    /// Hidden-number senders only carry an opaque UUID in `source`.
    pub fn sender(&self) -> Option<&str> {
        non_empty(self.source_number.as_deref()).or_else(|| non_empty(self.source.as_deref()))
    }

    /// Trimmed message text, if any.
    pub fn text(&self) -> Option<&str> {
        self.data_message
            .as_ref()
            .and_then(|d| d.message.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}
