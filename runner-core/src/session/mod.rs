//! Session management

pub mod state;
pub mod table;

use serde::{Deserialize, Serialize};

use crate::error::RelayError;
use crate::relay::Frame;

// Re-export key types for convenience
pub use state::{Session, SessionInfo, SessionState};
pub use table::{Attachment, SessionTable};

/// Reference to a session as carried by stream and stop URLs
///
/// URLs issued by `Start` look like
/// `{base}Services.Stream?_id={instance}&_sid={session}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRef {
    /// Session id
    #[serde(rename = "_sid")]
    pub session_id: String,
    /// Id of the service instance that issued the session
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
}

impl SessionRef {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            instance_id: None,
        }
    }

    #[must_use]
    pub fn with_instance(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    /// Parse `_sid` and `_id` from a query string (leading `?` allowed)
    pub fn from_query(query: &str) -> Result<Self, RelayError> {
        let query = query.trim().trim_start_matches('?');
        let mut session_id = None;
        let mut instance_id = None;
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "_sid" => session_id = Some(value.into_owned()),
                "_id" => instance_id = Some(value.into_owned()),
                _ => {}
            }
        }

        match session_id {
            Some(session_id) if !session_id.is_empty() => Ok(Self {
                session_id,
                instance_id: instance_id.filter(|id| !id.is_empty()),
            }),
            _ => Err(RelayError::InvalidOpen("missing _sid".to_string())),
        }
    }

    /// Parse a full stream or stop URL
    pub fn from_url(raw: &str) -> Result<Self, RelayError> {
        let url = url::Url::parse(raw.trim())
            .map_err(|e| RelayError::InvalidOpen(format!("bad url: {}", e)))?;
        Self::from_query(url.query().unwrap_or_default())
    }

    /// Parse the first frame of a stream
    ///
    /// Accepts a JSON object (`{"_sid": "...", "_id": "..."}`), a full URL or
    /// a bare query string.
    pub fn from_frame(frame: &Frame) -> Result<Self, RelayError> {
        let text = match frame {
            Frame::Text(text) => text.as_str(),
            Frame::Binary(bytes) => std::str::from_utf8(bytes)
                .map_err(|_| RelayError::InvalidOpen("first frame is not utf-8".to_string()))?,
        };
        let text = text.trim();

        if text.starts_with('{') {
            let parsed: SessionRef = serde_json::from_str(text)
                .map_err(|e| RelayError::InvalidOpen(format!("bad open frame: {}", e)))?;
            if parsed.session_id.is_empty() {
                return Err(RelayError::InvalidOpen("missing _sid".to_string()));
            }
            Ok(parsed)
        } else if text.contains("://") {
            Self::from_url(text)
        } else {
            Self::from_query(text)
        }
    }
}
