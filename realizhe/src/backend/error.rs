use serde::Deserialize;
use thiserror::Error;

/// Postgres foreign key violation.
pub const FOREIGN_KEY_VIOLATION: &str = "23503";
/// PostgREST: a single-row read matched zero or several rows.
pub const NOT_SINGLE_ROW: &str = "PGRST116";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0}")]
    NotConfigured(&'static str),
    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl BackendError {
    pub fn api(status: u16, code: Option<&str>, message: impl Into<String>) -> Self {
        BackendError::Api {
            status,
            code: code.map(String::from),
            message: message.into(),
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            BackendError::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Api { status, .. } => Some(*status),
            BackendError::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        self.code() == Some(FOREIGN_KEY_VIOLATION)
    }

    pub fn is_not_single_row(&self) -> bool {
        self.code() == Some(NOT_SINGLE_ROW)
    }

    pub fn is_not_configured(&self) -> bool {
        matches!(self, BackendError::NotConfigured(_))
    }

    /// Build an error from a non-2xx response body. Understands the PostgREST
    /// (`code`/`message`), GoTrue (`error_description`/`msg`) and Storage
    /// (`error`/`message`) envelopes; falls back to the raw body.
    pub fn from_response(status: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct Envelope {
            code: Option<serde_json::Value>,
            error_code: Option<String>,
            message: Option<String>,
            msg: Option<String>,
            error_description: Option<String>,
            error: Option<String>,
        }

        let Ok(envelope) = serde_json::from_str::<Envelope>(body) else {
            let message = if body.trim().is_empty() {
                format!("backend returned status {status}")
            } else {
                body.trim().to_string()
            };
            return BackendError::api(status, None, message);
        };

        let code = match envelope.code {
            Some(serde_json::Value::String(code)) => Some(code),
            Some(serde_json::Value::Number(code)) => Some(code.to_string()),
            _ => envelope.error_code.or_else(|| envelope.error.clone()),
        };
        let message = envelope
            .message
            .or(envelope.msg)
            .or(envelope.error_description)
            .or(envelope.error)
            .unwrap_or_else(|| format!("backend returned status {status}"));

        BackendError::Api {
            status,
            code,
            message,
        }
    }
}
