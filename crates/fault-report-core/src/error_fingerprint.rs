//! Error normalization and fingerprinting.
//!
//! Any value a handler can fail with is reduced to one stable string through a
//! fixed fallback chain (trace, then message, then rendered value, then a
//! sentinel). The fingerprint is derived from that string alone.

use std::fmt;

use sha2::{Digest, Sha256};

pub const UNKNOWN_ERROR_TEXT: &str = "Unknown error";
pub const FINGERPRINT_LEN: usize = 8;

/// Shape-independent view of a failure value.
///
/// Every accessor is optional; implementors expose whatever they have and
/// [`normalize_error`] picks the most informative one.
pub trait ReportableError {
    /// Structured trace: cause chain, backtrace, or a `stack` field.
    fn trace(&self) -> Option<String> {
        None
    }

    /// Short human message.
    fn message(&self) -> Option<String> {
        None
    }

    /// Plain string rendering of the value itself.
    fn rendered(&self) -> Option<String> {
        None
    }
}

const BACKTRACE_SECTION: &str = "\n\nStack backtrace:";

impl ReportableError for anyhow::Error {
    /// Message plus cause chain. A captured backtrace is dropped so the same
    /// failure hashes alike whatever `RUST_BACKTRACE` says and whichever
    /// runtime thread observed it.
    fn trace(&self) -> Option<String> {
        Some(strip_backtrace(format!("{self:?}")))
    }

    fn message(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl ReportableError for dyn std::error::Error + Send + Sync + 'static {
    fn trace(&self) -> Option<String> {
        render_source_chain(self)
    }

    fn message(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl ReportableError for Box<dyn std::error::Error + Send + Sync + 'static> {
    fn trace(&self) -> Option<String> {
        render_source_chain(self.as_ref())
    }

    fn message(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl ReportableError for std::io::Error {
    fn trace(&self) -> Option<String> {
        render_source_chain(self)
    }

    fn message(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl ReportableError for serde_json::Value {
    fn trace(&self) -> Option<String> {
        self.get("stack")
            .and_then(serde_json::Value::as_str)
            .map(ToOwned::to_owned)
    }

    fn message(&self) -> Option<String> {
        self.get("message")
            .and_then(serde_json::Value::as_str)
            .map(ToOwned::to_owned)
    }

    fn rendered(&self) -> Option<String> {
        match self {
            serde_json::Value::Null => None,
            serde_json::Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl ReportableError for str {
    fn rendered(&self) -> Option<String> {
        Some(self.to_string())
    }
}

impl ReportableError for String {
    fn rendered(&self) -> Option<String> {
        Some(self.clone())
    }
}

impl<E: ReportableError> ReportableError for Option<E> {
    fn trace(&self) -> Option<String> {
        self.as_ref().and_then(ReportableError::trace)
    }

    fn message(&self) -> Option<String> {
        self.as_ref().and_then(ReportableError::message)
    }

    fn rendered(&self) -> Option<String> {
        self.as_ref().and_then(ReportableError::rendered)
    }
}

impl<T: ReportableError + ?Sized> ReportableError for &T {
    fn trace(&self) -> Option<String> {
        (**self).trace()
    }

    fn message(&self) -> Option<String> {
        (**self).message()
    }

    fn rendered(&self) -> Option<String> {
        (**self).rendered()
    }
}

fn strip_backtrace(mut rendered: String) -> String {
    if let Some(start) = rendered.find(BACKTRACE_SECTION) {
        rendered.truncate(start);
    }
    rendered
}

fn render_source_chain(error: &(dyn std::error::Error + 'static)) -> Option<String> {
    let mut source = error.source()?;
    let mut rendered = format!("{error}\n\nCaused by:");
    let mut index = 0_usize;
    loop {
        rendered.push_str(&format!("\n    {index}: {source}"));
        match source.source() {
            Some(next) => {
                source = next;
                index = index.saturating_add(1);
            }
            None => break,
        }
    }
    Some(rendered)
}

/// Returns the most informative non-blank text for `error`.
pub fn normalize_error<E: ReportableError + ?Sized>(error: &E) -> String {
    error
        .trace()
        .filter(|value| !value.trim().is_empty())
        .or_else(|| error.message().filter(|value| !value.trim().is_empty()))
        .or_else(|| error.rendered().filter(|value| !value.trim().is_empty()))
        .unwrap_or_else(|| UNKNOWN_ERROR_TEXT.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Eight lowercase hex characters identifying one normalized error text.
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub fn fingerprint(normalized: &str) -> Fingerprint {
    let digest = format!("{:x}", Sha256::digest(normalized.as_bytes()));
    Fingerprint(digest[..FINGERPRINT_LEN].to_string())
}

pub fn is_fingerprint_token(token: &str) -> bool {
    token.len() == FINGERPRINT_LEN && token.chars().all(|ch| ch.is_ascii_hexdigit())
}
