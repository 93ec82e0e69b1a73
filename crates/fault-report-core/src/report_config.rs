use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_REPORT_TITLE: &str = "Probot integration problem";
pub const DEFAULT_REPORT_BODY: &str = "An error occurred";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Immutable settings shared by every reporting component.
///
/// Values are only defaulted, never validated: a bad configuration must not be
/// the reason an error goes unreported.
pub struct ReportConfig {
    #[serde(default = "default_report_title")]
    pub title: String,
    #[serde(default = "default_report_body")]
    pub body: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub reopen: bool,
}

fn default_report_title() -> String {
    DEFAULT_REPORT_TITLE.to_string()
}

fn default_report_body() -> String {
    DEFAULT_REPORT_BODY.to_string()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: default_report_title(),
            body: default_report_body(),
            labels: Vec::new(),
            reopen: false,
        }
    }
}

impl ReportConfig {
    /// Builds a configuration from an arbitrary JSON value.
    ///
    /// Each field falls back to its default on its own when missing or of the
    /// wrong type. Non-string label entries are dropped.
    pub fn from_value(raw: &Value) -> Self {
        let mut config = Self::default();
        let Some(object) = raw.as_object() else {
            return config;
        };
        if let Some(title) = object.get("title").and_then(Value::as_str) {
            config.title = title.to_string();
        }
        if let Some(body) = object.get("body").and_then(Value::as_str) {
            config.body = body.to_string();
        }
        if let Some(labels) = object.get("labels").and_then(Value::as_array) {
            config.labels = labels
                .iter()
                .filter_map(Value::as_str)
                .map(ToOwned::to_owned)
                .collect();
        }
        if let Some(reopen) = object.get("reopen").and_then(Value::as_bool) {
            config.reopen = reopen;
        }
        config
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_reopen(mut self, reopen: bool) -> Self {
        self.reopen = reopen;
        self
    }
}
