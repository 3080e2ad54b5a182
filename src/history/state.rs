use serde::Serialize;
use std::fmt;

/// Why a triggering object was not ingested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The object lives under the marker namespace (a marker or staged file).
    MarkerNamespace,
    NotCsv,
    AlreadyProcessed,
}

impl SkipReason {
    pub fn as_str(&self) -> &str {
        match self {
            SkipReason::MarkerNamespace => "marker_namespace",
            SkipReason::NotCsv => "not_csv",
            SkipReason::AlreadyProcessed => "already_processed",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
