use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value as Json;

/// Payload of a storage "object finalized" notification. Only the fields the
/// handler uses are kept.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageObjectEvent {
    pub bucket: String,
    pub name: String,
    /// Object generation; informational only.
    #[serde(default, deserialize_with = "string_or_number")]
    pub generation: Option<String>,
}

impl StorageObjectEvent {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
            generation: None,
        }
    }

    pub fn generation_or_unknown(&self) -> &str {
        self.generation.as_deref().unwrap_or("unknown")
    }
}

fn string_or_number<'de, D>(de: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
    }
    Ok(Option::<Raw>::deserialize(de)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
    }))
}

/// Decode an event body. Accepts the bare object payload (binary content
/// mode) or a structured CloudEvent carrying it under `data`.
pub fn parse_event(body: &[u8]) -> Result<StorageObjectEvent> {
    let value: Json = serde_json::from_slice(body).context("event body is not JSON")?;
    let payload = match value.get("data") {
        Some(data) if value.get("specversion").is_some() => data.clone(),
        _ => value,
    };
    serde_json::from_value(payload).context("event payload lacks bucket/name")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_binary_mode_payload() -> Result<()> {
        let body = br#"{"bucket":"raw-uploads","name":"survey.csv","generation":"1712345678901234","contentType":"text/csv"}"#;
        let ev = parse_event(body)?;
        assert_eq!(ev.bucket, "raw-uploads");
        assert_eq!(ev.name, "survey.csv");
        assert_eq!(ev.generation.as_deref(), Some("1712345678901234"));
        Ok(())
    }

    #[test]
    fn parses_structured_envelope() -> Result<()> {
        let body = br#"{
            "specversion": "1.0",
            "type": "google.cloud.storage.object.v1.finalized",
            "source": "//storage.googleapis.com/projects/_/buckets/raw-uploads",
            "id": "42",
            "data": {"bucket": "raw-uploads", "name": "in/survey.csv", "generation": 7}
        }"#;
        let ev = parse_event(body)?;
        assert_eq!(ev.name, "in/survey.csv");
        assert_eq!(ev.generation.as_deref(), Some("7"));
        Ok(())
    }

    #[test]
    fn generation_is_optional() -> Result<()> {
        let ev = parse_event(br#"{"bucket":"b","name":"x.csv"}"#)?;
        assert_eq!(ev.generation, None);
        assert_eq!(ev.generation_or_unknown(), "unknown");
        Ok(())
    }

    #[test]
    fn rejects_missing_fields_and_garbage() {
        assert!(parse_event(br#"{"bucket":"b"}"#).is_err());
        assert!(parse_event(b"not json").is_err());
    }
}
