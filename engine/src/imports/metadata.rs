use serde::Deserialize;
use std::collections::BTreeMap;

/// `metadata.json` sidecar written next to an exported dataset
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CorpusMetadata {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub arguments: BTreeMap<String, String>,
}

impl CorpusMetadata {
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// `arguments.name`, else the last segment of `arguments.src`
    pub fn declared_name(&self) -> Option<String> {
        if let Some(name) = self.arguments.get("name").filter(|n| !n.trim().is_empty()) {
            return Some(name.clone());
        }
        self.arguments
            .get("src")
            .and_then(|src| src.trim_end_matches('/').rsplit('/').next())
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_prefers_explicit_argument() {
        let metadata = CorpusMetadata::parse(
            r#"{"columns":["id","text"],"count":42,"arguments":{"name":"patents","src":"/raw/cordis"}}"#,
        )
        .unwrap();
        assert_eq!(metadata.declared_name().as_deref(), Some("patents"));
        assert_eq!(metadata.count, Some(42));
    }

    #[test]
    fn name_falls_back_to_source_segment() {
        let metadata =
            CorpusMetadata::parse(r#"{"arguments":{"src":"/raw/exports/cordis/"}}"#).unwrap();
        assert_eq!(metadata.declared_name().as_deref(), Some("cordis"));
    }

    #[test]
    fn no_arguments_means_no_name() {
        let metadata = CorpusMetadata::parse(r#"{"columns":[]}"#).unwrap();
        assert_eq!(metadata.declared_name(), None);
    }
}
