//! Record entry model
//!
//! One listed record together with its deletion mark.

use atp_client::{record_key, ListedRecord};

/// A record shown in the list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordEntry {
    /// `at://` URI, unique within the list
    pub uri: String,
    /// Pretty-printed JSON of the listed record (`uri`, `cid`, `value`)
    pub content: String,
    /// Whether the record will be deleted by the next delete
    pub marked_for_deletion: bool,
}

impl RecordEntry {
    pub fn new(uri: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            content: content.into(),
            marked_for_deletion: false,
        }
    }

    /// Build an unmarked entry from a listed record
    pub fn from_listed(record: &ListedRecord) -> Self {
        let content = serde_json::to_string_pretty(record).unwrap_or_else(|e| {
            log::warn!("Failed to render record {}: {}", record.uri, e);
            record.uri.clone()
        });
        Self::new(record.uri.clone(), content)
    }

    /// Record key (last path segment of the URI)
    pub fn rkey(&self) -> &str {
        record_key(&self.uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_listed() {
        let record = ListedRecord {
            uri: "at://did:plc:abc/app.bsky.feed.post/3k1".to_string(),
            cid: "bafyrei".to_string(),
            value: serde_json::json!({ "text": "hello world" }),
        };
        let entry = RecordEntry::from_listed(&record);

        assert_eq!(entry.uri, record.uri);
        assert_eq!(entry.rkey(), "3k1");
        assert!(!entry.marked_for_deletion);
        assert_eq!(
            entry.content,
            "{\n  \"uri\": \"at://did:plc:abc/app.bsky.feed.post/3k1\",\n  \"cid\": \"bafyrei\",\n  \"value\": {\n    \"text\": \"hello world\"\n  }\n}"
        );
    }
}
