//! AT Protocol data transfer objects
//!
//! These types mirror the `com.atproto.repo.*` lexicons used by the client.
//! They are intentionally separate from application domain models
//! to keep this crate pure and reusable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A decentralized identifier (e.g. `did:plc:abc123`, `did:web:example.com`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did(String);

impl Did {
    /// The DID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The DID method (`plc`, `web`, ...)
    pub fn method(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or_default()
    }

    /// Whether this is a `did:web` identifier
    pub fn is_web(&self) -> bool {
        self.method() == "web"
    }
}

impl FromStr for Did {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("did"), Some(method), Some(id))
                if !method.is_empty()
                    && method.chars().all(|c| c.is_ascii_lowercase())
                    && !id.is_empty() =>
            {
                Ok(Self(s.to_string()))
            }
            _ => Err(anyhow::anyhow!("Invalid DID: '{}'", s)),
        }
    }
}

impl TryFrom<String> for Did {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Did> for String {
    fn from(did: Did) -> Self {
        did.0
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Output of `com.atproto.repo.describeRepo`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeRepoOutput {
    /// Handle of the repository owner
    #[serde(default)]
    pub handle: Option<String>,

    /// DID of the repository owner
    pub did: Did,

    /// NSIDs of all collections present in the repository
    #[serde(default)]
    pub collections: Vec<String>,

    /// Whether the handle resolves back to the DID
    #[serde(default)]
    pub handle_is_correct: Option<bool>,
}

/// A single record from `com.atproto.repo.listRecords`
///
/// Field order matters: the pretty-printed form of this struct is what the
/// user sees and searches through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListedRecord {
    /// `at://` URI of the record
    pub uri: String,

    /// Content identifier of the record version
    pub cid: String,

    /// The record itself
    pub value: serde_json::Value,
}

impl ListedRecord {
    /// Record key (last path segment of the URI)
    pub fn rkey(&self) -> &str {
        record_key(&self.uri)
    }
}

/// Output of `com.atproto.repo.listRecords`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRecordsOutput {
    /// Continuation token (may be present even on the last page)
    #[serde(default)]
    pub cursor: Option<String>,

    /// Records of this page
    #[serde(default)]
    pub records: Vec<ListedRecord>,
}

/// A single write operation for `com.atproto.repo.applyWrites`
///
/// Only deletes are issued by this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum RepoWrite {
    /// Delete the record `rkey` in `collection`
    #[serde(rename = "com.atproto.repo.applyWrites#delete")]
    Delete { collection: String, rkey: String },
}

impl RepoWrite {
    /// Create a delete operation
    pub fn delete(collection: impl Into<String>, rkey: impl Into<String>) -> Self {
        Self::Delete {
            collection: collection.into(),
            rkey: rkey.into(),
        }
    }
}

/// Input of `com.atproto.repo.applyWrites`
#[derive(Debug, Clone, Serialize)]
pub struct ApplyWritesInput<'a> {
    /// Repository DID
    pub repo: &'a Did,

    /// Writes applied in a single transaction
    pub writes: &'a [RepoWrite],
}

/// Extract the record key from an `at://did/collection/rkey` URI
pub fn record_key(uri: &str) -> &str {
    uri.rsplit('/').next().unwrap_or(uri)
}
