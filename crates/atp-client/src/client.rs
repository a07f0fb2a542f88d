//! Repository client trait
//!
//! This module defines the core `RepoClient` trait that all client
//! implementations must satisfy.

use crate::types::{DescribeRepoOutput, Did, ListRecordsOutput, RepoWrite};
use async_trait::async_trait;

/// Repository API client trait
///
/// Defines the interface for the `com.atproto.repo.*` endpoints used by the
/// application. Implementations can hit a PDS directly or be test doubles.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow sharing across
/// async tasks and threads.
///
/// # Example
///
/// ```rust,ignore
/// use atp_client::{Did, RepoClient};
///
/// async fn collections(client: &dyn RepoClient, repo: &Did) -> anyhow::Result<Vec<String>> {
///     Ok(client.describe_repo(repo).await?.collections)
/// }
/// ```
#[async_trait]
pub trait RepoClient: Send + Sync {
    /// Describe a repository (`com.atproto.repo.describeRepo`)
    ///
    /// # Arguments
    ///
    /// * `repo` - DID of the repository owner
    ///
    /// # Returns
    ///
    /// Repository description including the list of collections.
    async fn describe_repo(&self, repo: &Did) -> anyhow::Result<DescribeRepoOutput>;

    /// List one page of records in a collection (`com.atproto.repo.listRecords`)
    ///
    /// # Arguments
    ///
    /// * `repo` - DID of the repository owner
    /// * `collection` - Collection NSID (e.g., "app.bsky.feed.post")
    /// * `limit` - Maximum number of records to return
    /// * `cursor` - Continuation token from a previous page
    ///
    /// # Returns
    ///
    /// The records of the page and the raw cursor returned by the service.
    async fn list_records(
        &self,
        repo: &Did,
        collection: &str,
        limit: u32,
        cursor: Option<&str>,
    ) -> anyhow::Result<ListRecordsOutput>;

    /// Apply a batch of writes atomically (`com.atproto.repo.applyWrites`)
    ///
    /// # Arguments
    ///
    /// * `repo` - DID of the repository owner
    /// * `writes` - Writes applied as one transaction
    ///
    /// # Returns
    ///
    /// Ok(()) if the whole transaction was applied, error otherwise
    async fn apply_writes(&self, repo: &Did, writes: &[RepoWrite]) -> anyhow::Result<()>;
}
