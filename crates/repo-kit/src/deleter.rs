//! Batch deleter
//!
//! Turns marked records into delete writes and applies them in sequential
//! `applyWrites` transactions.

use crate::domain_models::RecordEntry;
use atp_client::{Did, RepoClient, RepoWrite};
use thiserror::Error;

/// Writes per `applyWrites` transaction
pub const BATCH_SIZE: usize = 200;

/// A batch failed after `deleted` records were already removed
#[derive(Debug, Error)]
#[error("delete failed after {deleted} records: {source}")]
pub struct DeleteError {
    /// Records removed by the batches that completed
    pub deleted: usize,
    #[source]
    pub source: anyhow::Error,
}

/// Delete writes for every marked entry, in list order
pub fn delete_directives(collection: &str, entries: &[RecordEntry]) -> Vec<RepoWrite> {
    entries
        .iter()
        .filter(|e| e.marked_for_deletion)
        .map(|e| RepoWrite::delete(collection, e.rkey()))
        .collect()
}

/// Apply `writes` in chunks of [`BATCH_SIZE`], one after the other
///
/// Stops at the first failed batch; nothing is rolled back or retried.
/// Returns the number of deleted records.
pub async fn delete_in_batches(
    client: &dyn RepoClient,
    repo: &Did,
    writes: &[RepoWrite],
) -> Result<usize, DeleteError> {
    let total = writes.len();
    let mut deleted = 0;

    for (index, batch) in writes.chunks(BATCH_SIZE).enumerate() {
        log::debug!("Applying delete batch {} ({} writes)", index + 1, batch.len());
        if let Err(source) = client.apply_writes(repo, batch).await {
            log::error!(
                "Delete batch {} failed after {} of {} records: {:#}",
                index + 1,
                deleted,
                total,
                source
            );
            return Err(DeleteError { deleted, source });
        }
        deleted += batch.len();
    }

    log::info!("Deleted {} records from {}", deleted, repo);
    Ok(deleted)
}

/// Result message of a completed delete
pub fn deleted_notice(count: usize) -> String {
    if count == 1 {
        "Deleted 1 record".to_string()
    } else {
        format!("Deleted {} records", count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use atp_client::{DescribeRepoOutput, ListRecordsOutput};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Records batch sizes; fails the batch with index `fail_at`
    #[derive(Default)]
    struct Recorder {
        batches: Mutex<Vec<Vec<RepoWrite>>>,
        fail_at: Option<usize>,
    }

    #[async_trait]
    impl RepoClient for Recorder {
        async fn describe_repo(&self, _repo: &Did) -> anyhow::Result<DescribeRepoOutput> {
            unimplemented!()
        }

        async fn list_records(
            &self,
            _repo: &Did,
            _collection: &str,
            _limit: u32,
            _cursor: Option<&str>,
        ) -> anyhow::Result<ListRecordsOutput> {
            unimplemented!()
        }

        async fn apply_writes(&self, _repo: &Did, writes: &[RepoWrite]) -> anyhow::Result<()> {
            let mut batches = self.batches.lock().unwrap();
            if Some(batches.len()) == self.fail_at {
                anyhow::bail!("RateLimitExceeded");
            }
            batches.push(writes.to_vec());
            Ok(())
        }
    }

    fn repo() -> Did {
        "did:plc:abc".parse().unwrap()
    }

    fn writes(count: usize) -> Vec<RepoWrite> {
        (0..count)
            .map(|i| RepoWrite::delete("app.bsky.feed.like", i.to_string()))
            .collect()
    }

    #[test]
    fn test_delete_directives_only_marked() {
        let mut entries = vec![
            RecordEntry::new("at://did:plc:abc/app.bsky.feed.like/aaa", "{}"),
            RecordEntry::new("at://did:plc:abc/app.bsky.feed.like/bbb", "{}"),
            RecordEntry::new("at://did:plc:abc/app.bsky.feed.like/ccc", "{}"),
        ];
        entries[0].marked_for_deletion = true;
        entries[2].marked_for_deletion = true;

        assert_eq!(
            delete_directives("app.bsky.feed.like", &entries),
            vec![
                RepoWrite::delete("app.bsky.feed.like", "aaa"),
                RepoWrite::delete("app.bsky.feed.like", "ccc"),
            ]
        );
    }

    #[tokio::test]
    async fn test_batches_keep_order() {
        let client = Recorder::default();
        let writes = writes(450);

        let deleted = delete_in_batches(&client, &repo(), &writes).await.unwrap();
        assert_eq!(deleted, 450);

        let batches = client.batches.lock().unwrap();
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![200, 200, 50]);
        assert_eq!(batches[1][0], writes[200]);
        assert_eq!(batches[2][49], writes[449]);
    }

    #[tokio::test]
    async fn test_no_marked_records_sends_nothing() {
        let client = Recorder::default();
        assert_eq!(delete_in_batches(&client, &repo(), &[]).await.unwrap(), 0);
        assert!(client.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_batch_stops_remaining() {
        let client = Recorder {
            fail_at: Some(1),
            ..Default::default()
        };

        let err = delete_in_batches(&client, &repo(), &writes(450))
            .await
            .unwrap_err();
        assert_eq!(err.deleted, 200);
        assert_eq!(client.batches.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_deleted_notice() {
        assert_eq!(deleted_notice(0), "Deleted 0 records");
        assert_eq!(deleted_notice(1), "Deleted 1 record");
        assert_eq!(deleted_notice(450), "Deleted 450 records");
    }
}
