//! Record pager
//!
//! Fetches one page of a collection at a time and accumulates the records.

use crate::domain_models::RecordEntry;
use atp_client::{Did, ListedRecord, RepoClient};
use std::collections::HashSet;

/// Records requested per page
pub const PAGE_SIZE: u32 = 100;

/// One fetched page
#[derive(Debug, Clone)]
pub struct Page {
    pub records: Vec<ListedRecord>,
    /// Cursor for the next page, absent on the last page
    pub cursor: Option<String>,
}

/// Keep the service cursor only for a full page
///
/// Services may return a cursor with the last (short) page; that cursor
/// would only yield an empty page.
pub fn next_cursor(returned: usize, cursor: Option<String>) -> Option<String> {
    if returned == PAGE_SIZE as usize {
        cursor
    } else {
        None
    }
}

/// Fetch the page of `collection` following `cursor`
pub async fn fetch_page(
    client: &dyn RepoClient,
    repo: &Did,
    collection: &str,
    cursor: Option<&str>,
) -> anyhow::Result<Page> {
    let output = client
        .list_records(repo, collection, PAGE_SIZE, cursor)
        .await?;
    let cursor = next_cursor(output.records.len(), output.cursor);

    log::info!(
        "Fetched {} records of {} (more: {})",
        output.records.len(),
        collection,
        cursor.is_some()
    );
    Ok(Page {
        records: output.records,
        cursor,
    })
}

/// Append records as unmarked entries, skipping URIs already listed
///
/// Returns the number of entries added.
pub fn append_page(entries: &mut Vec<RecordEntry>, records: &[ListedRecord]) -> usize {
    let mut known: HashSet<String> = entries.iter().map(|e| e.uri.clone()).collect();
    let before = entries.len();

    for record in records {
        if known.insert(record.uri.clone()) {
            entries.push(RecordEntry::from_listed(record));
        } else {
            log::debug!("Skipping duplicate record {}", record.uri);
        }
    }
    entries.len() - before
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use atp_client::{DescribeRepoOutput, ListRecordsOutput, RepoWrite};
    use std::sync::Mutex;

    fn listed(n: usize) -> ListedRecord {
        ListedRecord {
            uri: format!("at://did:plc:abc/app.bsky.feed.like/{}", n),
            cid: format!("cid{}", n),
            value: serde_json::json!({ "n": n }),
        }
    }

    struct FixedPage {
        count: usize,
        cursor: Option<String>,
        requested: Mutex<Vec<(u32, Option<String>)>>,
    }

    #[async_trait]
    impl RepoClient for FixedPage {
        async fn describe_repo(&self, _repo: &Did) -> anyhow::Result<DescribeRepoOutput> {
            unimplemented!()
        }

        async fn list_records(
            &self,
            _repo: &Did,
            _collection: &str,
            limit: u32,
            cursor: Option<&str>,
        ) -> anyhow::Result<ListRecordsOutput> {
            self.requested
                .lock()
                .unwrap()
                .push((limit, cursor.map(str::to_string)));
            Ok(ListRecordsOutput {
                cursor: self.cursor.clone(),
                records: (0..self.count).map(listed).collect(),
            })
        }

        async fn apply_writes(&self, _repo: &Did, _writes: &[RepoWrite]) -> anyhow::Result<()> {
            unimplemented!()
        }
    }

    #[test]
    fn test_next_cursor() {
        assert_eq!(next_cursor(100, Some("c".to_string())), Some("c".to_string()));
        assert_eq!(next_cursor(99, Some("c".to_string())), None);
        assert_eq!(next_cursor(0, Some("c".to_string())), None);
        assert_eq!(next_cursor(100, None), None);
    }

    #[tokio::test]
    async fn test_short_page_drops_cursor() {
        let client = FixedPage {
            count: 37,
            cursor: Some("still-here".to_string()),
            requested: Mutex::new(Vec::new()),
        };
        let repo: Did = "did:plc:abc".parse().unwrap();

        let page = fetch_page(&client, &repo, "app.bsky.feed.like", Some("prev"))
            .await
            .unwrap();
        assert_eq!(page.records.len(), 37);
        assert!(page.cursor.is_none());
        assert_eq!(
            client.requested.lock().unwrap().as_slice(),
            &[(PAGE_SIZE, Some("prev".to_string()))]
        );
    }

    #[test]
    fn test_append_page_skips_duplicates() {
        let mut entries = Vec::new();
        assert_eq!(append_page(&mut entries, &[listed(1), listed(2)]), 2);
        assert_eq!(append_page(&mut entries, &[listed(2), listed(3)]), 1);

        let uris: Vec<&str> = entries.iter().map(|e| e.rkey()).collect();
        assert_eq!(uris, vec!["1", "2", "3"]);
        assert!(entries.iter().all(|e| !e.marked_for_deletion));
    }
}
