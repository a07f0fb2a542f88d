//! Records Reducer
//!
//! Collections, paging and the outcome of deletes. Returns a notice to show
//! when the action produces user feedback.

use crate::actions::RecordsAction;
use crate::deleter::deleted_notice;
use crate::domain_models::Notice;
use crate::pager::append_page;
use crate::state::RepoState;

/// Reduce records actions
pub fn reduce_records(mut state: RepoState, action: &RecordsAction) -> (RepoState, Option<Notice>) {
    let notice = match action {
        RecordsAction::LoadCollections => None,

        RecordsAction::CollectionsLoaded(collections) => {
            state.collections = collections.clone();
            None
        }

        RecordsAction::SelectCollection(collection) => {
            log::debug!("Switching to collection {}", collection);
            state.collection = Some(collection.clone());
            state.clear_records();
            state.loading = false;
            None
        }

        RecordsAction::FetchPage => {
            state.loading = true;
            None
        }

        RecordsAction::PageLoaded {
            collection,
            records,
            cursor,
        } => {
            if state.collection.as_ref() != Some(collection) {
                log::debug!("Ignoring page of {} after collection switch", collection);
                return (state, None);
            }
            let added = append_page(&mut state.records, records);
            log::debug!("Added {} records, {} total", added, state.records.len());
            state.cursor = cursor.clone();
            state.loading = false;
            None
        }

        RecordsAction::LoadFailed { message } => {
            state.loading = false;
            Some(Notice::error(format!(
                "Failed to load records: {}, retry with `more`",
                message
            )))
        }

        RecordsAction::DeleteMarked => {
            state.deleting = true;
            Some(Notice::progress(format!(
                "Deleting {} records...",
                state.marked_count()
            )))
        }

        RecordsAction::Deleted { count } => {
            state.deleting = false;
            state.clear_records();
            Some(Notice::success(deleted_notice(*count)))
        }

        RecordsAction::DeleteFailed {
            deleted,
            total,
            message,
        } => {
            state.deleting = false;
            // Completed batches removed the first `deleted` marked records
            let mut removed = 0;
            state.records.retain(|record| {
                if record.marked_for_deletion && removed < *deleted {
                    removed += 1;
                    false
                } else {
                    true
                }
            });
            Some(Notice::error(format!(
                "Delete stopped after {} of {} records: {}",
                deleted, total, message
            )))
        }
    };
    (state, notice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_models::{NoticeKind, RecordEntry};
    use atp_client::ListedRecord;
    use pretty_assertions::assert_eq;

    const LIKES: &str = "app.bsky.feed.like";

    fn listed(n: usize) -> ListedRecord {
        ListedRecord {
            uri: format!("at://did:plc:abc/{}/{}", LIKES, n),
            cid: format!("cid{}", n),
            value: serde_json::json!({}),
        }
    }

    fn page(range: std::ops::Range<usize>, cursor: Option<&str>) -> RecordsAction {
        RecordsAction::PageLoaded {
            collection: LIKES.to_string(),
            records: range.map(listed).collect(),
            cursor: cursor.map(str::to_string),
        }
    }

    fn with_collection() -> RepoState {
        reduce_records(
            RepoState::default(),
            &RecordsAction::SelectCollection(LIKES.to_string()),
        )
        .0
    }

    #[test]
    fn test_pages_accumulate() {
        let state = with_collection();
        let (state, _) = reduce_records(state, &RecordsAction::FetchPage);
        assert!(state.loading);

        let (state, _) = reduce_records(state, &page(0..100, Some("c1")));
        assert_eq!(state.records.len(), 100);
        assert!(state.has_more());
        assert!(!state.loading);

        let (state, _) = reduce_records(state, &page(100..137, None));
        assert_eq!(state.records.len(), 137);
        assert!(!state.has_more());
    }

    #[test]
    fn test_switching_collection_clears_records() {
        let (state, _) = reduce_records(with_collection(), &page(0..10, Some("c1")));
        let (state, _) = reduce_records(
            state,
            &RecordsAction::SelectCollection("app.bsky.feed.post".to_string()),
        );
        assert!(state.records.is_empty());
        assert!(state.cursor.is_none());
        assert_eq!(state.collection.as_deref(), Some("app.bsky.feed.post"));
    }

    #[test]
    fn test_stale_page_is_ignored() {
        let (state, _) = reduce_records(
            RepoState::default(),
            &RecordsAction::SelectCollection("app.bsky.feed.post".to_string()),
        );
        let (state, _) = reduce_records(state, &page(0..10, None));
        assert!(state.records.is_empty());
    }

    #[test]
    fn test_load_failure_is_retryable() {
        let (state, _) = reduce_records(with_collection(), &RecordsAction::FetchPage);
        let (state, notice) = reduce_records(
            state,
            &RecordsAction::LoadFailed {
                message: "timeout".to_string(),
            },
        );
        assert!(!state.loading);
        assert_eq!(
            notice,
            Some(Notice::error("Failed to load records: timeout, retry with `more`"))
        );
    }

    #[test]
    fn test_deleted_clears_list() {
        let (mut state, _) = reduce_records(with_collection(), &page(0..3, Some("c")));
        state.records[0].marked_for_deletion = true;

        let (state, notice) = reduce_records(state, &RecordsAction::DeleteMarked);
        assert!(state.deleting);
        assert_eq!(notice.map(|n| n.kind), Some(NoticeKind::Progress));

        let (state, notice) = reduce_records(state, &RecordsAction::Deleted { count: 1 });
        assert!(!state.deleting);
        assert!(state.records.is_empty());
        assert!(state.cursor.is_none());
        assert_eq!(notice, Some(Notice::success("Deleted 1 record")));
    }

    #[test]
    fn test_delete_failure_keeps_undeleted() {
        let mut state = with_collection();
        state.records = (0..5)
            .map(|n| RecordEntry::new(format!("at://a/c/{}", n), "{}"))
            .collect();
        for n in [0, 2, 4] {
            state.records[n].marked_for_deletion = true;
        }

        let (state, notice) = reduce_records(
            state,
            &RecordsAction::DeleteFailed {
                deleted: 2,
                total: 3,
                message: "RateLimitExceeded".to_string(),
            },
        );
        let left: Vec<&str> = state.records.iter().map(|r| r.rkey()).collect();
        assert_eq!(left, vec!["1", "3", "4"]);
        assert_eq!(state.marked_count(), 1);
        assert_eq!(
            notice,
            Some(Notice::error(
                "Delete stopped after 2 of 3 records: RateLimitExceeded"
            ))
        );
    }
}
