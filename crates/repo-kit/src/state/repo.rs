//! Repository browsing state

use crate::domain_models::RecordEntry;

/// Collections, the active collection and its accumulated records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoState {
    /// Collections present in the repository
    pub collections: Vec<String>,
    /// Active collection
    pub collection: Option<String>,
    /// Records fetched so far, in fetch order
    pub records: Vec<RecordEntry>,
    /// Continuation cursor; absent once the last page was fetched
    pub cursor: Option<String>,
    /// A page fetch is in flight
    pub loading: bool,
    /// A delete is in flight
    pub deleting: bool,
    /// Only show marked records
    pub show_selected_only: bool,
}

impl RepoState {
    pub fn marked_count(&self) -> usize {
        self.records.iter().filter(|r| r.marked_for_deletion).count()
    }

    /// More records can be fetched
    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn is_busy(&self) -> bool {
        self.loading || self.deleting
    }

    /// Records to show with their index in the full list
    pub fn visible_records(&self) -> impl Iterator<Item = (usize, &RecordEntry)> {
        let selected_only = self.show_selected_only;
        self.records
            .iter()
            .enumerate()
            .filter(move |(_, r)| !selected_only || r.marked_for_deletion)
    }

    /// Drop the records and the cursor
    pub fn clear_records(&mut self) {
        self.records.clear();
        self.cursor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_records_filter() {
        let mut state = RepoState::default();
        state.records = vec![
            RecordEntry::new("at://a/c/1", "{}"),
            RecordEntry::new("at://a/c/2", "{}"),
        ];
        state.records[1].marked_for_deletion = true;

        assert_eq!(state.visible_records().count(), 2);

        state.show_selected_only = true;
        let visible: Vec<usize> = state.visible_records().map(|(i, _)| i).collect();
        assert_eq!(visible, vec![1]);
        assert_eq!(state.marked_count(), 1);
    }
}
