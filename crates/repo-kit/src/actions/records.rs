//! Record actions
//!
//! Listing collections, paging through records and deleting marked ones.

use atp_client::ListedRecord;

#[derive(Debug, Clone)]
pub enum RecordsAction {
    /// Fetch the collection names of the repository
    LoadCollections,

    /// Collection names fetched
    CollectionsLoaded(Vec<String>),

    /// Switch the active collection (clears records and cursor)
    SelectCollection(String),

    /// Fetch the next page of the active collection
    FetchPage,

    /// A page arrived; `cursor` is already normalized
    PageLoaded {
        collection: String,
        records: Vec<ListedRecord>,
        cursor: Option<String>,
    },

    /// Listing failed
    LoadFailed { message: String },

    /// Delete all marked records of the active collection
    DeleteMarked,

    /// All marked records deleted
    Deleted { count: usize },

    /// A batch failed; `deleted` records were removed before it
    DeleteFailed {
        deleted: usize,
        total: usize,
        message: String,
    },
}
