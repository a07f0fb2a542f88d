//! Selection editing
//!
//! Pure operations over the record list. Marks only change here.

use crate::domain_models::RecordEntry;

/// Mark every record
pub fn select_all(records: &mut [RecordEntry]) {
    set_all(records, true);
}

/// Unmark every record
pub fn unselect_all(records: &mut [RecordEntry]) {
    set_all(records, false);
}

fn set_all(records: &mut [RecordEntry], marked: bool) {
    for record in records {
        record.marked_for_deletion = marked;
    }
}

/// Mark every record whose content contains `fragment`
///
/// Additive: marks are never removed. Returns the number of newly marked
/// records.
pub fn select_matching(records: &mut [RecordEntry], fragment: &str) -> usize {
    let mut newly_marked = 0;
    for record in records
        .iter_mut()
        .filter(|r| !r.marked_for_deletion && r.content.contains(fragment))
    {
        record.marked_for_deletion = true;
        newly_marked += 1;
    }
    newly_marked
}

/// Flip the mark of the record at `index`; returns the new mark
pub fn toggle(records: &mut [RecordEntry], index: usize) -> Option<bool> {
    let record = records.get_mut(index)?;
    record.marked_for_deletion = !record.marked_for_deletion;
    Some(record.marked_for_deletion)
}

pub fn marked_count(records: &[RecordEntry]) -> usize {
    records.iter().filter(|r| r.marked_for_deletion).count()
}
