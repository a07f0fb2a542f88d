//! Selection actions

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionAction {
    /// Mark every record
    SelectAll,
    /// Unmark every record
    UnselectAll,
    /// Mark every record whose content contains the text
    SelectMatching(String),
    /// Flip the mark of one record (index into the full list)
    Toggle(usize),
    /// Only show marked records
    ShowSelectedOnly(bool),
}
