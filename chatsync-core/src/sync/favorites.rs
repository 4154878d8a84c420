//! Favorites list state

use crate::types::FavoriteSummary;

use super::diff::{ListItem, ListView, RowChange};

impl ListItem for FavoriteSummary {
    type Key = String;

    fn key(&self) -> String {
        self.record_key.clone()
    }

    fn same_content(&self, other: &Self) -> bool {
        self == other
    }
}

/// Rows of the favorites view. Read-only; records change only through chat
/// toggles.
#[derive(Debug, Default)]
pub struct FavoritesListController {
    view: ListView<FavoriteSummary>,
}

impl FavoritesListController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_refresh(&mut self, rows: Vec<FavoriteSummary>) -> Vec<RowChange> {
        self.view.submit(rows)
    }

    pub fn rows(&self) -> &[FavoriteSummary] {
        self.view.items()
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn row(key: &str, title: &str, messages: usize) -> FavoriteSummary {
        FavoriteSummary {
            record_key: key.to_string(),
            owner: "u1".to_string(),
            chat_id: key.trim_start_matches("u1_").to_string(),
            title: title.to_string(),
            timestamp: Utc.timestamp_opt(100, 0).unwrap(),
            message_count: messages,
        }
    }

    #[test]
    fn test_refresh_diffs_by_record_key() {
        let mut list = FavoritesListController::new();
        list.apply_refresh(vec![row("u1_a", "A", 1), row("u1_b", "B", 2)]);

        // Re-favoriting refreshes the snapshot, so the message count moves
        let changes = list.apply_refresh(vec![row("u1_a", "A", 3), row("u1_b", "B", 2)]);
        assert_eq!(changes, vec![RowChange::Updated { index: 0 }]);

        let changes = list.apply_refresh(vec![row("u1_b", "B", 2)]);
        assert_eq!(changes, vec![RowChange::Removed { index: 0 }]);
        assert_eq!(list.len(), 1);
    }
}
