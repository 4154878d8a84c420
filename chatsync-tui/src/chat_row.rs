//! Row formatting for the list tables.

use chatsync_core::sync::{ChatRow, ToggleState};
use chatsync_core::FavoriteSummary;
use chrono::{DateTime, Utc};

/// Star shown in the favorite column.
pub fn favorite_marker(state: ToggleState) -> &'static str {
    match state {
        ToggleState::Settled(true) => "★",
        ToggleState::Settled(false) => "☆",
        // Optimistic value, still waiting on the store
        ToggleState::Pending { new: true, .. } => "★…",
        ToggleState::Pending { new: false, .. } => "☆…",
    }
}

pub fn chat_updated(row: &ChatRow) -> String {
    relative_time(row.summary.timestamp, Utc::now())
}

pub fn favorite_updated(row: &FavoriteSummary) -> String {
    relative_time(row.timestamp, Utc::now())
}

/// Relative time since `ts` (e.g., "2m ago", "1h ago").
pub fn relative_time(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(ts);

    if duration.num_seconds() < 0 {
        "just now".to_string()
    } else if duration.num_seconds() < 60 {
        format!("{}s ago", duration.num_seconds())
    } else if duration.num_minutes() < 60 {
        format!("{}m ago", duration.num_minutes())
    } else if duration.num_hours() < 24 {
        format!("{}h ago", duration.num_hours())
    } else if duration.num_days() < 7 {
        format!("{}d ago", duration.num_days())
    } else {
        ts.format("%b %d").to_string()
    }
}

/// First 8 characters of an id, on char boundaries.
pub fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}
