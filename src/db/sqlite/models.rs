//! SQLite database models

use serde::{Deserialize, Serialize};

/// User preferences, loaded once at startup and persisted on change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preferences {
    pub id: i64,
    pub theme: String,
    pub currency: String,
    /// Default state of the duplicate-skip toggle in the import wizard
    pub skip_duplicates_default: bool,
    /// Whether the commit stage shows a confirmation prompt
    pub confirm_before_commit: bool,
    /// Preferred chart palette (hex strings)
    pub chart_colors: Vec<String>,
}
