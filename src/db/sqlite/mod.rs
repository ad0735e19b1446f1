//! SQLite database module

pub mod models;
mod connection;
mod migrations;
mod preferences;

use crate::error::Result;
pub use models::Preferences;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

/// SQLite database wrapper
pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    /// Create new SQLite database connection
    pub fn new(path: &Path) -> Result<Self> {
        let conn = connection::create_connection(path)?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        // Run migrations
        db.run_migrations()?;

        Ok(db)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }

    // ========== Preference Methods ==========

    /// Get user preferences
    pub fn get_preferences(&self) -> Result<Preferences> {
        let conn = self.conn.lock();
        preferences::get_preferences(&conn)
    }

    /// Update user preferences (partial)
    pub fn update_preferences(
        &self,
        theme: Option<String>,
        currency: Option<String>,
        skip_duplicates_default: Option<bool>,
        confirm_before_commit: Option<bool>,
        chart_colors: Option<Vec<String>>,
    ) -> Result<Preferences> {
        let conn = self.conn.lock();
        preferences::update_preferences(
            &conn,
            theme,
            currency,
            skip_duplicates_default,
            confirm_before_commit,
            chart_colors,
        )
    }
}
