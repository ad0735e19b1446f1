//! Application state management

use crate::api::{HttpImportApi, ImportApi};
use crate::db::sqlite::{Preferences, SqliteDb};
use crate::error::{AppError, Result};
use crate::poller::JobWatcher;
use crate::store::{NotificationCache, UiState, UiStore};
use crate::wizard::ImportWizard;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across the UI layer
pub struct AppState {
    /// SQLite database for local preferences
    pub sqlite: Arc<SqliteDb>,

    /// REST backend client
    pub api: Arc<dyn ImportApi>,

    /// Per-job poll registry
    pub watcher: Arc<JobWatcher>,

    /// Observable cross-cutting UI state
    pub store: Arc<UiStore>,

    /// Cached notification list
    pub notifications: Arc<NotificationCache>,

    /// In-memory copy of the persisted preferences
    preferences: RwLock<Preferences>,

    /// Active import wizards by job id (route re-entry)
    wizards: DashMap<i64, Arc<ImportWizard>>,

    /// Application data directory
    pub data_dir: PathBuf,
}

impl AppState {
    /// Create new application state
    pub fn new(data_dir: &Path, backend_url: &str, poll_interval: Duration) -> Result<Self> {
        // Create data directory if it doesn't exist
        std::fs::create_dir_all(data_dir)?;
        tracing::info!("Data directory: {:?}", data_dir);

        // Initialize SQLite database and load preferences once
        let sqlite = Arc::new(SqliteDb::new(&data_dir.join("fintrack.db"))?);
        let preferences = sqlite.get_preferences()?;

        // Seed the UI store from persisted preferences
        let store = Arc::new(UiStore::new(UiState {
            theme: preferences.theme.clone(),
            currency: preferences.currency.clone(),
            unread_count: 0,
        }));

        let api: Arc<dyn ImportApi> = Arc::new(HttpImportApi::new(backend_url)?);
        let watcher = Arc::new(JobWatcher::new(api.clone(), poll_interval));

        Ok(Self {
            sqlite,
            api,
            watcher,
            store,
            notifications: Arc::new(NotificationCache::new()),
            preferences: RwLock::new(preferences),
            wizards: DashMap::new(),
            data_dir: data_dir.to_path_buf(),
        })
    }

    /// Current preferences (cached copy)
    pub fn preferences(&self) -> Preferences {
        self.preferences.read().clone()
    }

    /// Persist a partial preference change, refresh the cache and push
    /// display settings into the UI store.
    pub fn update_preferences(
        &self,
        theme: Option<String>,
        currency: Option<String>,
        skip_duplicates_default: Option<bool>,
        confirm_before_commit: Option<bool>,
        chart_colors: Option<Vec<String>>,
    ) -> Result<Preferences> {
        let updated = self.sqlite.update_preferences(
            theme,
            currency,
            skip_duplicates_default,
            confirm_before_commit,
            chart_colors,
        )?;

        *self.preferences.write() = updated.clone();
        self.store.set_theme(updated.theme.clone());
        self.store.set_currency(updated.currency.clone());
        Ok(updated)
    }

    /// Start a fresh import wizard (not yet registered; it has no job id
    /// until the upload is accepted)
    pub fn begin_import(&self) -> Arc<ImportWizard> {
        let skip_default = self.preferences.read().skip_duplicates_default;
        Arc::new(ImportWizard::new(
            self.api.clone(),
            self.watcher.clone(),
            skip_default,
        ))
    }

    /// Register a wizard under its job id for later route re-entry
    pub fn register_wizard(&self, wizard: Arc<ImportWizard>) -> Result<()> {
        let job_id = wizard
            .job_id()
            .ok_or_else(|| AppError::Internal("Wizard has no job yet".to_string()))?;
        self.wizards.insert(job_id, wizard);
        Ok(())
    }

    /// Fetch or rebuild the wizard for a job id (page reload re-entry)
    pub async fn resume_import(&self, job_id: i64) -> Result<Arc<ImportWizard>> {
        if let Some(existing) = self.wizards.get(&job_id) {
            return Ok(existing.clone());
        }

        let skip_default = self.preferences.read().skip_duplicates_default;
        let wizard = Arc::new(
            ImportWizard::resume(self.api.clone(), self.watcher.clone(), skip_default, job_id)
                .await?,
        );
        self.wizards.insert(job_id, wizard.clone());
        Ok(wizard)
    }

    /// Tear down a wizard and stop its poll (navigation away)
    pub fn close_import(&self, job_id: i64) {
        if let Some((_, wizard)) = self.wizards.remove(&job_id) {
            wizard.teardown();
        } else {
            self.watcher.stop_job(job_id);
        }
    }
}
