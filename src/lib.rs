//! FinTrack Desktop - Personal Finance Import Core
//!
//! Headless core of the FinTrack desktop client: the asynchronous
//! statement-import workflow (upload, extraction preview, commit),
//! generic job-status polling, local preferences and observable UI
//! state. The rendering layer sits on top and is not part of this
//! crate.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod poller;
pub mod state;
pub mod store;
pub mod wizard;

#[cfg(test)]
pub(crate) mod test_support;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging. Call once at startup.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fintrack_desktop=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
