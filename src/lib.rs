//! astroManager - Astronomical image archive
//!
//! Registers images with a stable UUID, stores every saved revision as an
//! append-only version, and keeps the site, telescope and plan metadata the
//! images refer to.

pub mod catalog;
pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod geodesic;
pub mod image;
pub mod interaction;
pub mod pipeline;
pub mod plan;
pub mod registry;
pub mod state;
pub mod store;

#[cfg(test)]
mod test_support;

pub use config::Settings;
pub use error::{ArchiveError, Result};
pub use pipeline::{ArchivePipeline, ProcessOutcome, SaveOutcome};
pub use registry::Resolution;
pub use state::ArchiveDb;
pub use store::ImageStore;

/// Install the `env_logger` sink, `info` unless `RUST_LOG` says otherwise.
/// Later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
