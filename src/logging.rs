//! Ambient structured logging init, grounded on the teacher's
//! `tracing_subscriber::registry().with(...).init()` pattern (`src/main.rs`),
//! stripped of the CLI-specific colorized formatter and file-rotation layer
//! since this crate exposes no CLI front end (spec §6).

use tracing_subscriber::EnvFilter;

/// Install a process-wide `tracing` subscriber reading its filter from
/// `RUST_LOG`, defaulting to `info` when unset. Intended for binaries and
/// integration tests embedding this crate; library code never calls this
/// itself.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
