// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app_dirs;
pub mod config;
pub mod engine;
pub mod history;
pub mod logging;
pub mod metrics;
pub mod passage;
pub mod runtime;
pub mod scoreboard;
pub mod session;
pub mod sink;
pub mod timer;
pub mod util;
