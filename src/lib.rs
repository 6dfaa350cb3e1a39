// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod agenda;
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod history;
pub mod runtime;
pub mod session;
pub mod store;
pub mod util;
pub mod visibility;
