pub mod config;
pub(crate) mod deck_toml;
pub mod fd_limit;
pub mod logger;

pub use config::*;
pub use fd_limit::{cap_concurrency, max_open_fds, max_units_by_fd_limit};
pub use logger::{Colors, setup_logging};
