//! Shared pieces of the relmesh CLI: logging setup and scene file I/O.

pub mod logging;
pub mod store;
