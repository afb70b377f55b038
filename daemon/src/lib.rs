//! Dockyard Library
//!
//! Single-host deployment daemon: turns pushed commits into running
//! application instances by detecting how to build and start them.

pub mod app;
pub mod deploy;
pub mod detect;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod integrations;
pub mod logs;
pub mod models;
pub mod server;
pub mod storage;
pub mod utils;
pub mod workers;
