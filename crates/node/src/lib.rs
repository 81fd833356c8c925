//! The ringlet node daemon: HTTP wire surface, configuration, logging
//! and the maintenance loop around [ringlet_core].

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod service;
pub mod util;
