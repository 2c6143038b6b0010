//! Process surface: command line, logging, HTTP server.

pub mod cli;
pub mod logging;
pub mod server;
