#![warn(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod jobs;
pub mod labels;
pub mod poller;
pub mod server;
