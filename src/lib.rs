//! Log-tail and rotation watcher.
//!
//! Follows a single growing text log through a bounded trailing window,
//! classifies new lines, keeps a fixed-size recent history, rotates the file
//! past a size threshold and restarts itself when it stops seeing updates.

pub mod cli;
pub mod config;
pub mod history;
pub mod rotation;
pub mod source;
pub mod watcher;
