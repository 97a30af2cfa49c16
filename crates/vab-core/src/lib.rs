//! Core domain + application logic for the voting alert bot.
//!
//! This crate is framework-agnostic. The voting API, the SQLite store and
//! Telegram live behind ports (traits) implemented in adapter crates.

pub mod calendar;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod menu;
pub mod messaging;
pub mod ports;
pub mod render;
pub mod scheduler;
pub mod security;
pub mod utils;
pub mod votes;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, HttpMethod, Result};
