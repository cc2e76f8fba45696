//! Core domain + application logic for TeleFeed, a Telegram message-redirection
//! service.
//!
//! This crate is framework-agnostic. The Telegram transport and the HTTP
//! surface live in adapter crates behind the ports defined here.

pub mod config;
pub mod control;
pub mod domain;
pub mod errors;
pub mod failure;
pub mod liveness;
pub mod logging;
pub mod messaging;
pub mod store;

pub use errors::{Error, Result};
