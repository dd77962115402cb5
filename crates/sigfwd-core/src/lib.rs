//! Core domain + application logic for the Telegram signal forwarder.
//!
//! This crate is framework-agnostic. The messaging platform lives behind the
//! `Transport` port and out-of-band verification input behind `SecretSource`;
//! adapter crates implement them.

pub mod auth;
pub mod compose;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod extract;
pub mod filter;
pub mod lifecycle;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod resolve;
pub mod secrets;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
