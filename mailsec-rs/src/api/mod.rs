//! REST API module for mailsec-rs
//!
//! Provides HTTP endpoints for the record checks

pub mod handlers;
pub mod server;

pub use server::ApiServer;
