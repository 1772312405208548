//! HTTP API endpoints of the relay client.

pub mod error;
pub mod requests;
