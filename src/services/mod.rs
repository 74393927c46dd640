//! Dashboard operations, one module per area.
//!
//! Each operation takes the shared [`AppState`](crate::AppState) and, for user
//! operations, the caller's access token. The token is forwarded to the
//! backend so row-level security still decides what the caller may see.

pub mod alerts;
pub mod auth;
pub mod devices;
pub mod ingest;
pub mod sensors;
pub mod thresholds;
