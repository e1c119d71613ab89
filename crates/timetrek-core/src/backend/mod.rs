//! Hosted backend client.
//!
//! [`RestBackend`] is the async client. [`HostedBackend`] wraps it with its
//! own runtime so the synchronous [`WorkspaceStore`](crate::WorkspaceStore)
//! and timer commits can run against the hosted tables.

mod hosted;
mod rest;

pub use hosted::HostedBackend;
pub use rest::RestBackend;
