//! HTTP adapter for the Digital Enterprise Server.
//!
//! Implements the [`RemoteRepository`](plexus_core::RemoteRepository) seam
//! over the server's JSON surface. The cache core never sees HTTP: status
//! and transport failures are mapped into the core error taxonomy here
//! (404 → `NotFound`, everything else transient → `RemoteUnavailable`).

mod client;
mod dto;

pub use client::DesClient;
