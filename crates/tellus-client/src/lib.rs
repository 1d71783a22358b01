//! Tellus Client - payload and catalog document retrieval
//!
//! This crate provides [`DownloadClient`], which reads distribution payloads
//! and catalog documents either from the local filesystem or over HTTP.
//!
//! # Overview
//!
//! Remote bodies are read as a stream of chunks. A non-success status is an
//! error; nothing is retried here, a failed download is picked up again on
//! the next scheduled harvest.

pub mod download;

// Re-export main client types
pub use download::DownloadClient;
