//! Core domain services for Gita Companion
//!
//! This crate implements the local-first persistence layer of the app:
//! typed repositories over the key-value store (reading progress, study
//! notes, preferences, usage analytics), the snapshot export/import
//! service, and local account/session management.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analytics;
pub mod auth;
pub mod backup;
pub mod notes;
pub mod preferences;
pub mod progress;
mod repository;

pub use repository::RepositoryError;
