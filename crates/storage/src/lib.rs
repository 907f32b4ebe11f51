//! Storage layer for Gita Companion
//!
//! This crate provides the key-value store adapter all repositories are
//! built on: a sled-backed implementation, an in-memory fake for tests,
//! and a shared handle that serializes read-modify-write cycles per key.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod kv;

pub use kv::{KeyValueStore, KvConfig, MemoryStore, SharedStore, SledStore, StorageError};
