//! Filebox Storage Library
//!
//! This crate provides the storage gateway for filebox: the `Storage` trait,
//! its S3 and local filesystem backends, and the out-of-band helpers that
//! drive the same contract (container initializer, health prober).
//!
//! # Object keys
//!
//! Every object lives directly inside one container under an [`ObjectKey`]:
//! a flat name made of `[a-zA-Z0-9._]`, at most 50 characters, never ending
//! in `.`. Client-supplied filenames become keys through
//! [`ObjectKey::sanitize`]; key handling is centralized in the `keys` module
//! so all backends agree on what a valid name is.

pub mod factory;
pub mod health;
pub mod initializer;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use filebox_core::StorageBackend;
pub use health::{check_health, HealthState};
pub use initializer::{spawn_initializer, InitOutcome};
pub use keys::{ObjectKey, MAX_KEY_LENGTH};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
