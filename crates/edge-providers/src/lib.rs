//! Edge-Providers: provider interfaces for edge-release
//!
//! This crate defines the external collaborators the release engine talks
//! to and ships two implementations of them.
//!
//! ## Layer 0 - Providers
//!
//! Focus: thin, stateless call surfaces. No retry, no credential handling.
//!
//! ## Key Components
//!
//! - `ObjectStore`, `FunctionPlatform`, `CdnDistributions`: provider traits
//! - `ProviderFactory`: region-scoped client construction
//! - `fakes`: in-memory implementations that record every call
//! - `FsProviders`: filesystem sandbox for local rehearsals

mod error;
pub mod fakes;
pub mod fs_backend;
pub mod provider_traits;

pub use error::ProviderError;
pub use fs_backend::FsProviders;
pub use provider_traits::{
    byte_stream, ByteStream, CdnDistributions, CodeSource, DistributionConfig, FunctionPlatform,
    FunctionVersion, ObjectStore, ProviderFactory, ProviderResult, VersionPage, LATEST_VERSION,
};
