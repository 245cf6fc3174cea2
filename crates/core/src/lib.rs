//! Core types and shared functionality for scidd.
//!
//! This crate provides:
//! - Identifier parsing and normalization
//! - The resolver contract and request signatures
//! - The cache-manager contract with a filesystem implementation
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod identifier;
pub mod resolver;

pub use cache::{CacheEntry, CacheManager, FsCacheManager, LocalApiCache, default_cache_manager};
pub use config::AppConfig;
pub use error::Error;
pub use identifier::{Identifier, ResourceType};
pub use resolver::{RequestSignature, Resolver, ResolverResponse};
