//! Client code for scidd.
//!
//! This crate provides the network side of identifier resolution: streaming
//! downloads into the cache, a reference REST resolver, and the
//! [`FileResource`] facade used by the server.

pub mod fetch;
pub mod resolver;
pub mod resource;

pub use fetch::{DownloadConfig, Downloader, StagedDownload};
pub use resolver::{HttpResolver, ResolverConfig, RetryPolicy};
pub use resource::FileResource;
