//! AT Protocol repository client
//!
//! This crate provides a trait-based client for the repository endpoints of a
//! personal data server (PDS), plus identity resolution for DIDs and handles.
//! Authentication is not handled here: requests are sent through an
//! [`XrpcHandler`], which the OAuth layer implements.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              RepoClient trait                    │
//! │  - describe_repo()                               │
//! │  - list_records()                                │
//! │  - apply_writes()                                │
//! └─────────────────────────────────────────────────┘
//!                        │
//!                        ▼
//! ┌─────────────────┐         ┌─────────────────────┐
//! │   XrpcClient    │────────►│  dyn XrpcHandler    │
//! │ (lexicon calls) │         │ (auth + transport)  │
//! └─────────────────┘         └─────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use atp_client::{Did, PublicHandler, RepoClient, XrpcClient};
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let handler = PublicHandler::new("https://bsky.social".parse()?)?;
//! let client = XrpcClient::new(Arc::new(handler));
//!
//! let repo: Did = "did:plc:ewvi7nxzyoun6zhxrhs64oiz".parse()?;
//! let description = client.describe_repo(&repo).await?;
//! println!("{:?}", description.collections);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod identity;
pub mod types;
pub mod xrpc;
pub mod xrpc_client;

pub use client::RepoClient;
pub use identity::{
    normalize_handle, DidDocument, DidService, HttpIdentityResolver, IdentityResolver,
};
pub use types::{
    record_key, DescribeRepoOutput, Did, ListRecordsOutput, ListedRecord, RepoWrite,
};
pub use xrpc::{PublicHandler, XrpcError, XrpcHandler, XrpcMethod, XrpcRequest, XrpcResponse};
pub use xrpc_client::XrpcClient;
