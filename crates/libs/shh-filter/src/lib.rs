//! Client-side subscriptions for a node's `shh` JSON-RPC namespace.
//!
//! The crate turns the node's install/poll/uninstall calls into long-lived
//! subscriptions. It provides:
//!
//! - **[`Filter`]**, a polling subscription with an `Installing`, `Active`,
//!   `Stopped` lifecycle
//! - **[`join_public_chats`] / [`leave_public_chats`]**, batched public chat
//!   subscriptions pairing one node-created filter with each chat
//! - **[`Shh`]**, a facade over the plain `shh_*` and `shhext_*` calls
//! - **[`HttpGateway`]**, a JSON-RPC 2.0 over HTTP/1.1 [`RpcGateway`]
//!
//! Filters spawn their polling on the tokio runtime captured by their
//! [`FilterContext`].

pub mod chat;
pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod method;
pub mod transport;
pub mod types;
pub mod watch;

#[cfg(test)]
mod mock;

pub use chat::{join_public_chats, leave_public_chats, ChatFilter};
pub use client::Shh;
pub use config::ShhConfig;
pub use error::ShhError;
pub use filter::{
    ChatConsumer, Consumer, Filter, FilterContext, FilterHandlers, FilterState,
    InstallErrorConsumer, ResultTransform,
};
pub use gateway::RpcGateway;
pub use method::ShhMethod;
pub use transport::HttpGateway;
pub use types::MessageFilterOptions;
pub use watch::{FilterId, WatchDescriptor};
