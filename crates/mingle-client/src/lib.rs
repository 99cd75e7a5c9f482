//! HTTP client for the mingle server, with polling views for live chat.

pub mod client;
pub mod config;
pub mod error;
pub mod feeds;
pub mod poller;
pub mod session;

pub use client::ApiClient;
pub use config::{ClientConfig, PollConfig};
pub use error::ClientError;
pub use feeds::{watch_conversation, watch_session};
pub use poller::{PollHandle, ViewState};
pub use session::AuthSession;
