//! Backend-side MySQL response decoding for proxies.
//!
//! A [`ResponseDecoder`] sits on one pooled backend connection and turns the
//! server's frames into response events for whichever [`ResponseHandler`] is
//! bound for the request in flight. [`mailbox::Mailbox`] serializes frame
//! delivery per connection when decoding runs on a worker pool.

pub mod connection;
pub mod constant;
pub mod decoder;
pub mod error;
pub mod handler;
pub mod mailbox;
mod opts;
pub mod protocol;

pub use connection::BackendConnection;
pub use decoder::{Phase, ResponseDecoder};
pub use handler::{LoadDataResponseHandler, ResponseHandler};
pub use opts::Opts;

#[cfg(feature = "tokio")]
pub mod tokio;
