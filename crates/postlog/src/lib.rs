//! Postlog analytics SDK for Rust.
//!
//! # Example
//!
//! ```rust,ignore
//! use postlog::Postlog;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), postlog::Error> {
//!     let client = Postlog::builder().debug_logging(true).build()?;
//!     client.initialize("tok_xxx");
//!
//!     client.identify("usr_123", "my-app")
//!         .property("plan", "pro")
//!         .send()
//!         .await?;
//!
//!     client.track("Signed up", "users", "my-app", "usr_123")
//!         .icon("🎉")
//!         .send()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

mod builders;
mod client;
mod config;
mod error;
mod queue;
mod session;
mod transport;
pub mod types;

pub use client::{Postlog, SendableIdentify, SendableTrack};
pub use config::{
    Config, PostlogBuilder, DEFAULT_API_HOST, DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_TIMEOUT,
};
pub use error::Error;
pub use queue::Completion;
pub use transport::{HttpTransport, Request, Response, Transport};
pub use types::{
    validate, Endpoint, IdentifyPayload, Payload, Properties, PropertyValue, TrackPayload,
};
