//! Memory Console Library
//!
//! Administrative client for a conversational-memory backend.
//!
//! # Features
//!
//! - **Request gateway**: one entry point for every backend call, with a
//!   uniform success/failure contract regardless of reply shape
//! - **Notifications**: single-slot loading/success/error/warning state with
//!   auto-dismissal
//! - **Feature modules**: transcript submission, similarity query, memory
//!   management, chat history, user and application configuration
//!
//! # Example
//!
//! ```no_run
//! use memory_console::{api, config::Config, gateway::RequestGateway};
//!
//! # async fn run() -> memory_console::Result<()> {
//! let gateway = RequestGateway::from_config(&Config::default())?;
//! let descriptor = api::list_memories("u1", "a1")?.on_success(|response| {
//!     println!("{}", response.data());
//! });
//! gateway.send(descriptor).await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod notification;
pub mod protocol;
pub mod render;
pub mod transport;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging. Logs go to stderr so stdout stays machine-readable.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match format {
        Some("json") => subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        _ => subscriber
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };

    installed.map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {e}")))
}
