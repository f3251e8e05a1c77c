//! ZIA Provider
//!
//! An infrastructure-as-code provider for Zscaler Internet Access (ZIA). It
//! speaks the gRPC plugin protocol upstream and the ZIA REST API downstream,
//! managing firewall filtering rules, custom URL categories, static IPs and
//! the tenant-wide sandbox and advanced threat settings.
//!
//! # Layout
//!
//! - [`crud`]: the generic adapter every resource kind runs through
//! - [`reconcile`]: order-independent comparison of set-valued attributes
//! - [`activation`]: optional activation of staged changes after each write
//! - [`retry`]: retries for transient API failures (edit lock, rate limit)
//! - [`client`]: the [`client::ApiClient`] seam and its HTTP implementation
//! - [`resources`]: the resource kinds and their catalog
//! - [`provider`]: [`provider::ZiaProvider`], registration and dispatch
//! - [`server`]: the plugin protocol server
//!
//! # Handshake Protocol
//!
//! On start the provider prints one line to stdout:
//!
//! ```text
//! ZIA_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `ZIA_PROVIDER|<protocol_version>|<address>`. Logs go to stderr.
//!
//! # Quick Start
//!
//! ```ignore
//! use zia_provider::{init_logging, serve, provider::ZiaProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!     serve(ZiaProvider::new()).await
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod activation;
pub mod client;
pub mod config;
pub mod crud;
pub mod diff;
pub mod error;
pub mod logging;
pub mod lookup;
pub mod provider;
pub mod reconcile;
pub mod resources;
pub mod retry;
pub mod schema;
pub mod server;
pub mod state;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated {
    tonic::include_proto!("zia.provider.v1");
}

pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::ZiaProvider;
pub use schema::ProviderSchema;
pub use server::{serve, serve_with_options, ProviderService, ServeOptions};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::{is_valid, validate, validate_result};
