//! Plugin processes, request scopes, and RPC facades for gantry.
//!
//! Plugins run as child processes that speak JSON-RPC 2.0 over their stdio
//! with `Content-Length` framing. The crate is layered:
//!
//! - [`transport`] and [`jsonrpc`] frame and encode individual messages.
//! - [`process::PluginProcess`] owns one child and its channel, and
//!   implements [`PluginChannel`].
//! - [`PluginContext`] issues a cancellable [`RequestScope`] for every call
//!   and cancels all of them, then closes the attached [`Host`], on shutdown.
//! - [`facade`] offers typed clients for providers, analyzers, language
//!   runtimes, converters, and secrets providers, plus servers that let a
//!   plugin implement the same traits over [`channel::serve`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use gantry_config::HostConfig;
//! use gantry_plugin::facade::provider::{ConfigureRequest, Provider, ProviderClient};
//! use gantry_plugin::process::PluginLaunch;
//! use gantry_plugin::{PluginContext, PluginHost};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HostConfig::from_env()?;
//! let host = Arc::new(PluginHost::new(None));
//! let context = PluginContext::new(&config).with_host(host.clone());
//!
//! let launch = PluginLaunch::new("pulumi-resource-aws").with_name("aws");
//! let aws = Arc::new(ProviderClient::launch(&launch, &config, context.clone())?);
//! host.register(aws.clone());
//!
//! aws.configure(&ConfigureRequest::default())?;
//! context.close()?;
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod context;
pub mod error;
pub mod facade;
pub mod host;
pub mod jsonrpc;
pub mod process;
pub mod telemetry;
pub mod transport;

#[cfg(test)]
mod tests;

pub use self::channel::{LoopbackChannel, PluginChannel, PluginHandler};
pub use self::context::{CancellationToken, PluginContext, RequestScope};
pub use self::error::{CloseErrors, PluginError, RpcCode, RpcError, TransportError};
pub use self::facade::PluginInfo;
pub use self::host::{Host, LogSeverity, ManagedPlugin, PluginHost};
