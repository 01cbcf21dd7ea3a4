//! NetBox API interaction module
//!
//! # Module Structure
//!
//! - [`openapi`] - Operation table loaded from the API specification
//! - [`http`] - Rate-limited, retrying HTTP transport
//! - [`client`] - Main client; calls operations by identifier
//! - [`pager`] - Concurrent offset/limit paging over list operations
//! - [`records`] - Typed shapes of the remote records we read
//! - [`fetch`] - Lookups used by the sync and inventory code
//!
//! # Example
//!
//! ```ignore
//! use nbsync::config::Config;
//! use nbsync::netbox::{Args, NetboxClient};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = NetboxClient::from_config(&Config::load()?)?;
//!     let devices = client.pager("dcim_devices_list")?.all(Default::default()).await?;
//!     client.call("dcim_cables_delete", Args::new().id(123)).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod fetch;
pub mod http;
pub mod openapi;
pub mod pager;
pub mod records;

pub use client::{Args, NetboxClient, OperationCaller};
pub use error::{NetboxError, Result, RetryOn};
pub use http::{ApiResponse, RetryPolicy, TransportSettings};
pub use openapi::{Operation, OperationTable};
pub use pager::{page_windows, PageWindow, Pager};
