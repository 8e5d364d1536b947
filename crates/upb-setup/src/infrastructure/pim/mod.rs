//! PIM client infrastructure.
//!
//! # Sub-modules
//!
//! - **`client`** – The real client: opens `tcp://` or `serial://` transports
//!   and reads the network id from the UPStart export file.
//! - **`export_file`** – Parser for UPStart export files.
//! - **`mock`** – Scripted client used by tests to exercise timeouts and
//!   cleanup without hardware.

pub mod client;
pub mod export_file;
pub mod mock;

pub use client::{PimClient, PimClientFactory, PimTarget};
