//! # upb-core
//!
//! Shared domain types for setting up a UPB Powerline Interface Module (PIM).
//!
//! A PIM bridges the UPB power-line bus to a host computer, either over a
//! serial port or through a TCP serial server.  Adding one to the system is a
//! short wizard: the user picks a transport, types an address, and points at
//! the UPStart export file that describes the bus network.  The setup crate
//! then tries a live connection within a deadline and, when it succeeds,
//! stores a registration record keyed by the network id the PIM reports.
//!
//! This crate holds the pieces of that flow that need no I/O:
//!
//! - **`domain::params`** – What the user typed ([`ConnectionParameters`]) and
//!   how it turns into a connection URL.
//! - **`domain::record`** – What a successful validation produces
//!   ([`ValidationResult`]) and what gets persisted ([`RegistrationRecord`]).
//! - **`domain::form`** – The form schema shown to the user and the error
//!   tokens / abort reasons the flow can report back.
//! - **`domain::host_key`** – Address normalization used to spot a PIM that is
//!   already registered under the same host.

pub mod domain;

pub use domain::form::{data_schema, AbortReason, BASE_ERROR_KEY, ErrorToken, FieldKind, FormField, FormSchema};
pub use domain::host_key::{host_key, url_already_configured};
pub use domain::params::{ConnectionParameters, ParseTransportError, TransportKind};
pub use domain::record::{RegistrationRecord, ValidationResult, DEFAULT_TITLE};
