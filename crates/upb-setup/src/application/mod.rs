//! Application layer use cases for the setup tool.
//!
//! Use cases here orchestrate domain types to fulfil a user goal and depend
//! on traits rather than concrete adapters, so a test can swap the PIM client
//! or the registration store without touching this code.
//!
//! # Sub-modules
//!
//! - **`validate_connection`** – One bounded-time connection attempt to a
//!   PIM.  Turns a callback-style client into an awaitable result and always
//!   releases the connection.
//!
//! - **`register_device`** – The setup flow: duplicate detection by host and
//!   by network id, validation, and record creation.

pub mod register_device;
pub mod validate_connection;
