//! Storage infrastructure: configuration and registration persistence.
//!
//! - **`config`** – Reads the TOML configuration file from the
//!   platform-appropriate directory and supplies defaults on first run.
//! - **`registry`** – Implementations of `RegistrationStore`: a TOML file for
//!   the CLI and an in-memory store for tests and embedding hosts.

pub mod config;
pub mod registry;
