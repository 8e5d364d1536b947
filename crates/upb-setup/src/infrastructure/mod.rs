//! Infrastructure layer for the setup tool.
//!
//! Contains the adapters the use cases are written against: the PIM client
//! (TCP and serial transports, UPStart export files) and file-system storage.
//!
//! **Dependency rule**: this layer may depend on `application` and `upb_core`,
//! but MUST NOT be imported by the `application` or domain layers.

pub mod pim;
pub mod storage;
