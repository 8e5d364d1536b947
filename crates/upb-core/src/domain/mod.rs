//! Domain entities for UPB PIM setup.
//!
//! Everything here is plain data plus pure functions.  The setup crate's
//! application layer drives these types; nothing in this module opens a
//! socket, touches the file system, or awaits.

pub mod form;
pub mod host_key;
pub mod params;
pub mod record;
