//! UPStart export file reader.
//!
//! UPStart is the vendor tool used to program a UPB network.  Its export is a
//! comma-separated text file with one record per line; the first field is
//! the record type.  Only two record types matter for setup:
//!
//! ```text
//! 0,<export version>,<network id>,<network name>,...   header (exactly one)
//! 2,<device id>,...                                    one per device
//! ```
//!
//! The network id in the header identifies the bus independently of how the
//! PIM is wired to the host, which makes it the registration key.

use std::path::{Path, PathBuf};

use thiserror::Error;

const HEADER_RECORD: &str = "0";
const DEVICE_RECORD: &str = "2";

#[derive(Debug, Error)]
pub enum ExportFileError {
    #[error("no UPStart export file given")]
    NoPath,

    #[error("I/O error reading UPStart export at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("UPStart export has no header record")]
    MissingHeader,

    #[error("UPStart export header has no network id")]
    MissingNetworkId,
}

/// What setup needs to know from an export file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub network_id: String,
    pub device_count: usize,
}

/// Parses export file content.
///
/// # Errors
///
/// Returns [`ExportFileError::MissingHeader`] or
/// [`ExportFileError::MissingNetworkId`] when the header is absent or empty.
pub fn parse_export(content: &str) -> Result<ExportSummary, ExportFileError> {
    let mut network_id: Option<String> = None;
    let mut device_count = 0;

    for line in content.lines() {
        let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
        match fields.first().copied() {
            Some(HEADER_RECORD) if network_id.is_none() => {
                let id = fields.get(2).copied().unwrap_or_default();
                if id.is_empty() {
                    return Err(ExportFileError::MissingNetworkId);
                }
                network_id = Some(id.to_string());
            }
            Some(DEVICE_RECORD) => device_count += 1,
            _ => {}
        }
    }

    let network_id = network_id.ok_or(ExportFileError::MissingHeader)?;
    Ok(ExportSummary {
        network_id,
        device_count,
    })
}

/// Reads and parses the export file at `path`.
///
/// # Errors
///
/// Returns [`ExportFileError::NoPath`] for an empty path,
/// [`ExportFileError::Io`] when the file cannot be read, and the
/// [`parse_export`] errors otherwise.
pub fn read_export_file(path: &str) -> Result<ExportSummary, ExportFileError> {
    if path.trim().is_empty() {
        return Err(ExportFileError::NoPath);
    }
    let path = Path::new(path);
    let content = std::fs::read_to_string(path).map_err(|source| ExportFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_export(&content)
}
