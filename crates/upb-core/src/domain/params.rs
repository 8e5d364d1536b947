//! Connection parameters entered by the user (or supplied by an import).
//!
//! # URL composition
//!
//! The PIM client library addresses devices by URL.  The user never types a
//! URL directly; they choose a transport and type an address, and the URL is
//! composed from the two:
//!
//! ```text
//! TCP          + "192.0.2.5:2101"  →  tcp://192.0.2.5:2101
//! Serial port  + "/dev/ttyUSB0"    →  serial:///dev/ttyUSB0
//! ```
//!
//! An import may carry a pre-resolved `host` URL instead.  When present and
//! non-empty it wins and the address is ignored; exactly one of the two ever
//! feeds the effective URL.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transport used to reach the PIM.
///
/// The serde names are the labels shown in the setup form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransportKind {
    /// PIM behind a TCP serial server.
    #[serde(rename = "TCP")]
    Tcp,
    /// PIM on a local serial port.
    #[default]
    #[serde(rename = "Serial port")]
    SerialPort,
}

impl TransportKind {
    /// All transports, in the order the form lists them.
    pub const ALL: [TransportKind; 2] = [TransportKind::Tcp, TransportKind::SerialPort];

    /// URL scheme for this transport.
    pub fn scheme(self) -> &'static str {
        match self {
            TransportKind::Tcp => "tcp",
            TransportKind::SerialPort => "serial",
        }
    }

    /// Label shown in the setup form.
    pub fn label(self) -> &'static str {
        match self {
            TransportKind::Tcp => "TCP",
            TransportKind::SerialPort => "Serial port",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Returned when a transport name matches neither a scheme nor a form label.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown transport '{0}' (expected 'tcp' or 'serial')")]
pub struct ParseTransportError(pub String);

impl FromStr for TransportKind {
    type Err = ParseTransportError;

    /// Accepts the URL scheme (`tcp`, `serial`) or the form label
    /// (`TCP`, `Serial port`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(TransportKind::Tcp),
            "serial" | "serial port" | "serial_port" => Ok(TransportKind::SerialPort),
            _ => Err(ParseTransportError(s.to_string())),
        }
    }
}

/// Parameters collected by the setup form.
///
/// `file_path` is the UPStart export file.  It is a plain string defaulting
/// to `""` because that is what the form submits; an empty value means "no
/// file", which the PIM client rejects as an invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionParameters {
    #[serde(default)]
    pub protocol: TransportKind,
    pub address: String,
    #[serde(default)]
    pub file_path: String,
    /// Pre-resolved connection URL.  Only imports set this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl ConnectionParameters {
    /// Builds form-style parameters (no explicit URL).
    pub fn new(
        protocol: TransportKind,
        address: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        Self {
            protocol,
            address: address.into(),
            file_path: file_path.into(),
            host: None,
        }
    }

    /// Builds parameters that carry an explicit connection URL.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// The URL the PIM client should connect to.
    pub fn effective_url(&self) -> String {
        match self.host.as_deref() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => format!("{}://{}", self.protocol.scheme(), self.address),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcp_address_composes_tcp_url() {
        let params = ConnectionParameters::new(TransportKind::Tcp, "192.0.2.5:2101", "");
        assert_eq!(params.effective_url(), "tcp://192.0.2.5:2101");
    }

    #[test]
    fn test_serial_address_composes_serial_url() {
        let params = ConnectionParameters::new(TransportKind::SerialPort, "/dev/ttyUSB0", "");
        assert_eq!(params.effective_url(), "serial:///dev/ttyUSB0");
    }

    #[test]
    fn test_explicit_host_overrides_address() {
        // Arrange: the address would compose a different URL
        let params = ConnectionParameters::new(TransportKind::SerialPort, "/dev/ttyS0", "")
            .with_host("tcp://10.0.0.9:2101");

        // Act / Assert
        assert_eq!(params.effective_url(), "tcp://10.0.0.9:2101");
    }

    #[test]
    fn test_empty_explicit_host_falls_back_to_address() {
        let params = ConnectionParameters::new(TransportKind::Tcp, "pim.local", "").with_host("");
        assert_eq!(params.effective_url(), "tcp://pim.local");
    }

    #[test]
    fn test_default_transport_is_serial_port() {
        assert_eq!(TransportKind::default(), TransportKind::SerialPort);
        assert_eq!(ConnectionParameters::default().protocol, TransportKind::SerialPort);
    }

    #[test]
    fn test_transport_parses_schemes_and_labels() {
        assert_eq!("tcp".parse::<TransportKind>(), Ok(TransportKind::Tcp));
        assert_eq!("TCP".parse::<TransportKind>(), Ok(TransportKind::Tcp));
        assert_eq!("serial".parse::<TransportKind>(), Ok(TransportKind::SerialPort));
        assert_eq!("Serial port".parse::<TransportKind>(), Ok(TransportKind::SerialPort));
    }

    #[test]
    fn test_transport_rejects_unknown_name() {
        let err = "usb".parse::<TransportKind>().unwrap_err();
        assert_eq!(err, ParseTransportError("usb".to_string()));
    }

    #[test]
    fn test_form_values_use_form_labels_on_the_wire() {
        // Arrange
        let params = ConnectionParameters::new(TransportKind::Tcp, "192.0.2.5:2101", "");

        // Act
        let json = serde_json::to_value(&params).unwrap();

        // Assert: labels, not variant names; absent host is omitted
        assert_eq!(json["protocol"], "TCP");
        assert_eq!(json["file_path"], "");
        assert!(json.get("host").is_none());
    }

    #[test]
    fn test_missing_optional_form_values_take_defaults() {
        let params: ConnectionParameters =
            serde_json::from_str(r#"{"address": "/dev/ttyUSB0"}"#).unwrap();
        assert_eq!(params.protocol, TransportKind::SerialPort);
        assert_eq!(params.file_path, "");
        assert_eq!(params.host, None);
    }
}
