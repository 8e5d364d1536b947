//! Validation results and persisted registration records.

use serde::{Deserialize, Serialize};

use super::params::ConnectionParameters;

/// Title given to every registered PIM.
pub const DEFAULT_TITLE: &str = "UPB";

/// What a successful connection check reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Network id reported by the PIM.  Opaque; used as the dedup key.
    pub network_id: String,
    pub title: String,
    /// The URL the connection was made to.
    pub url: String,
    pub file_path: String,
}

/// A registered PIM.
///
/// Created once, after the first successful validation of a network, and
/// never modified by the setup flow afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    /// Network id of the PIM; unique across all records.
    pub id: String,
    pub title: String,
    /// Connection URL, e.g. `tcp://192.0.2.5:2101`.
    pub host: String,
    #[serde(default)]
    pub file_path: String,
    /// Raw parameters of an imported entry, kept as supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imported: Option<ConnectionParameters>,
}

impl RegistrationRecord {
    /// Record for the interactive flow: resolved URL plus the file path the
    /// user entered.
    pub fn from_user(result: ValidationResult, input: &ConnectionParameters) -> Self {
        Self {
            id: result.network_id,
            title: result.title,
            host: result.url,
            file_path: input.file_path.clone(),
            imported: None,
        }
    }

    /// Record for the import flow: the raw parameters are stored verbatim
    /// alongside the resolved URL.
    pub fn from_import(result: ValidationResult, input: ConnectionParameters) -> Self {
        Self {
            id: result.network_id,
            title: result.title,
            host: result.url,
            file_path: input.file_path.clone(),
            imported: Some(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::params::TransportKind;

    fn result_for(url: &str) -> ValidationResult {
        ValidationResult {
            network_id: "NET42".to_string(),
            title: DEFAULT_TITLE.to_string(),
            url: url.to_string(),
            file_path: "/etc/upb/net.upe".to_string(),
        }
    }

    #[test]
    fn test_user_record_keeps_only_host_and_file_path() {
        let input = ConnectionParameters::new(TransportKind::Tcp, "192.0.2.5:2101", "/etc/upb/net.upe");
        let record = RegistrationRecord::from_user(result_for("tcp://192.0.2.5:2101"), &input);

        assert_eq!(record.id, "NET42");
        assert_eq!(record.title, "UPB");
        assert_eq!(record.host, "tcp://192.0.2.5:2101");
        assert_eq!(record.file_path, "/etc/upb/net.upe");
        assert!(record.imported.is_none());
    }

    #[test]
    fn test_import_record_keeps_raw_input() {
        let input = ConnectionParameters::new(TransportKind::SerialPort, "/dev/ttyS1", "/etc/upb/net.upe")
            .with_host("serial:///dev/ttyS1");
        let record = RegistrationRecord::from_import(result_for("serial:///dev/ttyS1"), input.clone());

        assert_eq!(record.host, "serial:///dev/ttyS1");
        assert_eq!(record.imported, Some(input));
    }

    #[test]
    fn test_record_without_import_omits_imported_key_in_toml() {
        let input = ConnectionParameters::new(TransportKind::Tcp, "pim:2101", "");
        let record = RegistrationRecord::from_user(result_for("tcp://pim:2101"), &input);

        let text = toml::to_string(&record).unwrap();

        assert!(!text.contains("imported"));
        assert!(text.contains("host = \"tcp://pim:2101\""));
    }
}
