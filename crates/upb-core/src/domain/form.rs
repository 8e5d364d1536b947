//! Setup form schema, error tokens, and abort reasons.
//!
//! The host platform renders the form; this module only declares it.  Errors
//! are reported to the form as short tokens (never as internal error text),
//! keyed by field name.  Failures that are not tied to one field use the
//! [`BASE_ERROR_KEY`] key.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::params::TransportKind;

/// Error key for failures that belong to the form as a whole.
pub const BASE_ERROR_KEY: &str = "base";

/// User-visible error token shown next to the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorToken {
    CannotConnect,
    InvalidUpbFile,
    Unknown,
}

impl ErrorToken {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorToken::CannotConnect => "cannot_connect",
            ErrorToken::InvalidUpbFile => "invalid_upb_file",
            ErrorToken::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a flow ended without creating a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    AlreadyConfigured,
}

impl AbortReason {
    pub fn as_str(self) -> &'static str {
        match self {
            AbortReason::AlreadyConfigured => "already_configured",
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input widget for a form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// One value out of a fixed list.
    Select { options: Vec<String> },
    /// Free text.
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormField {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormSchema {
    pub step_id: &'static str,
    pub fields: Vec<FormField>,
}

impl FormSchema {
    pub fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// The PIM setup form: transport, address, and UPStart export file.
pub fn data_schema() -> FormSchema {
    FormSchema {
        step_id: "user",
        fields: vec![
            FormField {
                name: "protocol",
                kind: FieldKind::Select {
                    options: TransportKind::ALL
                        .iter()
                        .map(|t| t.label().to_string())
                        .collect(),
                },
                required: true,
                default: Some(TransportKind::default().label().to_string()),
            },
            FormField {
                name: "address",
                kind: FieldKind::Text,
                required: true,
                default: None,
            },
            FormField {
                name: "file_path",
                kind: FieldKind::Text,
                required: true,
                default: Some(String::new()),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_tokens_match_form_strings() {
        assert_eq!(ErrorToken::CannotConnect.as_str(), "cannot_connect");
        assert_eq!(ErrorToken::InvalidUpbFile.as_str(), "invalid_upb_file");
        assert_eq!(ErrorToken::Unknown.to_string(), "unknown");
        assert_eq!(
            serde_json::to_value(ErrorToken::InvalidUpbFile).unwrap(),
            "invalid_upb_file"
        );
    }

    #[test]
    fn test_abort_reason_string() {
        assert_eq!(AbortReason::AlreadyConfigured.to_string(), "already_configured");
    }

    #[test]
    fn test_schema_protocol_defaults_to_serial_port() {
        let schema = data_schema();
        let protocol = schema.field("protocol").unwrap();

        assert!(protocol.required);
        assert_eq!(protocol.default.as_deref(), Some("Serial port"));
        assert_eq!(
            protocol.kind,
            FieldKind::Select {
                options: vec!["TCP".to_string(), "Serial port".to_string()]
            }
        );
    }

    #[test]
    fn test_schema_address_is_required_without_default() {
        let schema = data_schema();
        let address = schema.field("address").unwrap();
        assert!(address.required);
        assert_eq!(address.default, None);
    }

    #[test]
    fn test_schema_file_path_defaults_to_empty() {
        let schema = data_schema();
        assert_eq!(schema.field("file_path").unwrap().default.as_deref(), Some(""));
        assert_eq!(schema.fields.len(), 3);
    }
}
