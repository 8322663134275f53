//! Wire format spoken between csync and an external plugin process
//!
//! Each call spawns the artifact, writes one JSON request line to its stdin
//! and reads one JSON document from its stdout.

use serde::{Deserialize, Serialize};

use crate::plugins::contract::{PluginError, PluginInfo};

/// Entry point an artifact must announce in its handshake
pub const ENTRY_POINT: &str = "PluginInstance";

/// Protocol version spoken by this host
pub const PROTOCOL_VERSION: u32 = 1;

/// Operations an artifact must list to satisfy the plugin contract
pub const REQUIRED_OPERATIONS: [&str; 3] = ["info", "init", "execute"];

/// Request sent to the plugin process
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Request {
    /// Handshake: announce entry point, protocol version and info
    Describe,
    /// One-time setup
    Init,
    /// Run a sub-command
    Execute {
        /// Arguments after the plugin name
        args: Vec<String>,
    },
}

/// Answer to [`Request::Describe`]
#[derive(Debug, Clone, Deserialize)]
pub struct Handshake {
    /// Must equal [`ENTRY_POINT`]
    #[serde(default)]
    pub entry_point: Option<String>,
    /// Must equal [`PROTOCOL_VERSION`]
    #[serde(default)]
    pub protocol_version: Option<u32>,
    /// Registry name
    #[serde(default)]
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Operations the artifact implements
    #[serde(default)]
    pub operations: Vec<String>,
}

/// Why a handshake was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// Output is not a JSON document
    Malformed(String),
    /// Output does not announce the entry point
    EntryPointMissing,
    /// Entry point present, contract not satisfied
    ContractMismatch(String),
}

/// Parse and check the output of a `describe` call
///
/// # Errors
///
/// Returns the first way in which the handshake falls short
pub fn parse_handshake(stdout: &str) -> Result<PluginInfo, HandshakeError> {
    let value: serde_json::Value = serde_json::from_str(stdout.trim())
        .map_err(|e| HandshakeError::Malformed(format!("handshake is not valid JSON: {e}")))?;

    let announces_entry_point = value
        .get("entry_point")
        .and_then(serde_json::Value::as_str)
        .is_some_and(|entry| entry == ENTRY_POINT);
    if !announces_entry_point {
        return Err(HandshakeError::EntryPointMissing);
    }

    let handshake: Handshake = serde_json::from_value(value)
        .map_err(|e| HandshakeError::ContractMismatch(format!("invalid handshake: {e}")))?;

    match handshake.protocol_version {
        Some(PROTOCOL_VERSION) => {}
        Some(other) => {
            return Err(HandshakeError::ContractMismatch(format!(
                "protocol version {other} is not supported (host speaks {PROTOCOL_VERSION})"
            )));
        }
        None => {
            return Err(HandshakeError::ContractMismatch(
                "missing protocol_version".to_string(),
            ));
        }
    }

    let missing: Vec<&str> = REQUIRED_OPERATIONS
        .iter()
        .copied()
        .filter(|op| !handshake.operations.iter().any(|have| have == op))
        .collect();
    if !missing.is_empty() {
        return Err(HandshakeError::ContractMismatch(format!(
            "missing operations: {}",
            missing.join(", ")
        )));
    }

    if handshake.name.trim().is_empty() {
        return Err(HandshakeError::ContractMismatch(
            "info returned an empty name".to_string(),
        ));
    }

    Ok(PluginInfo::new(handshake.name, handshake.description))
}

/// Answer to [`Request::Init`] or [`Request::Execute`]
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Whether the call succeeded
    #[serde(default = "default_true")]
    pub ok: bool,
    /// Failure message when `ok` is false
    #[serde(default)]
    pub error: Option<String>,
    /// Text to show the operator
    #[serde(default)]
    pub output: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Response {
    /// Parse process output; empty output means success with nothing to show
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the output is not a response object
    pub fn parse(stdout: &str) -> Result<Self, PluginError> {
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            return Ok(Self {
                ok: true,
                error: None,
                output: None,
            });
        }

        serde_json::from_str(trimmed)
            .map_err(|e| PluginError::Protocol(format!("failed to parse plugin response: {e}")))
    }

    /// Turn the response into the plugin's result
    ///
    /// # Errors
    ///
    /// Returns the plugin's own failure message
    pub fn into_result(self) -> Result<Option<String>, PluginError> {
        if self.ok {
            return Ok(self.output);
        }

        Err(PluginError::Remote(self.error.unwrap_or_else(|| {
            "plugin reported a failure without a message".to_string()
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "entry_point": "PluginInstance",
        "protocol_version": 1,
        "name": "demo",
        "description": "Demo plugin",
        "operations": ["info", "init", "execute"]
    }"#;

    #[test]
    fn request_wire_format() {
        assert_eq!(
            serde_json::to_string(&Request::Describe).unwrap(),
            r#"{"method":"describe"}"#
        );
        let execute = Request::Execute {
            args: vec!["send".to_string(), "#general".to_string()],
        };
        assert_eq!(
            serde_json::to_string(&execute).unwrap(),
            r##"{"method":"execute","args":["send","#general"]}"##
        );
    }

    #[test]
    fn valid_handshake() {
        let info = parse_handshake(VALID).unwrap();
        assert_eq!(info, PluginInfo::new("demo", "Demo plugin"));
    }

    #[test]
    fn non_json_is_malformed() {
        assert!(matches!(
            parse_handshake("hello world"),
            Err(HandshakeError::Malformed(_))
        ));
    }

    #[test]
    fn missing_or_wrong_entry_point() {
        assert_eq!(
            parse_handshake(r#"{"name":"demo","protocol_version":1}"#),
            Err(HandshakeError::EntryPointMissing)
        );
        assert_eq!(
            parse_handshake(r#"{"entry_point":"Plugin","name":"demo"}"#),
            Err(HandshakeError::EntryPointMissing)
        );
        assert_eq!(parse_handshake("[1, 2]"), Err(HandshakeError::EntryPointMissing));
    }

    #[test]
    fn version_skew_is_contract_mismatch() {
        let skewed = VALID.replace("\"protocol_version\": 1", "\"protocol_version\": 2");
        let Err(HandshakeError::ContractMismatch(reason)) = parse_handshake(&skewed) else {
            panic!("expected contract mismatch");
        };
        assert!(reason.contains("protocol version 2"));
    }

    #[test]
    fn missing_operation_is_contract_mismatch() {
        let partial = VALID.replace(", \"execute\"", "");
        let Err(HandshakeError::ContractMismatch(reason)) = parse_handshake(&partial) else {
            panic!("expected contract mismatch");
        };
        assert_eq!(reason, "missing operations: execute");
    }

    #[test]
    fn empty_name_is_contract_mismatch() {
        let nameless = VALID.replace("\"demo\"", "\"\"");
        assert!(matches!(
            parse_handshake(&nameless),
            Err(HandshakeError::ContractMismatch(_))
        ));
    }

    #[test]
    fn response_parsing() {
        assert!(Response::parse("").unwrap().into_result().unwrap().is_none());

        let ok = Response::parse(r#"{"ok":true,"output":"done"}"#).unwrap();
        assert_eq!(ok.into_result().unwrap().as_deref(), Some("done"));

        let failed = Response::parse(r#"{"ok":false,"error":"unknown user"}"#).unwrap();
        let err = failed.into_result().unwrap_err();
        assert!(matches!(err, PluginError::Remote(ref m) if m == "unknown user"));

        assert!(matches!(
            Response::parse("not json"),
            Err(PluginError::Protocol(_))
        ));
    }
}
