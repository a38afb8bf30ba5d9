//! JSON message types for host requests and responses.

use crate::error::ProtocolError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Error message returned for an unrecognized operation tag.
pub const UNKNOWN_OP_MESSAGE: &str = "unknown op";

/// Operations understood by the host.
///
/// The set is closed: a new operation is a new variant plus a new match arm
/// in the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Append lines of text to a file.
    Append,
}

impl Operation {
    /// Returns the wire tag for this operation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Operation::Append => "append",
        }
    }

    /// Looks up an operation by its wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "append" => Some(Operation::Append),
            _ => None,
        }
    }
}

/// Request message.
///
/// Only `op` is interpreted up front; everything else stays in `params` until
/// the selected operation extracts its own fields. A missing or non-string
/// `op` decodes as `None`, which the host answers as an unknown operation.
///
/// Decoding is per field: a value that is valid JSON but cannot be held as a
/// Rust string (a lone surrogate escape such as `"\ud800"`) is set aside in
/// `undecodable` instead of failing the whole message. Repeated keys keep
/// the last value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Request {
    /// Operation tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,

    /// Operation-specific fields.
    #[serde(flatten)]
    pub params: Map<String, Value>,

    /// Fields that parsed but could not be decoded, with the decoder error.
    #[serde(skip)]
    undecodable: BTreeMap<String, String>,
}

impl<'de> Deserialize<'de> for Request {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let fields = BTreeMap::<String, Box<RawValue>>::deserialize(deserializer)?;

        let mut request = Request::default();
        for (key, raw) in fields {
            match serde_json::from_str::<Value>(raw.get()) {
                Ok(value) if key == "op" => {
                    request.op = match value {
                        Value::String(tag) => Some(tag),
                        _ => None,
                    };
                }
                Ok(value) => {
                    request.params.insert(key, value);
                }
                Err(_) if key == "op" => request.op = None,
                Err(e) => {
                    request.undecodable.insert(key, e.to_string());
                }
            }
        }
        Ok(request)
    }
}

impl Request {
    pub fn new(op: impl Into<String>) -> Self {
        Self {
            op: Some(op.into()),
            ..Self::default()
        }
    }

    /// Builds an append request.
    pub fn append<I, S>(path: impl Into<String>, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines: Vec<Value> = lines
            .into_iter()
            .map(|line| Value::String(line.into()))
            .collect();
        Self::new(Operation::Append.as_str())
            .with_param("path", Value::String(path.into()))
            .with_param("lines", Value::Array(lines))
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Returns the operation selected by this request, if the tag is known.
    pub fn operation(&self) -> Option<Operation> {
        self.op.as_deref().and_then(Operation::from_tag)
    }

    /// Looks up a parameter, failing if its value could not be decoded.
    fn param(&self, field: &'static str) -> Result<Option<&Value>, ProtocolError> {
        if let Some(reason) = self.undecodable.get(field) {
            return Err(ProtocolError::InvalidField {
                field,
                reason: format!("undecodable value: {}", reason),
            });
        }
        Ok(self.params.get(field))
    }
}

/// Parameters of an append request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendParams {
    /// Target file.
    pub path: String,
    /// Lines in the order they must be written. `None` is an empty line.
    pub lines: Vec<Option<String>>,
}

impl AppendParams {
    /// Extracts append parameters from a request.
    ///
    /// `path` is required. `lines` may be absent or `null`, both meaning no
    /// lines; otherwise it must be an array of strings and nulls.
    pub fn from_request(request: &Request) -> Result<Self, ProtocolError> {
        let path = match request.param("path")? {
            None | Some(Value::Null) => return Err(ProtocolError::MissingField("path")),
            Some(Value::String(path)) => path.clone(),
            Some(other) => {
                return Err(ProtocolError::InvalidField {
                    field: "path",
                    reason: format!("expected a string, got {}", type_name(other)),
                })
            }
        };

        let lines = match request.param("lines")? {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(index, item)| match item {
                    Value::Null => Ok(None),
                    Value::String(line) => Ok(Some(line.clone())),
                    other => Err(ProtocolError::InvalidField {
                        field: "lines",
                        reason: format!(
                            "entry {} must be a string or null, got {}",
                            index,
                            type_name(other)
                        ),
                    }),
                })
                .collect::<Result<_, _>>()?,
            Some(other) => {
                return Err(ProtocolError::InvalidField {
                    field: "lines",
                    reason: format!("expected an array, got {}", type_name(other)),
                })
            }
        };

        Ok(Self { path, lines })
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Response message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Whether the request succeeded.
    pub ok: bool,

    /// Failure description (only when `ok` is false).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
        }
    }

    /// Response for a request whose tag matches no operation.
    pub fn unknown_op() -> Self {
        Self::error(UNKNOWN_OP_MESSAGE)
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(json: &str) -> Request {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_operation_tags() {
        assert_eq!(Operation::from_tag("append"), Some(Operation::Append));
        assert_eq!(Operation::Append.as_str(), "append");
        assert_eq!(Operation::from_tag("APPEND"), None);
        assert_eq!(Operation::from_tag("foo"), None);
    }

    #[test]
    fn test_request_parse_append() {
        let request = parse(r#"{"op":"append","path":"/tmp/a.log","lines":["a","b"]}"#);
        assert_eq!(request.op.as_deref(), Some("append"));
        assert_eq!(request.operation(), Some(Operation::Append));

        let params = AppendParams::from_request(&request).unwrap();
        assert_eq!(params.path, "/tmp/a.log");
        assert_eq!(
            params.lines,
            vec![Some("a".to_string()), Some("b".to_string())]
        );
    }

    #[test]
    fn test_request_missing_or_non_string_op() {
        assert_eq!(parse(r#"{}"#).op, None);
        assert_eq!(parse(r#"{"op":null}"#).op, None);
        assert_eq!(parse(r#"{"op":42}"#).op, None);
        assert_eq!(parse(r#"{"op":["append"]}"#).operation(), None);
    }

    #[test]
    fn test_request_keeps_extra_fields() {
        let request = parse(r#"{"op":"append","path":"p","tabId":7}"#);
        assert_eq!(request.params["tabId"], 7);
    }

    #[test]
    fn test_request_must_be_object() {
        assert!(serde_json::from_str::<Request>(r#"["append"]"#).is_err());
        assert!(serde_json::from_str::<Request>(r#""append""#).is_err());
        assert!(serde_json::from_str::<Request>("null").is_err());
    }

    #[test]
    fn test_request_builder_serialization() {
        let request = Request::append("/tmp/a.log", ["x", "y"]);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"op": "append", "path": "/tmp/a.log", "lines": ["x", "y"]})
        );
    }

    #[test]
    fn test_lines_default_to_empty() {
        let missing = parse(r#"{"op":"append","path":"p"}"#);
        assert!(AppendParams::from_request(&missing).unwrap().lines.is_empty());

        let null = parse(r#"{"op":"append","path":"p","lines":null}"#);
        assert!(AppendParams::from_request(&null).unwrap().lines.is_empty());
    }

    #[test]
    fn test_null_line_entries() {
        let request = parse(r#"{"op":"append","path":"p","lines":[null,"b",null]}"#);
        let params = AppendParams::from_request(&request).unwrap();
        assert_eq!(params.lines, vec![None, Some("b".to_string()), None]);
    }

    #[test]
    fn test_missing_path() {
        let request = parse(r#"{"op":"append","lines":["a"]}"#);
        let err = AppendParams::from_request(&request).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingField("path")));

        let request = parse(r#"{"op":"append","path":null}"#);
        assert!(matches!(
            AppendParams::from_request(&request),
            Err(ProtocolError::MissingField("path"))
        ));
    }

    #[test]
    fn test_invalid_field_types() {
        let request = parse(r#"{"op":"append","path":5}"#);
        let err = AppendParams::from_request(&request).unwrap_err();
        assert!(err.to_string().contains("path"));

        let request = parse(r#"{"op":"append","path":"p","lines":"abc"}"#);
        let err = AppendParams::from_request(&request).unwrap_err();
        assert!(err.to_string().contains("expected an array"));

        let request = parse(r#"{"op":"append","path":"p","lines":["a",1]}"#);
        let err = AppendParams::from_request(&request).unwrap_err();
        assert!(err.to_string().contains("entry 1"));
    }

    #[test]
    fn test_lone_surrogate_rejects_only_that_field() {
        let request = parse(r#"{"op":"append","path":"/tmp/a.log","lines":["\ud800"]}"#);
        assert_eq!(request.operation(), Some(Operation::Append));
        assert_eq!(request.params["path"], "/tmp/a.log");

        let err = AppendParams::from_request(&request).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidField { field: "lines", .. }));

        let request = parse(r#"{"op":"append","path":"/tmp/\udc00.log"}"#);
        assert!(matches!(
            AppendParams::from_request(&request),
            Err(ProtocolError::InvalidField { field: "path", .. })
        ));
    }

    #[test]
    fn test_undecodable_op_is_unknown() {
        let request = parse(r#"{"op":"\ud800","path":"p"}"#);
        assert_eq!(request.op, None);
        assert_eq!(request.operation(), None);
    }

    #[test]
    fn test_repeated_key_keeps_last_value() {
        let request = parse(r#"{"op":"foo","op":"append","path":"a","path":"b"}"#);
        assert_eq!(request.operation(), Some(Operation::Append));
        assert_eq!(AppendParams::from_request(&request).unwrap().path, "b");
    }

    #[test]
    fn test_response_serialization() {
        let ok = serde_json::to_string(&Response::ok()).unwrap();
        assert_eq!(ok, r#"{"ok":true}"#);

        let unknown = serde_json::to_string(&Response::unknown_op()).unwrap();
        assert_eq!(unknown, r#"{"ok":false,"error":"unknown op"}"#);

        let parsed: Response = serde_json::from_str(r#"{"ok":true}"#).unwrap();
        assert!(parsed.is_ok());
        assert_eq!(parsed.error, None);
    }
}
