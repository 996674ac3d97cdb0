//! Wire format shared by the server and the client
//!
//! One JSON object per line in each direction. A request names a method and
//! carries its parameters; the response echoes the request's sequence number
//! and carries either a status string or an error message.
//!
//! ```text
//! {"seq":1,"call":{"method":"WindowCreator.Close","params":"a"}}
//! {"seq":1,"result":"Window with id a does not exist"}
//! ```

use crate::graphics::Color;
use serde::{Deserialize, Serialize};

/// Parameters of `WindowCreator.Solid`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolidColorArgs {
    /// Window identifier
    pub id: String,
    /// Width, must be positive
    pub width: i32,
    /// Height, must be positive
    pub height: i32,
    /// Title, must be non-empty
    pub title: String,
    /// Fill color
    pub color: Color,
}

/// Parameters of `WindowCreator.Qr`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrArgs {
    /// Window identifier
    pub id: String,
    /// Title, must be non-empty
    pub title: String,
    /// Text to encode, must be non-empty
    pub text: String,
    /// Recovery level index in `0..=3`
    pub recovery_level: i32,
    /// Side length, must be positive
    pub size: i32,
}

/// A remote operation with its parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum Call {
    /// Terminate the host with an exit code
    #[serde(rename = "Server.Close")]
    Shutdown(i32),
    /// Close a window by identifier
    #[serde(rename = "WindowCreator.Close")]
    CloseWindow(String),
    /// Create or update a solid-color window
    #[serde(rename = "WindowCreator.Solid")]
    Solid(SolidColorArgs),
    /// Create or update a QR window
    #[serde(rename = "WindowCreator.Qr")]
    Qr(QrArgs),
}

impl Call {
    /// Wire name of the method
    pub fn method(&self) -> &'static str {
        match self {
            Self::Shutdown(_) => "Server.Close",
            Self::CloseWindow(_) => "WindowCreator.Close",
            Self::Solid(_) => "WindowCreator.Solid",
            Self::Qr(_) => "WindowCreator.Qr",
        }
    }
}

/// One request line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Caller-chosen sequence number echoed in the response
    pub seq: u64,
    /// Operation to perform
    pub call: Call,
}

/// One response line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Sequence number of the request this answers
    pub seq: u64,
    /// Status string on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Error message on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    /// Successful response
    pub fn ok(seq: u64, status: impl Into<String>) -> Self {
        Self {
            seq,
            result: Some(status.into()),
            error: None,
        }
    }

    /// Failed response
    pub fn error(seq: u64, message: impl Into<String>) -> Self {
        Self {
            seq,
            result: None,
            error: Some(message.into()),
        }
    }

    /// Status string, or the remote error message
    pub fn into_result(self) -> Result<String, String> {
        match self.error {
            Some(message) => Err(message),
            None => Ok(self.result.unwrap_or_default()),
        }
    }
}

/// Serialize `value` as one protocol line including the trailing newline
pub fn encode_line<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request = Request {
            seq: 7,
            call: Call::Qr(QrArgs {
                id: "x".to_string(),
                title: "QR".to_string(),
                text: "hello".to_string(),
                recovery_level: 2,
                size: 256,
            }),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "seq": 7,
                "call": {
                    "method": "WindowCreator.Qr",
                    "params": {"id": "x", "title": "QR", "text": "hello", "recovery_level": 2, "size": 256}
                }
            })
        );
    }

    #[test]
    fn test_parse_hand_written_lines() {
        let shutdown: Request =
            serde_json::from_str(r#"{"seq":1,"call":{"method":"Server.Close","params":3}}"#).unwrap();
        assert_eq!(shutdown.call, Call::Shutdown(3));

        let solid: Request = serde_json::from_str(
            r#"{"seq":2,"call":{"method":"WindowCreator.Solid","params":
                {"id":"a","width":10,"height":20,"title":"t","color":{"r":1,"g":2,"b":3,"a":255}}}}"#,
        )
        .unwrap();
        assert_eq!(solid.call.method(), "WindowCreator.Solid");
    }

    #[test]
    fn test_unknown_method_rejected() {
        let parsed = serde_json::from_str::<Request>(r#"{"seq":1,"call":{"method":"Nope","params":1}}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_response_omits_empty_side() {
        let line = encode_line(&Response::ok(3, "")).unwrap();
        assert_eq!(line, "{\"seq\":3,\"result\":\"\"}\n");

        let failed: Response = serde_json::from_str(r#"{"seq":4,"error":"boom"}"#).unwrap();
        assert_eq!(failed.into_result(), Err("boom".to_string()));
    }
}
