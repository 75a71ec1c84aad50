use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 1967;
pub const DEFAULT_QUIZ_INTERVAL_SECS: u64 = 10;
pub const OPERAND_MIN: u32 = 1;
pub const OPERAND_MAX: u32 = 20;
pub const DUPLICATE_USERNAME: &str = "duplicate username";
/// Longest inbound line accepted, excluding the newline
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Messages a client may send.
///
/// Serialization produces the canonical lowercase `type` tag; parsing goes
/// through [`ClientMessage::parse`], which is more lenient than serde's
/// derived tag matching.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Login { username: String },
    Message { text: String },
    Answer { answer: String },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Login {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    NewUser {
        username: String,
    },
    Message {
        text: String,
        sender: String,
    },
    Result {
        result: bool,
    },
    QuestionArrive {
        question: String,
    },
    UserDisconnected {
        username: String,
    },
}

impl ServerMessage {
    pub fn login_accepted() -> Self {
        ServerMessage::Login {
            success: true,
            reason: None,
        }
    }

    pub fn login_rejected(reason: &str) -> Self {
        ServerMessage::Login {
            success: false,
            reason: Some(reason.to_string()),
        }
    }

    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(line.trim_end_matches(['\r', '\n']))
            .map_err(|e| ProtocolError::InvalidJson(e.to_string()))
    }
}

/// Reasons an inbound line was not turned into a [`ClientMessage`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid json: {0}")]
    InvalidJson(String),

    #[error("payload is not a json object")]
    NotAnObject,

    #[error("missing or non-string 'type' field")]
    MissingType,

    #[error("unknown message type '{0}'")]
    UnknownType(String),

    #[error("missing or non-string '{0}' field")]
    MissingField(&'static str),
}

impl ClientMessage {
    /// Parses one frame sent by a client.
    ///
    /// The `type` field is matched case-insensitively. Required fields must
    /// be JSON strings; anything else is reported as missing so the caller
    /// can drop the frame.
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(line.trim_end_matches(['\r', '\n']))
            .map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;

        let object = value.as_object().ok_or(ProtocolError::NotAnObject)?;

        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?
            .to_lowercase();

        match kind.as_str() {
            "login" => Ok(ClientMessage::Login {
                username: string_field(object, "username")?,
            }),
            "message" => Ok(ClientMessage::Message {
                text: string_field(object, "text")?,
            }),
            "answer" => Ok(ClientMessage::Answer {
                answer: string_field(object, "answer")?,
            }),
            _ => Err(ProtocolError::UnknownType(kind)),
        }
    }
}

fn string_field(object: &Map<String, Value>, name: &'static str) -> Result<String, ProtocolError> {
    object
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ProtocolError::MissingField(name))
}

/// Serializes a message as a single newline-terminated JSON frame.
pub fn encode_frame<T: Serialize>(message: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut frame = serde_json::to_vec(message)?;
    frame.push(b'\n');
    Ok(frame)
}

/// Trims a name and collapses every internal run of whitespace into a single
/// space, so "  Bob   Smith " and "Bob Smith" claim the same name.
pub fn simplify_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Solves a rendered quiz question such as `5 + 3 + ? * 2 = 22`.
///
/// Returns `None` when the question is malformed or has no integer solution.
pub fn solve_question(question: &str) -> Option<i64> {
    let tokens: Vec<&str> = question.split_whitespace().collect();
    if tokens.len() != 9
        || tokens[1] != "+"
        || tokens[3] != "+"
        || tokens[5] != "*"
        || tokens[7] != "="
    {
        return None;
    }

    let slots: Vec<Option<i64>> = [tokens[0], tokens[2], tokens[4], tokens[6], tokens[8]]
        .iter()
        .map(|t| if *t == "?" { None } else { t.parse().ok() })
        .collect();

    let masked = slots.iter().position(Option::is_none)?;
    if slots.iter().filter(|s| s.is_none()).count() != 1 {
        return None;
    }
    let value = |i: usize| slots[i].unwrap_or(0);
    let (a, b, c, d, r) = (value(0), value(1), value(2), value(3), value(4));

    match masked {
        0 => Some(r - b - c * d),
        1 => Some(r - a - c * d),
        2 if d != 0 && (r - a - b) % d == 0 => Some((r - a - b) / d),
        3 if c != 0 && (r - a - b) % c == 0 => Some((r - a - b) / c),
        4 => Some(a + b + c * d),
        _ => None,
    }
}
