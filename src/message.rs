//! Message protocol definitions
//!
//! Newline-terminated text frames of the form `command:param,param,...`.
//! Free-form text parameters are base64 tokens (see [`crate::codec`]);
//! stamp ids are plain decimal integers.

use std::fmt;

use crate::codec::{decode, encode};
use crate::error::RelayError;

/// Command tag of a client → server frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Claim a display name
    Join,
    /// Send chat text
    Chat,
    /// Send a stamp reaction
    Stamp,
    /// Anything else, kept verbatim for logging
    Unrecognized(String),
}

impl Command {
    fn from_tag(tag: &str) -> Self {
        match tag {
            "join" => Self::Join,
            "chat" => Self::Chat,
            "stamp" => Self::Stamp,
            other => Self::Unrecognized(other.to_string()),
        }
    }
}

/// Client → server frame, split into tag and raw parameter tokens
///
/// Parsing never fails; validation of parameter count and content is the
/// protocol handler's job since it depends on the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMessage {
    pub command: Command,
    pub params: Vec<String>,
}

impl CommandMessage {
    /// Split a frame (without its line terminator).
    ///
    /// A frame with no `:` has no parameters at all, while `join:` has a
    /// single empty parameter. Anything after a second `:` is ignored.
    pub fn parse(frame: &str) -> Self {
        let mut sections = frame.split(':');
        let command = Command::from_tag(sections.next().unwrap_or_default());
        let params: Vec<String> = sections
            .next()
            .map(|rest| rest.split(',').map(str::to_string).collect())
            .unwrap_or_default();
        Self { command, params }
    }

    /// The only parameter, or `BadRequest` if there are zero or several
    pub fn single_param(&self) -> Result<&str, RelayError> {
        match self.params.as_slice() {
            [param] => Ok(param),
            params => Err(RelayError::bad_request(format!(
                "expected 1 parameter, got {}",
                params.len()
            ))),
        }
    }
}

/// Server → client message
///
/// Holds decoded values; [`fmt::Display`] renders the wire frame
/// (without the line terminator) and [`ServerMessage::parse`] reverses it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// A session claimed a name
    Join { name: String },
    /// A session disconnected
    Leave { name: String },
    /// Current roster
    Users { names: Vec<String> },
    /// Chat text from a session
    Chat { name: String, content: String },
    /// Stamp reaction from a session
    Stamp { name: String, stamp: i64 },
    /// Error reported to a single session
    Error { code: ErrorCode, message: String },
}

/// Error codes carried by `ServerMessage::Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Unknown,
    BadRequest,
    Forbidden,
    DuplicateName,
}

impl ErrorCode {
    /// Stable numeric code shown to clients
    pub fn code(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::BadRequest => 1,
            Self::Forbidden => 2,
            Self::DuplicateName => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Unknown),
            1 => Some(Self::BadRequest),
            2 => Some(Self::Forbidden),
            3 => Some(Self::DuplicateName),
            _ => None,
        }
    }

    /// Fixed client-facing text for this code
    pub fn default_message(self) -> &'static str {
        match self {
            Self::Unknown => "an error occurred",
            Self::BadRequest => "bad request",
            Self::Forbidden => "forbidden",
            Self::DuplicateName => "that name is already in use",
        }
    }
}

/// Convert RelayError to ServerMessage for client notification
///
/// Details such as the offending token stay in the server log; the client
/// only sees the per-code text.
impl From<RelayError> for ServerMessage {
    fn from(err: RelayError) -> Self {
        let code = match err {
            RelayError::BadRequest(_) | RelayError::Decode(_) => ErrorCode::BadRequest,
            RelayError::Forbidden => ErrorCode::Forbidden,
            RelayError::DuplicateName(_) => ErrorCode::DuplicateName,
            RelayError::Io(_) | RelayError::Unknown => ErrorCode::Unknown,
        };
        ServerMessage::Error {
            code,
            message: code.default_message().to_string(),
        }
    }
}

impl ServerMessage {
    /// Parse a server frame (without its line terminator).
    pub fn parse(frame: &str) -> Result<Self, RelayError> {
        let (tag, rest) = frame
            .split_once(':')
            .ok_or_else(|| RelayError::bad_request("missing ':' separator"))?;
        let params: Vec<&str> = rest.split(',').collect();

        let message = match (tag, params.as_slice()) {
            ("join", [name]) => Self::Join { name: decode(name)? },
            ("leave", [name]) => Self::Leave { name: decode(name)? },
            ("users", [""]) => Self::Users { names: Vec::new() },
            ("users", names) => Self::Users {
                names: names
                    .iter()
                    .map(|name| decode(name))
                    .collect::<Result<_, _>>()?,
            },
            ("chat", [name, content]) => Self::Chat {
                name: decode(name)?,
                content: decode(content)?,
            },
            ("stamp", [name, stamp]) => Self::Stamp {
                name: decode(name)?,
                stamp: stamp
                    .parse()
                    .map_err(|_| RelayError::bad_request(format!("invalid stamp id '{stamp}'")))?,
            },
            ("error", [text]) => parse_error_text(&decode(text)?),
            _ => return Err(RelayError::bad_request(format!("unexpected frame '{frame}'"))),
        };
        Ok(message)
    }
}

/// Split `"<message> (code:<n>)"` back into its parts
fn parse_error_text(text: &str) -> ServerMessage {
    let parsed = text.strip_suffix(')').and_then(|body| {
        let (message, code) = body.rsplit_once(" (code:")?;
        let code = ErrorCode::from_code(code.parse().ok()?)?;
        Some((code, message.to_string()))
    });
    let (code, message) = parsed.unwrap_or_else(|| (ErrorCode::Unknown, text.to_string()));
    ServerMessage::Error { code, message }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Join { name } => write!(f, "join:{}", encode(name)),
            Self::Leave { name } => write!(f, "leave:{}", encode(name)),
            Self::Users { names } => {
                let names: Vec<String> = names.iter().map(encode).collect();
                write!(f, "users:{}", names.join(","))
            }
            Self::Chat { name, content } => {
                write!(f, "chat:{},{}", encode(name), encode(content))
            }
            Self::Stamp { name, stamp } => write!(f, "stamp:{},{}", encode(name), stamp),
            Self::Error { code, message } => {
                let text = format!("{} (code:{})", message, code.code());
                write!(f, "error:{}", encode(text))
            }
        }
    }
}
