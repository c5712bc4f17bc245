//! Line protocol: tokenizer, request grammar and reply encoding
//!
//! ```text
//! SET    [<auth_token>] <key> <value>
//! LOOKUP [<auth_token>] <key>
//! ```
//!
//! The auth token is present only when the server has authentication enabled.

use crate::error::Result;
use nom::{
    bytes::complete::{take_till1, take_while},
    multi::many0,
    sequence::preceded,
    IResult,
};

/// Line a client sends to end its session. The server closes without replying.
pub const EXIT_LINE: &str = "EXIT";

pub const OK_REPLY: &str = "OK";
pub const NOT_FOUND_REPLY: &str = "NOT FOUND";
pub const ERROR_PREFIX: &str = "ERROR: ";

/// Commands supported by the columnkv protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set { key: String, value: String },
    Lookup { key: String },
}

impl Command {
    /// Wire form, with the token inserted after the verb when given
    pub fn to_line(&self, auth_token: Option<&str>) -> String {
        let (verb, args) = match self {
            Command::Set { key, value } => ("SET", format!("{} {}", key, value)),
            Command::Lookup { key } => ("LOOKUP", key.clone()),
        };
        match auth_token {
            Some(token) => format!("{} {} {}\n", verb, token, args),
            None => format!("{} {}\n", verb, args),
        }
    }
}

/// Why a line could not become a `Command`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    Empty,
    Unauthorized,
    UnknownCommand(String),
    WrongArity { verb: &'static str },
}

/// Reply sent back for every request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Ok,
    Value(String),
    NotFound,
    Unauthorized,
    UnknownCommand,
    EmptyCommand,
    WrongArity(&'static str),
    PersistenceFailure,
    InvalidEncoding,
    LineTooLong,
}

impl Response {
    pub fn to_line(&self) -> String {
        match self {
            Response::Ok => format!("{}\n", OK_REPLY),
            Response::Value(v) => format!("{}\n", v),
            Response::NotFound => format!("{}\n", NOT_FOUND_REPLY),
            Response::Unauthorized => format!("{}Unauthorized\n", ERROR_PREFIX),
            Response::UnknownCommand => format!("{}Unknown command\n", ERROR_PREFIX),
            Response::EmptyCommand => format!("{}Empty command\n", ERROR_PREFIX),
            Response::WrongArity(verb) => {
                format!("{}Wrong number of arguments for {}\n", ERROR_PREFIX, verb)
            }
            Response::PersistenceFailure => format!("{}Persistence failure\n", ERROR_PREFIX),
            Response::InvalidEncoding => format!("{}Command is not valid UTF-8\n", ERROR_PREFIX),
            Response::LineTooLong => format!("{}Line too long\n", ERROR_PREFIX),
        }
    }

    /// Serialize response to bytes for network transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_line().into_bytes()
    }
}

impl From<RequestError> for Response {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Empty => Response::EmptyCommand,
            RequestError::Unauthorized => Response::Unauthorized,
            RequestError::UnknownCommand(_) => Response::UnknownCommand,
            RequestError::WrongArity { verb } => Response::WrongArity(verb),
        }
    }
}

/// A reply line as seen by a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Value(String),
    NotFound,
    Error(String),
}

impl Reply {
    /// Classify a reply line. A stored value spelled exactly `OK` or
    /// starting with `ERROR: ` is indistinguishable from a status line.
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        if line == OK_REPLY {
            Reply::Ok
        } else if line == NOT_FOUND_REPLY {
            Reply::NotFound
        } else if let Some(message) = line.strip_prefix(ERROR_PREFIX) {
            Reply::Error(message.to_string())
        } else {
            Reply::Value(line.to_string())
        }
    }
}

fn token(input: &str) -> IResult<&str, &str> {
    preceded(take_while(char::is_whitespace), take_till1(char::is_whitespace))(input)
}

/// Split a line on runs of whitespace
pub fn tokenize(line: &str) -> Result<Vec<&str>> {
    let (_, tokens) = many0(token)(line)?;
    Ok(tokens)
}

/// Turn one request line into a command, checking the auth token first.
pub fn parse_request(line: &str, auth_token: Option<&str>) -> std::result::Result<Command, RequestError> {
    let tokens = tokenize(line).map_err(|_| RequestError::Empty)?;
    let (verb, mut args) = match tokens.split_first() {
        Some((verb, args)) => (*verb, args),
        None => return Err(RequestError::Empty),
    };

    if let Some(expected) = auth_token {
        match args.split_first() {
            Some((supplied, rest)) if *supplied == expected => args = rest,
            _ => return Err(RequestError::Unauthorized),
        }
    }

    match verb.to_uppercase().as_str() {
        "SET" => match args {
            [key, value] => Ok(Command::Set {
                key: key.to_string(),
                value: value.to_string(),
            }),
            _ => Err(RequestError::WrongArity { verb: "SET" }),
        },
        "LOOKUP" => match args {
            [key] => Ok(Command::Lookup {
                key: key.to_string(),
            }),
            _ => Err(RequestError::WrongArity { verb: "LOOKUP" }),
        },
        _ => Err(RequestError::UnknownCommand(verb.to_string())),
    }
}
