//! Peer wire protocol: command parser and response framing
//!
//! Commands are single lines parsed with nom:
//!
//! ```text
//! INIT <arg>...
//! INVOKE <function> <arg>...
//! QUERY <function> <arg>...
//! ```
//!
//! An argument is a bare token or a double-quoted string without embedded
//! quotes. Payload responses are length-prefixed so stored bytes come back
//! exactly as written.

use crate::error::{Result, ShareVoteError};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{space0, space1},
    combinator::{map, map_res, verify},
    multi::many0,
    sequence::{delimited, preceded, terminated, tuple},
    IResult,
};
use std::str;

/// Commands accepted by the peer
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Init { args: Vec<String> },
    Invoke { function: String, args: Vec<String> },
    Query { function: String, args: Vec<String> },
}

impl Command {
    /// Encode the command as a protocol line
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let (verb, function, args) = match self {
            Command::Init { args } => ("INIT", None, args),
            Command::Invoke { function, args } => ("INVOKE", Some(function), args),
            Command::Query { function, args } => ("QUERY", Some(function), args),
        };

        let mut line = String::from(verb);
        if let Some(function) = function {
            if function.is_empty() || !is_bare(function) {
                return Err(ShareVoteError::Client(format!(
                    "Function name cannot be sent: {:?}",
                    function
                )));
            }
            line.push(' ');
            line.push_str(function);
        }
        for arg in args {
            line.push(' ');
            line.push_str(&encode_arg(arg)?);
        }
        line.push_str("\r\n");
        Ok(line.into_bytes())
    }
}

/// Response types from the peer
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ok,
    Payload(Vec<u8>),
    Error(String),
}

impl Response {
    /// Serialize response to bytes for network transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Response::Ok => b"OK\r\n".to_vec(),
            Response::Payload(bytes) => {
                let mut out = format!("PAYLOAD {}\r\n", bytes.len()).into_bytes();
                out.extend_from_slice(bytes);
                out.extend_from_slice(b"\r\n");
                out
            }
            // Messages are single-line on the wire
            Response::Error(e) => format!("ERROR {}\r\n", e.replace(['\r', '\n'], " ")).into_bytes(),
        }
    }
}

/// Response header line, before any payload body is read
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseHeader {
    Ok,
    Payload(usize),
    Error(String),
}

/// Parse a response header line (without its line terminator)
pub fn parse_response_header(line: &str) -> Result<ResponseHeader> {
    if line == "OK" {
        Ok(ResponseHeader::Ok)
    } else if let Some(len) = line.strip_prefix("PAYLOAD ") {
        let len = len
            .parse::<usize>()
            .map_err(|e| ShareVoteError::Protocol(format!("Bad payload length {:?}: {}", len, e)))?;
        Ok(ResponseHeader::Payload(len))
    } else if let Some(message) = line.strip_prefix("ERROR ") {
        Ok(ResponseHeader::Error(message.to_string()))
    } else {
        Err(ShareVoteError::Protocol(format!(
            "Unknown response format: {}",
            line
        )))
    }
}

fn is_bare(arg: &str) -> bool {
    !arg.starts_with('"') && !arg.chars().any(|c| c.is_ascii_whitespace())
}

/// Encode one argument as a bare or quoted token
pub fn encode_arg(arg: &str) -> Result<String> {
    if !arg.is_empty() && is_bare(arg) {
        return Ok(arg.to_string());
    }
    if arg.contains('"') || arg.contains(['\r', '\n']) {
        return Err(ShareVoteError::Client(format!(
            "Argument cannot be sent: {:?}",
            arg
        )));
    }
    Ok(format!("\"{}\"", arg))
}

/// Parse a complete command from input bytes
pub fn parse_command(input: &[u8]) -> Result<Command> {
    let (_, command) = command_parser(input)?;
    Ok(command)
}

/// Main command parser using nom combinators
fn command_parser(input: &[u8]) -> IResult<&[u8], Command> {
    terminated(
        alt((init_command, invoke_command, query_command)),
        tuple((space0, alt((tag(b"\r\n"), tag(b"\n"))))),
    )(input)
}

fn is_token_byte(c: u8) -> bool {
    c != b' ' && c != b'\t' && c != b'\r' && c != b'\n'
}

/// Bare token that does not start with a quote
fn bare_arg(input: &[u8]) -> IResult<&[u8], String> {
    map_res(
        verify(take_while1(is_token_byte), |token: &[u8]| token[0] != b'"'),
        |bytes: &[u8]| str::from_utf8(bytes).map(|s| s.to_string()),
    )(input)
}

/// Double-quoted argument, possibly empty or containing spaces
fn quoted_arg(input: &[u8]) -> IResult<&[u8], String> {
    map_res(
        delimited(
            tag(b"\""),
            take_while(|c| c != b'"' && c != b'\r' && c != b'\n'),
            tag(b"\""),
        ),
        |bytes: &[u8]| str::from_utf8(bytes).map(|s| s.to_string()),
    )(input)
}

fn argument(input: &[u8]) -> IResult<&[u8], String> {
    alt((quoted_arg, bare_arg))(input)
}

fn arguments(input: &[u8]) -> IResult<&[u8], Vec<String>> {
    many0(preceded(space1, argument))(input)
}

/// Parse INIT command: INIT <arg>...
fn init_command(input: &[u8]) -> IResult<&[u8], Command> {
    map(preceded(tag(b"INIT"), arguments), |args| Command::Init { args })(input)
}

/// Parse INVOKE command: INVOKE <function> <arg>...
fn invoke_command(input: &[u8]) -> IResult<&[u8], Command> {
    map(
        tuple((tag(b"INVOKE"), space1, bare_arg, arguments)),
        |(_, _, function, args)| Command::Invoke { function, args },
    )(input)
}

/// Parse QUERY command: QUERY <function> <arg>...
fn query_command(input: &[u8]) -> IResult<&[u8], Command> {
    map(
        tuple((tag(b"QUERY"), space1, bare_arg, arguments)),
        |(_, _, function, args)| Command::Query { function, args },
    )(input)
}
