//! Record types stored by the chaincode
//!
//! Every record is four string fields rendered into a JSON-like object by
//! plain concatenation. Values are not escaped: a `"` inside a field yields
//! text that no JSON parser accepts, and that text is what gets stored.

use crate::error::{Result, ShareVoteError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A fixed-shape record built from positional chaincode arguments
pub trait Record: Sized {
    /// Number of arguments the matching write function takes
    const ARITY: usize;

    /// Build the record from positional arguments, checking their count
    fn from_args(args: &[String]) -> Result<Self>;

    /// State key the record is stored under
    fn key(&self) -> String;

    /// Field names and values in rendering order
    fn fields(&self) -> Vec<(&'static str, &str)>;

    /// Render the record the way it is persisted
    fn render(&self) -> String {
        render_fields(&self.fields())
    }
}

/// Concatenate `{"k": "v", ...}` with no escaping of keys or values
pub fn render_fields(fields: &[(&str, &str)]) -> String {
    let body = fields
        .iter()
        .map(|(name, value)| format!("\"{}\": \"{}\"", name, value))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{}}}", body)
}

/// Reject argument lists whose length is not `expected`
pub fn check_arity(args: &[String], expected: usize) -> Result<()> {
    if args.len() != expected {
        return Err(ShareVoteError::IncorrectArguments {
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

/// Parse stored bytes back into a typed record
///
/// Only succeeds when the stored text is valid JSON, i.e. none of the
/// write arguments contained quotes or control characters.
pub fn decode<R: DeserializeOwned>(bytes: &[u8]) -> Result<R> {
    serde_json::from_slice(bytes).map_err(ShareVoteError::from)
}

/// Calendar slot written by `write`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub name: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

impl Record for Appointment {
    const ARITY: usize = 4;

    fn from_args(args: &[String]) -> Result<Self> {
        check_arity(args, Self::ARITY)?;
        Ok(Self {
            name: args[0].clone(),
            date: args[1].clone(),
            start_time: args[2].clone(),
            end_time: args[3].clone(),
        })
    }

    fn key(&self) -> String {
        self.name.clone()
    }

    fn fields(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("name", self.name.as_str()),
            ("date", self.date.as_str()),
            ("start_time", self.start_time.as_str()),
            ("end_time", self.end_time.as_str()),
        ]
    }
}

/// A member's vote on a subject, written by `write2`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub key: String,
    pub name: String,
    pub subj: String,
    pub vote: String,
}

/// Undelimited concatenation used by `write2`/`read2`
pub fn vote_key(name: &str, subj: &str) -> String {
    format!("{}{}", name, subj)
}

impl Record for Vote {
    const ARITY: usize = 3;

    fn from_args(args: &[String]) -> Result<Self> {
        check_arity(args, Self::ARITY)?;
        Ok(Self {
            key: vote_key(&args[0], &args[1]),
            name: args[0].clone(),
            subj: args[1].clone(),
            vote: args[2].clone(),
        })
    }

    fn key(&self) -> String {
        self.key.clone()
    }

    fn fields(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("key", self.key.as_str()),
            ("name", self.name.as_str()),
            ("subj", self.subj.as_str()),
            ("vote", self.vote.as_str()),
        ]
    }
}

/// Agenda item written by `write3`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(rename = "subject__number")]
    pub number: String,
    #[serde(rename = "subject__title")]
    pub title: String,
    #[serde(rename = "subject__content")]
    pub content: String,
    #[serde(rename = "subject__type")]
    pub kind: String,
}

impl Record for Subject {
    const ARITY: usize = 4;

    fn from_args(args: &[String]) -> Result<Self> {
        check_arity(args, Self::ARITY)?;
        Ok(Self {
            number: args[0].clone(),
            title: args[1].clone(),
            content: args[2].clone(),
            kind: args[3].clone(),
        })
    }

    fn key(&self) -> String {
        self.number.clone()
    }

    fn fields(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("subject__number", self.number.as_str()),
            ("subject__title", self.title.as_str()),
            ("subject__content", self.content.as_str()),
            ("subject__type", self.kind.as_str()),
        ]
    }
}

/// Shareholding entry written by `write4`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharesHeld {
    pub key_shares_held: String,
    pub bill_number: String,
    pub user: String,
    pub number_of_shares_held: String,
}

impl Record for SharesHeld {
    const ARITY: usize = 4;

    fn from_args(args: &[String]) -> Result<Self> {
        check_arity(args, Self::ARITY)?;
        Ok(Self {
            key_shares_held: args[0].clone(),
            bill_number: args[1].clone(),
            user: args[2].clone(),
            number_of_shares_held: args[3].clone(),
        })
    }

    fn key(&self) -> String {
        self.key_shares_held.clone()
    }

    fn fields(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("key_shares_held", self.key_shares_held.as_str()),
            ("bill_number", self.bill_number.as_str()),
            ("user", self.user.as_str()),
            ("number_of_shares_held", self.number_of_shares_held.as_str()),
        ]
    }
}
