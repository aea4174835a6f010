//! Wire-level types shared by the gateway and the feature modules

mod envelope;

pub use envelope::{
    CanonicalResponse, DEFAULT_FAILURE_MESSAGE, DEFAULT_SUCCESS_MESSAGE, Envelope,
    describe_failure, normalize_reply, reason_phrase,
};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// HTTP verbs the backend surface uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    /// GET (payload travels in the query string)
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl Verb {
    /// Upper-case method name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Whether the payload is carried in the query string instead of the body
    #[must_use]
    pub fn encodes_payload_in_query(self) -> bool {
        self == Self::Get
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            other => Err(Error::validation(format!("unsupported HTTP verb: {other}"))),
        }
    }
}
