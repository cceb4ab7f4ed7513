use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Connection state of the single managed protocol session.
///
/// Stored as TEXT in the sessions table; the string forms below are the
/// canonical on-disk and on-wire representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Unknown,
    Connecting,
    Connected,
    Reconnecting,
    LoggedOut,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::LoggedOut => "logged_out",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(Self::Unknown),
            "connecting" => Ok(Self::Connecting),
            "connected" => Ok(Self::Connected),
            "reconnecting" => Ok(Self::Reconnecting),
            "logged_out" => Ok(Self::LoggedOut),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown session status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

/// Direction tag on an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}
