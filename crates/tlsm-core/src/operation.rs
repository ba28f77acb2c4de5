//! Operation kinds and policy categories.
//!
//! Both sets are closed. Adding an operation means adding a variant here,
//! an entry in [`Operation::ALL`], and an object matcher in `tlsm-policy`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// An intercepted operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Opening a file.
    #[serde(rename = "open")]
    FileOpen,
    /// Binding a socket to a local address.
    #[serde(rename = "bind")]
    SocketBind,
    /// Connecting a socket to a remote address.
    #[serde(rename = "connect")]
    SocketConnect,
    /// Sending a signal.
    #[serde(rename = "signal")]
    Signal,
    /// Executing a program.
    #[serde(rename = "execve")]
    Execve,
}

impl Operation {
    /// Number of operation kinds.
    pub const COUNT: usize = 5;

    /// Every operation kind, in table order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::FileOpen,
        Self::SocketBind,
        Self::SocketConnect,
        Self::Signal,
        Self::Execve,
    ];

    /// Wire name used in rule text and on the answer channel.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FileOpen => "open",
            Self::SocketBind => "bind",
            Self::SocketConnect => "connect",
            Self::Signal => "signal",
            Self::Execve => "execve",
        }
    }

    /// Position of this operation in [`Operation::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::FileOpen => 0,
            Self::SocketBind => 1,
            Self::SocketConnect => 2,
            Self::Signal => 3,
            Self::Execve => 4,
        }
    }

    /// Number of object words a rule for this operation carries.
    ///
    /// Signals are matched on subject alone.
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::Signal => 0,
            Self::FileOpen | Self::SocketBind | Self::SocketConnect | Self::Execve => 1,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| CoreError::UnknownOperation(s.to_owned()))
    }
}

/// The outcome class a policy assigns to the requests it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Let the operation proceed.
    Allow,
    /// Refuse the operation.
    Deny,
    /// Ask the subject owner's approver.
    Ask,
    /// Watch every operation of one exact subject through the approver.
    Analyze,
}

impl Category {
    /// Every category, in table order.
    pub const ALL: [Self; 4] = [Self::Allow, Self::Deny, Self::Ask, Self::Analyze];

    /// Wire name used in rule text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Ask => "ask",
            Self::Analyze => "analyze",
        }
    }

    /// Whether requests matching this category go through interactive
    /// adjudication.
    #[must_use]
    pub const fn is_interactive(self) -> bool {
        matches!(self, Self::Ask | Self::Analyze)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CoreError::UnknownCategory(s.to_owned()))
    }
}
