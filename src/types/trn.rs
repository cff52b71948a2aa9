use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::store::path::validate_path;

const TRN_PREFIX: &str = "trn:";

/// Resource kinds addressable by a TRN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrnKind {
    Group,
    Workspace,
}

impl TrnKind {
    const fn as_str(self) -> &'static str {
        match self {
            TrnKind::Group => "group",
            TrnKind::Workspace => "workspace",
        }
    }
}

/// Globally unique, human-readable resource name: `trn:<kind>:<full-path>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trn {
    pub kind: TrnKind,
    pub path: String,
}

impl Trn {
    #[must_use]
    pub fn group(path: &str) -> Self {
        Self {
            kind: TrnKind::Group,
            path: path.to_string(),
        }
    }

    #[must_use]
    pub fn workspace(path: &str) -> Self {
        Self {
            kind: TrnKind::Workspace,
            path: path.to_string(),
        }
    }

    /// Parses a TRN and checks it names the expected kind.
    pub fn parse_as(s: &str, kind: TrnKind) -> Result<Self> {
        let trn: Trn = s.parse()?;
        if trn.kind != kind {
            return Err(Error::invalid(format!(
                "TRN '{s}' is not a {} TRN",
                kind.as_str()
            )));
        }
        Ok(trn)
    }
}

impl fmt::Display for Trn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{TRN_PREFIX}{}:{}", self.kind.as_str(), self.path)
    }
}

impl FromStr for Trn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix(TRN_PREFIX)
            .ok_or_else(|| Error::invalid(format!("TRN '{s}' must start with '{TRN_PREFIX}'")))?;

        let (kind, path) = rest
            .split_once(':')
            .ok_or_else(|| Error::invalid(format!("TRN '{s}' is missing a resource type")))?;

        let kind = match kind {
            "group" => TrnKind::Group,
            "workspace" => TrnKind::Workspace,
            other => {
                return Err(Error::invalid(format!(
                    "TRN '{s}' has unknown resource type '{other}'"
                )));
            }
        };

        validate_path(path)?;
        if kind == TrnKind::Workspace && !path.contains('/') {
            return Err(Error::invalid(format!(
                "TRN '{s}' must include the workspace's group path"
            )));
        }

        Ok(Self {
            kind,
            path: path.to_string(),
        })
    }
}
