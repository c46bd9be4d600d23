//! CODEOWNERS parsing.
//!
//! Only ownership is extracted; pattern matching against paths is not implemented.
//! Lines the parser cannot use are skipped and logged rather than rejected, so newer
//! syntax does not break older bots.

use std::fmt;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::github::repos::MAX_CODEOWNERS_BYTES;

#[derive(Debug, Error)]
pub enum CodeownersError {
    #[error("CODEOWNERS is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CODEOWNERS is too large ({size} bytes, limit {limit} bytes)")]
    TooLarge { size: usize, limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Owner {
    User(String),
    Team { org: String, slug: String },
}

impl Owner {
    /// Parse an `@user` or `@org/team` token.
    pub fn parse(token: &str) -> Option<Owner> {
        let name = token.strip_prefix('@')?;
        if name.is_empty() {
            return None;
        }
        match name.split_once('/') {
            None => Some(Owner::User(name.to_string())),
            Some((org, slug)) if !org.is_empty() && !slug.is_empty() && !slug.contains('/') => {
                Some(Owner::Team {
                    org: org.to_string(),
                    slug: slug.to_string(),
                })
            }
            Some(_) => None,
        }
    }
}

/// Displayed without the `@`: `alice`, `acme/reviewers`.
impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::User(name) => f.write_str(name),
            Owner::Team { org, slug } => write!(f, "{org}/{slug}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipEntry {
    pub pattern: String,
    pub owners: Vec<Owner>,
}

impl fmt::Display for OwnershipEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)?;
        for owner in &self.owners {
            write!(f, " @{owner}")?;
        }
        Ok(())
    }
}

/// Parsed CODEOWNERS, entries in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Codeowners {
    entries: Vec<OwnershipEntry>,
}

impl Codeowners {
    pub fn parse(content: &str) -> Self {
        let mut entries = Vec::new();

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split_whitespace();
            let Some(pattern) = fields.next() else {
                continue;
            };

            let mut owners = Vec::new();
            let mut saw_owner_field = false;
            for token in fields {
                if token.starts_with('#') {
                    break;
                }
                saw_owner_field = true;
                match Owner::parse(token) {
                    Some(owner) => owners.push(owner),
                    None => debug!(line = index + 1, token, "Ignoring CODEOWNERS owner token"),
                }
            }

            if owners.is_empty() {
                debug!(
                    line = index + 1,
                    has_owner_fields = saw_owner_field,
                    "Skipping CODEOWNERS line without usable owners"
                );
                continue;
            }

            entries.push(OwnershipEntry {
                pattern: pattern.to_string(),
                owners,
            });
        }

        Self { entries }
    }

    /// Parse raw bytes, refusing oversized or non-UTF-8 input.
    pub fn parse_bytes(bytes: Vec<u8>) -> Result<Self, CodeownersError> {
        if bytes.len() >= MAX_CODEOWNERS_BYTES {
            return Err(CodeownersError::TooLarge {
                size: bytes.len(),
                limit: MAX_CODEOWNERS_BYTES,
            });
        }
        let text = String::from_utf8(bytes)?;
        Ok(Self::parse(&text))
    }

    pub fn from_path(path: &Path) -> Result<Self, CodeownersError> {
        let bytes = std::fs::read(path).map_err(|source| CodeownersError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse_bytes(bytes)
    }

    pub fn entries(&self) -> &[OwnershipEntry] {
        &self.entries
    }

    /// Owners of the first `*` entry.
    pub fn global_owners(&self) -> &[Owner] {
        self.entries
            .iter()
            .find(|entry| entry.pattern == "*")
            .map(|entry| entry.owners.as_slice())
            .unwrap_or(&[])
    }
}

impl fmt::Display for Codeowners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}
