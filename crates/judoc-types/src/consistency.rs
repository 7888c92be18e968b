use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Durability/visibility level requested from the backend for a single row
/// operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Consistency {
    Any,
    One,
    Two,
    Three,
    Quorum,
    All,
    LocalQuorum,
    EachQuorum,
    LocalOne,
}

impl Consistency {
    /// Every level, in the order they are listed in help text.
    pub const ALL_LEVELS: [Consistency; 9] = [
        Self::Any,
        Self::One,
        Self::Two,
        Self::Three,
        Self::Quorum,
        Self::All,
        Self::LocalQuorum,
        Self::EachQuorum,
        Self::LocalOne,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "ANY",
            Self::One => "ONE",
            Self::Two => "TWO",
            Self::Three => "THREE",
            Self::Quorum => "QUORUM",
            Self::All => "ALL",
            Self::LocalQuorum => "LOCAL_QUORUM",
            Self::EachQuorum => "EACH_QUORUM",
            Self::LocalOne => "LOCAL_ONE",
        }
    }
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Consistency {
    type Err = TypeError;

    /// Parses case-insensitively; `-` is accepted in place of `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL_LEVELS
            .into_iter()
            .find(|level| level.as_str() == normalized)
            .ok_or_else(|| TypeError::UnknownConsistency(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_every_level() {
        for level in Consistency::ALL_LEVELS {
            assert_eq!(level.as_str().parse::<Consistency>().unwrap(), level);
        }
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("local_quorum".parse::<Consistency>().unwrap(), Consistency::LocalQuorum);
        assert_eq!("Local-One".parse::<Consistency>().unwrap(), Consistency::LocalOne);
        assert_eq!(" any ".parse::<Consistency>().unwrap(), Consistency::Any);
    }

    #[test]
    fn parse_unknown() {
        let err = "SERIAL".parse::<Consistency>().unwrap_err();
        assert_eq!(err, TypeError::UnknownConsistency("SERIAL".into()));
    }

    #[test]
    fn serde_uses_cql_names() {
        let json = serde_json::to_string(&Consistency::EachQuorum).unwrap();
        assert_eq!(json, "\"EACH_QUORUM\"");
        let parsed: Consistency = serde_json::from_str("\"LOCAL_ONE\"").unwrap();
        assert_eq!(parsed, Consistency::LocalOne);
    }
}
