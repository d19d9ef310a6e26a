use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::errors::BlockError;

/// Which side of a timestamp a block lookup is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Boundary {
    /// Earliest block at or after the timestamp.
    First,
    /// Latest block at or before the timestamp.
    Last,
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Boundary::First => write!(f, "First"),
            Boundary::Last => write!(f, "Last"),
        }
    }
}

impl FromStr for Boundary {
    type Err = BlockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "First" => Ok(Boundary::First),
            "Last" => Ok(Boundary::Last),
            other => Err(BlockError::InvalidBoundary {
                got: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockReference {
    pub height: u64,
    pub timestamp_unix_seconds: Option<i64>,
}

impl BlockReference {
    pub fn at(height: u64) -> Self {
        Self {
            height,
            timestamp_unix_seconds: None,
        }
    }
}
