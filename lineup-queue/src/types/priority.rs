use serde::{Deserialize, Serialize};
use std::fmt;

/// Job priority for queue ordering (lower values = more urgent)
///
/// No range is enforced; the wire protocol only produces non-negative
/// values, but the queue accepts the full `i64` range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub i64);

impl Priority {
    /// Get the numeric value
    pub fn value(self) -> i64 {
        self.0
    }
}

impl From<i64> for Priority {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Self(i64::from(value))
    }
}

impl From<Priority> for i64 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
