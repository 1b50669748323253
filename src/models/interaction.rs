use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// A user's reaction to a pool item
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Judgment {
    Like,
    Dislike,
}

impl Judgment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Judgment::Like => "like",
            Judgment::Dislike => "dislike",
        }
    }
}

impl Display for Judgment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One actor's latest judgment on one item
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InteractionRecord {
    pub actor_id: String,
    pub item_id: i64,
    pub kind: Judgment,
    pub created_at: DateTime<Utc>,
}

/// An item identifier with the time the actor judged it, used for exclusion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecentJudgment {
    pub item_id: i64,
    pub judged_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_stored_kind() {
        assert_eq!(Judgment::Like.to_string(), "like");
        assert_eq!(Judgment::Dislike.to_string(), "dislike");
    }

    #[test]
    fn test_judgment_serialization() {
        assert_eq!(serde_json::to_string(&Judgment::Dislike).unwrap(), "\"dislike\"");
    }
}
