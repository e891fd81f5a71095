//! The persisted once-only slot and the actor names written into it.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{ACTOR_NAME_REPLACEMENT, MAX_ACTOR_NAME_LEN};

/// Player display name cleaned for storage.
///
/// Quote characters are replaced with `_` and the name is capped at
/// [`MAX_ACTOR_NAME_LEN`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ActorName(String);

impl ActorName {
    /// Sanitize a raw display name. Empty names yield `None`.
    #[must_use]
    pub fn sanitize(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        let cleaned: String = raw
            .chars()
            .take(MAX_ACTOR_NAME_LEN)
            .map(|ch| match ch {
                '\'' | '"' => ACTOR_NAME_REPLACEMENT,
                other => other,
            })
            .collect();
        Some(Self(cleaned))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ActorName {
    type Error = &'static str;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::sanitize(&raw).ok_or("actor name must not be empty")
    }
}

impl From<ActorName> for String {
    fn from(name: ActorName) -> Self {
        name.0
    }
}

impl fmt::Display for ActorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ActorName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Durable state of one reward's once-only slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRecord {
    pub key: String,
    /// Whether the reward has ever been produced.
    pub granted: bool,
    /// Epoch seconds of the most recent grant or collection; 0 if never granted.
    pub granted_at_epoch_seconds: u64,
    /// Player tied to the most recent grant or collection.
    pub last_actor: Option<ActorName>,
}

impl RewardRecord {
    /// Fresh ungranted slot for `key`.
    #[must_use]
    pub fn ungranted(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            granted: false,
            granted_at_epoch_seconds: 0,
            last_actor: None,
        }
    }

    /// Mark the slot granted, overwriting metadata with the latest values.
    pub fn apply_grant(&mut self, actor: Option<&ActorName>, at_epoch_seconds: u64) {
        self.granted = true;
        self.granted_at_epoch_seconds = at_epoch_seconds.max(1);
        self.last_actor = actor.cloned();
    }

    /// Update who collected the reward and when, leaving `granted` untouched.
    pub fn apply_collection(&mut self, actor: &ActorName, at_epoch_seconds: u64) {
        self.granted_at_epoch_seconds = at_epoch_seconds.max(1);
        self.last_actor = Some(actor.clone());
    }

    /// Return the slot to its never-granted shape.
    pub fn clear(&mut self) {
        self.granted = false;
        self.granted_at_epoch_seconds = 0;
        self.last_actor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_quotes_and_caps_length() {
        let name = ActorName::sanitize("O'Brien \"the\" Bold").unwrap();
        assert_eq!(name.as_str(), "O_Brien _the_ Bold");

        let long = "x".repeat(200);
        let capped = ActorName::sanitize(&long).unwrap();
        assert_eq!(capped.as_str().chars().count(), MAX_ACTOR_NAME_LEN);

        let quoted = "'".repeat(80);
        let cleaned = ActorName::sanitize(&quoted).unwrap();
        assert_eq!(cleaned.as_str(), "_".repeat(MAX_ACTOR_NAME_LEN));
    }

    #[test]
    fn sanitize_counts_characters_not_bytes() {
        let name = "Ærøskøbing".repeat(10);
        let capped = ActorName::sanitize(&name).unwrap();
        assert_eq!(capped.as_str().chars().count(), MAX_ACTOR_NAME_LEN);
        assert!(ActorName::sanitize("").is_none());
    }

    #[test]
    fn deserializing_goes_through_sanitize() {
        let name: ActorName = serde_json::from_str(r#""O'Brien""#).unwrap();
        assert_eq!(name.as_str(), "O_Brien");

        let long = format!("\"{}\"", "y".repeat(100));
        let capped: ActorName = serde_json::from_str(&long).unwrap();
        assert_eq!(capped.as_str().len(), MAX_ACTOR_NAME_LEN);

        assert!(serde_json::from_str::<ActorName>(r#""""#).is_err());
        assert_eq!(serde_json::to_string(&name).unwrap(), r#""O_Brien""#);
    }

    #[test]
    fn record_transitions_keep_invariants() {
        let mut record = RewardRecord::ungranted("slot");
        assert!(!record.granted);
        assert_eq!(record.granted_at_epoch_seconds, 0);

        let actor = ActorName::sanitize("Ragnaros").unwrap();
        record.apply_grant(Some(&actor), 0);
        assert!(record.granted);
        assert!(record.granted_at_epoch_seconds > 0);

        let looter = ActorName::sanitize("Looter").unwrap();
        record.apply_collection(&looter, 1_700_000_000);
        assert!(record.granted);
        assert_eq!(record.last_actor, Some(looter));
        assert_eq!(record.granted_at_epoch_seconds, 1_700_000_000);

        record.clear();
        assert_eq!(record, RewardRecord::ungranted("slot"));
    }
}
