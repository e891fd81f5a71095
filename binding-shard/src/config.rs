//! Drop rule configuration and its key/value loading.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use crate::constants::{
    CHANCE_MAX_PCT, CHANCE_MIN_PCT, CONF_ALLOW_REPEAT, CONF_CHANCE, CONF_ENABLE, CONF_NPC_ENTRY,
    CONF_RESET, DEFAULT_ALLOW_REPEAT, DEFAULT_CHANCE_PCT, DEFAULT_ENABLE,
    DEFAULT_RESET_ON_STARTUP, LOG_TAG, LOG_TARGET, NPC_BARON_GEDDON,
};

/// Raw key/value lookup provided by the host's configuration manager.
pub trait ConfigSource {
    /// Raw string value for `key`, if the key is present.
    fn get_raw(&self, key: &str) -> Option<String>;
}

impl ConfigSource for HashMap<String, String> {
    fn get_raw(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl ConfigSource for BTreeMap<String, String> {
    fn get_raw(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Immutable settings snapshot for one configuration load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardConfig {
    #[serde(default = "ShardConfig::default_enable")]
    pub enable: bool,
    /// Creature template entry whose kill may drop the reward.
    #[serde(default = "ShardConfig::default_npc_entry")]
    pub npc_entry: u32,
    /// Drop chance in percent, `[0, 100]`.
    #[serde(default = "ShardConfig::default_chance_pct")]
    pub chance_pct: f64,
    #[serde(default = "ShardConfig::default_allow_repeat")]
    pub allow_repeat: bool,
    #[serde(default = "ShardConfig::default_reset_on_startup")]
    pub reset_on_startup: bool,
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            enable: Self::default_enable(),
            npc_entry: Self::default_npc_entry(),
            chance_pct: Self::default_chance_pct(),
            allow_repeat: Self::default_allow_repeat(),
            reset_on_startup: Self::default_reset_on_startup(),
        }
    }
}

impl ShardConfig {
    const fn default_enable() -> bool {
        DEFAULT_ENABLE
    }

    const fn default_npc_entry() -> u32 {
        NPC_BARON_GEDDON
    }

    const fn default_chance_pct() -> f64 {
        DEFAULT_CHANCE_PCT
    }

    const fn default_allow_repeat() -> bool {
        DEFAULT_ALLOW_REPEAT
    }

    const fn default_reset_on_startup() -> bool {
        DEFAULT_RESET_ON_STARTUP
    }

    /// Read the `GeddonShard.*` options from a key/value source.
    ///
    /// Missing keys take their default; unparsable values log a warning and
    /// take their default. The result is already normalized.
    #[must_use]
    pub fn from_source<C: ConfigSource + ?Sized>(source: &C) -> Self {
        Self {
            enable: read_option(source, CONF_ENABLE, parse_bool, Self::default_enable()),
            npc_entry: read_option(
                source,
                CONF_NPC_ENTRY,
                |raw| u32::from_str(raw).ok(),
                Self::default_npc_entry(),
            ),
            chance_pct: read_option(
                source,
                CONF_CHANCE,
                |raw| f64::from_str(raw).ok(),
                Self::default_chance_pct(),
            ),
            allow_repeat: read_option(
                source,
                CONF_ALLOW_REPEAT,
                parse_bool,
                Self::default_allow_repeat(),
            ),
            reset_on_startup: read_option(
                source,
                CONF_RESET,
                parse_bool,
                Self::default_reset_on_startup(),
            ),
        }
        .normalized()
    }

    /// Parse a JSON settings document; absent fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid JSON for this shape.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(json).map(Self::normalized)
    }

    /// Coerce out-of-range values: a zero target falls back to the default
    /// encounter and the chance is clamped to `[0, 100]`.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.npc_entry == 0 {
            self.npc_entry = Self::default_npc_entry();
        }
        self.chance_pct = if self.chance_pct.is_finite() {
            self.chance_pct.clamp(CHANCE_MIN_PCT, CHANCE_MAX_PCT)
        } else {
            CHANCE_MIN_PCT
        };
        self
    }
}

fn read_option<C, T, F>(source: &C, key: &str, parse: F, default: T) -> T
where
    C: ConfigSource + ?Sized,
    F: Fn(&str) -> Option<T>,
{
    let Some(raw) = source.get_raw(key) else {
        return default;
    };
    match parse(raw.trim()) {
        Some(value) => value,
        None => {
            log::warn!(
                target: LOG_TARGET,
                "{LOG_TAG} Ignoring unparsable value {raw:?} for {key}; using default."
            );
            default
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
