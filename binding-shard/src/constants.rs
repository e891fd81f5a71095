//! Fixed identifiers and tuning values for the binding shard drop rule.
//!
//! Everything the rule needs that is not operator-tunable lives here, so a
//! change to an item id or table name is a reviewed code change rather than a
//! configuration tweak.

// Game data -----------------------------------------------------------------
/// Creature template entry of Baron Geddon, the default target.
pub const NPC_BARON_GEDDON: u32 = 12_056;
/// Item template entry of the Talisman of Binding Shard.
pub const ITEM_TALISMAN: u32 = 17_782;
/// Display name used in announcements.
pub const REWARD_DISPLAY_NAME: &str = "Talisman of Binding Shard";

// Configuration keys --------------------------------------------------------
pub const CONF_ENABLE: &str = "GeddonShard.Enable";
pub const CONF_NPC_ENTRY: &str = "GeddonShard.NpcEntry";
pub const CONF_CHANCE: &str = "GeddonShard.Chance";
pub const CONF_ALLOW_REPEAT: &str = "GeddonShard.AllowRepeat";
pub const CONF_RESET: &str = "GeddonShard.ResetOnStartup";

// Configuration defaults ----------------------------------------------------
pub(crate) const DEFAULT_ENABLE: bool = true;
pub(crate) const DEFAULT_CHANCE_PCT: f64 = 1.0;
pub(crate) const DEFAULT_ALLOW_REPEAT: bool = false;
pub(crate) const DEFAULT_RESET_ON_STARTUP: bool = false;
pub(crate) const CHANCE_MIN_PCT: f64 = 0.0;
pub(crate) const CHANCE_MAX_PCT: f64 = 100.0;

// Persistence ---------------------------------------------------------------
pub const TABLE_NAME: &str = "mod_geddon_once_drop";
pub const KEY_NAME: &str = "geddon_17782_once";
/// Longest actor name written to the store, in characters.
pub const MAX_ACTOR_NAME_LEN: usize = 63;
pub(crate) const ACTOR_NAME_REPLACEMENT: char = '_';

// Probability ---------------------------------------------------------------
/// Draw range upper bound: 10000 buckets of one hundredth of a percent.
pub const ROLL_SCALE: u32 = 10_000;
pub(crate) const BASIS_POINTS_PER_PERCENT: f64 = 100.0;

// Logging -------------------------------------------------------------------
pub(crate) const LOG_TARGET: &str = "module";
pub(crate) const LOG_TAG: &str = "[GeddonShard]";

// Announcements -------------------------------------------------------------
pub(crate) const FALLBACK_ACTOR_NAME: &str = "Someone";
pub(crate) const FALLBACK_SOURCE_NAME: &str = "their foe";
