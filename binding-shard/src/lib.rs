//! Binding Shard Drop Rule
//!
//! A once-per-server rare drop for a multiplayer game server: the configured
//! reward is added to the loot of the configured encounter with a configurable
//! chance, at most once for the lifetime of the persisted world unless repeats
//! are allowed. The grant survives restarts, is never duplicated under
//! concurrent kills, and is announced when a player loots it.
//!
//! The crate has no knowledge of a particular engine. Hosts plug in their
//! loot containers, chat, name lookups, and storage through the traits in
//! [`events`] and [`store`].

pub mod award;
pub mod config;
pub mod constants;
pub mod events;
pub mod numbers;
pub mod record;
pub mod roll;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod store;

// Re-export commonly used types
pub use award::{AwardMachine, AwardSnapshot, AwardState, CollectionOutcome, GrantDecision};
pub use config::{ConfigSource, ShardConfig};
pub use constants::{ITEM_TALISMAN, KEY_NAME, NPC_BARON_GEDDON, TABLE_NAME};
pub use events::{
    Broadcast, DefeatedCreature, LootContainer, LootSource, NoLookup, ShardDropScript,
    ShardEvents, WorldLookup,
};
pub use record::{ActorName, RewardRecord};
pub use roll::{chance_threshold, roll_succeeds};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRewardStore;
pub use store::{MemoryRewardStore, RewardStore, StoreError};
