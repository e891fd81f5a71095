//! Once-only award state machine.
//!
//! The machine owns the cached "already granted" flag and keeps it in step
//! with the durable [`RewardStore`]. Every transition runs under one
//! process-wide mutex that also owns the random source, so the flag check, the
//! chance roll, the flag flip, and the durable write happen as a single
//! serialized step. Two sessions killing the target at the same moment can
//! never both observe "not yet granted" and both win.
//!
//! Storage failures never escape: initialization fails open to an ungranted
//! cache, and a failed grant write still reports [`GrantDecision::Granted`]
//! because the item has already been produced.
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::ShardConfig;
use crate::constants::{ITEM_TALISMAN, KEY_NAME, LOG_TAG, LOG_TARGET};
use crate::events::LootContainer;
use crate::record::ActorName;
use crate::roll::roll_succeeds;
use crate::store::RewardStore;

/// Lifecycle of the cached grant flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AwardState {
    /// No configuration has been loaded yet; every event is rejected.
    Unknown,
    Ungranted,
    Granted,
}

/// Result of a defeat event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantDecision {
    /// The event does not concern this rule.
    Skip,
    /// The rule applies but no reward is produced this time.
    Denied,
    /// The caller must place the reward in the loot container.
    Granted,
}

/// Result of a collection event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollectionOutcome {
    Recorded,
    Skipped,
    /// The metadata write failed; logged and dropped.
    Failed,
}

/// State and configuration visible after a load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwardSnapshot {
    pub state: AwardState,
    pub config: ShardConfig,
}

/// Decision plus the `allow_repeat` value it was taken under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GrantAttempt {
    pub(crate) decision: GrantDecision,
    pub(crate) allow_repeat: bool,
}

impl GrantAttempt {
    const fn new(decision: GrantDecision, allow_repeat: bool) -> Self {
        Self {
            decision,
            allow_repeat,
        }
    }
}

#[derive(Debug)]
struct AwardInner<R> {
    state: AwardState,
    config: Option<ShardConfig>,
    rng: R,
}

/// Grant coordinator shared by every worker that reports kills.
#[derive(Debug)]
pub struct AwardMachine<S, R = ChaCha20Rng> {
    store: S,
    key: String,
    reward_item: u32,
    inner: Mutex<AwardInner<R>>,
}

impl<S: RewardStore> AwardMachine<S, ChaCha20Rng> {
    /// Machine with an OS-seeded ChaCha stream.
    #[must_use]
    pub fn from_entropy(store: S) -> Self {
        Self::new(store, ChaCha20Rng::from_entropy())
    }

    /// Machine with a reproducible ChaCha stream.
    #[must_use]
    pub fn seeded(store: S, seed: u64) -> Self {
        Self::new(store, ChaCha20Rng::seed_from_u64(seed))
    }
}

impl<S, R> AwardMachine<S, R>
where
    S: RewardStore,
    R: RngCore,
{
    #[must_use]
    pub fn new(store: S, rng: R) -> Self {
        Self {
            store,
            key: KEY_NAME.to_string(),
            reward_item: ITEM_TALISMAN,
            inner: Mutex::new(AwardInner {
                state: AwardState::Unknown,
                config: None,
                rng,
            }),
        }
    }

    /// Use a different once-only slot key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Item template entry this machine grants.
    #[must_use]
    pub const fn reward_item(&self) -> u32 {
        self.reward_item
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn state(&self) -> AwardState {
        self.lock().state
    }

    /// Active configuration, or `None` before the first load.
    #[must_use]
    pub fn config(&self) -> Option<ShardConfig> {
        self.lock().config.clone()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.lock().config.as_ref().is_some_and(|cfg| cfg.enable)
    }

    fn lock(&self) -> MutexGuard<'_, AwardInner<R>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load a configuration and synchronize the cached flag with the store.
    ///
    /// Runs once per configuration load. Creates the slot if missing, clears
    /// it when `reset_on_startup` is set, then reads it back. Any storage
    /// failure is logged and the cache falls back to ungranted.
    pub fn initialize(&self, config: ShardConfig) -> AwardSnapshot {
        let config = config.normalized();
        let mut inner = self.lock();

        if let Err(err) = self.store.ensure_schema(&self.key) {
            log::warn!(
                target: LOG_TARGET,
                "{LOG_TAG} Could not prepare reward storage for {}: {err}",
                self.key
            );
        }

        if config.reset_on_startup {
            match self.store.reset_to_ungranted(&self.key) {
                Ok(()) => log::info!(
                    target: LOG_TARGET,
                    "{LOG_TAG} ResetOnStartup=1 -> cleared once-per-server memory."
                ),
                Err(err) => log::warn!(
                    target: LOG_TARGET,
                    "{LOG_TAG} ResetOnStartup=1 but the reset write failed: {err}"
                ),
            }
        }

        let state = match self.store.load(&self.key) {
            Ok(record) if record.granted => AwardState::Granted,
            Ok(_) => AwardState::Ungranted,
            Err(err) => {
                log::warn!(
                    target: LOG_TARGET,
                    "{LOG_TAG} Could not load reward state for {}: {err}; assuming not granted.",
                    self.key
                );
                AwardState::Ungranted
            }
        };

        inner.state = state;
        inner.config = Some(config.clone());
        AwardSnapshot { state, config }
    }

    /// Decide whether this kill produces the reward.
    ///
    /// Returns [`GrantDecision::Skip`] when the rule is off, the creature is
    /// not the target, or `loot` already holds the reward. Returns
    /// [`GrantDecision::Denied`] before initialization, when a non-repeatable
    /// reward was already granted, or when the roll misses. On
    /// [`GrantDecision::Granted`] the flag is set and persisted; placing the
    /// item is left to the caller.
    pub fn try_grant_on_defeat<L>(
        &self,
        target_entry: u32,
        killer: Option<&str>,
        loot: &L,
    ) -> GrantDecision
    where
        L: LootContainer + ?Sized,
    {
        self.attempt_grant(target_entry, killer, loot).decision
    }

    /// Same as [`Self::try_grant_on_defeat`], also reporting the repeat
    /// setting the decision was made under.
    pub(crate) fn attempt_grant<L>(
        &self,
        target_entry: u32,
        killer: Option<&str>,
        loot: &L,
    ) -> GrantAttempt
    where
        L: LootContainer + ?Sized,
    {
        let mut inner = self.lock();
        let AwardInner { state, config, rng } = &mut *inner;

        let Some(config) = config.as_ref() else {
            log::debug!(
                target: LOG_TARGET,
                "{LOG_TAG} Kill of {target_entry} arrived before configuration load; ignoring."
            );
            return GrantAttempt::new(GrantDecision::Denied, false);
        };
        let attempt = |decision| GrantAttempt::new(decision, config.allow_repeat);
        if !config.enable
            || target_entry != config.npc_entry
            || loot.contains(self.reward_item)
        {
            return attempt(GrantDecision::Skip);
        }
        if !config.allow_repeat && *state == AwardState::Granted {
            return attempt(GrantDecision::Denied);
        }
        if !roll_succeeds(config.chance_pct, rng) {
            return attempt(GrantDecision::Denied);
        }

        *state = AwardState::Granted;
        let actor = killer.and_then(ActorName::sanitize);
        if let Err(err) = self
            .store
            .record_grant(&self.key, actor.as_ref(), unix_now())
        {
            log::warn!(
                target: LOG_TARGET,
                "{LOG_TAG} Reward granted but persisting {} failed: {err}",
                self.key
            );
        }
        attempt(GrantDecision::Granted)
    }

    /// Record who collected the reward. Never fails the caller.
    pub fn confirm_on_collection(
        &self,
        collector: Option<&str>,
        at_epoch_seconds: u64,
    ) -> CollectionOutcome {
        let inner = self.lock();
        if !inner.config.as_ref().is_some_and(|cfg| cfg.enable) {
            return CollectionOutcome::Skipped;
        }
        let Some(actor) = collector.and_then(ActorName::sanitize) else {
            return CollectionOutcome::Skipped;
        };
        match self
            .store
            .record_collection_metadata(&self.key, &actor, at_epoch_seconds)
        {
            Ok(()) => CollectionOutcome::Recorded,
            Err(err) => {
                log::warn!(
                    target: LOG_TARGET,
                    "{LOG_TAG} Could not record collection by {actor}: {err}"
                );
                CollectionOutcome::Failed
            }
        }
    }
}

/// Current wall clock in epoch seconds, never 0.
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(1, |elapsed| elapsed.as_secs().max(1))
}
