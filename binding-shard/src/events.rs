//! Host-facing event adapter.
//!
//! The host engine registers one [`ShardEvents`] implementation and calls it
//! from its own dispatch: once per configuration load, once per creature kill,
//! and once per looted item. [`ShardDropScript`] turns those callbacks into
//! award machine transitions plus the loot and chat side effects.
use rand::RngCore;
use std::sync::Arc;

use crate::award::{
    AwardMachine, AwardSnapshot, AwardState, CollectionOutcome, GrantDecision, unix_now,
};
use crate::config::ShardConfig;
use crate::constants::{
    FALLBACK_ACTOR_NAME, FALLBACK_SOURCE_NAME, LOG_TAG, LOG_TARGET, REWARD_DISPLAY_NAME,
};
use crate::store::RewardStore;

/// Loot being assembled for one kill.
pub trait LootContainer {
    fn contains(&self, item_id: u32) -> bool;
    fn add_item(&mut self, item_id: u32);
}

/// Server-wide system chat.
pub trait Broadcast {
    fn system_message(&self, text: &str);
}

/// Object that produced the loot window an item was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LootSource {
    Creature(u64),
    GameObject(u64),
    Unknown,
}

/// Name lookups into the host's world and template data.
pub trait WorldLookup {
    /// Display name of the creature or object behind a loot window.
    fn loot_source_name(&self, _source: LootSource) -> Option<String> {
        None
    }

    /// Template name for a creature entry.
    fn creature_name(&self, _entry: u32) -> Option<String> {
        None
    }
}

/// Lookup that knows no names; announcements fall back to generic wording.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookup;

impl WorldLookup for NoLookup {}

/// A creature that just died.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefeatedCreature {
    pub entry: u32,
    pub name: String,
}

/// Callbacks the host invokes for this rule.
pub trait ShardEvents: Send + Sync {
    /// Called after every configuration load or reload.
    fn on_config_loaded(&self, config: ShardConfig) -> AwardSnapshot;

    /// Called once per creature kill credited to a player.
    fn on_defeat(
        &self,
        killer: Option<&str>,
        defeated: &DefeatedCreature,
        loot: &mut dyn LootContainer,
    ) -> GrantDecision;

    /// Called once per item a player takes from a loot window.
    fn on_collected(
        &self,
        collector: Option<&str>,
        item_id: u32,
        source: LootSource,
    ) -> CollectionOutcome;
}

/// Default [`ShardEvents`] wiring over a shared award machine.
#[derive(Debug)]
pub struct ShardDropScript<S, R, B, W = NoLookup> {
    machine: Arc<AwardMachine<S, R>>,
    broadcast: B,
    world: W,
}

impl<S, R, B> ShardDropScript<S, R, B, NoLookup>
where
    S: RewardStore,
    R: RngCore + Send,
    B: Broadcast + Send + Sync,
{
    #[must_use]
    pub fn new(machine: Arc<AwardMachine<S, R>>, broadcast: B) -> Self {
        Self::with_lookup(machine, broadcast, NoLookup)
    }
}

impl<S, R, B, W> ShardDropScript<S, R, B, W>
where
    S: RewardStore,
    R: RngCore + Send,
    B: Broadcast + Send + Sync,
    W: WorldLookup + Send + Sync,
{
    #[must_use]
    pub const fn with_lookup(machine: Arc<AwardMachine<S, R>>, broadcast: B, world: W) -> Self {
        Self {
            machine,
            broadcast,
            world,
        }
    }

    #[must_use]
    pub fn machine(&self) -> &Arc<AwardMachine<S, R>> {
        &self.machine
    }

    #[must_use]
    pub const fn broadcast(&self) -> &B {
        &self.broadcast
    }

    fn source_name(&self, source: LootSource) -> String {
        self.world
            .loot_source_name(source)
            .or_else(|| {
                self.machine
                    .config()
                    .and_then(|cfg| self.world.creature_name(cfg.npc_entry))
            })
            .unwrap_or_else(|| FALLBACK_SOURCE_NAME.to_string())
    }

    fn announce_collection(&self, collector: &str, source: LootSource) {
        let who = if collector.is_empty() {
            FALLBACK_ACTOR_NAME
        } else {
            collector
        };
        let from = self.source_name(source);
        self.broadcast.system_message(&format!(
            "{who} has looted the legendary {REWARD_DISPLAY_NAME} from {from}!"
        ));
    }
}

impl<S, R, B, W> ShardEvents for ShardDropScript<S, R, B, W>
where
    S: RewardStore,
    R: RngCore + Send,
    B: Broadcast + Send + Sync,
    W: WorldLookup + Send + Sync,
{
    fn on_config_loaded(&self, config: ShardConfig) -> AwardSnapshot {
        let snapshot = self.machine.initialize(config);
        let cfg = &snapshot.config;
        let npc_name = self
            .world
            .creature_name(cfg.npc_entry)
            .unwrap_or_else(|| String::from("Unknown"));
        log::info!(
            target: LOG_TARGET,
            "{LOG_TAG} Enable={} NpcEntry={}({}) Chance={:.3}% AllowRepeat={} ResetOnStartup={} AlreadyDropped={}",
            u32::from(cfg.enable),
            cfg.npc_entry,
            npc_name,
            cfg.chance_pct,
            u32::from(cfg.allow_repeat),
            u32::from(cfg.reset_on_startup),
            snapshot.state == AwardState::Granted,
        );
        snapshot
    }

    fn on_defeat(
        &self,
        killer: Option<&str>,
        defeated: &DefeatedCreature,
        loot: &mut dyn LootContainer,
    ) -> GrantDecision {
        if killer.is_none() {
            return GrantDecision::Skip;
        }
        let attempt = self.machine.attempt_grant(defeated.entry, killer, &*loot);
        if attempt.decision == GrantDecision::Granted {
            let item = self.machine.reward_item();
            loot.add_item(item);
            let repeat_note = if attempt.allow_repeat {
                " (AllowRepeat=1)"
            } else {
                ""
            };
            log::info!(
                target: LOG_TARGET,
                "{LOG_TAG} Added item {item} to {}'s corpse loot{repeat_note}.",
                defeated.name
            );
        }
        attempt.decision
    }

    fn on_collected(
        &self,
        collector: Option<&str>,
        item_id: u32,
        source: LootSource,
    ) -> CollectionOutcome {
        if !self.machine.is_enabled() || item_id != self.machine.reward_item() {
            return CollectionOutcome::Skipped;
        }
        let Some(collector) = collector else {
            return CollectionOutcome::Skipped;
        };
        self.announce_collection(collector, source);
        self.machine.confirm_on_collection(Some(collector), unix_now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ITEM_TALISMAN, KEY_NAME, NPC_BARON_GEDDON};
    use crate::store::MemoryRewardStore;
    use rand::rngs::mock::StepRng;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Corpse {
        items: Vec<u32>,
    }

    impl LootContainer for Corpse {
        fn contains(&self, item_id: u32) -> bool {
            self.items.contains(&item_id)
        }

        fn add_item(&mut self, item_id: u32) {
            self.items.push(item_id);
        }
    }

    #[derive(Default)]
    struct Chat {
        lines: Mutex<Vec<String>>,
    }

    impl Broadcast for Chat {
        fn system_message(&self, text: &str) {
            self.lines.lock().unwrap().push(text.to_string());
        }
    }

    struct Names;

    impl WorldLookup for Names {
        fn loot_source_name(&self, source: LootSource) -> Option<String> {
            match source {
                LootSource::Creature(7) => Some(String::from("Baron Geddon")),
                LootSource::GameObject(_) => Some(String::from("Cache of the Firelord")),
                _ => None,
            }
        }

        fn creature_name(&self, entry: u32) -> Option<String> {
            (entry == NPC_BARON_GEDDON).then(|| String::from("Baron Geddon (template)"))
        }
    }

    fn geddon() -> DefeatedCreature {
        DefeatedCreature {
            entry: NPC_BARON_GEDDON,
            name: String::from("Baron Geddon"),
        }
    }

    fn script<W: WorldLookup + Send + Sync>(
        store: MemoryRewardStore,
        world: W,
    ) -> ShardDropScript<MemoryRewardStore, StepRng, Chat, W> {
        let machine = Arc::new(AwardMachine::new(store, StepRng::new(0, 0)));
        ShardDropScript::with_lookup(machine, Chat::default(), world)
    }

    fn certain() -> ShardConfig {
        ShardConfig {
            chance_pct: 100.0,
            ..ShardConfig::default()
        }
    }

    #[test]
    fn granted_kill_places_one_item() {
        let script = script(MemoryRewardStore::new(), NoLookup);
        script.on_config_loaded(certain());

        let mut corpse = Corpse::default();
        assert_eq!(
            script.on_defeat(Some("Tank"), &geddon(), &mut corpse),
            GrantDecision::Granted
        );
        assert_eq!(corpse.items, vec![ITEM_TALISMAN]);

        // Duplicate hook invocation for the same corpse.
        assert_eq!(
            script.on_defeat(Some("Tank"), &geddon(), &mut corpse),
            GrantDecision::Skip
        );
        assert_eq!(corpse.items.len(), 1);
        assert!(script.broadcast().lines.lock().unwrap().is_empty());
    }

    #[test]
    fn kill_without_killer_is_skipped() {
        let script = script(MemoryRewardStore::new(), NoLookup);
        script.on_config_loaded(certain());
        let mut corpse = Corpse::default();
        assert_eq!(
            script.on_defeat(None, &geddon(), &mut corpse),
            GrantDecision::Skip
        );
        assert!(corpse.items.is_empty());
    }

    #[test]
    fn collection_announces_with_resolved_names() {
        let store = MemoryRewardStore::new();
        let script = script(store.clone(), Names);
        script.on_config_loaded(certain());

        assert_eq!(
            script.on_collected(Some("Looter"), ITEM_TALISMAN, LootSource::Creature(7)),
            CollectionOutcome::Recorded
        );
        assert_eq!(
            script.on_collected(Some("Looter"), ITEM_TALISMAN, LootSource::Creature(8)),
            CollectionOutcome::Recorded
        );
        assert_eq!(
            script.on_collected(Some(""), ITEM_TALISMAN, LootSource::GameObject(1)),
            CollectionOutcome::Skipped
        );
        let lines = script.broadcast().lines.lock().unwrap().clone();
        assert_eq!(
            lines,
            vec![
                String::from(
                    "Looter has looted the legendary Talisman of Binding Shard from Baron Geddon!"
                ),
                String::from(
                    "Looter has looted the legendary Talisman of Binding Shard from Baron Geddon (template)!"
                ),
                String::from(
                    "Someone has looted the legendary Talisman of Binding Shard from Cache of the Firelord!"
                ),
            ]
        );
        assert!(store.load(KEY_NAME).unwrap().last_actor.is_some());
    }

    #[test]
    fn collection_falls_back_to_generic_source() {
        let script = script(MemoryRewardStore::new(), NoLookup);
        script.on_config_loaded(certain());
        script.on_collected(Some("Looter"), ITEM_TALISMAN, LootSource::Unknown);
        let lines = script.broadcast().lines.lock().unwrap().clone();
        assert_eq!(
            lines,
            vec![String::from(
                "Looter has looted the legendary Talisman of Binding Shard from their foe!"
            )]
        );
    }

    #[test]
    fn unrelated_or_disabled_collections_are_ignored() {
        let script = script(MemoryRewardStore::new(), NoLookup);
        script.on_config_loaded(certain());
        assert_eq!(
            script.on_collected(Some("Looter"), 19_019, LootSource::Unknown),
            CollectionOutcome::Skipped
        );
        assert_eq!(
            script.on_collected(None, ITEM_TALISMAN, LootSource::Unknown),
            CollectionOutcome::Skipped
        );

        script.on_config_loaded(ShardConfig {
            enable: false,
            ..certain()
        });
        assert_eq!(
            script.on_collected(Some("Looter"), ITEM_TALISMAN, LootSource::Unknown),
            CollectionOutcome::Skipped
        );
        assert!(script.broadcast().lines.lock().unwrap().is_empty());
    }

    #[test]
    fn script_is_usable_as_trait_object() {
        let script: Box<dyn ShardEvents> = Box::new(script(MemoryRewardStore::new(), NoLookup));
        let snapshot = script.on_config_loaded(certain());
        assert_eq!(snapshot.config.npc_entry, NPC_BARON_GEDDON);
        let mut corpse = Corpse::default();
        assert_eq!(
            script.on_defeat(Some("Tank"), &geddon(), &mut corpse),
            GrantDecision::Granted
        );
    }
}
