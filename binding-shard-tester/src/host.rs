//! Minimal stand-ins for the host engine: corpses, chat, and name lookups.
use std::sync::Mutex;

use binding_shard::{Broadcast, LootContainer, LootSource, NPC_BARON_GEDDON, WorldLookup};

/// Loot list of one simulated corpse.
#[derive(Debug, Default, Clone)]
pub struct Corpse {
    pub items: Vec<u32>,
}

impl LootContainer for Corpse {
    fn contains(&self, item_id: u32) -> bool {
        self.items.contains(&item_id)
    }

    fn add_item(&mut self, item_id: u32) {
        self.items.push(item_id);
    }
}

/// Captures every system message so scenarios can assert on announcements.
#[derive(Debug, Default)]
pub struct ChatLog {
    lines: Mutex<Vec<String>>,
}

impl ChatLog {
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

impl Broadcast for ChatLog {
    fn system_message(&self, text: &str) {
        log::debug!("chat: {text}");
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(text.to_string());
        }
    }
}

/// Name table for the single raid boss the simulation spawns.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoltenCore;

impl WorldLookup for MoltenCore {
    fn loot_source_name(&self, source: LootSource) -> Option<String> {
        match source {
            LootSource::Creature(_) => Some(String::from("Baron Geddon")),
            LootSource::GameObject(_) | LootSource::Unknown => None,
        }
    }

    fn creature_name(&self, entry: u32) -> Option<String> {
        (entry == NPC_BARON_GEDDON).then(|| String::from("Baron Geddon"))
    }
}
