//! Engine event notifications delivered to running modules

use crate::types::{ChatMessage, Creature, GameObject, MapRef, Packet, Player, Session, Unit};

/// Optional event-handler capability of a module.
///
/// Every method has a no-op default so a handler only overrides the events it
/// cares about. Handlers may be invoked from several engine threads at once and
/// may receive an event shortly after their module was stopped, so state must
/// live behind interior mutability.
///
/// Packet events are requests: returning `false` rejects the packet and stops
/// delivery to lower-priority handlers.
pub trait EventHandler: Send + Sync {
    // ─── Player Events ───────────────────────────────────────────────

    fn on_player_login(&self, _player: &Player) {}

    fn on_player_logout(&self, _player: &Player) {}

    fn on_player_level_changed(&self, _player: &Player, _old_level: u8) {}

    /// Called for every chat line; handlers may rewrite the message text.
    fn on_player_chat(&self, _player: &Player, _message: &mut ChatMessage) {}

    fn on_player_kill(&self, _killer: &Player, _victim: &Player) {}

    fn on_player_kill_creature(&self, _killer: &Player, _victim: &Creature) {}

    // ─── Creature Events ─────────────────────────────────────────────

    fn on_creature_kill(&self, _killer: &Creature, _victim: &Unit) {}

    fn on_creature_death(&self, _creature: &Creature, _killer: Option<&Unit>) {}

    fn on_creature_respawn(&self, _creature: &Creature) {}

    // ─── GameObject Events ───────────────────────────────────────────

    fn on_game_object_use(&self, _object: &GameObject, _player: &Player) {}

    fn on_game_object_destroyed(&self, _object: &GameObject, _player: Option<&Player>) {}

    // ─── World Events ────────────────────────────────────────────────

    /// Called once per world tick with the elapsed milliseconds
    fn on_world_update(&self, _diff_ms: u32) {}

    fn on_map_update(&self, _map: &MapRef, _diff_ms: u32) {}

    // ─── Packet Events ───────────────────────────────────────────────

    fn on_packet_receive(&self, _session: &Session, _packet: &mut Packet) -> bool {
        true
    }

    fn on_packet_send(&self, _session: &Session, _packet: &Packet) -> bool {
        true
    }

    // ─── Server Events ───────────────────────────────────────────────

    fn on_server_start(&self) {}

    fn on_server_stop(&self) {}

    fn on_config_reload(&self) {}
}
