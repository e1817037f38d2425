//! Module metadata and lifecycle types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Descriptor containing identity and metadata about a module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Module name (unique key inside the host)
    pub name: String,
    /// Module version
    pub version: String,
    /// Module author
    pub author: String,
    /// Human-readable description
    pub description: String,
    /// Project homepage
    #[serde(default)]
    pub website: String,
    /// Names of modules that must be initialized before this one
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Dispatch priority (higher receives events first)
    #[serde(default)]
    pub priority: ModulePriority,
    /// Whether bulk initialization picks this module up
    #[serde(default = "default_auto_load")]
    pub auto_load: bool,
}

fn default_auto_load() -> bool {
    true
}

impl Default for ModuleDescriptor {
    fn default() -> Self {
        Self {
            name: String::new(),
            version: "0.0.1".to_string(),
            author: String::new(),
            description: String::new(),
            website: String::new(),
            dependencies: Vec::new(),
            priority: ModulePriority::default(),
            auto_load: true,
        }
    }
}

/// Event dispatch priority.
///
/// Variants are declared lowest first so the derived `Ord` matches dispatch order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ModulePriority {
    Lowest,
    Low,
    #[default]
    Normal,
    High,
    Highest,
    Critical,
}

impl fmt::Display for ModulePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Lowest => "lowest",
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Highest => "highest",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Lifecycle state of a module
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    Initializing,
    Initialized,
    Running,
    Stopping,
    /// Absorbing failure state; the module can only be unloaded
    Error,
}

impl ModuleState {
    /// True once `initialize` has succeeded and the module has not been stopped since.
    pub fn is_initialized(self) -> bool {
        matches!(self, Self::Initialized | Self::Running)
    }

    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Initializing => "initializing",
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Read access to the states of other modules, used for dependency checks.
pub trait DependencyLookup {
    /// State of the named module, or `None` if it is not loaded.
    fn state_of(&self, name: &str) -> Option<ModuleState>;
}

impl DependencyLookup for std::collections::HashMap<String, ModuleState> {
    fn state_of(&self, name: &str) -> Option<ModuleState> {
        self.get(name).copied()
    }
}

// ─── Event Payloads ──────────────────────────────────────────────────

/// A player character as seen by modules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub guid: u64,
    pub name: String,
    pub level: u8,
    pub account_id: u32,
}

/// A non-player creature
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Creature {
    pub guid: u64,
    /// Template entry id
    pub entry: u32,
    pub name: String,
}

/// Anything that can take part in combat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Unit {
    Player(Player),
    Creature(Creature),
}

impl Unit {
    pub fn guid(&self) -> u64 {
        match self {
            Self::Player(p) => p.guid,
            Self::Creature(c) => c.guid,
        }
    }
}

/// A world object such as a chest or door
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameObject {
    pub guid: u64,
    pub entry: u32,
}

/// A map instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapRef {
    pub map_id: u32,
    pub instance_id: u32,
}

/// A connected client session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub account_id: u32,
    pub address: String,
}

/// A network packet travelling to or from a client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    pub opcode: u32,
    pub payload: Vec<u8>,
}

/// A chat message; handlers may rewrite `text`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Chat channel type (say, yell, whisper, ...)
    pub kind: u32,
    pub language: u32,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_descriptor_defaults() {
        let descriptor = ModuleDescriptor::default();
        assert_eq!(descriptor.priority, ModulePriority::Normal);
        assert!(descriptor.auto_load);
        assert!(descriptor.dependencies.is_empty());
    }

    #[test]
    fn test_priority_ordering() {
        assert!(ModulePriority::Critical > ModulePriority::Highest);
        assert!(ModulePriority::High > ModulePriority::Normal);
        assert!(ModulePriority::Normal > ModulePriority::Low);
        assert!(ModulePriority::Low > ModulePriority::Lowest);
    }

    #[test]
    fn test_state_is_initialized() {
        assert!(ModuleState::Initialized.is_initialized());
        assert!(ModuleState::Running.is_initialized());
        assert!(!ModuleState::Loaded.is_initialized());
        assert!(!ModuleState::Initializing.is_initialized());
        assert!(!ModuleState::Error.is_initialized());
    }

    #[test]
    fn test_descriptor_toml_missing_fields_use_defaults() {
        let descriptor: ModuleDescriptor = toml::from_str(
            r#"
            name = "stats"
            version = "1.0.0"
            author = "realm"
            description = "Login statistics"
            "#,
        )
        .unwrap();

        assert_eq!(descriptor.priority, ModulePriority::Normal);
        assert!(descriptor.auto_load);
    }

    #[test]
    fn test_priority_serializes_snake_case() {
        let json = serde_json::to_string(&ModulePriority::Highest).unwrap();
        assert_eq!(json, "\"highest\"");
    }

    #[test]
    fn test_dependency_lookup_for_map() {
        let mut states = HashMap::new();
        states.insert("core".to_string(), ModuleState::Running);

        assert_eq!(states.state_of("core"), Some(ModuleState::Running));
        assert_eq!(states.state_of("missing"), None);
    }

    #[test]
    fn test_unit_guid() {
        let unit = Unit::Creature(Creature {
            guid: 42,
            entry: 7,
            name: "Wolf".to_string(),
        });
        assert_eq!(unit.guid(), 42);
    }
}
