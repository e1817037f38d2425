//! Per-module lifecycle state machine

use std::fmt;

use realm_module_api::ModuleState;

use super::error::PluginHostError;

/// A lifecycle move the host can make on a module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Load,
    Initialize,
    Start,
    Stop,
    Unload,
    Fail,
}

impl Transition {
    /// Verb used in error messages and logs
    pub fn operation(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Initialize => "initialize",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Unload => "unload",
            Self::Fail => "fail",
        }
    }

    /// Whether the move is legal from `state`
    pub fn permitted_from(self, state: ModuleState) -> bool {
        use ModuleState::*;
        match self {
            Self::Load => state == Unloaded,
            Self::Initialize => state == Loaded,
            Self::Start => state == Initialized,
            Self::Stop => state == Running,
            Self::Unload => matches!(state, Loaded | Initialized | Error),
            Self::Fail => true,
        }
    }

    /// State recorded while the hook runs
    pub fn interim(self) -> Option<ModuleState> {
        match self {
            Self::Load => Some(ModuleState::Loading),
            Self::Initialize => Some(ModuleState::Initializing),
            Self::Stop => Some(ModuleState::Stopping),
            Self::Start | Self::Unload | Self::Fail => None,
        }
    }

    /// State reached when the hook succeeds
    pub fn target(self) -> ModuleState {
        match self {
            Self::Load => ModuleState::Loaded,
            Self::Initialize => ModuleState::Initialized,
            Self::Start => ModuleState::Running,
            Self::Stop => ModuleState::Loaded,
            Self::Unload => ModuleState::Unloaded,
            Self::Fail => ModuleState::Error,
        }
    }

    /// Apply the move to `state`, returning the resulting state
    pub fn apply(self, state: ModuleState) -> Result<ModuleState, (ModuleState, Transition)> {
        if self.permitted_from(state) {
            Ok(self.target())
        } else {
            Err((state, self))
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operation())
    }
}

/// Host-tracked lifecycle of one module.
///
/// A transition is split in two: [`Lifecycle::begin`] validates it and records
/// the interim state, then [`Lifecycle::complete`] or [`Lifecycle::fail`]
/// settles it once the hook has returned.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    name: String,
    state: ModuleState,
    pending: Option<Transition>,
}

impl Lifecycle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ModuleState::Unloaded,
            pending: None,
        }
    }

    pub fn state(&self) -> ModuleState {
        self.state
    }

    /// Fail with `InvalidState` unless `transition` is legal now
    pub fn ensure(&self, transition: Transition) -> Result<(), PluginHostError> {
        if self.pending.is_none() && transition.permitted_from(self.state) {
            Ok(())
        } else {
            Err(PluginHostError::InvalidState {
                name: self.name.clone(),
                state: self.state,
                operation: transition.operation(),
            })
        }
    }

    /// Validate `transition` and enter its interim state
    pub fn begin(&mut self, transition: Transition) -> Result<(), PluginHostError> {
        self.ensure(transition)?;
        self.pending = Some(transition);
        if let Some(interim) = transition.interim() {
            self.state = interim;
        }
        Ok(())
    }

    /// Settle the pending transition in its target state
    pub fn complete(&mut self) -> ModuleState {
        if let Some(transition) = self.pending.take() {
            self.state = transition.target();
        }
        self.state
    }

    /// Settle the pending transition (if any) in `Error`
    pub fn fail(&mut self) -> ModuleState {
        self.pending = None;
        self.state = ModuleState::Error;
        self.state
    }
}
