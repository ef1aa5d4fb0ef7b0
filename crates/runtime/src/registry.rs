//! Factories for actions and objective behaviors.
//!
//! Definitions name actions and behaviors by key. The registry turns those keys into
//! fresh instances each time a phase or an objective is instantiated, so no runtime
//! state is ever shared between two mission runs.

use std::collections::HashMap;
use std::fmt;

use questline_core::{ActionType, BehaviorType};
use tracing::warn;

use crate::action::{FinishImmediately, MissionAction};
use crate::objective::{AutoCompleteBehavior, ManualBehavior, ObjectiveBehavior};

/// Keys of the built-in factories.
pub mod builtin {
    /// Action that finishes as soon as it runs.
    pub const FINISH: &str = "finish";
    /// Behavior that waits for an explicit completion.
    pub const MANUAL: &str = "manual";
    /// Behavior that completes as soon as it runs.
    pub const AUTO_COMPLETE: &str = "auto_complete";
}

type ActionFactory = Box<dyn Fn() -> Box<dyn MissionAction>>;
type BehaviorFactory = Box<dyn Fn() -> Box<dyn ObjectiveBehavior>>;

/// Action and behavior factories keyed by definition keys.
pub struct Registry {
    actions: HashMap<ActionType, ActionFactory>,
    behaviors: HashMap<BehaviorType, BehaviorFactory>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
            behaviors: HashMap::new(),
        }
    }

    /// A registry holding the built-in factories.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_action(builtin::FINISH, || FinishImmediately);
        registry.register_behavior(builtin::MANUAL, || ManualBehavior);
        registry.register_behavior(builtin::AUTO_COMPLETE, || AutoCompleteBehavior);
        registry
    }

    /// Register (or replace) an action factory.
    pub fn register_action<A, F>(&mut self, key: impl Into<ActionType>, factory: F)
    where
        A: MissionAction + 'static,
        F: Fn() -> A + 'static,
    {
        self.actions
            .insert(key.into(), Box::new(move || Box::new(factory())));
    }

    /// Register (or replace) a behavior factory.
    pub fn register_behavior<B, F>(&mut self, key: impl Into<BehaviorType>, factory: F)
    where
        B: ObjectiveBehavior + 'static,
        F: Fn() -> B + 'static,
    {
        self.behaviors
            .insert(key.into(), Box::new(move || Box::new(factory())));
    }

    /// Instantiate an action. Empty and unknown keys yield `None` with a warning.
    pub fn create_action(&self, key: &ActionType) -> Option<Box<dyn MissionAction>> {
        if !key.is_valid() {
            warn!("Skipping action with an empty key");
            return None;
        }

        match self.actions.get(key) {
            Some(factory) => Some(factory()),
            None => {
                warn!(action = %key, "Skipping unknown action");
                None
            }
        }
    }

    /// Instantiate a behavior. A missing key means [`builtin::MANUAL`].
    pub fn create_behavior(&self, key: Option<&BehaviorType>) -> Option<Box<dyn ObjectiveBehavior>> {
        let key = match key {
            Some(key) if key.is_valid() => key.as_str(),
            _ => builtin::MANUAL,
        };

        match self.behaviors.get(&BehaviorType::new(key)) {
            Some(factory) => Some(factory()),
            None => {
                warn!(behavior = %key, "Unknown objective behavior");
                None
            }
        }
    }

    /// Whether an action key is registered.
    pub fn has_action(&self, key: &ActionType) -> bool {
        self.actions.contains_key(key)
    }

    /// Whether a behavior key is registered.
    pub fn has_behavior(&self, key: &BehaviorType) -> bool {
        self.behaviors.contains_key(key)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut actions: Vec<&str> = self.actions.keys().map(ActionType::as_str).collect();
        let mut behaviors: Vec<&str> = self.behaviors.keys().map(BehaviorType::as_str).collect();
        actions.sort_unstable();
        behaviors.sort_unstable();

        f.debug_struct("Registry")
            .field("actions", &actions)
            .field("behaviors", &behaviors)
            .finish()
    }
}
