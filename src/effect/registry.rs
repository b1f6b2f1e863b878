use std::collections::BTreeMap;

use crate::effect::{Effect, InjectionPoints};

/// Builds a fresh effect object.
pub type EffectFactory = Box<dyn Fn() -> Box<dyn Effect> + Send + Sync>;

/// How an effect identifier is instantiated and where it may be injected.
pub struct EffectRegistration {
    identifier: String,
    injection_points: InjectionPoints,
    share_instance: bool,
    factory: EffectFactory,
}

impl EffectRegistration {
    pub fn new<F>(identifier: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Effect> + Send + Sync + 'static,
    {
        Self {
            identifier: identifier.into(),
            injection_points: InjectionPoints::all(),
            share_instance: false,
            factory: Box::new(factory),
        }
    }

    /// Restrict the points the effect can be configured into.
    pub fn at(mut self, injection_points: InjectionPoints) -> Self {
        self.injection_points = injection_points;
        self
    }

    /// Reuse one instance across every point the effect is configured into.
    pub fn shared(mut self) -> Self {
        self.share_instance = true;
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn injection_points(&self) -> InjectionPoints {
        self.injection_points
    }

    pub fn share_instance(&self) -> bool {
        self.share_instance
    }

    pub fn instantiate(&self) -> Box<dyn Effect> {
        (self.factory)()
    }
}

impl std::fmt::Debug for EffectRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectRegistration")
            .field("identifier", &self.identifier)
            .field("injection_points", &self.injection_points)
            .field("share_instance", &self.share_instance)
            .finish()
    }
}

/// Table of known effect identifiers.
#[derive(Debug, Default)]
pub struct EffectRegistry {
    entries: BTreeMap<String, EffectRegistration>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in effects.
    pub fn with_builtin_effects() -> Self {
        let mut registry = Self::new();
        crate::effects::register_builtin_effects(&mut registry);
        registry
    }

    /// Add a registration, replacing any previous one with the same identifier.
    pub fn register(&mut self, registration: EffectRegistration) -> Option<EffectRegistration> {
        let previous = self
            .entries
            .insert(registration.identifier.clone(), registration);
        if let Some(previous) = &previous {
            log::warn!("Effect '{}' registered twice; keeping the latest", previous.identifier);
        }
        previous
    }

    pub fn get(&self, identifier: &str) -> Option<&EffectRegistration> {
        self.entries.get(identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
