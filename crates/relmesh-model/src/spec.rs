//! Named enable/disable groups gating commands.
//!
//! Every command names one spec. The registry always carries two
//! reserved entries: `Default` is permanently enabled and `Disable` is
//! permanently disabled, so authors can hard-wire a command on or off
//! without editing it. User specs toggle freely; exactly the flipped
//! ones run in a given setup pass.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::names::dedupe_name;

/// Spec permanently enabled for every setup pass.
pub const SPEC_DEFAULT: &str = "Default";
/// Spec permanently disabled, parking commands without deleting them.
pub const SPEC_DISABLE: &str = "Disable";
/// Spec enabled only while no user spec is enabled. Selectable on
/// commands but never user-creatable.
pub const SPEC_DEFAULT_ONLY: &str = "DefaultOnly";

/// One named gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spec {
    pub name: String,
    pub enabled: bool,
}

/// Ordered registry of specs, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecRegistry {
    specs: BTreeMap<String, bool>,
}

impl SpecRegistry {
    /// Registry holding only the reserved specs.
    pub fn new() -> Self {
        let mut specs = BTreeMap::new();
        specs.insert(SPEC_DEFAULT.to_string(), true);
        specs.insert(SPEC_DISABLE.to_string(), false);
        specs.insert(SPEC_DEFAULT_ONLY.to_string(), false);
        SpecRegistry { specs }
    }

    pub fn is_reserved(name: &str) -> bool {
        name == SPEC_DEFAULT || name == SPEC_DISABLE || name == SPEC_DEFAULT_ONLY
    }

    /// Add a user spec, deduplicating against existing names.
    ///
    /// Returns the name actually registered (`Custom`, `Custom.001`, …).
    /// New specs start disabled.
    pub fn add(&mut self, name: &str) -> String {
        let registered = dedupe_name(name, |candidate| self.specs.contains_key(candidate));
        self.specs.insert(registered.clone(), false);
        registered
    }

    /// Remove a user spec. Reserved specs are never removed.
    pub fn remove(&mut self, name: &str) -> bool {
        if Self::is_reserved(name) {
            return false;
        }
        self.specs.remove(name).is_some()
    }

    /// Flip a user spec. Reserved specs keep their fixed state.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        if Self::is_reserved(name) {
            return false;
        }
        match self.specs.get_mut(name) {
            Some(state) => {
                *state = enabled;
                true
            }
            None => false,
        }
    }

    /// Whether commands gated by `name` run. Unknown specs never run.
    pub fn is_enabled(&self, name: &str) -> bool {
        match name {
            SPEC_DEFAULT => true,
            SPEC_DISABLE => false,
            SPEC_DEFAULT_ONLY => !self.any_user_spec_enabled(),
            other => self.specs.get(other).copied().unwrap_or(false),
        }
    }

    fn any_user_spec_enabled(&self) -> bool {
        self.specs
            .iter()
            .any(|(name, &enabled)| enabled && !Self::is_reserved(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    /// All specs in name order, reserved entries included.
    pub fn iter(&self) -> impl Iterator<Item = Spec> + '_ {
        self.specs.keys().map(|name| Spec {
            name: name.clone(),
            enabled: self.is_enabled(name),
        })
    }

    /// Names selectable as a command's spec value.
    pub fn names(&self) -> Vec<String> {
        self.specs.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_specs_are_fixed() {
        let mut registry = SpecRegistry::new();
        assert!(registry.is_enabled(SPEC_DEFAULT));
        assert!(!registry.is_enabled(SPEC_DISABLE));
        assert!(!registry.set_enabled(SPEC_DEFAULT, false));
        assert!(!registry.set_enabled(SPEC_DISABLE, true));
        assert!(!registry.remove(SPEC_DEFAULT));
        assert!(registry.is_enabled(SPEC_DEFAULT));
    }

    #[test]
    fn user_specs_toggle_and_default_off() {
        let mut registry = SpecRegistry::new();
        let name = registry.add("Winter");
        assert_eq!(name, "Winter");
        assert!(!registry.is_enabled("Winter"));
        assert!(registry.set_enabled("Winter", true));
        assert!(registry.is_enabled("Winter"));
        assert!(registry.remove("Winter"));
        assert!(!registry.is_enabled("Winter"));
    }

    #[test]
    fn duplicate_names_get_numeric_suffix() {
        let mut registry = SpecRegistry::new();
        assert_eq!(registry.add("Custom"), "Custom");
        assert_eq!(registry.add("Custom"), "Custom.001");
        assert_eq!(registry.add("Custom"), "Custom.002");
        assert_eq!(registry.add("Default"), "Default.001");
    }

    #[test]
    fn unknown_spec_never_runs() {
        let registry = SpecRegistry::new();
        assert!(!registry.is_enabled("Ghost"));
    }

    #[test]
    fn default_only_yields_to_enabled_user_specs() {
        let mut registry = SpecRegistry::new();
        assert!(registry.is_enabled(SPEC_DEFAULT_ONLY));
        registry.add("Winter");
        assert!(registry.is_enabled(SPEC_DEFAULT_ONLY));
        registry.set_enabled("Winter", true);
        assert!(!registry.is_enabled(SPEC_DEFAULT_ONLY));
        assert_eq!(registry.add("DefaultOnly"), "DefaultOnly.001");
    }
}
