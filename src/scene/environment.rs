//! Environment elements
//!
//! Named, optionally-singleton data items (ambient light, fog, exposure)
//! attached to scene nodes. Elements are resolved against the ancestor
//! chain with an explicit [`ResolutionMode`], so a subtree can override or
//! defer to its surroundings.

use glam::Vec3;

/// How an environment lookup weighs the local bag against ancestors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolutionMode {
    /// Only this node's bag is consulted.
    LocalOnly,
    /// The local element wins; ancestors are asked only when it is absent.
    LocalPriority,
    /// The ancestor chain wins (outermost first); the local element is the
    /// fallback.
    AncestorPriority,
}

/// Payload of an environment element.
#[derive(Clone, Debug, PartialEq)]
pub enum EnvironmentValue {
    AmbientLight(Vec3),
    Fog { color: Vec3, density: f32 },
    Exposure(f32),
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnvironmentElement {
    pub name: String,
    /// Singleton elements replace an existing same-named entry on insert;
    /// non-singletons accumulate in insertion order.
    pub singleton: bool,
    pub value: EnvironmentValue,
}

impl EnvironmentElement {
    #[must_use]
    pub fn new(name: impl Into<String>, singleton: bool, value: EnvironmentValue) -> Self {
        Self {
            name: name.into(),
            singleton,
            value,
        }
    }
}

/// Ordered collection of environment elements owned by one scene node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnvironmentBag {
    elements: Vec<EnvironmentElement>,
}

impl EnvironmentBag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an element, replacing an existing entry of the same name when
    /// the incoming element is a singleton.
    pub fn insert(&mut self, element: EnvironmentElement) {
        if element.singleton {
            if let Some(existing) = self.elements.iter_mut().find(|e| e.name == element.name) {
                *existing = element;
                return;
            }
        }
        self.elements.push(element);
    }

    /// First element with the given name, in insertion order.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EnvironmentElement> {
        self.elements.iter().find(|e| e.name == name)
    }

    /// Removes every element with the given name.
    pub fn remove(&mut self, name: &str) {
        self.elements.retain(|e| e.name != name);
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnvironmentElement> {
        self.elements.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
