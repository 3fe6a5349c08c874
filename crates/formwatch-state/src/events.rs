//! # Region Events
//!
//! Typed interaction events delivered to listeners scoped to one region.
//! Events whose target lies outside the region are dropped before any
//! listener runs. Listeners run in subscription order; a listener that
//! returns [`Propagation::Stop`] ends dispatch for that event.

use serde::{Deserialize, Serialize};

use formwatch_core::{Element, NodeId};

/// Kind of interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A key was released in a field.
    KeyUp,
    /// A field committed a new value.
    Change,
    /// A field's value changed while editing.
    Input,
    /// An element was clicked.
    Click,
}

impl EventKind {
    /// Whether this kind reports a field mutation.
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::KeyUp | Self::Change | Self::Input)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::KeyUp => "keyup",
            Self::Change => "change",
            Self::Input => "input",
            Self::Click => "click",
        })
    }
}

/// An interaction with an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionEvent {
    /// What happened.
    pub kind: EventKind,
    /// The element it happened to. Targets taken from a document keep
    /// their node id, which decides region membership.
    pub target: Element,
}

impl RegionEvent {
    /// Construct an event.
    pub fn new(kind: EventKind, target: Element) -> Self {
        Self { kind, target }
    }

    /// The target's document node, if it came from a document.
    pub fn target_node(&self) -> Option<NodeId> {
        self.target.node_id()
    }
}

/// Whether dispatch continues after a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Let later listeners see the event.
    Continue,
    /// Later listeners do not see the event.
    Stop,
}

/// Handle returned by [`RegionEventSource::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

/// A region event listener.
pub type Listener = Box<dyn FnMut(&RegionEvent) -> Propagation>;

/// Event source scoped to one region element.
pub struct RegionEventSource {
    region: Element,
    listeners: Vec<(Subscription, Listener)>,
    next_id: u64,
}

impl RegionEventSource {
    /// A source delivering events targeted inside `region`.
    pub fn new(region: Element) -> Self {
        Self {
            region,
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    /// The region element.
    pub fn region(&self) -> &Element {
        &self.region
    }

    /// Register a listener.
    pub fn subscribe(&mut self, listener: Listener) -> Subscription {
        let sub = Subscription(self.next_id);
        self.next_id += 1;
        self.listeners.push((sub, listener));
        sub
    }

    /// Remove a listener. Returns whether it was registered.
    pub fn unsubscribe(&mut self, sub: Subscription) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(s, _)| *s != sub);
        self.listeners.len() != before
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Deliver `event` to listeners in subscription order.
    pub fn dispatch(&mut self, event: &RegionEvent) -> Propagation {
        if !self.region.contains(&event.target) {
            tracing::trace!(
                target_element = %event.target,
                node = ?event.target_node(),
                kind = %event.kind,
                "event outside region"
            );
            return Propagation::Continue;
        }
        for (_, listener) in self.listeners.iter_mut() {
            if listener(event) == Propagation::Stop {
                return Propagation::Stop;
            }
        }
        Propagation::Continue
    }
}

impl std::fmt::Debug for RegionEventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionEventSource")
            .field("region", &self.region.to_string())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
