use serde::Serialize;

use crate::registry::BehaviorId;

/// Lifecycle counters of one behavior.
///
/// Only the registry's lifecycle operations change them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BehaviorCounters {
    performs: u32,
    performed_cycles: u64,
    consecutive_performs: u32,
}

impl BehaviorCounters {
    /// Number of times the behavior was entered.
    pub fn performs(&self) -> u32 {
        self.performs
    }

    /// Total `perform` calls since creation.
    pub fn performed_cycles(&self) -> u64 {
        self.performed_cycles
    }

    /// Length of the current unbroken run.
    pub fn consecutive_performs(&self) -> u32 {
        self.consecutive_performs
    }

    pub(crate) fn enter(&mut self) {
        self.performs = self.performs.saturating_add(1);
        self.consecutive_performs = 1;
    }

    pub(crate) fn performed(&mut self) {
        self.performed_cycles = self.performed_cycles.saturating_add(1);
    }

    pub(crate) fn stayed(&mut self) {
        self.consecutive_performs = self.consecutive_performs.saturating_add(1);
    }
}

/// User logic of a leaf behavior.
///
/// Only `perform` is required. A behavior that reports itself unfinished
/// cannot be preempted by a switch.
pub trait LeafBehavior: Send {
    fn perform(&mut self);

    fn is_finished(&self) -> bool {
        true
    }

    /// Called on entry, after the counters were reset.
    fn init(&mut self) {}

    /// Called on forced termination, before re-initialization.
    fn abort(&mut self) {}

    /// Called when `next` takes over.
    fn on_leaving(&mut self, _next: &str) {}
}

impl<F> LeafBehavior for F
where
    F: FnMut() + Send,
{
    fn perform(&mut self) {
        self()
    }
}

/// Picks a composite's children for the coming cycle.
pub trait ChildSelector: Send {
    /// Child names, most preferred first.
    fn preferred(&mut self) -> Vec<String>;
}

impl<F> ChildSelector for F
where
    F: FnMut() -> Vec<String> + Send,
{
    fn preferred(&mut self) -> Vec<String> {
        self()
    }
}

/// The always-present behavior that does nothing and is always finished.
#[derive(Debug, Clone, Copy, Default)]
pub struct Idle;

impl LeafBehavior for Idle {
    fn perform(&mut self) {}
}

/// A behavior that delegates to one child at a time.
pub struct Composite {
    pub(crate) selector: Box<dyn ChildSelector>,
    pub(crate) default_name: String,
    pub(crate) default_child: BehaviorId,
    pub(crate) current: BehaviorId,
}

impl Composite {
    /// The child currently performed.
    pub fn current(&self) -> BehaviorId {
        self.current
    }

    /// The child selected on every entry.
    pub fn default_child(&self) -> BehaviorId {
        self.default_child
    }
}

/// A registered behavior.
pub enum Behavior {
    Leaf(Box<dyn LeafBehavior>),
    Composite(Composite),
}

impl Behavior {
    pub fn leaf(behavior: impl LeafBehavior + 'static) -> Self {
        Behavior::Leaf(Box::new(behavior))
    }

    /// A composite entering `default_child` on every init.
    ///
    /// The child is resolved when the composite is registered.
    pub fn composite(default_child: impl Into<String>, selector: impl ChildSelector + 'static) -> Self {
        Behavior::Composite(Composite {
            selector: Box::new(selector),
            default_name: default_child.into(),
            default_child: BehaviorId::NONE,
            current: BehaviorId::NONE,
        })
    }

    pub fn kind(&self) -> BehaviorKind {
        match self {
            Behavior::Leaf(_) => BehaviorKind::Leaf,
            Behavior::Composite(_) => BehaviorKind::Composite,
        }
    }

    pub fn as_composite(&self) -> Option<&Composite> {
        match self {
            Behavior::Composite(composite) => Some(composite),
            Behavior::Leaf(_) => None,
        }
    }
}

impl std::fmt::Debug for Behavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Behavior::Leaf(_) => f.write_str("Leaf"),
            Behavior::Composite(composite) => f
                .debug_struct("Composite")
                .field("default", &composite.default_name)
                .field("current", &composite.current)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorKind {
    Leaf,
    Composite,
}
