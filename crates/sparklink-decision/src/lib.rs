//! Behavior selection for simulation agents.
//!
//! A [`BehaviorRegistry`] holds named behaviors, either leaves running user
//! logic or composites delegating to one child at a time, plus the sentinel
//! `"None"`. Each cycle the [`DecisionEngine`] asks a [`DecisionPolicy`] for
//! a behavior name, hands control over if the running behavior is finished,
//! and performs whichever behavior holds control.
//!
//! ```
//! use sparklink_decision::{BehaviorRegistry, DecisionEngine};
//!
//! let mut registry = BehaviorRegistry::new();
//! registry.add_leaf("walk", || {})?;
//! let mut engine = DecisionEngine::new(registry, |_: &BehaviorRegistry| "walk".to_string());
//! engine.decide()?;
//! assert_eq!(engine.current_name(), "walk");
//! # Ok::<(), sparklink_decision::DecisionError>(())
//! ```

pub mod behavior;
pub mod engine;
pub mod error;
pub mod registry;

pub use behavior::{Behavior, BehaviorCounters, BehaviorKind, ChildSelector, Composite, Idle, LeafBehavior};
pub use engine::{DecisionEngine, DecisionPolicy};
pub use error::{DecisionError, Result};
pub use registry::{BehaviorId, BehaviorInfo, BehaviorRegistry, NONE};
