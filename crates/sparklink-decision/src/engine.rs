use tracing::{debug, error};

use crate::error::Result;
use crate::registry::{BehaviorId, BehaviorRegistry};

/// Names the behavior the agent should execute next.
///
/// The returned name must be registered (the sentinel `"None"` included).
pub trait DecisionPolicy: Send {
    fn decide_next_behavior(&mut self, registry: &BehaviorRegistry) -> String;
}

impl<F> DecisionPolicy for F
where
    F: FnMut(&BehaviorRegistry) -> String + Send,
{
    fn decide_next_behavior(&mut self, registry: &BehaviorRegistry) -> String {
        self(registry)
    }
}

/// Runs one decision per cycle over a [`BehaviorRegistry`].
pub struct DecisionEngine {
    registry: BehaviorRegistry,
    policy: Box<dyn DecisionPolicy>,
    current: BehaviorId,
    desired: BehaviorId,
    decisions: u64,
    strict: bool,
}

impl DecisionEngine {
    pub fn new(registry: BehaviorRegistry, policy: impl DecisionPolicy + 'static) -> Self {
        Self {
            registry,
            policy: Box::new(policy),
            current: BehaviorId::NONE,
            desired: BehaviorId::NONE,
            decisions: 0,
            strict: false,
        }
    }

    /// Panic instead of returning an error when the policy names an unknown
    /// behavior. Off unless enabled here.
    pub fn with_strict_resolution(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Run one decision: ask the policy, switch or stay, perform.
    ///
    /// Always returns `Ok(true)` when a behavior was performed.
    pub fn decide(&mut self) -> Result<bool> {
        self.decisions += 1;

        let name = self.policy.decide_next_behavior(&self.registry);
        let desired = match self.registry.resolve(&name) {
            Ok(id) => id,
            Err(err) => {
                error!(behavior = %name, decision = self.decisions, "policy selected an unknown behavior");
                if self.strict {
                    panic!("{err}");
                }
                return Err(err);
            }
        };
        self.desired = desired;

        if desired != self.current {
            let previous = self.current;
            self.current = self.registry.switch_from(desired, previous)?;
            if self.current != previous {
                debug!(
                    from = self.registry.name(previous),
                    to = self.registry.name(self.current),
                    "current behavior changed"
                );
            }
        } else {
            self.registry.stay_in(self.current);
        }

        self.registry.perform(self.current)?;
        Ok(true)
    }

    /// Back to the sentinel with no decisions taken.
    pub fn reset(&mut self) {
        self.current = BehaviorId::NONE;
        self.desired = BehaviorId::NONE;
        self.decisions = 0;
    }

    pub fn current_behavior(&self) -> BehaviorId {
        self.current
    }

    /// What the policy asked for last; differs from the current behavior
    /// while an unfinished behavior holds control.
    pub fn desired_behavior(&self) -> BehaviorId {
        self.desired
    }

    pub fn current_name(&self) -> &str {
        self.registry.name(self.current)
    }

    /// Current chain, e.g. `attack > kick`.
    pub fn describe(&self) -> String {
        self.registry.describe(self.current)
    }

    pub fn number_of_decisions(&self) -> u64 {
        self.decisions
    }

    pub fn registry(&self) -> &BehaviorRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut BehaviorRegistry {
        &mut self.registry
    }

    /// Abort the current behavior chain and fall back to the sentinel.
    pub fn abort_current(&mut self) {
        self.registry.abort(self.current);
        self.current = BehaviorId::NONE;
    }
}

impl std::fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("current", &self.current_name())
            .field("desired", &self.registry.name(self.desired))
            .field("decisions", &self.decisions)
            .finish()
    }
}
