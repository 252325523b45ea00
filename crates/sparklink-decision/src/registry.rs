use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::behavior::{Behavior, BehaviorCounters, BehaviorKind, ChildSelector, Idle, LeafBehavior};
use crate::error::{DecisionError, Result};

/// Name of the sentinel behavior present in every registry.
pub const NONE: &str = "None";

/// Handle of a registered behavior.
///
/// Only meaningful for the registry that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct BehaviorId(usize);

impl BehaviorId {
    /// The sentinel.
    pub const NONE: BehaviorId = BehaviorId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BehaviorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Slot {
    name: String,
    counters: BehaviorCounters,
    behavior: Behavior,
}

/// Summary of one behavior for status output.
#[derive(Debug, Clone, Serialize)]
pub struct BehaviorInfo {
    pub name: String,
    pub kind: BehaviorKind,
    #[serde(flatten)]
    pub counters: BehaviorCounters,
    pub current_child: Option<String>,
}

/// Name-keyed behaviors and the lifecycle operations that drive them.
///
/// Behaviors are addressed by [`BehaviorId`]. Every operation that moves
/// control between behaviors goes through the registry so that counters and
/// composite state stay consistent.
pub struct BehaviorRegistry {
    slots: Vec<Slot>,
    index: HashMap<String, BehaviorId>,
}

impl BehaviorRegistry {
    /// A registry holding only the sentinel.
    pub fn new() -> Self {
        let mut index = HashMap::new();
        index.insert(NONE.to_string(), BehaviorId::NONE);
        Self {
            slots: vec![Slot {
                name: NONE.to_string(),
                counters: BehaviorCounters::default(),
                behavior: Behavior::leaf(Idle),
            }],
            index,
        }
    }

    /// Register a behavior under a unique name.
    ///
    /// A composite's default child must already be registered.
    pub fn register(&mut self, name: impl Into<String>, mut behavior: Behavior) -> Result<BehaviorId> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(DecisionError::DuplicateBehavior(name));
        }
        if let Behavior::Composite(composite) = &mut behavior {
            let child = self.id(&composite.default_name).ok_or_else(|| {
                DecisionError::UnknownDefaultChild {
                    composite: name.clone(),
                    child: composite.default_name.clone(),
                }
            })?;
            composite.default_child = child;
            composite.current = child;
        }

        let id = BehaviorId(self.slots.len());
        debug!(behavior = %name, kind = ?behavior.kind(), "behavior registered");
        self.index.insert(name.clone(), id);
        self.slots.push(Slot {
            name,
            counters: BehaviorCounters::default(),
            behavior,
        });
        Ok(id)
    }

    pub fn add_leaf(&mut self, name: impl Into<String>, leaf: impl LeafBehavior + 'static) -> Result<BehaviorId> {
        self.register(name, Behavior::leaf(leaf))
    }

    pub fn add_composite(
        &mut self,
        name: impl Into<String>,
        default_child: impl Into<String>,
        selector: impl ChildSelector + 'static,
    ) -> Result<BehaviorId> {
        self.register(name, Behavior::composite(default_child, selector))
    }

    pub fn id(&self, name: &str) -> Option<BehaviorId> {
        self.index.get(name).copied()
    }

    /// Like [`id`](Self::id), failing for unknown names.
    pub fn resolve(&self, name: &str) -> Result<BehaviorId> {
        self.id(name)
            .ok_or_else(|| DecisionError::UnknownBehavior(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn name(&self, id: BehaviorId) -> &str {
        &self.slot(id).name
    }

    pub fn counters(&self, id: BehaviorId) -> BehaviorCounters {
        self.slot(id).counters
    }

    pub fn kind(&self, id: BehaviorId) -> BehaviorKind {
        self.slot(id).behavior.kind()
    }

    pub fn behavior(&self, id: BehaviorId) -> &Behavior {
        &self.slot(id).behavior
    }

    /// Number of behaviors, sentinel included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false; the sentinel is always present.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.name.as_str())
    }

    pub fn info(&self) -> Vec<BehaviorInfo> {
        self.slots
            .iter()
            .map(|slot| BehaviorInfo {
                name: slot.name.clone(),
                kind: slot.behavior.kind(),
                counters: slot.counters,
                current_child: slot
                    .behavior
                    .as_composite()
                    .map(|composite| self.name(composite.current).to_string()),
            })
            .collect()
    }

    /// The child a composite currently performs.
    pub fn current_child(&self, id: BehaviorId) -> Option<BehaviorId> {
        self.slot(id)
            .behavior
            .as_composite()
            .map(|composite| composite.current)
    }

    /// `id` followed by its chain of currently performed children.
    pub fn current_chain(&self, id: BehaviorId) -> Vec<BehaviorId> {
        let mut chain = vec![id];
        let mut reference = id;
        while let Some(child) = self.current_child(reference) {
            if chain.contains(&child) {
                break;
            }
            chain.push(child);
            reference = child;
        }
        chain
    }

    /// Chain of names, e.g. `attack > dribble > walk`.
    pub fn describe(&self, id: BehaviorId) -> String {
        self.current_chain(id)
            .into_iter()
            .map(|node| self.name(node))
            .collect::<Vec<_>>()
            .join(" > ")
    }

    /// True if `testee` is `reference` or sits on its chain of current children.
    pub fn is_in_execution(&self, testee: BehaviorId, reference: BehaviorId) -> bool {
        let mut node = reference;
        for _ in 0..self.slots.len() {
            if node == testee {
                return true;
            }
            match self.current_child(node) {
                Some(child) => node = child,
                None => return false,
            }
        }
        false
    }

    /// The leaf at the end of the current chain.
    pub fn root_behavior(&self, id: BehaviorId) -> BehaviorId {
        let mut node = id;
        for _ in 0..self.slots.len() {
            match self.current_child(node) {
                Some(child) => node = child,
                None => break,
            }
        }
        node
    }

    pub fn is_finished(&self, id: BehaviorId) -> bool {
        match &self.slot(self.root_behavior(id)).behavior {
            Behavior::Leaf(leaf) => leaf.is_finished(),
            Behavior::Composite(_) => true,
        }
    }

    /// Enter a behavior: counters restart their run and composites return to
    /// their default child.
    pub fn init(&mut self, id: BehaviorId) {
        let slot = self.slot_mut(id);
        slot.counters.enter();
        match &mut slot.behavior {
            Behavior::Leaf(leaf) => leaf.init(),
            Behavior::Composite(composite) => composite.current = composite.default_child,
        }
    }

    /// Force termination. Aborts the current chain bottom-up, re-initializing
    /// every behavior on it. Nothing is performed.
    pub fn abort(&mut self, id: BehaviorId) {
        debug!(behavior = %self.describe(id), "aborting");
        for node in self.current_chain(id).into_iter().rev() {
            if let Behavior::Leaf(leaf) = &mut self.slot_mut(node).behavior {
                leaf.abort();
            }
            self.init(node);
        }
    }

    /// The policy re-selected `id`. Extends its run only if it is finished.
    pub fn stay_in(&mut self, id: BehaviorId) {
        if self.is_finished(id) {
            self.slot_mut(id).counters.stayed();
        }
    }

    /// Tell the chain under `id` that `next` takes over.
    ///
    /// The notification stops where the chain reaches `next`.
    pub fn on_leaving_behavior(&mut self, id: BehaviorId, next: BehaviorId) {
        if id == next {
            return;
        }
        let next_name = self.name(next).to_string();
        for node in self.current_chain(id) {
            if node == next {
                break;
            }
            if let Behavior::Leaf(leaf) = &mut self.slot_mut(node).behavior {
                leaf.on_leaving(&next_name);
            }
        }
    }

    /// Try to hand control from `current` to `desired`.
    ///
    /// Returns whichever behavior holds control afterwards. A leaf takes over
    /// only if `current` is finished. A composite walks its preferred
    /// children: one already running under `current` is adopted as is, any
    /// other must itself win the switch.
    pub fn switch_from(&mut self, desired: BehaviorId, current: BehaviorId) -> Result<BehaviorId> {
        self.switch_at(desired, current, 0)
    }

    /// Count a cycle and run the behavior. Composites re-select their child
    /// with the switch/stay protocol and perform it.
    pub fn perform(&mut self, id: BehaviorId) -> Result<()> {
        self.perform_at(id, 0)
    }

    fn switch_at(&mut self, desired: BehaviorId, current: BehaviorId, depth: usize) -> Result<BehaviorId> {
        self.check_depth(desired, depth)?;

        if self.kind(desired) == BehaviorKind::Leaf {
            if !self.is_finished(current) {
                return Ok(current);
            }
            self.on_leaving_behavior(current, desired);
            self.init(desired);
            debug!(from = self.name(current), to = self.name(desired), "behavior switched");
            return Ok(desired);
        }

        for child in self.preferred_children(desired)? {
            if self.is_in_execution(child, current) {
                if child != current {
                    self.on_leaving_behavior(current, child);
                }
                self.enter_with(desired, child);
                return Ok(desired);
            }
            if self.switch_at(child, current, depth + 1)? == child {
                self.enter_with(desired, child);
                return Ok(desired);
            }
        }
        Ok(current)
    }

    fn perform_at(&mut self, id: BehaviorId, depth: usize) -> Result<()> {
        self.check_depth(id, depth)?;

        let slot = self.slot_mut(id);
        slot.counters.performed();
        let current = match &mut slot.behavior {
            Behavior::Leaf(leaf) => {
                leaf.perform();
                return Ok(());
            }
            Behavior::Composite(composite) => composite.current,
        };

        let mut next = current;
        for child in self.preferred_children(id)? {
            if child == current {
                next = current;
                break;
            }
            next = self.switch_at(child, current, depth + 1)?;
            if next == child {
                break;
            }
        }

        if next == current {
            self.stay_in(current);
        } else if let Behavior::Composite(composite) = &mut self.slot_mut(id).behavior {
            composite.current = next;
        }
        self.perform_at(next, depth + 1)
    }

    /// Enter composite `id` with `child` as its current child.
    fn enter_with(&mut self, id: BehaviorId, child: BehaviorId) {
        let slot = self.slot_mut(id);
        slot.counters.enter();
        if let Behavior::Composite(composite) = &mut slot.behavior {
            composite.current = child;
        }
    }

    fn preferred_children(&mut self, id: BehaviorId) -> Result<Vec<BehaviorId>> {
        let names = match &mut self.slot_mut(id).behavior {
            Behavior::Composite(composite) => composite.selector.preferred(),
            Behavior::Leaf(_) => return Ok(Vec::new()),
        };
        names
            .iter()
            .map(|name| {
                let child = self.resolve(name)?;
                if child == id {
                    return Err(DecisionError::SelectionCycle(self.name(id).to_string()));
                }
                Ok(child)
            })
            .collect()
    }

    fn check_depth(&self, id: BehaviorId, depth: usize) -> Result<()> {
        if depth > self.slots.len() {
            return Err(DecisionError::SelectionCycle(self.name(id).to_string()));
        }
        Ok(())
    }

    fn slot(&self, id: BehaviorId) -> &Slot {
        &self.slots[id.0]
    }

    fn slot_mut(&mut self, id: BehaviorId) -> &mut Slot {
        &mut self.slots[id.0]
    }
}

impl Default for BehaviorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BehaviorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    type Log = Arc<Mutex<Vec<String>>>;

    /// Leaf whose finished flag is flipped by the test.
    struct Scripted {
        name: &'static str,
        finished: Arc<AtomicBool>,
        log: Log,
    }

    impl LeafBehavior for Scripted {
        fn perform(&mut self) {
            self.log.lock().unwrap().push(format!("perform {}", self.name));
        }

        fn is_finished(&self) -> bool {
            self.finished.load(Ordering::SeqCst)
        }

        fn init(&mut self) {
            self.log.lock().unwrap().push(format!("init {}", self.name));
        }

        fn abort(&mut self) {
            self.log.lock().unwrap().push(format!("abort {}", self.name));
        }

        fn on_leaving(&mut self, next: &str) {
            self.log
                .lock()
                .unwrap()
                .push(format!("leave {} for {next}", self.name));
        }
    }

    fn scripted(registry: &mut BehaviorRegistry, name: &'static str, log: &Log) -> (BehaviorId, Arc<AtomicBool>) {
        let finished = Arc::new(AtomicBool::new(true));
        let id = registry
            .add_leaf(
                name,
                Scripted {
                    name,
                    finished: Arc::clone(&finished),
                    log: Arc::clone(log),
                },
            )
            .unwrap();
        (id, finished)
    }

    fn take(log: &Log) -> Vec<String> {
        std::mem::take(&mut *log.lock().unwrap())
    }

    fn fixed(names: &[&str]) -> impl ChildSelector + 'static {
        let names: Vec<String> = names.iter().map(|name| name.to_string()).collect();
        move || names.clone()
    }

    #[test]
    fn sentinel_always_present() {
        let registry = BehaviorRegistry::new();
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
        assert_eq!(registry.id(NONE), Some(BehaviorId::NONE));
        assert_eq!(registry.name(BehaviorId::NONE), "None");
        assert!(registry.is_finished(BehaviorId::NONE));
        assert_eq!(registry.root_behavior(BehaviorId::NONE), BehaviorId::NONE);
    }

    #[test]
    fn names_are_unique() {
        let mut registry = BehaviorRegistry::new();
        registry.add_leaf("walk", || {}).unwrap();
        assert_eq!(
            registry.add_leaf("walk", || {}).unwrap_err(),
            DecisionError::DuplicateBehavior("walk".into())
        );
        assert_eq!(
            registry.add_leaf(NONE, || {}).unwrap_err(),
            DecisionError::DuplicateBehavior("None".into())
        );
        assert_eq!(
            registry.resolve("kick").unwrap_err(),
            DecisionError::UnknownBehavior("kick".into())
        );
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["None", "walk"]);
    }

    #[test]
    fn composite_needs_registered_default() {
        let mut registry = BehaviorRegistry::new();
        let err = registry
            .add_composite("attack", "dribble", fixed(&[]))
            .unwrap_err();
        assert_eq!(
            err,
            DecisionError::UnknownDefaultChild {
                composite: "attack".into(),
                child: "dribble".into()
            }
        );
        assert!(!registry.contains("attack"));
    }

    #[test]
    fn unfinished_current_keeps_control() {
        let log = Log::default();
        let mut registry = BehaviorRegistry::new();
        let (a, _) = scripted(&mut registry, "a", &log);
        let (b, b_finished) = scripted(&mut registry, "b", &log);

        b_finished.store(false, Ordering::SeqCst);
        assert_eq!(registry.switch_from(a, b).unwrap(), b);
        assert!(take(&log).is_empty());
        assert_eq!(registry.counters(a).performs(), 0);
    }

    #[test]
    fn finished_current_is_notified_and_superseded() {
        let log = Log::default();
        let mut registry = BehaviorRegistry::new();
        let (a, _) = scripted(&mut registry, "a", &log);
        let (b, _) = scripted(&mut registry, "b", &log);

        assert_eq!(registry.switch_from(a, b).unwrap(), a);
        assert_eq!(take(&log), vec!["leave b for a", "init a"]);
        assert_eq!(registry.counters(a).performs(), 1);
        assert_eq!(registry.counters(a).consecutive_performs(), 1);
        assert_eq!(registry.counters(b).performs(), 0);
    }

    #[test]
    fn stay_in_counts_only_finished_runs() {
        let log = Log::default();
        let mut registry = BehaviorRegistry::new();
        let (a, a_finished) = scripted(&mut registry, "a", &log);
        registry.init(a);

        registry.stay_in(a);
        registry.stay_in(a);
        assert_eq!(registry.counters(a).consecutive_performs(), 3);

        a_finished.store(false, Ordering::SeqCst);
        registry.stay_in(a);
        assert_eq!(registry.counters(a).consecutive_performs(), 3);
    }

    #[test]
    fn perform_counts_cycles() {
        let log = Log::default();
        let mut registry = BehaviorRegistry::new();
        let (a, _) = scripted(&mut registry, "a", &log);
        registry.perform(a).unwrap();
        registry.perform(a).unwrap();
        assert_eq!(registry.counters(a).performed_cycles(), 2);
        assert_eq!(take(&log), vec!["perform a", "perform a"]);
    }

    #[test]
    fn composite_delegates_to_preferred_child() {
        let log = Log::default();
        let mut registry = BehaviorRegistry::new();
        let (walk, _) = scripted(&mut registry, "walk", &log);
        let (kick, _) = scripted(&mut registry, "kick", &log);
        let attack = registry
            .add_composite("attack", "None", fixed(&["kick", "walk"]))
            .unwrap();
        assert_eq!(registry.kind(attack), BehaviorKind::Composite);

        // Enter attack from walk: kick wins the switch because walk is finished.
        registry.init(walk);
        take(&log);
        assert_eq!(registry.switch_from(attack, walk).unwrap(), attack);
        assert_eq!(registry.current_child(attack), Some(kick));
        assert_eq!(registry.root_behavior(attack), kick);
        assert_eq!(take(&log), vec!["leave walk for kick", "init kick"]);

        registry.perform(attack).unwrap();
        assert_eq!(take(&log), vec!["perform kick"]);
        assert_eq!(registry.describe(attack), "attack > kick");
        assert!(registry.is_in_execution(kick, attack));
        assert!(!registry.is_in_execution(walk, attack));
        assert_eq!(registry.current_chain(attack), vec![attack, kick]);
        assert_eq!(registry.counters(kick).consecutive_performs(), 2);
        assert_eq!(registry.counters(attack).performed_cycles(), 1);
    }

    #[test]
    fn composite_adopts_running_child_without_init() {
        let log = Log::default();
        let mut registry = BehaviorRegistry::new();
        let (walk, walk_finished) = scripted(&mut registry, "walk", &log);
        let attack = registry
            .add_composite("attack", "None", fixed(&["walk"]))
            .unwrap();

        registry.init(walk);
        walk_finished.store(false, Ordering::SeqCst);
        take(&log);

        assert_eq!(registry.switch_from(attack, walk).unwrap(), attack);
        assert_eq!(registry.current_child(attack), Some(walk));
        assert!(take(&log).is_empty());
        assert_eq!(registry.counters(walk).performs(), 1);
        assert_eq!(registry.counters(attack).performs(), 1);
    }

    #[test]
    fn composite_switch_fails_when_no_child_can_take_over() {
        let log = Log::default();
        let mut registry = BehaviorRegistry::new();
        let (walk, walk_finished) = scripted(&mut registry, "walk", &log);
        scripted(&mut registry, "kick", &log);
        let attack = registry
            .add_composite("attack", "None", fixed(&["kick"]))
            .unwrap();

        walk_finished.store(false, Ordering::SeqCst);
        assert_eq!(registry.switch_from(attack, walk).unwrap(), walk);
        assert_eq!(registry.counters(attack).performs(), 0);
    }

    #[test]
    fn composite_perform_switches_and_stays() {
        let log = Log::default();
        let mut registry = BehaviorRegistry::new();
        let (walk, _) = scripted(&mut registry, "walk", &log);
        let (kick, kick_finished) = scripted(&mut registry, "kick", &log);
        let preferred = Arc::new(Mutex::new(vec!["walk".to_string()]));
        let selector = {
            let preferred = Arc::clone(&preferred);
            move || preferred.lock().unwrap().clone()
        };
        let attack = registry.add_composite("attack", "None", selector).unwrap();

        registry.init(attack);
        registry.perform(attack).unwrap();
        assert_eq!(registry.current_child(attack), Some(walk));
        assert_eq!(take(&log), vec!["init walk", "perform walk"]);

        registry.perform(attack).unwrap();
        assert_eq!(registry.counters(walk).consecutive_performs(), 2);
        take(&log);

        *preferred.lock().unwrap() = vec!["kick".to_string(), "walk".to_string()];
        registry.perform(attack).unwrap();
        assert_eq!(registry.current_child(attack), Some(kick));
        assert_eq!(take(&log), vec!["leave walk for kick", "init kick", "perform kick"]);

        // kick is busy, so walk cannot take back control.
        kick_finished.store(false, Ordering::SeqCst);
        *preferred.lock().unwrap() = vec!["walk".to_string()];
        registry.perform(attack).unwrap();
        assert_eq!(registry.current_child(attack), Some(kick));
        assert_eq!(take(&log), vec!["perform kick"]);
        assert_eq!(registry.counters(kick).consecutive_performs(), 1);
    }

    #[test]
    fn init_resets_composite_to_default() {
        let log = Log::default();
        let mut registry = BehaviorRegistry::new();
        let (walk, _) = scripted(&mut registry, "walk", &log);
        let (kick, _) = scripted(&mut registry, "kick", &log);
        let attack = registry
            .add_composite("attack", "walk", fixed(&["kick"]))
            .unwrap();
        assert_eq!(registry.current_child(attack), Some(walk));

        registry.perform(attack).unwrap();
        assert_eq!(registry.current_child(attack), Some(kick));

        registry.init(attack);
        assert_eq!(registry.current_child(attack), Some(walk));
    }

    #[test]
    fn abort_reinitializes_chain_bottom_up() {
        let log = Log::default();
        let mut registry = BehaviorRegistry::new();
        scripted(&mut registry, "walk", &log);
        let (kick, _) = scripted(&mut registry, "kick", &log);
        let attack = registry
            .add_composite("attack", "walk", fixed(&["kick"]))
            .unwrap();
        registry.perform(attack).unwrap();
        take(&log);

        registry.abort(attack);
        assert_eq!(take(&log), vec!["abort kick", "init kick"]);
        assert_eq!(registry.counters(attack).performs(), 1);
        assert_eq!(registry.counters(kick).performs(), 2);
        assert_eq!(registry.counters(attack).performed_cycles(), 1);
        assert_eq!(registry.counters(kick).performed_cycles(), 1);
    }

    #[test]
    fn leaving_notification_stops_at_new_behavior() {
        let log = Log::default();
        let mut registry = BehaviorRegistry::new();
        scripted(&mut registry, "walk", &log);
        let attack = registry
            .add_composite("attack", "walk", fixed(&["walk"]))
            .unwrap();
        let (kick, _) = scripted(&mut registry, "kick", &log);

        registry.on_leaving_behavior(attack, kick);
        assert_eq!(take(&log), vec!["leave walk for kick"]);

        let walk = registry.id("walk").unwrap();
        registry.on_leaving_behavior(attack, walk);
        assert!(take(&log).is_empty());
    }

    #[test]
    fn self_selection_is_rejected() {
        let mut registry = BehaviorRegistry::new();
        let lonely = registry
            .add_composite("lonely", "None", fixed(&["lonely"]))
            .unwrap();
        assert_eq!(
            registry.perform(lonely).unwrap_err(),
            DecisionError::SelectionCycle("lonely".into())
        );
    }

    #[test]
    fn unknown_child_is_an_error() {
        let mut registry = BehaviorRegistry::new();
        let attack = registry
            .add_composite("attack", "None", fixed(&["fly"]))
            .unwrap();
        assert_eq!(
            registry.perform(attack).unwrap_err(),
            DecisionError::UnknownBehavior("fly".into())
        );
    }

    #[test]
    fn info_lists_current_children() {
        let mut registry = BehaviorRegistry::new();
        registry.add_leaf("walk", || {}).unwrap();
        registry
            .add_composite("attack", "walk", fixed(&["walk"]))
            .unwrap();

        let info = registry.info();
        assert_eq!(info.len(), 3);
        assert_eq!(info[2].current_child.as_deref(), Some("walk"));

        let json = serde_json::to_value(&info[2]).unwrap();
        assert_eq!(json["kind"], "composite");
        assert_eq!(json["performs"], 0);
    }
}
