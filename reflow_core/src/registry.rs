// Copyright 2026 the Reflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The update registry: queues elements and drives them through one tick.
//!
//! [`UpdateRegistry::perform_update`] runs four phases strictly in order:
//!
//! 1. **Cleanup** — both queues are scanned from the back. Entries whose
//!    element was dropped are removed silently; entries whose element reports
//!    itself destroyed are removed and receive their completion callback.
//! 2. **Layout** — the layout queue is sorted by tree depth, then every live
//!    element is rebuilt for [`Prelayout`], [`Layout`], and [`PostLayout`] in
//!    turn. Afterwards each queued element gets
//!    [`layout_complete`](CanvasElement::layout_complete) and the queue is
//!    cleared.
//! 3. **Cull** — the installed [`Culler`] runs once.
//! 4. **Graphic** — every live element in the graphic queue, in registration
//!    order, is rebuilt for [`PreRender`] and [`LatePreRender`], then receives
//!    [`graphic_update_complete`](CanvasElement::graphic_update_complete), and
//!    the queue is cleared.
//!
//! A rebuild error is reported through the [`TraceSink`] with the element's
//! tree path and never stops the tick.
//!
//! # Re-entrancy
//!
//! Rebuilds and completion callbacks run with no queue borrowed, so they may
//! call back into the registry:
//!
//! | Call              | During layout phase            | During graphic phase |
//! |-------------------|--------------------------------|----------------------|
//! | register layout   | accepted, rebuilt this tick    | accepted, next tick  |
//! | register graphic  | accepted, rebuilt this tick    | refused, logged      |
//! | unregister        | layout part refused, logged    | graphic part refused |
//! | `perform_update`  | refused, logged                | refused, logged      |
//!
//! [`Prelayout`]: UpdateStage::Prelayout
//! [`Layout`]: UpdateStage::Layout
//! [`PostLayout`]: UpdateStage::PostLayout
//! [`PreRender`]: UpdateStage::PreRender
//! [`LatePreRender`]: UpdateStage::LatePreRender

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::{Cell, RefCell};
use core::fmt;

use crate::cull::{Culler, NoopCuller};
use crate::depth::{DepthMode, sort_by_depth};
use crate::element::{CanvasElement, ElementHandle};
use crate::queue::UniqueQueue;
use crate::stage::{PhaseKind, UpdateStage};
use crate::tick::{SubscriptionId, TickSignal};
use crate::trace::{
    Clock, ContractViolation, NoopSink, PhaseBeginEvent, PhaseEndEvent, RebuildFailure,
    StageBeginEvent, StageEndEvent, TraceSink, Tracer, UpdateBeginEvent, UpdateEndEvent,
    UpdateStats, ViolationKind,
};

type Queue = RefCell<UniqueQueue<ElementHandle>>;

/// Configuration for the [`UpdateRegistry`].
#[derive(Clone, Copy, Debug)]
pub struct RegistryConfig {
    /// Initial capacity of the layout queue.
    pub layout_capacity: usize,
    /// Initial capacity of the graphic queue.
    pub graphic_capacity: usize,
    /// How tree depths are obtained when sorting the layout queue.
    pub depth_mode: DepthMode,
    /// Timestamp source for profiling events. Without one, timestamps are 0.
    pub clock: Option<Clock>,
}

impl RegistryConfig {
    /// Walk-mode depth sorting, room for 64 elements per queue, no clock.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            layout_capacity: 64,
            graphic_capacity: 64,
            depth_mode: DepthMode::Walk,
            clock: None,
        }
    }

    /// Returns this configuration with the given depth mode.
    #[must_use]
    pub const fn with_depth_mode(mut self, depth_mode: DepthMode) -> Self {
        self.depth_mode = depth_mode;
        self
    }

    /// Returns this configuration with the given clock.
    #[must_use]
    pub const fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Schedules layout and graphic rebuilds for [`CanvasElement`]s.
///
/// The registry holds [`ElementHandle`]s only; elements are owned by the
/// surrounding tree and may disappear at any time. Every method takes
/// `&self`, so the registry is usually shared as an `Rc<UpdateRegistry>`
/// and handed to elements that need to schedule themselves.
pub struct UpdateRegistry {
    config: RegistryConfig,
    layout_queue: Queue,
    graphic_queue: Queue,
    performing_layout: Cell<bool>,
    performing_graphic: Cell<bool>,
    in_update: Cell<bool>,
    tick_index: Cell<u64>,
    last_stats: Cell<UpdateStats>,
    culler: RefCell<Box<dyn Culler>>,
    tracer: Tracer,
    subscription: Cell<Option<SubscriptionId>>,
}

impl fmt::Debug for UpdateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateRegistry")
            .field("config", &self.config)
            .field("layout_queue", &self.layout_queue.borrow().len())
            .field("graphic_queue", &self.graphic_queue.borrow().len())
            .field("performing_layout", &self.performing_layout.get())
            .field("performing_graphic", &self.performing_graphic.get())
            .field("tick_index", &self.tick_index.get())
            .finish_non_exhaustive()
    }
}

impl Default for UpdateRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::new())
    }
}

impl UpdateRegistry {
    /// Creates an empty registry with no culler and a discarding sink.
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            layout_queue: RefCell::new(UniqueQueue::with_capacity(config.layout_capacity)),
            graphic_queue: RefCell::new(UniqueQueue::with_capacity(config.graphic_capacity)),
            performing_layout: Cell::new(false),
            performing_graphic: Cell::new(false),
            in_update: Cell::new(false),
            tick_index: Cell::new(0),
            last_stats: Cell::new(UpdateStats::default()),
            culler: RefCell::new(Box::new(NoopCuller)),
            tracer: Tracer::new(Box::new(NoopSink), config.clock),
            subscription: Cell::new(None),
        }
    }

    /// Returns the configuration the registry was created with.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Installs the clipping pass run between the two phases.
    ///
    /// # Panics
    ///
    /// Panics if called from inside [`Culler::cull`].
    pub fn set_culler(&self, culler: impl Culler + 'static) {
        *self.culler.borrow_mut() = Box::new(culler);
    }

    /// Installs the diagnostics sink and returns the previous one.
    ///
    /// # Panics
    ///
    /// Panics if called from inside a sink callback.
    pub fn set_trace_sink(&self, sink: impl TraceSink + 'static) -> Box<dyn TraceSink> {
        self.tracer.replace_sink(Box::new(sink))
    }

    // -- registration -------------------------------------------------------

    /// Queues an element for layout rebuild. Already-queued elements are
    /// left in place.
    pub fn register_for_layout(&self, element: impl Into<ElementHandle>) {
        self.try_register_for_layout(element);
    }

    /// Queues an element for layout rebuild.
    ///
    /// Returns `false`, leaving the queue unchanged, if the element is
    /// already queued. Registration while the layout phase is running is
    /// accepted; the element is rebuilt for the stages that remain.
    pub fn try_register_for_layout(&self, element: impl Into<ElementHandle>) -> bool {
        self.layout_queue.borrow_mut().add_unique(element.into())
    }

    /// Queues an element for graphic rebuild. Refused (and logged) while
    /// the graphic phase is running.
    pub fn register_for_graphic(&self, element: impl Into<ElementHandle>) {
        self.try_register_for_graphic(element);
    }

    /// Queues an element for graphic rebuild.
    ///
    /// Returns `false` if the element is already queued, or if the graphic
    /// phase is running; the latter is reported as
    /// [`ViolationKind::GraphicRegistrationDuringGraphic`].
    pub fn try_register_for_graphic(&self, element: impl Into<ElementHandle>) -> bool {
        let handle = element.into();
        if self.performing_graphic.get() {
            self.violation(ViolationKind::GraphicRegistrationDuringGraphic, &handle);
            return false;
        }
        self.graphic_queue.borrow_mut().add_unique(handle)
    }

    /// Removes an element from both queues.
    ///
    /// For each queue whose phase is not running, the element receives that
    /// queue's completion callback and is removed; the callback fires even if
    /// the element was not queued. For a queue whose phase is running the
    /// removal is refused and logged, and the element stays queued.
    pub fn unregister(&self, element: impl Into<ElementHandle>) {
        let handle = element.into();

        if self.performing_layout.get() {
            self.violation(ViolationKind::UnregisterDuringLayout, &handle);
        } else {
            if let Some(element) = handle.upgrade() {
                element.layout_complete();
            }
            self.layout_queue.borrow_mut().remove(&handle);
        }

        if self.performing_graphic.get() {
            self.violation(ViolationKind::UnregisterDuringGraphic, &handle);
        } else {
            if let Some(element) = handle.upgrade() {
                element.graphic_update_complete();
            }
            self.graphic_queue.borrow_mut().remove(&handle);
        }
    }

    // -- queries ------------------------------------------------------------

    /// Returns whether the layout phase is running.
    #[inline]
    #[must_use]
    pub fn is_rebuilding_layout(&self) -> bool {
        self.performing_layout.get()
    }

    /// Returns whether the graphic phase is running.
    #[inline]
    #[must_use]
    pub fn is_rebuilding_graphic(&self) -> bool {
        self.performing_graphic.get()
    }

    /// Returns the number of elements queued for layout.
    #[must_use]
    pub fn layout_queue_len(&self) -> usize {
        self.layout_queue.borrow().len()
    }

    /// Returns the number of elements queued for graphic rebuild.
    #[must_use]
    pub fn graphic_queue_len(&self) -> usize {
        self.graphic_queue.borrow().len()
    }

    /// Returns whether the element is queued for layout.
    #[must_use]
    pub fn is_queued_for_layout(&self, element: impl Into<ElementHandle>) -> bool {
        self.layout_queue.borrow().contains(&element.into())
    }

    /// Returns whether the element is queued for graphic rebuild.
    #[must_use]
    pub fn is_queued_for_graphic(&self, element: impl Into<ElementHandle>) -> bool {
        self.graphic_queue.borrow().contains(&element.into())
    }

    /// Returns the number of completed ticks.
    #[must_use]
    pub fn tick_index(&self) -> u64 {
        self.tick_index.get()
    }

    /// Returns the counters of the most recent completed tick.
    #[must_use]
    pub fn last_stats(&self) -> UpdateStats {
        self.last_stats.get()
    }

    // -- tick ---------------------------------------------------------------

    /// Subscribes [`perform_update`](Self::perform_update) to `signal`.
    ///
    /// A registry attaches at most once; later calls return `false`. The
    /// subscription holds a weak reference, so dropping the registry turns it
    /// into a no-op.
    pub fn attach(self: &Rc<Self>, signal: &TickSignal) -> bool {
        if self.subscription.get().is_some() {
            return false;
        }
        let weak = Rc::downgrade(self);
        let id = signal.subscribe(move || {
            if let Some(registry) = weak.upgrade() {
                registry.perform_update();
            }
        });
        self.subscription.set(Some(id));
        true
    }

    /// Removes the subscription made by [`attach`](Self::attach).
    ///
    /// Returns `false` if the registry was not attached to `signal`.
    pub fn detach(&self, signal: &TickSignal) -> bool {
        match self.subscription.take() {
            Some(id) if signal.unsubscribe(id) => true,
            other => {
                self.subscription.set(other);
                false
            }
        }
    }

    /// Runs one full tick: cleanup, layout, cull, graphic.
    ///
    /// Calling this from inside a running tick is reported as
    /// [`ViolationKind::ReentrantUpdate`] and does nothing.
    pub fn perform_update(&self) {
        let tick_index = self.tick_index.get();
        if self.in_update.get() {
            self.tracer.contract_violation(&ContractViolation {
                tick_index,
                kind: ViolationKind::ReentrantUpdate,
                path: None,
            });
            return;
        }
        self.in_update.set(true);

        self.tracer.update_begin(&UpdateBeginEvent {
            tick_index,
            layout_queued: self.layout_queue_len(),
            graphic_queued: self.graphic_queue_len(),
            timestamp: self.tracer.now(),
        });

        let mut stats = UpdateStats::default();

        self.phase_begin(PhaseKind::Cleanup);
        stats.cleaned = self.clean_queue(&self.layout_queue, |e| e.layout_complete())
            + self.clean_queue(&self.graphic_queue, |e| e.graphic_update_complete());
        self.phase_end(PhaseKind::Cleanup);

        self.phase_begin(PhaseKind::Layout);
        self.performing_layout.set(true);
        sort_by_depth(&self.layout_queue, self.config.depth_mode);
        for stage in UpdateStage::LAYOUT {
            let rebuilds = self.run_stage(&self.layout_queue, stage, &mut stats);
            stats.layout_rebuilds += rebuilds;
        }
        stats.layout_elements = self.complete_queue(&self.layout_queue, |e| e.layout_complete());
        self.performing_layout.set(false);
        self.phase_end(PhaseKind::Layout);

        self.phase_begin(PhaseKind::Cull);
        self.culler.borrow_mut().cull();
        self.phase_end(PhaseKind::Cull);

        self.phase_begin(PhaseKind::Graphic);
        self.performing_graphic.set(true);
        for stage in UpdateStage::GRAPHIC {
            let rebuilds = self.run_stage(&self.graphic_queue, stage, &mut stats);
            stats.graphic_rebuilds += rebuilds;
        }
        stats.graphic_elements =
            self.complete_queue(&self.graphic_queue, |e| e.graphic_update_complete());
        self.performing_graphic.set(false);
        self.phase_end(PhaseKind::Graphic);

        self.tick_index.set(tick_index + 1);
        self.last_stats.set(stats);
        self.in_update.set(false);

        self.tracer.update_end(&UpdateEndEvent {
            tick_index,
            stats,
            timestamp: self.tracer.now(),
        });
    }

    /// Purges dropped and destroyed entries, back to front. Returns how many
    /// entries were removed.
    fn clean_queue(&self, queue: &Queue, complete: fn(&dyn CanvasElement)) -> usize {
        let mut cleaned = 0;
        let mut index = queue.borrow().len();
        while index > 0 {
            index -= 1;
            let Some(handle) = entry(queue, index) else {
                continue;
            };
            match handle.upgrade() {
                None => {
                    queue.borrow_mut().remove_at(index);
                    cleaned += 1;
                }
                Some(element) if element.is_destroyed() => {
                    queue.borrow_mut().remove_at(index);
                    cleaned += 1;
                    complete(&*element);
                }
                Some(_) => {}
            }
        }
        cleaned
    }

    /// Rebuilds every live entry of `queue` for `stage`. Returns the number
    /// of rebuild calls made.
    fn run_stage(&self, queue: &Queue, stage: UpdateStage, stats: &mut UpdateStats) -> usize {
        let tick_index = self.tick_index.get();
        self.tracer.stage_begin(&StageBeginEvent {
            tick_index,
            stage,
            queued: queue.borrow().len(),
            timestamp: self.tracer.now(),
        });

        let mut rebuilds = 0;
        let mut index = 0;
        while let Some(handle) = entry(queue, index) {
            index += 1;
            let Some(element) = handle.live() else {
                continue;
            };
            rebuilds += 1;
            if let Err(error) = element.rebuild(stage) {
                stats.failures += 1;
                self.tracer.rebuild_failed(&RebuildFailure {
                    tick_index,
                    stage,
                    error,
                    path: Some(handle.describe()),
                });
            }
        }

        self.tracer.stage_end(&StageEndEvent {
            tick_index,
            stage,
            timestamp: self.tracer.now(),
        });
        rebuilds
    }

    /// Sends the completion callback to every entry that still resolves,
    /// then clears `queue`. Returns the number of entries it held.
    fn complete_queue(&self, queue: &Queue, complete: fn(&dyn CanvasElement)) -> usize {
        let mut index = 0;
        while let Some(handle) = entry(queue, index) {
            index += 1;
            if let Some(element) = handle.upgrade() {
                complete(&*element);
            }
        }
        let mut queue = queue.borrow_mut();
        let held = queue.len();
        queue.clear();
        held
    }

    fn phase_begin(&self, phase: PhaseKind) {
        self.tracer.phase_begin(&PhaseBeginEvent {
            tick_index: self.tick_index.get(),
            phase,
            timestamp: self.tracer.now(),
        });
    }

    fn phase_end(&self, phase: PhaseKind) {
        self.tracer.phase_end(&PhaseEndEvent {
            tick_index: self.tick_index.get(),
            phase,
            timestamp: self.tracer.now(),
        });
    }

    fn violation(&self, kind: ViolationKind, handle: &ElementHandle) {
        self.tracer.contract_violation(&ContractViolation {
            tick_index: self.tick_index.get(),
            kind,
            path: Some(handle.describe()),
        });
    }
}

/// Clones the handle at `index` without keeping the queue borrowed.
fn entry(queue: &Queue, index: usize) -> Option<ElementHandle> {
    queue.borrow().get(index).cloned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::string::{String, ToString};
    use alloc::vec;
    use alloc::vec::Vec;

    use super::*;
    use crate::element::RebuildError;
    use crate::node::Node;

    type Journal = Rc<RefCell<Vec<String>>>;
    type Hook = Box<dyn Fn(UpdateStage)>;

    /// Element double that journals every call it receives.
    struct Spy {
        name: &'static str,
        node: Option<Rc<Node>>,
        journal: Journal,
        destroyed: Cell<bool>,
        fail_on: Cell<Option<UpdateStage>>,
        hook: RefCell<Option<Hook>>,
    }

    impl Spy {
        fn new(name: &'static str, node: Option<Rc<Node>>, journal: &Journal) -> Rc<Self> {
            Rc::new(Self {
                name,
                node,
                journal: Rc::clone(journal),
                destroyed: Cell::new(false),
                fail_on: Cell::new(None),
                hook: RefCell::new(None),
            })
        }

        fn on_rebuild(&self, hook: impl Fn(UpdateStage) + 'static) {
            *self.hook.borrow_mut() = Some(Box::new(hook));
        }

        fn log(&self, what: &str) {
            self.journal.borrow_mut().push(format!("{}.{what}", self.name));
        }
    }

    impl CanvasElement for Spy {
        fn rebuild(&self, stage: UpdateStage) -> Result<(), RebuildError> {
            self.log(&format!("rebuild({stage})"));
            if let Some(hook) = self.hook.borrow().as_ref() {
                hook(stage);
            }
            if self.fail_on.get() == Some(stage) {
                return Err(RebuildError::failed("spy failure"));
            }
            Ok(())
        }

        fn node(&self) -> Option<Rc<Node>> {
            self.node.clone()
        }

        fn layout_complete(&self) {
            self.log("layout_complete");
        }

        fn graphic_update_complete(&self) {
            self.log("graphic_complete");
        }

        fn is_destroyed(&self) -> bool {
            self.destroyed.get()
        }
    }

    /// Sink double that keeps diagnostics for inspection.
    #[derive(Default)]
    struct Diagnostics {
        failures: Vec<RebuildFailure>,
        violations: Vec<ContractViolation>,
    }

    impl TraceSink for Diagnostics {
        fn on_rebuild_failed(&mut self, e: &RebuildFailure) {
            self.failures.push(e.clone());
        }

        fn on_contract_violation(&mut self, e: &ContractViolation) {
            self.violations.push(e.clone());
        }
    }

    fn journal() -> Journal {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn diagnosed(registry: &UpdateRegistry) -> Rc<RefCell<Diagnostics>> {
        let diagnostics = Rc::new(RefCell::new(Diagnostics::default()));
        registry.set_trace_sink(Rc::clone(&diagnostics));
        diagnostics
    }

    fn count(journal: &Journal, entry: &str) -> usize {
        journal.borrow().iter().filter(|e| *e == entry).count()
    }

    #[test]
    fn parent_and_child_layout_call_order() {
        let journal = journal();
        let root = Node::new("E1");
        let child = Node::new_child(&root, "E2");
        let e1 = Spy::new("E1", Some(root), &journal);
        let e2 = Spy::new("E2", Some(child), &journal);

        let registry = UpdateRegistry::default();
        {
            let journal = Rc::clone(&journal);
            registry.set_culler(move || journal.borrow_mut().push("cull".to_string()));
        }
        registry.register_for_layout(&e2);
        registry.register_for_layout(&e1);
        registry.perform_update();

        assert_eq!(
            *journal.borrow(),
            vec![
                "E1.rebuild(prelayout)",
                "E2.rebuild(prelayout)",
                "E1.rebuild(layout)",
                "E2.rebuild(layout)",
                "E1.rebuild(post-layout)",
                "E2.rebuild(post-layout)",
                "E1.layout_complete",
                "E2.layout_complete",
                "cull",
            ]
        );
        assert_eq!(registry.layout_queue_len(), 0);
        assert_eq!(registry.tick_index(), 1);
    }

    #[test]
    fn shallower_elements_rebuild_first_in_every_stage() {
        let journal = journal();
        let root = Node::new("root");
        let a = Node::new_child(&root, "a");
        let a1 = Node::new_child(&a, "a1");
        let b = Node::new_child(&root, "b");

        let deep = Spy::new("deep", Some(a1), &journal);
        let mid_b = Spy::new("mid_b", Some(b), &journal);
        let mid_a = Spy::new("mid_a", Some(a), &journal);
        let top = Spy::new("top", Some(root), &journal);

        let registry = UpdateRegistry::default();
        for e in [&deep, &mid_b, &mid_a, &top] {
            registry.register_for_layout(e);
        }
        registry.perform_update();

        let expected_per_stage = ["top", "mid_b", "mid_a", "deep"];
        for stage in UpdateStage::LAYOUT {
            let order: Vec<String> = journal
                .borrow()
                .iter()
                .filter(|e| e.ends_with(&format!(".rebuild({stage})")))
                .map(|e| e.split('.').next().unwrap_or_default().to_string())
                .collect();
            assert_eq!(order, expected_per_stage, "stage {stage}");
        }
    }

    #[test]
    fn cached_depth_mode_gives_same_order() {
        let journal = journal();
        let root = Node::new("root");
        let child = Node::new_child(&root, "child");
        let late = Spy::new("late", Some(child), &journal);
        let early = Spy::new("early", Some(root), &journal);

        let registry =
            UpdateRegistry::new(RegistryConfig::new().with_depth_mode(DepthMode::CachedPerSort));
        registry.register_for_layout(&late);
        registry.register_for_layout(&early);
        registry.perform_update();

        assert_eq!(
            &journal.borrow()[..2],
            ["early.rebuild(prelayout)", "late.rebuild(prelayout)"]
        );
    }

    /// Names of the elements rebuilt for `stage`, in call order.
    fn stage_order(journal: &Journal, stage: UpdateStage) -> Vec<String> {
        let suffix = format!(".rebuild({stage})");
        journal
            .borrow()
            .iter()
            .filter_map(|e| e.strip_suffix(&suffix))
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn depth_order_is_fixed_when_the_phase_starts() {
        let journal = journal();
        let root = Node::new("root");
        let a = Node::new_child(&root, "a");
        let b = Node::new_child(&a, "b");
        let c = Node::new_child(&b, "c");

        let deep = Spy::new("deep", Some(Rc::clone(&c)), &journal);
        let mid = Spy::new("mid", Some(b), &journal);
        let shallow = Spy::new("shallow", Some(a), &journal);
        {
            let (c, root) = (Rc::clone(&c), Rc::clone(&root));
            shallow.on_rebuild(move |stage| {
                if stage == UpdateStage::Prelayout {
                    c.reparent(&root);
                }
            });
        }

        let registry = UpdateRegistry::default();
        for e in [&deep, &mid, &shallow] {
            registry.register_for_layout(e);
        }
        registry.perform_update();

        assert_eq!(c.depth(), 1, "deep was moved up during prelayout");
        for stage in UpdateStage::LAYOUT {
            assert_eq!(
                stage_order(&journal, stage),
                ["shallow", "mid", "deep"],
                "stage {stage}"
            );
        }
    }

    #[test]
    fn depth_lookup_may_query_the_registry() {
        use alloc::rc::Weak;

        /// Reads the registry from inside `node()`.
        struct Curious {
            node: Rc<Node>,
            registry: Weak<UpdateRegistry>,
            seen_len: Cell<Option<usize>>,
        }

        impl CanvasElement for Curious {
            fn rebuild(&self, _stage: UpdateStage) -> Result<(), RebuildError> {
                Ok(())
            }

            fn node(&self) -> Option<Rc<Node>> {
                if let Some(registry) = self.registry.upgrade() {
                    self.seen_len.set(Some(registry.layout_queue_len()));
                }
                Some(Rc::clone(&self.node))
            }

            fn layout_complete(&self) {}

            fn graphic_update_complete(&self) {}
        }

        for mode in [DepthMode::Walk, DepthMode::CachedPerSort] {
            let registry = Rc::new(UpdateRegistry::new(
                RegistryConfig::new().with_depth_mode(mode),
            ));
            let root = Node::new("root");
            let curious = |node: Rc<Node>| {
                Rc::new(Curious {
                    node,
                    registry: Rc::downgrade(&registry),
                    seen_len: Cell::new(None),
                })
            };
            let child = curious(Node::new_child(&root, "child"));
            let parent = curious(Rc::clone(&root));
            registry.register_for_layout(&child);
            registry.register_for_layout(&parent);

            registry.perform_update();

            assert_eq!(parent.seen_len.get(), Some(2), "{mode:?}");
            assert_eq!(child.seen_len.get(), Some(2), "{mode:?}");
            assert!(!registry.is_rebuilding_layout());
            assert_eq!(registry.layout_queue_len(), 0);
            assert_eq!(registry.tick_index(), 1);
        }
    }

    #[test]
    fn try_register_for_layout_rejects_duplicates() {
        let journal = journal();
        let e = Spy::new("e", None, &journal);
        let registry = UpdateRegistry::default();

        assert!(registry.try_register_for_layout(&e));
        assert_eq!(registry.layout_queue_len(), 1);
        assert!(!registry.try_register_for_layout(Rc::downgrade(&e)));
        assert_eq!(registry.layout_queue_len(), 1);
        assert!(registry.is_queued_for_layout(&e));
        assert!(!registry.is_queued_for_graphic(&e));
    }

    #[test]
    fn element_may_sit_in_both_queues() {
        let journal = journal();
        let e = Spy::new("e", None, &journal);
        let registry = UpdateRegistry::default();

        assert!(registry.try_register_for_layout(&e));
        assert!(registry.try_register_for_graphic(&e));
        assert!(!registry.try_register_for_graphic(&e));
        registry.perform_update();

        assert_eq!(
            *journal.borrow(),
            vec![
                "e.rebuild(prelayout)",
                "e.rebuild(layout)",
                "e.rebuild(post-layout)",
                "e.layout_complete",
                "e.rebuild(pre-render)",
                "e.rebuild(late-pre-render)",
                "e.graphic_complete",
            ]
        );
    }

    #[test]
    fn full_tick_rebuilds_each_stage_exactly_once() {
        let journal = journal();
        let registry = UpdateRegistry::default();
        let layout: Vec<_> = ["l0", "l1", "l2"]
            .into_iter()
            .map(|n| Spy::new(n, None, &journal))
            .collect();
        let graphic: Vec<_> = ["g0", "g1"]
            .into_iter()
            .map(|n| Spy::new(n, None, &journal))
            .collect();
        for e in &layout {
            registry.register_for_layout(e);
        }
        for e in &graphic {
            registry.register_for_graphic(e);
        }

        registry.perform_update();

        for e in &layout {
            for stage in UpdateStage::LAYOUT {
                assert_eq!(count(&journal, &format!("{}.rebuild({stage})", e.name)), 1);
            }
            assert_eq!(count(&journal, &format!("{}.layout_complete", e.name)), 1);
            assert_eq!(count(&journal, &format!("{}.graphic_complete", e.name)), 0);
        }
        for e in &graphic {
            for stage in UpdateStage::GRAPHIC {
                assert_eq!(count(&journal, &format!("{}.rebuild({stage})", e.name)), 1);
            }
            assert_eq!(count(&journal, &format!("{}.graphic_complete", e.name)), 1);
        }
        assert_eq!(journal.borrow().len(), 3 * 4 + 2 * 3);
        assert_eq!(registry.layout_queue_len(), 0);
        assert_eq!(registry.graphic_queue_len(), 0);

        let stats = registry.last_stats();
        assert_eq!(stats.layout_elements, 3);
        assert_eq!(stats.graphic_elements, 2);
        assert_eq!(stats.layout_rebuilds, 9);
        assert_eq!(stats.graphic_rebuilds, 4);
        assert_eq!(stats.failures, 0);
        assert_eq!(stats.cleaned, 0);
    }

    #[test]
    fn graphic_queue_keeps_registration_order() {
        let journal = journal();
        let root = Node::new("root");
        let child = Node::new_child(&root, "child");
        let deep = Spy::new("deep", Some(child), &journal);
        let top = Spy::new("top", Some(root), &journal);

        let registry = UpdateRegistry::default();
        registry.register_for_graphic(&deep);
        registry.register_for_graphic(&top);
        registry.perform_update();

        assert_eq!(
            &journal.borrow()[..2],
            ["deep.rebuild(pre-render)", "top.rebuild(pre-render)"]
        );
    }

    #[test]
    fn destroyed_element_is_cleaned_with_completion() {
        let journal = journal();
        let doomed = Spy::new("doomed", None, &journal);
        let healthy = Spy::new("healthy", None, &journal);
        let registry = UpdateRegistry::default();
        registry.register_for_layout(&doomed);
        registry.register_for_graphic(&doomed);
        registry.register_for_layout(&healthy);

        doomed.destroyed.set(true);
        registry.perform_update();

        assert_eq!(count(&journal, "doomed.layout_complete"), 1);
        assert_eq!(count(&journal, "doomed.graphic_complete"), 1);
        assert!(
            !journal.borrow().iter().any(|e| e.starts_with("doomed.rebuild")),
            "destroyed elements are not rebuilt"
        );
        assert_eq!(count(&journal, "healthy.layout_complete"), 1);
        assert_eq!(registry.last_stats().cleaned, 2);
    }

    #[test]
    fn dropped_element_is_cleaned_silently() {
        let journal = journal();
        let registry = UpdateRegistry::default();
        {
            let gone = Spy::new("gone", None, &journal);
            registry.register_for_layout(&gone);
            registry.register_for_graphic(&gone);
        }
        let kept = Spy::new("kept", None, &journal);
        registry.register_for_layout(&kept);
        assert_eq!(registry.layout_queue_len(), 2);

        registry.perform_update();

        assert!(journal.borrow().iter().all(|e| e.starts_with("kept.")));
        assert_eq!(registry.last_stats().cleaned, 2);
        assert_eq!(registry.last_stats().layout_elements, 1);
    }

    #[test]
    fn element_destroyed_mid_phase_is_skipped_but_completed() {
        let journal = journal();
        let root = Node::new("root");
        let child = Node::new_child(&root, "child");
        let killer = Spy::new("killer", Some(root), &journal);
        let victim = Spy::new("victim", Some(child), &journal);
        {
            let victim = Rc::clone(&victim);
            killer.on_rebuild(move |stage| {
                if stage == UpdateStage::Layout {
                    victim.destroyed.set(true);
                }
            });
        }

        let registry = UpdateRegistry::default();
        registry.register_for_layout(&victim);
        registry.register_for_layout(&killer);
        registry.perform_update();

        assert_eq!(count(&journal, "victim.rebuild(prelayout)"), 1);
        assert_eq!(count(&journal, "victim.rebuild(layout)"), 0);
        assert_eq!(count(&journal, "victim.rebuild(post-layout)"), 0);
        assert_eq!(count(&journal, "victim.layout_complete"), 1);
    }

    #[test]
    fn failing_rebuild_does_not_stop_the_tick() {
        let journal = journal();
        let root = Node::new("Canvas");
        let label = Node::new_child(&root, "Label");
        let first = Spy::new("first", Some(root), &journal);
        let broken = Spy::new("broken", Some(label), &journal);
        let last = Spy::new("last", None, &journal);
        broken.fail_on.set(Some(UpdateStage::Prelayout));

        let registry = UpdateRegistry::default();
        let diagnostics = diagnosed(&registry);
        for e in [&first, &broken, &last] {
            registry.register_for_layout(e);
        }
        registry.perform_update();

        for stage in UpdateStage::LAYOUT {
            assert_eq!(count(&journal, &format!("last.rebuild({stage})")), 1);
            assert_eq!(count(&journal, &format!("broken.rebuild({stage})")), 1);
        }
        let diagnostics = diagnostics.borrow();
        assert_eq!(diagnostics.failures.len(), 1);
        let failure = &diagnostics.failures[0];
        assert_eq!(failure.stage, UpdateStage::Prelayout);
        assert_eq!(failure.path.as_deref(), Some("Canvas/Label"));
        assert_eq!(failure.tick_index, 0);
        assert_eq!(registry.last_stats().failures, 1);
    }

    #[test]
    fn graphic_registration_refused_during_graphic_phase() {
        let journal = journal();
        let registry = Rc::new(UpdateRegistry::default());
        let diagnostics = diagnosed(&registry);
        let painter = Spy::new("painter", Some(Node::new("Painter")), &journal);
        let late = Spy::new("late", None, &journal);
        let results = Rc::new(RefCell::new(Vec::new()));
        {
            let registry = Rc::clone(&registry);
            let late = Rc::clone(&late);
            let me = Rc::downgrade(&painter);
            let results = Rc::clone(&results);
            painter.on_rebuild(move |_| {
                let mut results = results.borrow_mut();
                results.push(registry.try_register_for_graphic(&late));
                results.push(registry.try_register_for_graphic(me.clone()));
            });
        }

        registry.register_for_graphic(&painter);
        registry.perform_update();

        assert_eq!(*results.borrow(), [false, false, false, false]);
        assert_eq!(count(&journal, "late.rebuild(pre-render)"), 0);
        assert_eq!(registry.graphic_queue_len(), 0);

        let diagnostics = diagnostics.borrow();
        assert_eq!(diagnostics.violations.len(), 4);
        assert!(
            diagnostics
                .violations
                .iter()
                .all(|v| v.kind == ViolationKind::GraphicRegistrationDuringGraphic)
        );
        assert_eq!(diagnostics.violations[1].path.as_deref(), Some("Painter"));
        // `late` has no node, so it is named by address.
        let late_name = ElementHandle::from(&late).describe();
        assert!(late_name.starts_with("0x"), "got: {late_name}");
        assert_eq!(diagnostics.violations[0].path, Some(late_name));
    }

    #[test]
    fn graphic_registration_during_layout_runs_same_tick() {
        let journal = journal();
        let registry = Rc::new(UpdateRegistry::default());
        let sizer = Spy::new("sizer", None, &journal);
        {
            let registry = Rc::clone(&registry);
            let me = Rc::downgrade(&sizer);
            sizer.on_rebuild(move |stage| {
                if stage == UpdateStage::PostLayout {
                    assert!(registry.try_register_for_graphic(me.clone()));
                }
            });
        }

        registry.register_for_layout(&sizer);
        registry.perform_update();

        assert_eq!(count(&journal, "sizer.rebuild(pre-render)"), 1);
        assert_eq!(count(&journal, "sizer.graphic_complete"), 1);
    }

    #[test]
    fn layout_registration_during_layout_joins_remaining_stages() {
        let journal = journal();
        let registry = Rc::new(UpdateRegistry::default());
        let parent = Spy::new("parent", None, &journal);
        let spawned = Spy::new("spawned", None, &journal);
        {
            let registry = Rc::clone(&registry);
            let spawned = Rc::clone(&spawned);
            parent.on_rebuild(move |stage| {
                if stage == UpdateStage::Layout {
                    registry.register_for_layout(&spawned);
                }
            });
        }

        registry.register_for_layout(&parent);
        registry.perform_update();

        assert_eq!(count(&journal, "spawned.rebuild(prelayout)"), 0);
        assert_eq!(count(&journal, "spawned.rebuild(layout)"), 1);
        assert_eq!(count(&journal, "spawned.rebuild(post-layout)"), 1);
        assert_eq!(count(&journal, "spawned.layout_complete"), 1);
        assert_eq!(registry.layout_queue_len(), 0);
    }

    #[test]
    fn phase_flags_are_visible_to_rebuilds() {
        let journal = journal();
        let registry = Rc::new(UpdateRegistry::default());
        let e = Spy::new("e", None, &journal);
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let registry = Rc::clone(&registry);
            let seen = Rc::clone(&seen);
            e.on_rebuild(move |stage| {
                seen.borrow_mut().push((
                    stage,
                    registry.is_rebuilding_layout(),
                    registry.is_rebuilding_graphic(),
                ));
            });
        }
        registry.register_for_layout(&e);
        registry.register_for_graphic(&e);
        assert!(!registry.is_rebuilding_layout());

        registry.perform_update();

        for (stage, layout, graphic) in seen.borrow().iter() {
            assert_eq!(*layout, stage.is_layout(), "{stage}");
            assert_eq!(*graphic, stage.is_graphic(), "{stage}");
        }
        assert_eq!(seen.borrow().len(), 5);
        assert!(!registry.is_rebuilding_layout());
        assert!(!registry.is_rebuilding_graphic());
    }

    #[test]
    fn unregister_outside_tick_completes_and_removes() {
        let journal = journal();
        let e = Spy::new("e", None, &journal);
        let registry = UpdateRegistry::default();
        registry.register_for_layout(&e);
        registry.register_for_graphic(&e);

        registry.unregister(&e);

        assert_eq!(registry.layout_queue_len(), 0);
        assert_eq!(registry.graphic_queue_len(), 0);
        assert_eq!(*journal.borrow(), vec!["e.layout_complete", "e.graphic_complete"]);
    }

    #[test]
    fn unregister_of_unqueued_element_still_completes() {
        let journal = journal();
        let e = Spy::new("e", None, &journal);
        let registry = UpdateRegistry::default();

        registry.unregister(&e);

        assert_eq!(*journal.borrow(), vec!["e.layout_complete", "e.graphic_complete"]);
    }

    #[test]
    fn unregister_during_layout_removes_only_from_graphic() {
        let journal = journal();
        let registry = Rc::new(UpdateRegistry::default());
        let diagnostics = diagnosed(&registry);
        let e = Spy::new("e", None, &journal);
        {
            let registry = Rc::clone(&registry);
            let me = Rc::downgrade(&e);
            e.on_rebuild(move |stage| {
                if stage == UpdateStage::Prelayout {
                    registry.unregister(me.clone());
                }
            });
        }
        registry.register_for_layout(&e);
        registry.register_for_graphic(&e);

        registry.perform_update();

        for stage in UpdateStage::LAYOUT {
            assert_eq!(count(&journal, &format!("e.rebuild({stage})")), 1);
        }
        assert_eq!(count(&journal, "e.rebuild(pre-render)"), 0);
        assert_eq!(count(&journal, "e.graphic_complete"), 1);

        let kinds: Vec<_> = diagnostics.borrow().violations.iter().map(|v| v.kind).collect();
        assert_eq!(kinds, [ViolationKind::UnregisterDuringLayout]);
    }

    #[test]
    fn unregister_during_graphic_is_refused() {
        let journal = journal();
        let registry = Rc::new(UpdateRegistry::default());
        let diagnostics = diagnosed(&registry);
        let e = Spy::new("e", None, &journal);
        {
            let registry = Rc::clone(&registry);
            let me = Rc::downgrade(&e);
            e.on_rebuild(move |stage| {
                if stage == UpdateStage::PreRender {
                    registry.unregister(me.clone());
                }
            });
        }
        registry.register_for_graphic(&e);

        registry.perform_update();

        assert_eq!(count(&journal, "e.rebuild(late-pre-render)"), 1);
        let kinds: Vec<_> = diagnostics.borrow().violations.iter().map(|v| v.kind).collect();
        assert_eq!(kinds, [ViolationKind::UnregisterDuringGraphic]);
    }

    #[test]
    fn reentrant_update_is_refused() {
        let journal = journal();
        let registry = Rc::new(UpdateRegistry::default());
        let diagnostics = diagnosed(&registry);
        let e = Spy::new("e", None, &journal);
        {
            let registry = Rc::clone(&registry);
            e.on_rebuild(move |stage| {
                if stage == UpdateStage::Layout {
                    registry.perform_update();
                }
            });
        }
        registry.register_for_layout(&e);

        registry.perform_update();

        assert_eq!(registry.tick_index(), 1);
        assert_eq!(count(&journal, "e.rebuild(layout)"), 1);
        let kinds: Vec<_> = diagnostics.borrow().violations.iter().map(|v| v.kind).collect();
        assert_eq!(kinds, [ViolationKind::ReentrantUpdate]);
    }

    #[test]
    fn cull_runs_once_between_phases() {
        let journal = journal();
        let registry = UpdateRegistry::default();
        let e = Spy::new("e", None, &journal);
        {
            let journal = Rc::clone(&journal);
            registry.set_culler(move || journal.borrow_mut().push("cull".to_string()));
        }
        registry.register_for_layout(&e);
        registry.register_for_graphic(&e);
        registry.perform_update();
        registry.perform_update();

        let journal = journal.borrow();
        let position = |entry: &str| journal.iter().position(|e| e == entry).unwrap();
        let cull_at = position("cull");
        let layout_done = position("e.layout_complete");
        let graphic_start = position("e.rebuild(pre-render)");
        assert!(cull_at > layout_done);
        assert!(cull_at < graphic_start);
        assert_eq!(journal.iter().filter(|e| *e == "cull").count(), 2);
    }

    #[test]
    fn empty_tick_still_culls_and_counts() {
        let culls = Rc::new(Cell::new(0));
        let registry = UpdateRegistry::default();
        {
            let culls = Rc::clone(&culls);
            registry.set_culler(move || culls.set(culls.get() + 1));
        }
        registry.perform_update();
        registry.perform_update();
        assert_eq!(culls.get(), 2);
        assert_eq!(registry.tick_index(), 2);
        assert_eq!(registry.last_stats(), UpdateStats::default());
    }

    #[test]
    fn attach_subscribes_exactly_once() {
        let journal = journal();
        let signal = TickSignal::new();
        let registry = Rc::new(UpdateRegistry::default());
        assert!(registry.attach(&signal));
        assert!(!registry.attach(&signal));
        assert_eq!(signal.listener_count(), 1);

        let e = Spy::new("e", None, &journal);
        registry.register_for_layout(&e);
        signal.emit();
        assert_eq!(registry.tick_index(), 1);
        assert_eq!(count(&journal, "e.layout_complete"), 1);

        assert!(registry.detach(&signal));
        assert!(!registry.detach(&signal));
        signal.emit();
        assert_eq!(registry.tick_index(), 1);
    }

    #[test]
    fn dropped_registry_leaves_signal_usable() {
        let signal = TickSignal::new();
        {
            let registry = Rc::new(UpdateRegistry::default());
            registry.attach(&signal);
        }
        signal.emit();
        assert_eq!(signal.emit_count(), 1);
    }

    #[test]
    fn replaced_sink_is_returned() {
        let registry = UpdateRegistry::default();
        let first = Rc::new(RefCell::new(Diagnostics::default()));
        drop(registry.set_trace_sink(Rc::clone(&first)));
        let previous = registry.set_trace_sink(NoopSink);
        drop(previous);
        assert_eq!(Rc::strong_count(&first), 1);
    }

    #[cfg(feature = "trace")]
    #[test]
    fn profiling_markers_bracket_the_tick() {
        #[derive(Default)]
        struct Markers(Vec<String>);

        impl TraceSink for Markers {
            fn on_update_begin(&mut self, e: &UpdateBeginEvent) {
                self.0.push(format!("update+{}", e.layout_queued));
            }
            fn on_update_end(&mut self, e: &UpdateEndEvent) {
                self.0.push(format!("update-{}", e.stats.layout_rebuilds));
            }
            fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
                self.0.push(format!("{}+", e.phase.name()));
            }
            fn on_phase_end(&mut self, e: &PhaseEndEvent) {
                self.0.push(format!("{}-", e.phase.name()));
            }
            fn on_stage_begin(&mut self, e: &StageBeginEvent) {
                self.0.push(format!("[{}", e.stage));
            }
            fn on_stage_end(&mut self, e: &StageEndEvent) {
                self.0.push(format!("{}]", e.stage));
            }
        }

        fn ticks() -> u64 {
            7
        }

        let journal = journal();
        let registry = UpdateRegistry::new(RegistryConfig::new().with_clock(ticks));
        let markers = Rc::new(RefCell::new(Markers::default()));
        registry.set_trace_sink(Rc::clone(&markers));
        let e = Spy::new("e", None, &journal);
        registry.register_for_layout(&e);
        registry.perform_update();

        assert_eq!(
            markers.borrow().0,
            vec![
                "update+1",
                "cleanup+",
                "cleanup-",
                "layout+",
                "[prelayout",
                "prelayout]",
                "[layout",
                "layout]",
                "[post-layout",
                "post-layout]",
                "layout-",
                "cull+",
                "cull-",
                "graphic+",
                "[pre-render",
                "pre-render]",
                "[late-pre-render",
                "late-pre-render]",
                "graphic-",
                "update-3",
            ]
        );
    }
}
