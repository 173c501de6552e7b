// Copyright 2026 the Reflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated render loop that exercises the registry and the diagnostics
//! pipeline.
//!
//! Builds a small widget tree, marks widgets dirty between ticks, and drives
//! the registry through a [`TickSignal`]. Events go to both a
//! [`PrettyPrintSink`](reflow_debug::pretty::PrettyPrintSink) and a
//! [`RecorderSink`](reflow_debug::recorder::RecorderSink); the recording is
//! exported as a Chrome trace JSON file at the end.

use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::BufWriter;
use std::rc::{Rc, Weak};
use std::sync::OnceLock;
use std::time::Instant;

use reflow_core::element::{CanvasElement, RebuildError};
use reflow_core::node::Node;
use reflow_core::registry::{RegistryConfig, UpdateRegistry};
use reflow_core::stage::UpdateStage;
use reflow_core::tick::TickSignal;

use reflow_debug::pretty::PrettyPrintSink;
use reflow_debug::recorder::RecorderSink;

const TICK_COUNT: u64 = 6;
/// Tick on which the label cannot find its font.
const FONT_MISSING_TICK: u64 = 2;
/// Tick before which the badge is torn down.
const BADGE_TEARDOWN_TICK: u64 = 4;

fn monotonic_nanos() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    let elapsed = START.get_or_init(Instant::now).elapsed();
    u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX)
}

/// How a widget behaves when rebuilt.
#[derive(Clone, Copy, Debug)]
enum Kind {
    /// Lays out children; no visuals of its own.
    Panel,
    /// Needs a font during layout.
    Label,
    /// Schedules its own graphic rebuild once its size is known.
    Image,
}

struct Widget {
    kind: Kind,
    node: Rc<Node>,
    registry: Weak<UpdateRegistry>,
    me: Weak<Self>,
    destroyed: Cell<bool>,
    layouts: Cell<u32>,
    paints: Cell<u32>,
}

impl Widget {
    fn new(kind: Kind, node: Rc<Node>, registry: &Rc<UpdateRegistry>) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            kind,
            node,
            registry: Rc::downgrade(registry),
            me: me.clone(),
            destroyed: Cell::new(false),
            layouts: Cell::new(0),
            paints: Cell::new(0),
        })
    }

    fn set_dirty(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.register_for_layout(self.me.clone());
            if matches!(self.kind, Kind::Label) {
                registry.register_for_graphic(self.me.clone());
            }
        }
    }
}

impl CanvasElement for Widget {
    fn rebuild(&self, stage: UpdateStage) -> Result<(), RebuildError> {
        let Some(registry) = self.registry.upgrade() else {
            return Ok(());
        };
        match (self.kind, stage) {
            (Kind::Label, UpdateStage::Layout)
                if registry.tick_index() == FONT_MISSING_TICK =>
            {
                return Err(RebuildError::MissingDependency {
                    what: "font \"Inter\"".into(),
                });
            }
            (Kind::Image, UpdateStage::PostLayout) => {
                registry.register_for_graphic(self.me.clone());
            }
            _ => {}
        }
        if stage.is_layout() {
            self.layouts.set(self.layouts.get() + 1);
        } else {
            self.paints.set(self.paints.get() + 1);
        }
        Ok(())
    }

    fn node(&self) -> Option<Rc<Node>> {
        Some(Rc::clone(&self.node))
    }

    fn layout_complete(&self) {}

    fn graphic_update_complete(&self) {}

    fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }
}

fn main() {
    // -- sinks -------------------------------------------------------------
    let pretty = PrettyPrintSink::new(Box::new(std::io::stdout()));
    let recorder = Rc::new(RefCell::new(RecorderSink::new()));

    // -- registry ----------------------------------------------------------
    let config = RegistryConfig::new().with_clock(monotonic_nanos);
    let registry = Rc::new(UpdateRegistry::new(config));
    registry.set_trace_sink((pretty, Rc::clone(&recorder)));
    let culls = Rc::new(Cell::new(0_u32));
    {
        let culls = Rc::clone(&culls);
        registry.set_culler(move || culls.set(culls.get() + 1));
    }

    let will_render = TickSignal::new();
    registry.attach(&will_render);

    // -- tree --------------------------------------------------------------
    let canvas = Node::new("Canvas");
    let toolbar = Node::new_child(&canvas, "Toolbar");
    let panel = Widget::new(Kind::Panel, Rc::clone(&toolbar), &registry);
    let title = Widget::new(Kind::Label, Node::new_child(&toolbar, "Title"), &registry);
    let icon = Widget::new(Kind::Image, Node::new_child(&toolbar, "Icon"), &registry);
    let badge = Widget::new(Kind::Image, Node::new_child(&canvas, "Badge"), &registry);
    let widgets = [&panel, &title, &icon, &badge];

    // -- simulated loop ----------------------------------------------------
    for tick in 0..TICK_COUNT {
        // Dirty the deepest widgets first; the registry reorders by depth.
        for widget in widgets.iter().rev() {
            if tick == 0 || tick % 2 == 1 {
                widget.set_dirty();
            }
        }
        if tick == FONT_MISSING_TICK {
            title.set_dirty();
        }
        if tick == BADGE_TEARDOWN_TICK {
            badge.set_dirty();
            badge.destroyed.set(true);
        }

        will_render.emit();
    }

    for widget in widgets {
        println!(
            "{:<16} layouts={} paints={}",
            widget.node.path(),
            widget.layouts.get(),
            widget.paints.get(),
        );
    }
    println!("culls={} ticks={}", culls.get(), registry.tick_index());

    // -- export Chrome trace -----------------------------------------------
    let path = "trace.json";
    let file = File::create(path).expect("failed to create trace.json");
    let mut writer = BufWriter::new(file);
    reflow_debug::chrome::export(recorder.borrow().as_bytes(), &mut writer)
        .expect("failed to write Chrome trace");

    println!("Wrote {path} ({TICK_COUNT} ticks)");
}
