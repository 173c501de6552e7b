// Copyright 2026 the Reflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Update stages and tick phases.
//!
//! A tick drives queued elements through five [`UpdateStage`]s. The first
//! three form the *layout group* and run over the layout queue in tree-depth
//! order; the last two form the *graphic group* and run over the graphic
//! queue in registration order. The partition is fixed.

use core::fmt;

/// One discrete step of a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UpdateStage {
    /// Before layout: collect sizes, invalidate caches.
    Prelayout,
    /// Layout proper.
    Layout,
    /// After layout: react to final geometry.
    PostLayout,
    /// Before rendering: regenerate meshes, materials.
    PreRender,
    /// After every `PreRender` rebuild has run.
    LatePreRender,
}

impl UpdateStage {
    /// Stages run over the layout queue, in order.
    pub const LAYOUT: [Self; 3] = [Self::Prelayout, Self::Layout, Self::PostLayout];

    /// Stages run over the graphic queue, in order.
    pub const GRAPHIC: [Self; 2] = [Self::PreRender, Self::LatePreRender];

    /// All stages in tick order.
    pub const ALL: [Self; 5] = [
        Self::Prelayout,
        Self::Layout,
        Self::PostLayout,
        Self::PreRender,
        Self::LatePreRender,
    ];

    /// Returns the zero-based position of the stage within a tick.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::Prelayout => 0,
            Self::Layout => 1,
            Self::PostLayout => 2,
            Self::PreRender => 3,
            Self::LatePreRender => 4,
        }
    }

    /// Inverse of [`index`](Self::index).
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Prelayout),
            1 => Some(Self::Layout),
            2 => Some(Self::PostLayout),
            3 => Some(Self::PreRender),
            4 => Some(Self::LatePreRender),
            _ => None,
        }
    }

    /// Returns whether the stage belongs to the layout group.
    #[inline]
    #[must_use]
    pub const fn is_layout(self) -> bool {
        matches!(self, Self::Prelayout | Self::Layout | Self::PostLayout)
    }

    /// Returns whether the stage belongs to the graphic group.
    #[inline]
    #[must_use]
    pub const fn is_graphic(self) -> bool {
        !self.is_layout()
    }

    /// Returns a short lowercase name, used by diagnostics sinks.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Prelayout => "prelayout",
            Self::Layout => "layout",
            Self::PostLayout => "post-layout",
            Self::PreRender => "pre-render",
            Self::LatePreRender => "late-pre-render",
        }
    }
}

impl fmt::Display for UpdateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which part of [`perform_update`](crate::registry::UpdateRegistry::perform_update)
/// is running. Used for profiling markers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// Purging null and destroyed queue entries.
    Cleanup,
    /// Layout-group stages over the layout queue.
    Layout,
    /// The clipping pass between the two groups.
    Cull,
    /// Graphic-group stages over the graphic queue.
    Graphic,
}

impl PhaseKind {
    /// Phases in the order a tick runs them.
    pub const ALL: [Self; 4] = [Self::Cleanup, Self::Layout, Self::Cull, Self::Graphic];

    /// Returns a short lowercase name, used by diagnostics sinks.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Cleanup => "cleanup",
            Self::Layout => "layout",
            Self::Cull => "cull",
            Self::Graphic => "graphic",
        }
    }

    /// Returns the zero-based position of the phase within a tick.
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::Cleanup => 0,
            Self::Layout => 1,
            Self::Cull => 2,
            Self::Graphic => 3,
        }
    }

    /// Inverse of [`index`](Self::index).
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Cleanup),
            1 => Some(Self::Layout),
            2 => Some(Self::Cull),
            3 => Some(Self::Graphic),
            _ => None,
        }
    }
}
