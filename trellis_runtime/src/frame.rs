//! Exception frames.
//!
//! One [`Frame`] exists per active `try` construct. A frame carries the
//! construct's progress through the handling protocol (its [`FrameState`]),
//! where control currently is inside it (its [`Scope`]), and the identity of
//! the exception it holds, if any.
//!
//! Frames live on the per-thread handler stack owned by the context
//! (`context` module); they are pushed at `try` entry and popped by the
//! teardown phase of the matching `finally`.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use trellis_core::class::Class;

/// User payload attached to a thrown exception.
///
/// Shared so a rethrow and a caught snapshot can alias the same data.
pub type ExcData = Arc<dyn Any + Send + Sync>;

// ============================================================================
// Frame State
// ============================================================================

/// Progress of a frame through the handling protocol.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FrameState {
    /// No exception has occurred in this frame.
    #[default]
    Empty = 0,

    /// An exception was raised and no `catch` has matched it yet.
    Pending = 1,

    /// A `catch` clause selected the exception.
    Caught = 2,
}

impl FrameState {
    /// Returns the raw u8 value.
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Creates from a raw u8 value.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Empty),
            1 => Some(Self::Pending),
            2 => Some(Self::Caught),
            _ => None,
        }
    }

    /// Returns a human-readable name.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Empty => "Empty",
            Self::Pending => "Pending",
            Self::Caught => "Caught",
        }
    }
}

impl fmt::Debug for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameState::{}", self.name())
    }
}

impl fmt::Display for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Scope
// ============================================================================

/// Which sub-block of a frame currently holds control.
///
/// `Outside` is never stored in a live frame; it is what [`crate::scope`]
/// reports when no frame is active at all.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum Scope {
    /// Outside any `try`.
    Outside = -1,

    /// Inside the engine's own scaffolding, between user blocks.
    Internal = 0,

    /// In the `try` block (across routine calls).
    Try = 1,

    /// In a `catch` block (across routine calls).
    Catch = 2,

    /// In the `finally` block (across routine calls).
    Finally = 3,
}

impl Scope {
    /// Returns the raw i8 value.
    #[inline]
    pub const fn as_i8(self) -> i8 {
        self as i8
    }

    /// Returns true if control is in one of the three user blocks.
    #[inline]
    pub const fn is_handling(self) -> bool {
        matches!(self, Self::Try | Self::Catch | Self::Finally)
    }

    /// Returns a human-readable name.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Outside => "Outside",
            Self::Internal => "Internal",
            Self::Try => "Try",
            Self::Catch => "Catch",
            Self::Finally => "Finally",
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scope::{}", self.name())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Frame
// ============================================================================

/// One activation of a `try` construct.
pub struct Frame {
    /// Protocol progress.
    pub(crate) state: FrameState,

    /// Where control currently is inside this frame.
    pub(crate) scope: Scope,

    /// Class of the occurred exception, if any.
    pub(crate) class: Option<&'static Class>,

    /// User data attached to the occurred exception.
    pub(crate) data: Option<ExcData>,

    /// Source file of the `throw`.
    pub(crate) file: &'static str,

    /// Source line of the `throw`.
    pub(crate) line: u32,

    /// Source file of the `try` construct, for the trace.
    pub(crate) try_file: &'static str,

    /// Source line of the `try` construct, for the trace.
    pub(crate) try_line: u32,
}

impl Frame {
    /// Creates a fresh frame for a `try` entered at the given source site.
    #[inline]
    pub(crate) fn new(try_file: &'static str, try_line: u32) -> Self {
        Self {
            state: FrameState::Empty,
            scope: Scope::Internal,
            class: None,
            data: None,
            file: "",
            line: 0,
            try_file,
            try_line,
        }
    }

    /// Records a raised exception's identity and marks the frame pending.
    ///
    /// Overwrites any previously-stored identity: a `throw` from a `catch`
    /// or `finally` overrules whatever was pending before it.
    #[inline]
    pub(crate) fn record(
        &mut self,
        class: &'static Class,
        data: Option<ExcData>,
        file: &'static str,
        line: u32,
    ) {
        self.class = Some(class);
        self.data = data;
        self.file = file;
        self.line = line;
        self.state = FrameState::Pending;
    }

    /// Returns the frame's protocol state.
    #[inline]
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Returns where control currently is inside this frame.
    #[inline]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Returns the source site of the `try` construct.
    #[inline]
    pub fn try_site(&self) -> (&'static str, u32) {
        (self.try_file, self.try_line)
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("state", &self.state)
            .field("scope", &self.scope)
            .field("class", &self.class.map(Class::name))
            .field("try_site", &format_args!("{}:{}", self.try_file, self.try_line))
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
