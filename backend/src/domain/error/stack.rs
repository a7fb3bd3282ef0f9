//! Call-stack snapshots attached to errors at creation.
//!
//! Frame order is a single process-wide setting applied when the snapshot is
//! taken, so every error created after [`set_stack_trace_order`] shares the
//! same orientation regardless of where it is later rendered.

use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};

use backtrace::Backtrace;

/// Upper bound on frames kept per error.
const MAX_FRAMES: usize = 32;

/// Frames whose symbol starts with one of these belong to the capture
/// machinery and are dropped from the top of the snapshot.
const INTERNAL_PREFIXES: &[&str] = &["backtrace::", "users_api::domain::error::"];

static ORDER: AtomicU8 = AtomicU8::new(StackTraceOrder::NewestFirst as u8);

/// Display order for captured frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum StackTraceOrder {
    /// Innermost call first.
    #[default]
    NewestFirst = 0,
    /// Outermost call first.
    OldestFirst = 1,
}

/// Set the frame order used by every error created from now on.
pub fn set_stack_trace_order(order: StackTraceOrder) {
    ORDER.store(order as u8, Ordering::Relaxed);
}

/// Frame order currently applied to new errors.
#[must_use]
pub fn stack_trace_order() -> StackTraceOrder {
    match ORDER.load(Ordering::Relaxed) {
        1 => StackTraceOrder::OldestFirst,
        _ => StackTraceOrder::NewestFirst,
    }
}

/// One resolved frame of a call-stack snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Demangled function path without the trailing hash.
    pub function: String,
    /// Source file, when debug info is available.
    pub file: Option<String>,
    /// Source line, when debug info is available.
    pub line: Option<u32>,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{} ({file}:{line})", self.function),
            (Some(file), None) => write!(f, "{} ({file})", self.function),
            _ => f.write_str(&self.function),
        }
    }
}

/// Unresolved call stack taken when an error is created.
///
/// Only instruction pointers are recorded up front. Symbols are resolved the
/// first time [`StackSnapshot::frames`] is called, so errors whose stack is
/// never logged stay cheap.
pub(crate) struct StackSnapshot {
    trace: Backtrace,
    order: StackTraceOrder,
    resolved: OnceLock<Vec<StackFrame>>,
}

impl StackSnapshot {
    /// Record the current call stack under the given display order.
    pub(crate) fn capture(order: StackTraceOrder) -> Self {
        Self {
            trace: Backtrace::new_unresolved(),
            order,
            resolved: OnceLock::new(),
        }
    }

    /// Frames in the order in force at capture time, resolved on first use.
    pub(crate) fn frames(&self) -> &[StackFrame] {
        self.resolved.get_or_init(|| {
            let mut trace = self.trace.clone();
            trace.resolve();
            resolve_frames(&trace, self.order)
        })
    }

    /// Whether symbols have been looked up yet.
    #[cfg(test)]
    fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }
}

impl fmt::Debug for StackSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackSnapshot")
            .field("order", &self.order)
            .field("resolved", &self.resolved.get().is_some())
            .finish_non_exhaustive()
    }
}

fn resolve_frames(trace: &Backtrace, order: StackTraceOrder) -> Vec<StackFrame> {
    let mut frames: Vec<StackFrame> = trace
        .frames()
        .iter()
        .flat_map(|frame| frame.symbols())
        .map(|symbol| StackFrame {
            function: symbol
                .name()
                .map_or_else(|| "<unknown>".to_owned(), |name| format!("{name:#}")),
            file: symbol.filename().map(|path| path.display().to_string()),
            line: symbol.lineno(),
        })
        .skip_while(|frame| {
            INTERNAL_PREFIXES
                .iter()
                .any(|prefix| frame.function.starts_with(prefix))
        })
        .take(MAX_FRAMES)
        .collect();

    if order == StackTraceOrder::OldestFirst {
        frames.reverse();
    }
    frames
}
