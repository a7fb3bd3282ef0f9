//! Typed request-facing error built from the [`ErrorKind`] registry.
//!
//! A [`CustomError`] is created where the failure happens, optionally
//! decorated through its builder methods, and then passed up unchanged.
//! Handler layers may add checkpoints for observability; they never change
//! the kind. Only the kind's default message is ever shown to clients, the
//! cause and override messages stay in logs.

mod kind;
mod stack;

use std::error::Error as StdError;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

pub use kind::{ErrorKind, KindDescriptor, RegistryError, verify_registry};
pub use stack::{StackFrame, StackTraceOrder, set_stack_trace_order, stack_trace_order};

type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// Context note recorded by a layer that passed the error on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// Free-form description of what the layer was doing.
    pub message: String,
    /// Where the checkpoint was added.
    pub location: &'static Location<'static>,
}

#[derive(Clone)]
struct Inner {
    kind: ErrorKind,
    message: Option<String>,
    cause: Option<Cause>,
    location: &'static Location<'static>,
    stack: Arc<stack::StackSnapshot>,
    checkpoints: Vec<Checkpoint>,
}

/// Error instance of an [`ErrorKind`].
///
/// Cloning is cheap; clones share the captured stack and cause.
///
/// # Examples
/// ```
/// use std::error::Error as _;
/// use users_api::domain::ErrorKind;
///
/// let io = std::io::Error::other("socket closed");
/// let err = ErrorKind::DbConnection
///     .new()
///     .with_cause(io)
///     .append_message(format_args!("pool {}", "primary"));
///
/// assert_eq!(err.code(), "DB_CONNECTION");
/// assert_eq!(err.detail(), "failed to establish database connection");
/// assert_eq!(err.message(), "pool primary");
/// assert!(err.source().is_some());
/// ```
#[derive(Clone)]
pub struct CustomError {
    inner: Arc<Inner>,
}

impl CustomError {
    #[track_caller]
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self {
            inner: Arc::new(Inner {
                kind,
                message: None,
                cause: None,
                location: Location::caller(),
                stack: Arc::new(stack::StackSnapshot::capture(stack_trace_order())),
                checkpoints: Vec::new(),
            }),
        }
    }

    /// Attach the error that caused this one.
    #[must_use]
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.inner).cause = Some(Arc::new(cause));
        self
    }

    /// Replace the internal message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).message = Some(message.into());
        self
    }

    /// Append formatted text to the internal message, separated by `"; "`.
    #[must_use]
    pub fn append_message(mut self, args: fmt::Arguments<'_>) -> Self {
        let inner = Arc::make_mut(&mut self.inner);
        let text = args.to_string();
        inner.message = Some(match inner.message.take() {
            Some(existing) => format!("{existing}; {text}"),
            None => text,
        });
        self
    }

    /// Record that a layer handled this error on its way out.
    ///
    /// The kind, cause and stack are carried over untouched.
    #[must_use]
    #[track_caller]
    pub fn checkpoint(mut self, message: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.inner).checkpoints.push(Checkpoint {
            message: message.into(),
            location: Location::caller(),
        });
        self
    }

    /// Category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        self.inner.kind.code()
    }

    /// Client-safe detail, always the kind's default message.
    #[must_use]
    pub fn detail(&self) -> &'static str {
        self.inner.kind.message()
    }

    /// Internal message: the override if set, otherwise the detail.
    #[must_use]
    pub fn message(&self) -> &str {
        self.inner.message.as_deref().unwrap_or_else(|| self.detail())
    }

    /// Source location where the error was created.
    #[must_use]
    pub fn location(&self) -> &'static Location<'static> {
        self.inner.location
    }

    /// Frames captured at creation, in the order configured at that time.
    ///
    /// Symbols are looked up on the first call and cached for every clone.
    #[must_use]
    pub fn stack(&self) -> &[StackFrame] {
        self.inner.stack.frames()
    }

    /// Checkpoints added by handler layers, oldest first.
    #[must_use]
    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.inner.checkpoints
    }

    /// Search the cause chain for an error of type `T`.
    #[must_use]
    pub fn find_cause<T>(&self) -> Option<&T>
    where
        T: StdError + 'static,
    {
        let mut current = self.source();
        while let Some(err) = current {
            if let Some(found) = err.downcast_ref::<T>() {
                return Some(found);
            }
            current = err.source();
        }
        None
    }

    /// Render the cause chain as `outer: inner: ...` for logs.
    #[must_use]
    pub fn cause_chain(&self) -> String {
        let mut parts = Vec::new();
        let mut current = self.source();
        while let Some(err) = current {
            parts.push(err.to_string());
            current = err.source();
        }
        parts.join(": ")
    }
}

impl fmt::Display for CustomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl fmt::Debug for CustomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomError")
            .field("kind", &self.inner.kind)
            .field("message", &self.inner.message)
            .field("cause", &self.inner.cause)
            .field("location", &self.inner.location)
            .field("checkpoints", &self.inner.checkpoints)
            .finish_non_exhaustive()
    }
}

impl StdError for CustomError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner
            .cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

impl From<ErrorKind> for CustomError {
    #[track_caller]
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}
