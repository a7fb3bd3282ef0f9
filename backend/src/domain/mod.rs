//! Domain primitives, use-cases and ports.
//!
//! Public surface:
//! - [`ErrorKind`] and [`CustomError`]: the closed error taxonomy.
//! - [`User`], [`UserId`], [`UserDraft`]: the user entity.
//! - [`UserService`]: CRUD use-cases over the [`ports::UserRepository`] port.
//! - [`TraceId`]: request correlation identifier.

pub mod error;
pub mod ports;
pub mod trace_id;
pub mod user;
pub mod user_service;

pub use self::error::{
    Checkpoint, CustomError, ErrorKind, RegistryError, StackFrame, StackTraceOrder,
    set_stack_trace_order, stack_trace_order, verify_registry,
};
pub use self::trace_id::TraceId;
pub use self::user::{User, UserDraft, UserId};
pub use self::user_service::UserService;

/// Header carrying the trace identifier on every response.
pub const TRACE_ID_HEADER: &str = "trace-id";
