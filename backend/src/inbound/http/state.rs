//! Shared HTTP adapter state.
//!
//! HTTP handlers accept this state via `actix_web::web::Data` so they only
//! depend on domain use-cases and remain testable without I/O.

use std::sync::Arc;

use crate::domain::UserService;
use crate::domain::ports::UserRepository;

/// Dependency bundle for HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    /// User use-cases.
    pub users: UserService,
}

impl HttpState {
    /// Bundle the use-cases handlers need.
    pub fn new(users: UserService) -> Self {
        Self { users }
    }

    /// State whose use-cases run over `repository`.
    pub fn from_repository(repository: Arc<dyn UserRepository>) -> Self {
        Self::new(UserService::new(repository))
    }
}
