//! Authentication collaborator interface.
//!
//! # Responsibilities
//! - Define the user identity trait handlers and services see
//! - Define how an application resolves a request to a user
//! - Provide the default provider (resolves nobody)

use std::fmt;
use std::sync::Arc;

use crate::database::LazyDatabase;
use crate::downcast::AsAny;
use crate::http::ListenerContext;

/// An authenticated identity.
pub trait User: AsAny + fmt::Debug + Send + Sync {
    /// Stable key for this user. Rate limiting buckets by it.
    fn user_id(&self) -> String;
}

impl dyn User {
    pub fn downcast_ref<T: User + 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Resolves the user behind a request.
///
/// Called at most once per request; the result is memoized in the request
/// scope. The database is lazy, so providers that do not touch it never cause
/// a context to be opened.
pub trait AuthenticationProvider: Send + Sync {
    fn authenticate(&self, context: &ListenerContext, database: &LazyDatabase) -> Option<Arc<dyn User>>;
}

/// Provider used when the application configured none. Nobody is ever
/// authenticated, so endpoints requiring authentication answer 403.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAuthentication;

impl AuthenticationProvider for NoAuthentication {
    fn authenticate(&self, _context: &ListenerContext, _database: &LazyDatabase) -> Option<Arc<dyn User>> {
        None
    }
}
