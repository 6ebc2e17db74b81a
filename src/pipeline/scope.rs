//! Per-request resources shared by middlewares, services and binding.

use std::cell::OnceCell;
use std::fmt;
use std::sync::Arc;

use crate::database::{DatabaseProvider, LazyDatabase};
use crate::http::ListenerContext;
use crate::security::{AuthenticationProvider, User};

/// Lazily opened database and memoized user for one request.
///
/// Lives for exactly one pass through the pipeline; [`RequestScope::finish`]
/// closes the database context if anything opened it.
pub struct RequestScope {
    database: LazyDatabase,
    authentication: Arc<dyn AuthenticationProvider>,
    user: OnceCell<Option<Arc<dyn User>>>,
}

impl RequestScope {
    pub fn new(
        database: Arc<dyn DatabaseProvider>,
        authentication: Arc<dyn AuthenticationProvider>,
    ) -> Self {
        Self {
            database: LazyDatabase::new(database),
            authentication,
            user: OnceCell::new(),
        }
    }

    pub fn database(&self) -> &LazyDatabase {
        &self.database
    }

    /// The user behind this request. Authentication runs on first call only.
    pub fn user(&self, context: &ListenerContext) -> Option<Arc<dyn User>> {
        self.user
            .get_or_init(|| self.authentication.authenticate(context, &self.database))
            .clone()
    }

    pub(crate) fn finish(self) {
        self.database.close();
    }
}

impl fmt::Debug for RequestScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestScope")
            .field("database", &self.database)
            .field("user", &self.user.get())
            .finish_non_exhaustive()
    }
}
