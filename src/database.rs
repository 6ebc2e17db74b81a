//! Persistence collaborator interface.
//!
//! The server never talks to a store itself. It asks the configured
//! [`DatabaseProvider`] for a context only when a request actually needs one,
//! and closes that context when the request ends.

use std::cell::OnceCell;
use std::fmt;
use std::sync::Arc;

use crate::downcast::AsAny;
use crate::pipeline::EndpointError;

/// A per-request handle to the application's store.
pub trait DatabaseContext: AsAny + Send + Sync {
    /// Release the handle. Called once, at the end of the request.
    fn close(&self) {}
}

impl dyn DatabaseContext {
    pub fn downcast_ref<T: DatabaseContext + 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Opens per-request database contexts.
pub trait DatabaseProvider: Send + Sync {
    /// Called once at server startup.
    fn initialize(&self) -> Result<(), EndpointError> {
        Ok(())
    }

    fn open_context(&self) -> Arc<dyn DatabaseContext>;
}

/// Provider used when the application configured none.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDatabaseProvider;

/// Context handed out by [`NullDatabaseProvider`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDatabaseContext;

impl DatabaseContext for NullDatabaseContext {}

impl DatabaseProvider for NullDatabaseProvider {
    fn open_context(&self) -> Arc<dyn DatabaseContext> {
        Arc::new(NullDatabaseContext)
    }
}

/// A database context opened on first use.
pub struct LazyDatabase {
    provider: Arc<dyn DatabaseProvider>,
    context: OnceCell<Arc<dyn DatabaseContext>>,
}

impl LazyDatabase {
    pub fn new(provider: Arc<dyn DatabaseProvider>) -> Self {
        Self {
            provider,
            context: OnceCell::new(),
        }
    }

    /// The context, opening it if this is the first access.
    pub fn get(&self) -> &Arc<dyn DatabaseContext> {
        self.context.get_or_init(|| self.provider.open_context())
    }

    pub fn is_materialized(&self) -> bool {
        self.context.get().is_some()
    }

    /// Close the context if it was ever opened.
    pub fn close(self) {
        if let Some(context) = self.context.into_inner() {
            context.close();
        }
    }
}

impl fmt::Debug for LazyDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyDatabase")
            .field("materialized", &self.is_materialized())
            .finish()
    }
}
