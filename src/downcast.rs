//! Downcasting support for collaborator trait objects.

use std::any::Any;

/// Implemented for every `'static` type; lets trait objects expose `&dyn Any`.
///
/// Call it on `&dyn Trait`, not on an `Arc<dyn Trait>`, or the `Arc` itself is
/// what gets erased.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}
