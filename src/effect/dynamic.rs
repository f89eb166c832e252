//! Type-erased effects.
//!
//! Code that composes effects across a boundary where types are not known
//! statically (plugin tables, heterogeneous pipelines) can erase values to
//! [`Dynamic`] and functions to [`DynFn`]. Recovering the concrete type is
//! checked at run time and fails with [`ErrorKind::TypeMismatch`](crate::ErrorKind).

use std::any::{Any, type_name};
use std::sync::Arc;

use super::Effect;
use crate::error::{Error, Result};

/// A value with its type erased.
pub type Dynamic = Box<dyn Any + Send + 'static>;

/// A function over erased values. Fails when the argument has the wrong type.
pub type DynFn = Box<dyn FnOnce(Dynamic) -> Result<Dynamic> + Send + 'static>;

/// Erases a typed function into a [`DynFn`].
pub fn erase_fn<A, B, F>(f: F) -> DynFn
where
    A: Send + 'static,
    B: Send + 'static,
    F: FnOnce(A) -> B + Send + 'static,
{
    Box::new(move |arg: Dynamic| {
        let arg = downcast_value::<A>(arg)?;
        Ok(Box::new(f(arg)) as Dynamic)
    })
}

fn downcast_value<T: 'static>(value: Dynamic) -> Result<T> {
    value
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| Error::type_mismatch(type_name::<T>()))
}

impl<A: Send + 'static> Effect<A> {
    /// Erases the value type.
    #[must_use]
    pub fn erase(&self) -> Effect<Dynamic> {
        self.map(|a| Box::new(a) as Dynamic)
    }
}

impl Effect<Dynamic> {
    /// Recovers the concrete value type, failing with a type mismatch.
    #[must_use]
    pub fn downcast<T: Send + 'static>(&self) -> Effect<T> {
        let this = self.clone();
        Effect::from_thunk(Arc::new(move || downcast_value::<T>(this.run()?)))
    }

    /// Applies an erased function to an erased argument.
    ///
    /// The receiver must produce a [`DynFn`]; anything else, or an argument
    /// the function cannot accept, fails with a type mismatch.
    #[must_use]
    pub fn apply_dyn(&self, arg: &Self) -> Self {
        let this = self.clone();
        let arg = arg.clone();
        Effect::from_thunk(Arc::new(move || {
            let f = downcast_value::<DynFn>(this.run()?)?;
            f(arg.run()?)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn erased_increment() -> Effect<Dynamic> {
        Effect::of(|| Box::new(erase_fn(|x: i32| x + 1)) as Dynamic)
    }

    #[test]
    fn erase_and_downcast_preserve_value() {
        let value = Effect::of(|| 41_i32).erase().downcast::<i32>();
        assert_eq!(value.run().unwrap(), 41);
    }

    #[test]
    fn downcast_to_wrong_type_is_mismatch() {
        let err = Effect::of(|| 41_i32).erase().downcast::<String>().run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(err.message().contains("String"));
    }

    #[test]
    fn apply_dyn_calls_erased_function() {
        let out = erased_increment()
            .apply_dyn(&Effect::of(|| 1_i32).erase())
            .downcast::<i32>();
        assert_eq!(out.run().unwrap(), 2);
    }

    #[test]
    fn apply_dyn_rejects_non_function() {
        let not_a_fn = Effect::of(|| "text").erase();
        let err = not_a_fn.apply_dyn(&Effect::of(|| 1_i32).erase()).run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn apply_dyn_rejects_wrong_argument() {
        let err = erased_increment()
            .apply_dyn(&Effect::of(|| "one").erase())
            .run()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(err.message().contains("i32"));
    }
}
