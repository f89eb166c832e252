//! Functor, applicative and monad combinators.
//!
//! Every combinator closes over a clone of its receiver and returns a new
//! effect. Nothing executes until the result is run.

use std::sync::Arc;

use super::Effect;

/// A partially applied binary function, produced while currying `map2`.
type Curried<B, C> = Box<dyn FnOnce(B) -> C + Send + 'static>;

impl<A: Send + 'static> Effect<A> {
    /// Runs the receiver, then applies `f` to its value.
    #[must_use]
    pub fn map<B, F>(&self, f: F) -> Effect<B>
    where
        B: Send + 'static,
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        let this = self.clone();
        Effect::from_thunk(Arc::new(move || this.run().map(&f)))
    }

    /// Runs the receiver, passes its value to `f`, then runs the returned effect.
    #[must_use]
    pub fn flat_map<B, F>(&self, f: F) -> Effect<B>
    where
        B: Send + 'static,
        F: Fn(A) -> Effect<B> + Send + Sync + 'static,
    {
        let this = self.clone();
        Effect::from_thunk(Arc::new(move || f(this.run()?).run()))
    }

    /// Combines this effect's value with `other`'s through `f`.
    ///
    /// Built on [`apply`](Effect::apply): the receiver is mapped to a curried
    /// function which is then applied to `other`. The receiver runs first.
    #[must_use]
    pub fn map2<B, C, F>(&self, other: &Effect<B>, f: F) -> Effect<C>
    where
        B: Send + 'static,
        C: Send + 'static,
        F: Fn(A, B) -> C + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.map(move |a| {
            let f = Arc::clone(&f);
            Box::new(move |b| f(a, b)) as Curried<B, C>
        })
        .apply(other)
    }

    /// Turns a plain function into one over effects.
    ///
    /// ```
    /// use ioeffect::Effect;
    ///
    /// let double = Effect::lift(|x: i32| x * 2);
    /// assert_eq!(double(&Effect::pure(4)).run().unwrap(), 8);
    /// ```
    pub fn lift<B, F>(f: F) -> impl Fn(&Self) -> Effect<B>
    where
        B: Send + 'static,
        F: Fn(A) -> B + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        move |effect: &Self| {
            let f = Arc::clone(&f);
            effect.map(move |a| f(a))
        }
    }

    /// Runs the receiver and replaces its value with `value`.
    #[must_use]
    pub fn as_value<B>(&self, value: B) -> Effect<B>
    where
        B: Clone + Send + Sync + 'static,
    {
        self.map(move |_| value.clone())
    }

    /// Runs the receiver and discards its value.
    #[must_use]
    pub fn void(&self) -> Effect<()> {
        self.map(|_| ())
    }

    /// Pairs the value with `f` applied to it.
    #[must_use]
    pub fn zip_with<B, F>(&self, f: F) -> Effect<(A, B)>
    where
        B: Send + 'static,
        F: Fn(&A) -> B + Send + Sync + 'static,
    {
        self.map(move |a| {
            let b = f(&a);
            (a, b)
        })
    }
}

impl<A: Send + 'static> Effect<Effect<A>> {
    /// Runs the outer effect, then the effect it produced.
    #[must_use]
    pub fn flatten(&self) -> Effect<A> {
        self.flat_map(|inner| inner)
    }
}

impl<F: Send + 'static> Effect<F> {
    /// Applies the function this effect produces to the value `arg` produces.
    ///
    /// The function effect runs before the argument effect.
    #[must_use]
    pub fn apply<A, B>(&self, arg: &Effect<A>) -> Effect<B>
    where
        F: FnOnce(A) -> B,
        A: Send + 'static,
        B: Send + 'static,
    {
        let this = self.clone();
        let arg = arg.clone();
        Effect::from_thunk(Arc::new(move || {
            let f = this.run()?;
            let a = arg.run()?;
            Ok(f(a))
        }))
    }
}
