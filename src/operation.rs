//! Callable operations.
//!
//! Every operation, primitive or composite, is a value constructed once by
//! [`Runtime::resolve`] with its dependencies already resolved and stored
//! in its fields. Nothing is looked up while the body executes:
//!
//! ```text
//!   resolve::<O>() ──→ O::init(runtime) ──→ resolve::<Dep>() ...
//!                                  │
//!   run::<O>(input) / op.apply(input) ──→ O::body(input)
//! ```
//!
//! Measurement-conditioned branching is ordinary `if` on the returned
//! [`Outcome`](crate::Outcome); loops and locals are plain Rust.
//!
//! The input type is generic over a lifetime so that operations can borrow
//! qubit handles from their caller for the duration of the call.

use crate::error::RuntimeResult;
use crate::runtime::Runtime;

/// Naming for anything the runtime can resolve.
pub trait Callable {
    /// Short name, e.g. `"Set"`.
    const NAME: &'static str;
    /// Namespaced name, used as the registry key.
    const FULL_NAME: &'static str;
}

/// A routine with a typed input and output that issues quantum effects
/// through its resolved dependencies.
pub trait Operation: Callable + Sized {
    /// Input tuple. May borrow qubit handles for `'q`.
    type Input<'q>;
    /// Output tuple.
    type Output;

    /// Resolve dependencies. Called once, by [`Runtime::resolve`].
    fn init(runtime: &Runtime) -> RuntimeResult<Self>;

    /// The routine itself.
    fn body(&self, input: Self::Input<'_>) -> RuntimeResult<Self::Output>;

    /// Nested invocation from another operation's body.
    fn apply(&self, input: Self::Input<'_>) -> RuntimeResult<Self::Output> {
        let _span = tracing::trace_span!("apply", operation = Self::NAME).entered();
        self.body(input)
    }
}
