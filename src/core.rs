//! Core abstractions shared by the search strategies.
//!
//! A search strategy works on a [`Function`] over a bounded [`Domain`] and is
//! driven step by step through the [`Optimizer`] interface. The penalty
//! objectives of the tuning problem implement [`Function`], the simplex and
//! swarm methods implement [`Optimizer`].

mod base;
mod domain;
mod function;
mod optimizer;

pub use base::*;
pub use domain::*;
pub use function::*;
pub use optimizer::*;
