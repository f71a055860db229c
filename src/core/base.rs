use super::domain::Domain;

/// The base trait for [`Function`](super::function::Function).
///
/// A problem knows the domain (bound constraints) of its variables. All
/// variables tuned in this crate are bounded, so there is no unconstrained
/// default.
pub trait Problem {
    /// Get the domain (bound constraints) of the problem.
    fn domain(&self) -> Domain;
}

impl<P: Problem + ?Sized> Problem for &P {
    fn domain(&self) -> Domain {
        (**self).domain()
    }
}
