use nalgebra::{storage::StorageMut, Dyn, IsContiguous, Vector};

use super::{domain::Domain, function::Function};

/// Common interface for all optimizers.
///
/// The essential method is [`opt_next`](Optimizer::opt_next) which takes
/// variables *x* and computes the next step. Thus it represents one iteration
/// in the process. Repeated calls to this method should move *x* towards the
/// minimum in successful cases.
///
/// ## Implementing an optimizer
///
/// Here is an implementation of a random optimizer which samples the domain
/// in a hope that it eventually hits the minimum with enough luck.
///
/// ```rust
/// use viscotune::nalgebra as na;
/// use viscotune::{Domain, Function, Optimizer};
/// use na::{storage::StorageMut, Dyn, IsContiguous, Vector};
/// use rand::Rng;
///
/// struct Random<R> {
///     rng: R,
/// }
///
/// impl<F: Function, R: Rng> Optimizer<F> for Random<R> {
///     const NAME: &'static str = "Random";
///     type Error = std::convert::Infallible;
///
///     fn opt_next<Sx>(
///         &mut self,
///         f: &F,
///         dom: &Domain,
///         x: &mut Vector<f64, Dyn, Sx>,
///     ) -> Result<f64, Self::Error>
///     where
///         Sx: StorageMut<f64, Dyn> + IsContiguous,
///     {
///         dom.sample(x, &mut self.rng);
///         Ok(f.apply(x))
///     }
/// }
/// ```
pub trait Optimizer<F: Function> {
    /// Name of the optimizer.
    const NAME: &'static str;

    /// Error while computing the next step.
    type Error;

    /// Computes the next step in the optimization process.
    ///
    /// The value of `x` is the current point. After the method returns, `x`
    /// should hold the variable values of the performed step and the return
    /// value *must* be the function value of that step as computed by
    /// [`Function::apply`].
    ///
    /// The implementations *can* assume that subsequent calls to `opt_next`
    /// pass the value of `x` as was returned in the previous iteration.
    fn opt_next<Sx>(
        &mut self,
        f: &F,
        dom: &Domain,
        x: &mut Vector<f64, Dyn, Sx>,
    ) -> Result<f64, Self::Error>
    where
        Sx: StorageMut<f64, Dyn> + IsContiguous;
}
