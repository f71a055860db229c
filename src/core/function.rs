use nalgebra::{storage::Storage, Dyn, IsContiguous, Vector};

use super::base::Problem;

/// The trait for defining objective functions.
///
/// ## Defining a function
///
/// A function is any type that implements [`Function`] and [`Problem`]
/// traits.
///
/// ```rust
/// use viscotune::nalgebra as na;
/// use viscotune::{Domain, Function, Problem};
/// use na::{Dyn, IsContiguous};
///
/// struct Paraboloid;
///
/// impl Problem for Paraboloid {
///     fn domain(&self) -> Domain {
///         [(-10.0, 10.0), (-10.0, 10.0)].into_iter().collect()
///     }
/// }
///
/// impl Function for Paraboloid {
///     fn apply<Sx>(&self, x: &na::Vector<f64, Dyn, Sx>) -> f64
///     where
///         Sx: na::storage::Storage<f64, Dyn> + IsContiguous,
///     {
///         x[0].powi(2) + x[1].powi(2)
///     }
/// }
/// ```
pub trait Function: Problem {
    /// Calculate the function value given values of the variables.
    ///
    /// A non-finite value marks the point as unusable. Optimizers treat it as
    /// positive infinity.
    fn apply<Sx>(&self, x: &Vector<f64, Dyn, Sx>) -> f64
    where
        Sx: Storage<f64, Dyn> + IsContiguous;
}

impl<F: Function + ?Sized> Function for &F {
    fn apply<Sx>(&self, x: &Vector<f64, Dyn, Sx>) -> f64
    where
        Sx: Storage<f64, Dyn> + IsContiguous,
    {
        (**self).apply(x)
    }
}
