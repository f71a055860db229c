//! High-level API for running an optimizer.
//!
//! The driver encapsulates the function, its domain, the algorithm state and
//! the current point, and provides a simple API to run the iterative process.
//! The [`Engine`](crate::Engine) drives both continuous strategies through it.
//!
//! The simplest way of using the driver is to initialize it with the defaults
//! (Nelder-Mead simplex starting at the origin projected into the domain):
//!
//! ```rust
//! use viscotune::OptimizerDriver;
//! # use viscotune::nalgebra as na;
//! # use viscotune::{Domain, Function, Problem};
//! # use na::{Dyn, IsContiguous};
//! #
//! # struct Paraboloid;
//! #
//! # impl Problem for Paraboloid {
//! #     fn domain(&self) -> Domain {
//! #         Domain::rect(vec![-5.0, -5.0], vec![5.0, 5.0])
//! #     }
//! # }
//! #
//! # impl Function for Paraboloid {
//! #     fn apply<Sx>(&self, x: &na::Vector<f64, Dyn, Sx>) -> f64
//! #     where
//! #         Sx: na::storage::Storage<f64, Dyn> + IsContiguous,
//! #     {
//! #         (x[0] - 1.0).powi(2) + (x[1] + 2.0).powi(2)
//! #     }
//! # }
//!
//! let f = Paraboloid;
//!
//! let mut optimizer = OptimizerDriver::new(&f);
//! ```
//!
//! If you need to specify additional settings, use the builder:
//!
//! ```rust
//! use rand::{rngs::StdRng, SeedableRng};
//! use viscotune::algo::ParticleSwarm;
//! use viscotune::OptimizerDriver;
//! # use viscotune::nalgebra as na;
//! # use viscotune::{Domain, Function, Problem};
//! # use na::{Dyn, IsContiguous};
//! #
//! # struct Paraboloid;
//! #
//! # impl Problem for Paraboloid {
//! #     fn domain(&self) -> Domain {
//! #         Domain::rect(vec![-5.0, -5.0], vec![5.0, 5.0])
//! #     }
//! # }
//! #
//! # impl Function for Paraboloid {
//! #     fn apply<Sx>(&self, x: &na::Vector<f64, Dyn, Sx>) -> f64
//! #     where
//! #         Sx: na::storage::Storage<f64, Dyn> + IsContiguous,
//! #     {
//! #         (x[0] - 1.0).powi(2) + (x[1] + 2.0).powi(2)
//! #     }
//! # }
//!
//! let f = Paraboloid;
//!
//! let mut optimizer = OptimizerDriver::builder(&f)
//!     .with_initial(vec![4.0, 4.0])
//!     .with_algo(|f, dom| ParticleSwarm::new(f, dom, StdRng::seed_from_u64(3)))
//!     .build();
//!
//! let (x, fx) = optimizer
//!     .find(|state| state.fx() <= 1e-6 || state.iter() >= 100)
//!     .expect("no optimizer error");
//! ```

use nalgebra::DVector;

use crate::algo::NelderMead;
use crate::core::{Domain, Function, Optimizer, Problem};

/// Builder for the [`OptimizerDriver`].
pub struct OptimizerBuilder<'a, F, A> {
    f: &'a F,
    dom: Domain,
    algo: A,
    x0: DVector<f64>,
}

impl<'a, F: Problem> OptimizerBuilder<'a, F, NelderMead> {
    fn new(f: &'a F) -> Self {
        let dom = f.domain();
        let algo = NelderMead::new(f, &dom);
        let x0 = DVector::zeros(dom.dim());

        Self { f, dom, algo, x0 }
    }
}

impl<'a, F: Problem, A> OptimizerBuilder<'a, F, A> {
    /// Sets the initial point from which the iterative process starts.
    ///
    /// The point is projected into the domain when the driver is built.
    pub fn with_initial(mut self, x0: Vec<f64>) -> Self {
        assert_eq!(x0.len(), self.dom.dim(), "initial point has wrong dimension");
        self.x0 = DVector::from_vec(x0);
        self
    }

    /// Sets specific algorithm to be used.
    ///
    /// This builder method accepts a closure that takes the reference to the
    /// problem and its domain. For [`NelderMead`] you can simply pass the
    /// `new` constructor directly.
    pub fn with_algo<A2, FA>(self, factory: FA) -> OptimizerBuilder<'a, F, A2>
    where
        FA: FnOnce(&F, &Domain) -> A2,
    {
        let algo = factory(self.f, &self.dom);

        OptimizerBuilder {
            f: self.f,
            dom: self.dom,
            algo,
            x0: self.x0,
        }
    }

    /// Builds the [`OptimizerDriver`].
    pub fn build(self) -> OptimizerDriver<'a, F, A> {
        let Self {
            f,
            dom,
            algo,
            mut x0,
        } = self;

        dom.project(&mut x0);

        OptimizerDriver {
            f,
            dom,
            algo,
            x: x0,
            fx: f64::INFINITY,
        }
    }
}

/// The driver for the process of optimization.
///
/// For default settings, use [`OptimizerDriver::new`]. For more flexibility,
/// use [`OptimizerDriver::builder`]. For the usage of the driver, see
/// [module](self) documentation.
pub struct OptimizerDriver<'a, F, A> {
    f: &'a F,
    dom: Domain,
    algo: A,
    x: DVector<f64>,
    fx: f64,
}

impl<'a, F: Problem> OptimizerDriver<'a, F, NelderMead> {
    /// Returns the builder for specifying additional settings.
    pub fn builder(f: &'a F) -> OptimizerBuilder<'a, F, NelderMead> {
        OptimizerBuilder::new(f)
    }

    /// Initializes the driver with the default settings.
    pub fn new(f: &'a F) -> Self {
        OptimizerDriver::builder(f).build()
    }
}

impl<'a, F, A> OptimizerDriver<'a, F, A> {
    /// Returns reference to the current point.
    pub fn x(&self) -> &[f64] {
        self.x.as_slice()
    }

    /// Returns the current function value.
    pub fn fx(&self) -> f64 {
        self.fx
    }

    /// Returns the domain the process runs in.
    pub fn domain(&self) -> &Domain {
        &self.dom
    }

    /// Returns reference to the algorithm state.
    pub fn algo(&self) -> &A {
        &self.algo
    }
}

impl<'a, F: Function, A: Optimizer<F>> OptimizerDriver<'a, F, A> {
    /// Does one iteration of the process, returning the function value in case
    /// of no error.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<(&[f64], f64), A::Error> {
        self.fx = self.algo.opt_next(self.f, &self.dom, &mut self.x)?;
        Ok((self.x.as_slice(), self.fx))
    }

    /// Runs the iterative process until given stopping criterion is satisfied.
    pub fn find<C>(&mut self, stop: C) -> Result<(&[f64], f64), A::Error>
    where
        C: Fn(OptimizerIterState<'_>) -> bool,
    {
        let mut iter = 0;

        loop {
            self.next()?;

            let state = OptimizerIterState {
                x: &self.x,
                fx: self.fx,
                iter,
            };

            if stop(state) {
                return Ok((self.x.as_slice(), self.fx));
            }

            iter += 1;
        }
    }

    /// Returns the name of the used optimizer.
    pub fn name(&self) -> &str {
        A::NAME
    }
}

/// State of the current iteration.
pub struct OptimizerIterState<'a> {
    x: &'a DVector<f64>,
    fx: f64,
    iter: usize,
}

impl<'a> OptimizerIterState<'a> {
    /// Returns reference to the current point.
    pub fn x(&self) -> &[f64] {
        self.x.as_slice()
    }

    /// Returns the current function value.
    pub fn fx(&self) -> f64 {
        self.fx
    }

    /// Returns the current iteration number.
    pub fn iter(&self) -> usize {
        self.iter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::{rngs::StdRng, SeedableRng};

    use crate::algo::ParticleSwarm;
    use crate::testing::*;

    #[test]
    fn basic_use_case() {
        let f = Paraboloid::new(2.0, -3.0);
        let mut optimizer = OptimizerDriver::builder(&f)
            .with_initial(vec![8.0, 8.0])
            .build();

        let tolerance = 1e-6;
        let result = optimizer.find(|state| state.iter() >= 200 || state.fx() < tolerance);

        // The simplex may also collapse right at the minimum.
        if let Ok((_, value)) = result {
            assert!(value <= tolerance);
        }
        assert!(f.is_optimum(&DVector::from_column_slice(optimizer.x()), 1e-2));
    }

    #[test]
    fn custom_algo() {
        let f = Paraboloid::new(2.0, -3.0);
        let mut optimizer = OptimizerDriver::builder(&f)
            .with_algo(|f, dom| ParticleSwarm::new(f, dom, StdRng::seed_from_u64(11)))
            .with_initial(vec![8.0, 8.0])
            .build();

        let (_, value) = optimizer.find(|state| state.iter() >= 50).unwrap();

        assert!(value < 0.5);
        assert_eq!(optimizer.name(), "particle swarm");
    }

    #[test]
    fn initial() {
        let f = Paraboloid::new(0.0, 0.0);
        let optimizer = OptimizerDriver::builder(&f)
            .with_initial(vec![1.0, 2.0])
            .build();

        assert_eq!(optimizer.x(), &[1.0, 2.0]);
        assert_eq!(optimizer.fx(), f64::INFINITY);
    }

    #[test]
    fn initial_in_domain() {
        let f = Paraboloid::new(0.0, 0.0).with_domain([(0.0, 1.0), (0.0, 1.0)]);
        let optimizer = OptimizerDriver::builder(&f)
            .with_initial(vec![10.0, -10.0])
            .build();

        assert_eq!(optimizer.x(), &[1.0, 0.0]);
    }
}
