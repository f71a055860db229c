//! Bounded Nelder-Mead (simplex) optimization method.
//!
//! [Nelder-Mead](https://en.wikipedia.org/wiki/Nelder%E2%80%93Mead_method)
//! simplex-reflection method is a popular derivative-free optimization
//! algorithm. It keeps a [simplex](https://en.wikipedia.org/wiki/Simplex) of
//! _n + 1_ points and the simplex is reflected, expanded or contracted based on
//! the function values comparison.
//!
//! Bound constraints are handled by projecting every trial point onto the
//! domain. Further constraints can be imposed by the function itself by
//! returning positive infinity for infeasible points (extreme barrier). Such
//! points always rank worst and are replaced first.
//!
//! # References
//!
//! \[1\] [Numerical
//! Optimization](https://link.springer.com/book/10.1007/978-0-387-40065-5)
//!
//! \[2\] [Implementing the Nelder-Mead simplex algorithm with adaptive
//! parameters](https://link.springer.com/article/10.1007/s10589-010-9329-3)
//!
//! \[3\] [Less is more: Simplified Nelder-Mead method for large unconstrained
//! optimization](https://api.semanticscholar.org/CorpusID:59403095)

use getset::{CopyGetters, Setters};
use log::debug;
use nalgebra::{
    storage::{Storage, StorageMut},
    DVector, Dim, Dyn, IsContiguous, Vector,
};
use thiserror::Error;

use crate::core::{Domain, Function, Optimizer};
use crate::error::FailureReason;

/// Family of coefficients for reflection, expansion and contractions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoefficientsFamily {
    /// Standard ("textbook") choice.
    Standard,
    /// The coefficients are adjusted compared to standard by taking problem
    /// dimension into account.
    Balanced,
    /// The coefficients are left unchanged so it is the responsibility of the
    /// user to set them through [`NelderMeadOptions`].
    Fixed,
}

/// Options for [`NelderMead`] optimizer.
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct NelderMeadOptions {
    /// Family for coefficients adaptation or fixed coefficients. Default:
    /// standard (see [`CoefficientsFamily`]).
    family: CoefficientsFamily,
    /// Coefficient for reflection operation. Default: `-1`.
    reflection_coeff: f64,
    /// Coefficient for expansion operation. Default: `-2`.
    expansion_coeff: f64,
    /// Coefficient for outer contraction operation. Default: `-0.5`.
    outer_contraction_coeff: f64,
    /// Coefficient for inner contraction operation. Default: `0.5`.
    inner_contraction_coeff: f64,
    /// Coefficient for shrinking operation. Default: `0.5`.
    shrink_coeff: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            family: CoefficientsFamily::Standard,
            reflection_coeff: -1.0,
            expansion_coeff: -2.0,
            outer_contraction_coeff: -0.5,
            inner_contraction_coeff: 0.5,
            shrink_coeff: 0.5,
        }
    }
}

impl NelderMeadOptions {
    fn overwrite_coeffs(&mut self, dom: &Domain) {
        let Self {
            family,
            reflection_coeff,
            expansion_coeff,
            outer_contraction_coeff,
            inner_contraction_coeff,
            shrink_coeff,
        } = self;

        match family {
            CoefficientsFamily::Standard => {
                *reflection_coeff = -1.0;
                *expansion_coeff = -2.0;
                *outer_contraction_coeff = -0.5;
                *inner_contraction_coeff = 0.5;
                *shrink_coeff = 0.5;
            }
            CoefficientsFamily::Balanced => {
                let n_inv = 1.0 / dom.dim() as f64;

                *reflection_coeff = -1.0;
                *expansion_coeff = -(n_inv * 2.0 + 1.0);
                *outer_contraction_coeff = -(1.0 - n_inv);
                *inner_contraction_coeff = -*outer_contraction_coeff;
                *shrink_coeff = 1.0 - n_inv;
            }
            CoefficientsFamily::Fixed => {
                // Leave unchanged.
            }
        }
    }
}

/// Nelder-Mead optimizer.
///
/// See [module](self) documentation for more details.
pub struct NelderMead {
    options: NelderMeadOptions,
    scale: DVector<f64>,
    centroid: DVector<f64>,
    reflection: DVector<f64>,
    expansion: DVector<f64>,
    contraction: DVector<f64>,
    simplex: Vec<DVector<f64>>,
    errors: Vec<f64>,
    sort_perm: Vec<usize>,
}

impl NelderMead {
    /// Initializes Nelder-Mead optimizer with default options.
    pub fn new<F>(f: &F, dom: &Domain) -> Self {
        Self::with_options(f, dom, NelderMeadOptions::default())
    }

    /// Initializes Nelder-Mead optimizer with given options.
    pub fn with_options<F>(_: &F, dom: &Domain, mut options: NelderMeadOptions) -> Self {
        let n = dom.dim();

        options.overwrite_coeffs(dom);

        Self {
            options,
            scale: dom.scale().clone_owned(),
            centroid: DVector::zeros(n),
            reflection: DVector::zeros(n),
            expansion: DVector::zeros(n),
            contraction: DVector::zeros(n),
            simplex: Vec::with_capacity(n + 1),
            errors: Vec::with_capacity(n + 1),
            sort_perm: Vec::with_capacity(n + 1),
        }
    }

    /// Resets the internal state of the optimizer.
    pub fn reset(&mut self) {
        // Causes simplex to be initialized again.
        self.simplex.clear();
        self.errors.clear();
        self.sort_perm.clear();
    }

    /// Difference between the worst and the best function value in the
    /// simplex, `None` before the first iteration.
    pub fn spread(&self) -> Option<f64> {
        let best = self.errors[*self.sort_perm.first()?];
        let worst = self.errors[*self.sort_perm.last()?];
        Some(worst - best)
    }
}

/// Error returned from [`NelderMead`] optimizer.
#[derive(Debug, Error)]
pub enum NelderMeadError {
    /// Simplex collapsed so it is impossible to make any progress.
    #[error("simplex collapsed")]
    SimplexCollapsed,
    /// Simplex contains too many invalid values (NaN, infinity).
    #[error("simplex contains too many invalid values")]
    SimplexInvalid,
}

impl From<NelderMeadError> for FailureReason {
    fn from(error: NelderMeadError) -> Self {
        match error {
            // A collapsed simplex is treated as convergence by the engine,
            // this conversion is only hit when it happens before any progress.
            NelderMeadError::SimplexCollapsed => FailureReason::NotConverged(0),
            NelderMeadError::SimplexInvalid => FailureReason::InvalidSimplex,
        }
    }
}

impl NelderMead {
    fn next_inner<F, Sx>(
        &mut self,
        f: &F,
        dom: &Domain,
        x: &mut Vector<f64, Dyn, Sx>,
    ) -> Result<f64, NelderMeadError>
    where
        F: Function,
        Sx: StorageMut<f64, Dyn> + IsContiguous,
    {
        let NelderMeadOptions {
            reflection_coeff,
            expansion_coeff,
            outer_contraction_coeff,
            inner_contraction_coeff,
            shrink_coeff,
            ..
        } = self.options;

        let Self {
            scale,
            simplex,
            errors,
            sort_perm,
            centroid,
            reflection,
            expansion,
            contraction,
            ..
        } = self;

        let n = dom.dim();

        if simplex.is_empty() {
            // Simplex initialization.
            errors.push(f.apply(x).nan_to_inf());
            simplex.push(x.clone_owned());

            for j in 0..n {
                let mut xi = x.clone_owned();
                xi[j] += scale[j];

                if dom.project_in(&mut xi, j) && xi[j] == x[j] {
                    // Sitting on the upper bound, step inwards instead.
                    xi[j] -= scale[j];
                    dom.project_in(&mut xi, j);
                }

                errors.push(f.apply(&xi).nan_to_inf());
                simplex.push(xi);
            }

            let error_count = errors.iter().filter(|e| !e.is_finite()).count();

            if error_count > simplex.len() / 2 {
                // The simplex is too degenerate.
                debug!(
                    "{} out of {} points in simplex have invalid value, returning error",
                    error_count,
                    simplex.len()
                );
                simplex.clear();
                errors.clear();
                return Err(NelderMeadError::SimplexInvalid);
            }

            sort_perm.extend(0..=n);
            sort_perm.sort_by(|a, b| {
                errors[*a]
                    .partial_cmp(&errors[*b])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        // Calculate the centroid.
        centroid.fill(0.0);
        (0..n)
            .map(|i| &simplex[sort_perm[i]])
            .for_each(|xi| *centroid += xi);
        *centroid /= n as f64;

        debug!("centroid of simplex: {:?}", centroid.as_slice());

        #[derive(Debug, Clone, Copy, PartialEq)]
        enum Transformation {
            Reflection,
            Expansion,
            OuterContraction,
            InnerContraction,
            Shrinkage,
        }

        impl Transformation {
            fn as_str(&self) -> &str {
                match self {
                    Transformation::Reflection => "reflection",
                    Transformation::Expansion => "expansion",
                    Transformation::OuterContraction => "outer contraction",
                    Transformation::InnerContraction => "inner contraction",
                    Transformation::Shrinkage => "shrinkage",
                }
            }
        }

        // Perform one of possible simplex transformations.
        reflection.on_line2_mut(centroid, &simplex[sort_perm[n]], reflection_coeff);
        let reflection_not_feasible = dom.project(reflection);
        let reflection_error = f.apply(reflection).nan_to_inf();

        #[allow(clippy::suspicious_else_formatting)]
        let (transformation, not_feasible) = if errors[sort_perm[0]] <= reflection_error
            && reflection_error < errors[sort_perm[n - 1]]
        {
            // Reflected point is neither best nor worst in the new simplex.
            // Just replace the worst point.
            simplex[sort_perm[n]].copy_from(reflection);
            errors[sort_perm[n]] = reflection_error;
            (Transformation::Reflection, reflection_not_feasible)
        } else if reflection_error < errors[sort_perm[0]] {
            // Reflected point is better than the current best. Try to go
            // farther along this direction.
            expansion.on_line2_mut(centroid, &simplex[sort_perm[n]], expansion_coeff);
            let expansion_not_feasible = dom.project(expansion);
            let expansion_error = f.apply(expansion).nan_to_inf();

            if expansion_error < reflection_error {
                simplex[sort_perm[n]].copy_from(expansion);
                errors[sort_perm[n]] = expansion_error;
                (Transformation::Expansion, expansion_not_feasible)
            } else {
                simplex[sort_perm[n]].copy_from(reflection);
                errors[sort_perm[n]] = reflection_error;
                (Transformation::Reflection, reflection_not_feasible)
            }
        } else
        /* reflection_error >= errors[sort_perm[n - 1]] */
        {
            // Reflected point is still worse than the second to last point. Try
            // to do a contraction.
            let (transformation, not_feasible) = if errors[sort_perm[n - 1]] <= reflection_error
                && reflection_error < errors[sort_perm[n]]
            {
                contraction.on_line2_mut(centroid, &simplex[sort_perm[n]], outer_contraction_coeff);
                let contraction_not_feasible = dom.project(contraction);
                let contraction_error = f.apply(contraction).nan_to_inf();

                if contraction_error <= reflection_error {
                    simplex[sort_perm[n]].copy_from(contraction);
                    errors[sort_perm[n]] = contraction_error;
                    (
                        Some(Transformation::OuterContraction),
                        contraction_not_feasible,
                    )
                } else {
                    (None, false)
                }
            } else {
                contraction.on_line2_mut(centroid, &simplex[sort_perm[n]], inner_contraction_coeff);
                let contraction_not_feasible = dom.project(contraction);
                let contraction_error = f.apply(contraction).nan_to_inf();

                if contraction_error <= errors[sort_perm[n]] {
                    simplex[sort_perm[n]].copy_from(contraction);
                    errors[sort_perm[n]] = contraction_error;
                    (
                        Some(Transformation::InnerContraction),
                        contraction_not_feasible,
                    )
                } else {
                    (None, false)
                }
            };

            match transformation {
                Some(transformation) => (transformation, not_feasible),
                None => {
                    // Neither outside nor inside contraction was acceptable.
                    // Shrink the simplex towards the best point.
                    contraction.copy_from(&simplex[sort_perm[0]]);

                    for i in 1..=n {
                        let xi = &mut simplex[sort_perm[i]];
                        xi.on_line_mut(contraction, shrink_coeff);
                        errors[sort_perm[i]] = f.apply(xi).nan_to_inf();
                    }

                    (Transformation::Shrinkage, false)
                }
            }
        };

        // Establish the ordering of simplex points.
        sort_perm.sort_by(|a, b| {
            errors[*a]
                .partial_cmp(&errors[*b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(
            "performed {}{},\tfx = {} - {}",
            transformation.as_str(),
            if not_feasible { " with projection" } else { "" },
            errors[sort_perm[0]],
            errors[sort_perm[n]]
        );

        // Return the best simplex point.
        x.copy_from(&simplex[sort_perm[0]]);

        if transformation == Transformation::Shrinkage
            || transformation == Transformation::InnerContraction
            || not_feasible
        {
            // Check whether the simplex collapsed or not. It can happen only
            // when shrinkage or inner contraction is performed or a new point
            // was projected into the feasible domain, because otherwise an
            // error reduction was achieved.
            let eps = f64::EPSILON.sqrt();

            let worst = errors[sort_perm[n]];
            let best = errors[sort_perm[0]];
            let numer = (worst - best) * 2.0;
            let denom = worst + best + eps;

            if numer / denom <= eps {
                debug!("simplex collapsed: {} / {} <= {}", numer, denom, eps);
                return Err(NelderMeadError::SimplexCollapsed);
            }
        }

        Ok(errors[sort_perm[0]])
    }
}

impl<F: Function> Optimizer<F> for NelderMead {
    const NAME: &'static str = "Nelder-Mead";

    type Error = NelderMeadError;

    fn opt_next<Sx>(
        &mut self,
        f: &F,
        dom: &Domain,
        x: &mut Vector<f64, Dyn, Sx>,
    ) -> Result<f64, Self::Error>
    where
        Sx: StorageMut<f64, Dyn> + IsContiguous,
    {
        self.next_inner(f, dom, x)
    }
}

trait VectorNelderMeadExt<D: Dim> {
    fn on_line_mut<Sto>(&mut self, to: &Vector<f64, D, Sto>, t: f64)
    where
        Sto: Storage<f64, D>;

    fn on_line2_mut<Sfrom, Sto>(
        &mut self,
        from: &Vector<f64, D, Sfrom>,
        to: &Vector<f64, D, Sto>,
        t: f64,
    ) where
        Sfrom: Storage<f64, D>,
        Sto: Storage<f64, D>;
}

impl<D: Dim, S> VectorNelderMeadExt<D> for Vector<f64, D, S>
where
    S: StorageMut<f64, D>,
{
    fn on_line_mut<Sto>(&mut self, to: &Vector<f64, D, Sto>, t: f64)
    where
        Sto: Storage<f64, D>,
    {
        *self -= to;
        *self *= t;
        *self += to;
    }

    fn on_line2_mut<Sfrom, Sto>(&mut self, from: &Vector<f64, D, Sfrom>, to: &Vector<f64, D, Sto>, t: f64)
    where
        Sfrom: Storage<f64, D>,
        Sto: Storage<f64, D>,
    {
        to.sub_to(from, self);
        *self *= t;
        *self += from;
    }
}

trait NanToInf {
    fn nan_to_inf(self) -> Self;
}

impl NanToInf for f64 {
    fn nan_to_inf(self) -> Self {
        if self.is_finite() {
            self
        } else {
            // Not finite also covers NaN and negative infinity.
            f64::INFINITY
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use nalgebra::dvector;

    use crate::core::Problem;
    use crate::testing::*;

    #[test]
    fn paraboloid() {
        let f = Paraboloid::new(2.0, -3.0);
        let dom = f.domain();
        let optimizer = NelderMead::new(&f, &dom);

        let x = optimize(&f, &dom, optimizer, dvector![8.0, 8.0], 0.0, 500, 1e-8).unwrap();
        assert!(f.is_optimum(&x, 1e-3));
    }

    #[test]
    fn balanced_family() {
        let f = Paraboloid::new(2.0, -3.0);
        let dom = f.domain();

        let mut options = NelderMeadOptions::default();
        options.set_family(CoefficientsFamily::Balanced);
        let optimizer = NelderMead::with_options(&f, &dom, options);

        let x = optimize(&f, &dom, optimizer, dvector![-8.0, 8.0], 0.0, 500, 1e-8).unwrap();
        assert!(f.is_optimum(&x, 1e-3));
    }

    #[test]
    fn considering_domain() {
        // Unconstrained optimum (2, -3) lies outside of the domain, the best
        // feasible point is on the bound.
        let f = Paraboloid::new(2.0, -3.0).with_domain([(-1.0, 1.0), (-1.0, 1.0)]);
        let dom = f.domain();
        let mut optimizer = NelderMead::new(&f, &dom);

        let mut x = dvector![0.0, 0.0];
        for _ in 0..200 {
            if optimizer.opt_next(&f, &dom, &mut x).is_err() {
                break;
            }
        }

        assert!(dom.contains(x.as_slice()));
        assert!((x[0] - 1.0).abs() < 1e-2);
        assert!((x[1] + 1.0).abs() < 1e-2);
    }

    #[test]
    fn barrier_points_are_replaced() {
        // Points with x0 + x1 < 0 are infeasible.
        let f = Paraboloid::new(-2.0, -2.0).with_barrier(|x0, x1| x0 + x1 >= 0.0);
        let dom = f.domain();
        let mut optimizer = NelderMead::new(&f, &dom);

        let mut x = dvector![3.0, 3.0];
        let mut fx = f64::INFINITY;
        for _ in 0..300 {
            match optimizer.opt_next(&f, &dom, &mut x) {
                Ok(value) => fx = value,
                Err(_) => break,
            }
        }

        assert!(x[0] + x[1] >= 0.0);
        // Constrained minimum is 8 at the origin, the start is 50.
        assert!(fx.is_finite());
        assert!(fx < 50.0);
    }

    #[test]
    fn invalid_simplex() {
        let f = Paraboloid::new(0.0, 0.0).with_barrier(|_, _| false);
        let dom = f.domain();
        let mut optimizer = NelderMead::new(&f, &dom);

        let mut x = dvector![1.0, 1.0];
        assert!(matches!(
            optimizer.opt_next(&f, &dom, &mut x),
            Err(NelderMeadError::SimplexInvalid)
        ));
    }

    #[test]
    fn spread_after_first_step() {
        let f = Paraboloid::new(0.0, 0.0);
        let dom = f.domain();
        let mut optimizer = NelderMead::new(&f, &dom);
        assert_eq!(optimizer.spread(), None);

        let mut x = dvector![1.0, 1.0];
        optimizer.opt_next(&f, &dom, &mut x).unwrap();
        assert!(optimizer.spread().unwrap() >= 0.0);
    }
}
