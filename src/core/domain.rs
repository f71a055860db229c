//! Search domain definition, i.e. bound constraints for the tuned variables.

use std::iter::FromIterator;

use nalgebra::{storage::StorageMut, DVector, Dim, Vector};
use rand::Rng;
use rand_distr::{Distribution, Uniform};

/// Rectangular domain of a problem.
///
/// Every variable is bounded from both sides. The bounds are inclusive, a
/// point lying exactly on a bound is inside the domain.
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    lower: DVector<f64>,
    upper: DVector<f64>,
    scale: DVector<f64>,
}

impl Domain {
    /// Creates rectangular domain with given bounds.
    pub fn rect(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        assert!(
            lower.len() == upper.len(),
            "lower and upper have different size"
        );

        let dim = lower.len();
        assert!(dim > 0, "empty domain");
        assert!(
            lower
                .iter()
                .zip(upper.iter())
                .all(|(l, u)| l.is_finite() && u.is_finite() && l <= u),
            "bounds must be finite and ordered"
        );

        let scale = lower
            .iter()
            .copied()
            .zip(upper.iter().copied())
            .map(|(l, u)| estimate_magnitude_from_bounds(l, u));

        Self {
            scale: DVector::from_iterator(dim, scale),
            lower: DVector::from_vec(lower),
            upper: DVector::from_vec(upper),
        }
    }

    /// Gets the dimension of the domain.
    pub fn dim(&self) -> usize {
        self.lower.nrows()
    }

    /// Gets the lower bound in given dimension.
    pub fn lower(&self, i: usize) -> f64 {
        self.lower[i]
    }

    /// Gets the upper bound in given dimension.
    pub fn upper(&self, i: usize) -> f64 {
        self.upper[i]
    }

    /// Width of the domain in given dimension.
    pub fn range(&self, i: usize) -> f64 {
        self.upper[i] - self.lower[i]
    }

    /// Gets the estimated magnitude of every variable.
    ///
    /// The magnitude is used as the initial step size by the simplex method.
    pub fn scale(&self) -> &DVector<f64> {
        &self.scale
    }

    /// Determines whether the point lies inside the domain.
    pub fn contains(&self, x: &[f64]) -> bool {
        x.len() == self.dim()
            && x.iter()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .all(|(xi, (li, ui))| li <= xi && xi <= ui)
    }

    /// Projects given point into the domain.
    ///
    /// Returns `true` if the point was not feasible and had to be moved.
    pub fn project<D, Sx>(&self, x: &mut Vector<f64, D, Sx>) -> bool
    where
        D: Dim,
        Sx: StorageMut<f64, D>,
    {
        let mut not_feasible = false;

        self.lower
            .iter()
            .zip(self.upper.iter())
            .zip(x.iter_mut())
            .for_each(|((li, ui), xi)| {
                if *xi < *li {
                    *xi = *li;
                    not_feasible = true;
                } else if *xi > *ui {
                    *xi = *ui;
                    not_feasible = true;
                }
            });

        not_feasible
    }

    /// Projects given point into the domain in given dimension.
    pub fn project_in<D, Sx>(&self, x: &mut Vector<f64, D, Sx>, i: usize) -> bool
    where
        D: Dim,
        Sx: StorageMut<f64, D>,
    {
        let li = self.lower[i];
        let ui = self.upper[i];
        let xi = &mut x[i];

        if *xi < li {
            *xi = li;
            true
        } else if *xi > ui {
            *xi = ui;
            true
        } else {
            false
        }
    }

    /// Samples a point uniformly in the domain.
    pub fn sample<D, Sx, R>(&self, x: &mut Vector<f64, D, Sx>, rng: &mut R)
    where
        D: Dim,
        Sx: StorageMut<f64, D>,
        R: Rng + ?Sized,
    {
        x.iter_mut()
            .zip(self.lower.iter().copied().zip(self.upper.iter().copied()))
            .for_each(|(xi, (li, ui))| {
                *xi = Uniform::new_inclusive(li, ui).sample(rng);
            });
    }
}

impl FromIterator<(f64, f64)> for Domain {
    fn from_iter<I: IntoIterator<Item = (f64, f64)>>(iter: I) -> Self {
        let (lower, upper): (Vec<_>, Vec<_>) = iter.into_iter().unzip();
        Self::rect(lower, upper)
    }
}

/// Estimates magnitude of the variable given lower and upper bounds.
fn estimate_magnitude_from_bounds(lower: f64, upper: f64) -> f64 {
    let avg = 0.5 * (lower.abs() + upper.abs());
    let magnitude = 10f64.powf(avg.abs().log10().trunc());

    // For [0, 0] range, the computed magnitude is undefined. We allow such
    // ranges to support fixing a variable to a value.
    if magnitude.is_finite() && magnitude > 0.0 {
        magnitude
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use nalgebra::dvector;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn magnitude_follows_bounds() {
        let dom: Domain = [(10.0, 100.0), (100.0, 300.0)].into_iter().collect();
        assert_eq!(dom.scale().as_slice(), &[10.0, 100.0]);
    }

    #[test]
    fn fixed_variable_has_unit_magnitude() {
        let dom = Domain::rect(vec![0.0], vec![0.0]);
        assert_eq!(dom.scale()[0], 1.0);
    }

    #[test]
    fn projection() {
        let dom = Domain::rect(vec![0.0, 0.0], vec![100.0, 300.0]);

        let mut x = dvector![-5.0, 150.0];
        assert!(dom.project(&mut x));
        assert_eq!(x.as_slice(), &[0.0, 150.0]);

        let mut x = dvector![50.0, 150.0];
        assert!(!dom.project(&mut x));

        let mut x = dvector![50.0, 301.0];
        assert!(dom.project_in(&mut x, 1));
        assert_eq!(x[1], 300.0);
    }

    #[test]
    fn bounds_are_inclusive() {
        let dom = Domain::rect(vec![10.0, 100.0], vec![100.0, 300.0]);
        assert!(dom.contains(&[10.0, 300.0]));
        assert!(!dom.contains(&[9.999, 300.0]));
        assert!(!dom.contains(&[50.0]));
    }

    #[test]
    fn sampling_stays_inside() {
        let dom = Domain::rect(vec![10.0, 100.0], vec![100.0, 300.0]);
        let mut rng = StdRng::seed_from_u64(7);
        let mut x = dvector![0.0, 0.0];

        for _ in 0..100 {
            dom.sample(&mut x, &mut rng);
            assert!(dom.contains(x.as_slice()));
        }
    }
}
