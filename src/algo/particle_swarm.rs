//! Particle swarm optimization (PSO).
//!
//! A population of particles moves through the bounded domain. Every particle
//! remembers the best position it has visited, and the swarm shares the best
//! position found by any particle. In each iteration the velocity of a
//! particle is pulled towards both, with random weights:
//!
//! ```text
//! v = w v + c1 r1 (p - x) + c2 r2 (g - x)
//! x = x + v
//! ```
//!
//! where `w` is inertia, `c1` cognitive and `c2` social coefficient and
//! `r1, r2` are drawn uniformly from `[0, 1)` per coordinate. Positions are
//! clamped to the domain after every move. All particles are moved against
//! the global best of the previous iteration and only then evaluated
//! (synchronous update).
//!
//! The method is derivative-free and does not require the objective to be
//! continuous. Invalid values (NaN, infinity) are simply never the best.
//!
//! # References
//!
//! \[1\] [Particle swarm optimization](https://doi.org/10.1109/ICNN.1995.488968)
//!
//! \[2\] [A modified particle swarm optimizer](https://doi.org/10.1109/ICEC.1998.699146)

use getset::{CopyGetters, Setters};
use log::debug;
use nalgebra::{storage::StorageMut, DVector, Dyn, IsContiguous, Vector};
use rand::Rng;
use rand_distr::{Distribution, Uniform};
use thiserror::Error;

use crate::core::{Domain, Function, Optimizer};
use crate::error::{Error, ValidationError};

/// Options for [`ParticleSwarm`] optimizer.
#[derive(Debug, Clone, CopyGetters, Setters)]
#[getset(get_copy = "pub", set = "pub")]
pub struct ParticleSwarmOptions {
    /// Number of particles. Default: `50`.
    population_size: usize,
    /// Weight of the previous velocity. Default: `0.5`.
    inertia: f64,
    /// Attraction to the particle's own best position. Default: `0.5`.
    cognitive: f64,
    /// Attraction to the swarm's best position. Default: `0.5`.
    social: f64,
    /// Initial velocities are drawn from `[-f range, f range]` per
    /// coordinate. Default: `1`.
    velocity_factor: f64,
    /// Whether the first particle starts at the initial point instead of a
    /// random one. Default: `true`.
    include_initial: bool,
}

impl Default for ParticleSwarmOptions {
    fn default() -> Self {
        Self {
            population_size: 50,
            inertia: 0.5,
            cognitive: 0.5,
            social: 0.5,
            velocity_factor: 1.0,
            include_initial: true,
        }
    }
}

/// Particle swarm optimizer.
///
/// See [module](self) documentation for more details.
pub struct ParticleSwarm<R> {
    options: ParticleSwarmOptions,
    rng: R,
    positions: Vec<DVector<f64>>,
    velocities: Vec<DVector<f64>>,
    best_positions: Vec<DVector<f64>>,
    best_errors: Vec<f64>,
    global_best: usize,
}

impl<R: Rng> ParticleSwarm<R> {
    /// Initializes particle swarm optimizer with default options.
    pub fn new<F>(f: &F, dom: &Domain, rng: R) -> Self {
        Self::with_options(f, dom, rng, ParticleSwarmOptions::default())
    }

    /// Initializes particle swarm optimizer with given options.
    pub fn with_options<F>(_: &F, _: &Domain, rng: R, options: ParticleSwarmOptions) -> Self {
        let size = options.population_size;

        Self {
            options,
            rng,
            positions: Vec::with_capacity(size),
            velocities: Vec::with_capacity(size),
            best_positions: Vec::with_capacity(size),
            best_errors: Vec::with_capacity(size),
            global_best: 0,
        }
    }

    /// Resets the internal state of the optimizer.
    pub fn reset(&mut self) {
        // Causes the swarm to be initialized again.
        self.positions.clear();
        self.velocities.clear();
        self.best_positions.clear();
        self.best_errors.clear();
        self.global_best = 0;
    }

    /// Best position found so far and its value, `None` before the first
    /// iteration.
    pub fn best(&self) -> Option<(&DVector<f64>, f64)> {
        self.best_positions
            .get(self.global_best)
            .map(|x| (x, self.best_errors[self.global_best]))
    }
}

/// Error returned from [`ParticleSwarm`] optimizer.
#[derive(Debug, Error)]
pub enum ParticleSwarmError {
    /// The swarm has no particles.
    #[error("swarm has no particles")]
    EmptySwarm,
}

impl From<ParticleSwarmError> for Error {
    fn from(error: ParticleSwarmError) -> Self {
        match error {
            ParticleSwarmError::EmptySwarm => ValidationError::Option {
                name: "population_size",
                reason: "must be positive",
            }
            .into(),
        }
    }
}

impl<R: Rng> ParticleSwarm<R> {
    fn init<F, Sx>(&mut self, f: &F, dom: &Domain, x: &Vector<f64, Dyn, Sx>)
    where
        F: Function,
        Sx: StorageMut<f64, Dyn> + IsContiguous,
    {
        let ParticleSwarmOptions {
            population_size,
            velocity_factor,
            include_initial,
            ..
        } = self.options;

        let Self {
            rng,
            positions,
            velocities,
            best_positions,
            best_errors,
            ..
        } = self;

        let n = dom.dim();

        for i in 0..population_size {
            let mut position = DVector::zeros(n);
            if i == 0 && include_initial {
                position.copy_from(x);
                dom.project(&mut position);
            } else {
                dom.sample(&mut position, rng);
            }

            let velocity = DVector::from_iterator(
                n,
                (0..n).map(|j| {
                    let range = velocity_factor.abs() * dom.range(j);
                    Uniform::new_inclusive(-range, range).sample(rng)
                }),
            );

            best_errors.push(f.apply(&position).nan_to_inf());
            best_positions.push(position.clone());
            positions.push(position);
            velocities.push(velocity);
        }

        self.global_best = argmin(&self.best_errors);
    }

    fn next_inner<F, Sx>(
        &mut self,
        f: &F,
        dom: &Domain,
        x: &mut Vector<f64, Dyn, Sx>,
    ) -> Result<f64, ParticleSwarmError>
    where
        F: Function,
        Sx: StorageMut<f64, Dyn> + IsContiguous,
    {
        if self.options.population_size == 0 {
            return Err(ParticleSwarmError::EmptySwarm);
        }

        if self.positions.is_empty() {
            self.init(f, dom, x);
        } else {
            let ParticleSwarmOptions {
                inertia,
                cognitive,
                social,
                ..
            } = self.options;

            let Self {
                rng,
                positions,
                velocities,
                best_positions,
                best_errors,
                global_best,
                ..
            } = self;

            let global = best_positions[*global_best].clone();

            // Move all particles first.
            for ((xi, vi), pi) in positions
                .iter_mut()
                .zip(velocities.iter_mut())
                .zip(best_positions.iter())
            {
                for j in 0..xi.nrows() {
                    let r1 = rng.gen::<f64>();
                    let r2 = rng.gen::<f64>();

                    vi[j] = inertia * vi[j]
                        + cognitive * r1 * (pi[j] - xi[j])
                        + social * r2 * (global[j] - xi[j]);
                }

                *xi += &*vi;
                dom.project(xi);
            }

            // Then evaluate them.
            for ((xi, pi), ei) in positions
                .iter()
                .zip(best_positions.iter_mut())
                .zip(best_errors.iter_mut())
            {
                let error = f.apply(xi).nan_to_inf();

                if error < *ei {
                    *ei = error;
                    pi.copy_from(xi);
                }
            }

            *global_best = argmin(best_errors.as_slice());
        }

        let best = self.best_errors[self.global_best];

        if log::log_enabled!(log::Level::Debug) {
            let valid = self.best_errors.iter().filter(|e| e.is_finite()).count();
            let avg = if valid > 0 {
                self.best_errors
                    .iter()
                    .filter(|e| e.is_finite())
                    .sum::<f64>()
                    / valid as f64
            } else {
                f64::INFINITY
            };

            debug!(
                "swarm best = {}, avg = {}, valid = {}, invalid = {}",
                best,
                avg,
                valid,
                self.best_errors.len() - valid
            );
        }

        x.copy_from(&self.best_positions[self.global_best]);
        Ok(best)
    }
}

impl<F: Function, R: Rng> Optimizer<F> for ParticleSwarm<R> {
    const NAME: &'static str = "particle swarm";

    type Error = ParticleSwarmError;

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

/// Index of the smallest value, first one wins on ties.
fn argmin(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |(best, min), (i, value)| {
            if *value < min {
                (i, *value)
            } else {
                (best, min)
            }
        })
        .0
}

trait NanToInf {
    fn nan_to_inf(self) -> Self;
}

impl NanToInf for f64 {
    fn nan_to_inf(self) -> Self {
        if self.is_finite() {
            self
        } else {
            f64::INFINITY
        }
    }
}
