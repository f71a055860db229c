//! The collection of implemented algorithms.
//!
//! * [Stepping](stepping) -- Fixed-step heuristic driven by the viscosity
//!   deviation only. Cheap and predictable, but without any guarantees.
//! * [Nelder-Mead](nelder_mead) -- Derivative-free local method used for the
//!   constrained strategy. Bound constraints by projection, other constraints
//!   as an extreme barrier.
//! * [Particle swarm](particle_swarm) -- Global population-based method used
//!   for the stochastic strategy.

pub mod nelder_mead;
pub mod particle_swarm;
pub mod stepping;

pub use nelder_mead::NelderMead;
pub use particle_swarm::ParticleSwarm;
pub use stepping::Stepping;
