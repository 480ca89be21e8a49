//! Stochastic birth-death dynamics of several species on a toroidal lattice.
//!
//! Four discrete-time cellular-automaton update rules ([`discrete`]) are
//! compared against the continuous-time Gillespie algorithm ([`gillespie`]).
//! Both kinds of simulator share the [`lattice`], the [`rates`] and the
//! [`observer`] interface through which results are reported.

pub mod clock;
pub mod config;
pub mod discrete;
pub mod engine;
pub mod error;
pub mod gillespie;
pub mod lattice;
pub mod manager;
pub mod observer;
pub mod random_set;
pub mod rates;
pub mod stats;
