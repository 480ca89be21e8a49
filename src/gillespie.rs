//! Continuous-time simulation with the Gillespie direct method.

use crate::clock::Clock;
use crate::config::Config;
use crate::engine::Simulator;
use crate::error::SimError;
use crate::lattice::{Grid, Lattice, Species};
use crate::observer::Observer;
use crate::random_set::UniformRandomSet;
use crate::rates::{Event, RateModel};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Exp1;

/// Exponentially distributed waiting time until the next event of a process
/// with total propensity `total`.
///
/// # Errors
/// Returns [`SimError::DegenerateState`] if `total` is not positive.
pub fn sample_waiting_time<R: Rng + ?Sized>(total: f64, rng: &mut R) -> Result<f64, SimError> {
    if total.is_nan() || total <= 0.0 {
        return Err(SimError::DegenerateState);
    }
    let unit: f64 = Exp1.sample(rng);
    Ok(unit / total)
}

/// Spatial Gillespie simulator.
///
/// Every call to [`Simulator::step`] samples one event. Snapshots are still
/// emitted on the fixed reporting grid of the clock: `delta_t` is the model
/// time elapsed since the last reported boundary.
pub struct GillespieSimulator {
    lattice: Lattice,
    rates: RateModel,
    clock: Clock,
    rng: ChaCha12Rng,

    /// Occupied sites of each species.
    occupied: Vec<UniformRandomSet>,
    delta_t: f64,
    n_events: u64,
}

impl GillespieSimulator {
    pub fn new(cfg: &Config, mut rng: ChaCha12Rng) -> Result<Self> {
        let lattice = Lattice::new(cfg.lattice.size, cfg.n_species(), &mut rng)
            .context("failed to construct lattice")?;
        let occupied = (0..cfg.n_species())
            .map(|_| UniformRandomSet::new(lattice.n_sites()))
            .collect();
        Ok(Self {
            lattice,
            rates: RateModel::new(&cfg.species),
            clock: Clock::new(&cfg.clock),
            rng,
            occupied,
            delta_t: 0.0,
            n_events: 0,
        })
    }

    pub fn rates(&self) -> &RateModel {
        &self.rates
    }

    /// Change the rates of `species` between events.
    pub fn set_rates(&mut self, species: Species, birth_rate: f64, death_rate: f64) -> Result<()> {
        self.rates.set_rates(species, birth_rate, death_rate)
    }

    /// Number of events sampled so far. Zero while the simulator is idle.
    pub fn n_events(&self) -> u64 {
        self.n_events
    }

    /// Emit a snapshot for every reporting boundary crossed by `delta_t`.
    fn report_crossings(&mut self, obs: &mut dyn Observer) -> Result<()> {
        while self.delta_t >= self.clock.tau() && !self.clock.is_finished() {
            self.clock.tick();
            self.delta_t -= self.clock.tau();
            obs.on_snapshot(&self.snapshot())?;
        }
        Ok(())
    }

    /// Keep reporting the unchanged state until the maximum time.
    fn hold_and_report(&mut self, obs: &mut dyn Observer) -> Result<()> {
        log::debug!(
            "no further events after {} events, holding state from time {:.5}",
            self.n_events,
            self.clock.time()
        );
        while !self.clock.is_finished() {
            self.clock.tick();
            obs.on_snapshot(&self.snapshot())?;
        }
        self.delta_t = 0.0;
        Ok(())
    }

    fn execute(&mut self, event: Event, obs: &mut dyn Observer) -> Result<()> {
        self.n_events += 1;
        match event {
            Event::Birth(species) => {
                let parent = self.occupied[species].peek_random(&mut self.rng)?;
                let target = self.lattice.random_neighbor(parent, &mut self.rng);
                if self.lattice.species_at(Grid::Current, target).is_none() {
                    self.lattice.occupy(Grid::Current, species, target);
                    self.occupied[species].insert(target, &mut self.rng)?;
                    obs.on_birth(target, species)?;
                }
            }
            Event::Death(species) => {
                let site = self.occupied[species].remove_random(&mut self.rng)?;
                self.lattice
                    .vacate(Grid::Current, species, site, &mut self.rng)?;
                obs.on_death(site, species)?;
            }
        }
        Ok(())
    }
}

impl Simulator for GillespieSimulator {
    fn seed(&mut self, species: Species, obs: &mut dyn Observer) -> Result<()> {
        let site = self.lattice.seed(species, &mut self.rng)?;
        self.occupied[species].insert(site, &mut self.rng)?;
        obs.on_birth(site, species)
    }

    fn step(&mut self, obs: &mut dyn Observer) -> Result<()> {
        let props = self.rates.propensities(self.lattice.populations());
        if props.total() <= 0.0 {
            return self.hold_and_report(obs);
        }

        let waiting_time = sample_waiting_time(props.total(), &mut self.rng)?;
        let event = props
            .select(self.rng.random())
            .context("failed to select an event")?;
        self.execute(event, obs)?;

        self.delta_t += waiting_time;
        self.report_crossings(obs)
    }

    fn clock(&self) -> &Clock {
        &self.clock
    }

    fn lattice(&self) -> &Lattice {
        &self.lattice
    }
}
