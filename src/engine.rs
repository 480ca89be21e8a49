use crate::clock::Clock;
use crate::config::Config;
use crate::discrete::{DiscreteSimulator, UpdateOrder};
use crate::gillespie::GillespieSimulator;
use crate::lattice::{Lattice, Species};
use crate::observer::{Observer, Snapshot};
use crate::rates::{MultiBirth, SingleBirth};
use anyhow::{Context, Result};
use clap::ValueEnum;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;

/// Common interface of the discrete and continuous simulators.
pub trait Simulator {
    /// Place one individual of `species` on a random free site.
    fn seed(&mut self, species: Species, obs: &mut dyn Observer) -> Result<()>;

    /// Advance the simulation, notifying `obs` of every transition.
    fn step(&mut self, obs: &mut dyn Observer) -> Result<()>;

    fn clock(&self) -> &Clock;

    fn lattice(&self) -> &Lattice;

    fn is_finished(&self) -> bool {
        self.clock().is_finished()
    }

    fn snapshot(&self) -> Snapshot<'_> {
        let lattice = self.lattice();
        Snapshot {
            time: self.clock().time(),
            population: lattice.populations(),
            total: lattice.total_population(),
        }
    }
}

/// Update rule used to advance the lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Algorithm {
    /// Synchronous updates, at most one birth per site and step.
    SyncSingle,
    /// Synchronous updates, Poisson number of births per site and step.
    SyncMulti,
    /// Asynchronous updates, at most one birth per site and step.
    AsyncSingle,
    /// Asynchronous updates, Poisson number of births per site and step.
    AsyncMulti,
    /// Continuous-time Gillespie simulation.
    Gillespie,
}

/// Simulation engine.
///
/// Holds the selected simulator, which owns the lattice, rates, clock and
/// random number generator of one run.
pub struct Engine {
    algorithm: Algorithm,
    sim: Box<dyn Simulator>,
}

impl Engine {
    /// Create a new `Engine` and place the initial population at random.
    ///
    /// Without a `seed` the random number generator is seeded from the OS.
    pub fn generate_initial_condition(
        cfg: &Config,
        algorithm: Algorithm,
        seed: Option<u64>,
        obs: &mut dyn Observer,
    ) -> Result<Self> {
        let rng = match seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng()?,
        };

        let mut sim: Box<dyn Simulator> = match algorithm {
            Algorithm::SyncSingle => Box::new(DiscreteSimulator::<SingleBirth>::new(
                UpdateOrder::Synchronous,
                cfg,
                rng,
            )?),
            Algorithm::SyncMulti => Box::new(DiscreteSimulator::<MultiBirth>::new(
                UpdateOrder::Synchronous,
                cfg,
                rng,
            )?),
            Algorithm::AsyncSingle => Box::new(DiscreteSimulator::<SingleBirth>::new(
                UpdateOrder::Asynchronous,
                cfg,
                rng,
            )?),
            Algorithm::AsyncMulti => Box::new(DiscreteSimulator::<MultiBirth>::new(
                UpdateOrder::Asynchronous,
                cfg,
                rng,
            )?),
            Algorithm::Gillespie => Box::new(GillespieSimulator::new(cfg, rng)?),
        };

        for (species, spec) in cfg.species.iter().enumerate() {
            for _ in 0..spec.n_init {
                sim.seed(species, obs)
                    .with_context(|| format!("failed to seed species {species}"))?;
            }
        }

        Ok(Self { algorithm, sim })
    }

    /// Report the initial state, then step until the maximum time.
    pub fn perform_simulation(&mut self, obs: &mut dyn Observer) -> Result<()> {
        log::debug!("starting {:?} simulation", self.algorithm);
        obs.on_snapshot(&self.sim.snapshot())
            .context("failed to report initial state")?;

        const N_PROGRESS_REPORTS: u32 = 10;
        let mut i_report = 1;
        while !self.sim.is_finished() {
            self.sim.step(obs).context("failed to perform step")?;

            let progress = self.sim.clock().progress();
            if progress * N_PROGRESS_REPORTS as f64 >= i_report as f64 {
                log::debug!("completed {:06.2}%", 100.0 * progress);
                i_report += 1;
            }
        }

        Ok(())
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        self.sim.snapshot()
    }
}
