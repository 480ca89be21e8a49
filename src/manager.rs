use crate::config::Config;
use crate::engine::{Algorithm, Engine};
use crate::observer::{LatticeRenderer, Observers, TableWriter, TraceLogger};
use crate::stats::{Accumulator, AccumulatorReport};
use anyhow::{Context, Result};
use clap::ValueEnum;
use std::{io, io::Write, time::Duration};

/// What a run invocation does besides writing the population table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Mode {
    /// Single silent run.
    #[default]
    Plain,
    /// Single run, drawing the lattice after every output step.
    Draw,
    /// Single run, logging every birth and death and drawing the lattice.
    Trace,
    /// Ten independent runs.
    Ten,
    /// One hundred independent runs.
    Hundred,
}

impl Mode {
    pub fn n_runs(self) -> usize {
        match self {
            Mode::Ten => 10,
            Mode::Hundred => 100,
            Mode::Plain | Mode::Draw | Mode::Trace => 1,
        }
    }

    pub fn draws(self) -> bool {
        matches!(self, Mode::Draw | Mode::Trace)
    }

    pub fn traces(self) -> bool {
        matches!(self, Mode::Trace)
    }
}

/// Runs the requested repetitions of one simulation setup.
pub struct Manager {
    cfg: Config,
    algorithm: Algorithm,
    mode: Mode,
    seed: Option<u64>,
}

impl Manager {
    pub fn new(cfg: Config, algorithm: Algorithm, mode: Mode, seed: Option<u64>) -> Self {
        Self {
            cfg,
            algorithm,
            mode,
            seed,
        }
    }

    /// Perform every run, writing the population table to `out`.
    ///
    /// Returns the mean and standard deviation over runs of each species'
    /// final population, followed by that of the total population.
    pub fn run_simulations<W: Write>(&self, mut out: W) -> Result<Vec<AccumulatorReport>> {
        let n_species = self.cfg.n_species();
        let mut acc_vec = Vec::new();
        acc_vec.resize_with(n_species + 1, Accumulator::new);

        let n_runs = self.mode.n_runs();
        for i_run in 0..n_runs {
            let seed = self.seed.map(|seed| seed.wrapping_add(i_run as u64));

            let mut obs = self.observers(&mut out);
            let mut engine = Engine::generate_initial_condition(
                &self.cfg,
                self.algorithm,
                seed,
                &mut obs,
            )
            .context("failed to generate initial condition")?;

            engine
                .perform_simulation(&mut obs)
                .with_context(|| format!("failed to perform run {i_run}"))?;
            drop(obs);

            let snapshot = engine.snapshot();
            for (acc, &n_ind) in acc_vec.iter_mut().zip(snapshot.population) {
                acc.add(n_ind as f64);
            }
            acc_vec[n_species].add(snapshot.total as f64);
            log::info!(
                "finished run {}/{n_runs} at time {:.5} with populations {:?}",
                i_run + 1,
                snapshot.time,
                snapshot.population
            );

            out.flush().context("failed to flush output stream")?;
        }

        let reports: Vec<_> = acc_vec.iter().map(Accumulator::report).collect();
        if n_runs > 1 {
            for (i_species, report) in reports[..n_species].iter().enumerate() {
                log::info!(
                    "final population of species {i_species}: {:.3} +- {:.3}",
                    report.mean,
                    report.std_dev
                );
            }
            let report = reports[n_species];
            log::info!(
                "final total population: {:.3} +- {:.3}",
                report.mean,
                report.std_dev
            );
        }

        Ok(reports)
    }

    fn observers<'a, W: Write>(&self, out: &'a mut W) -> Observers<'a> {
        let mut obs = Observers::default();
        obs.push(Box::new(TableWriter::new(out)));

        let size = self.cfg.lattice.size;
        if self.mode.traces() {
            obs.push(Box::new(TraceLogger::new(size)));
        }
        if self.mode.draws() {
            let frame_delay = match self.cfg.output.frame_delay_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            };
            obs.push(Box::new(LatticeRenderer::new(
                io::stderr(),
                size,
                self.cfg.glyphs(),
                frame_delay,
            )));
        }

        obs
    }
}
