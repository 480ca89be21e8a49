//! Discrete-time cellular-automaton updates.
//!
//! The four update rules share one routine, parameterized by the order in
//! which sites are updated ([`UpdateOrder`]) and by the number of births an
//! occupied site attempts per step ([`BirthRule`]).

use crate::clock::Clock;
use crate::config::Config;
use crate::engine::Simulator;
use crate::lattice::{Grid, Lattice, Site, Species};
use crate::observer::Observer;
use crate::rates::{BirthRule, RateModel};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Bernoulli;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOrder {
    /// All deaths, then all births, computed on a delayed copy of the lattice.
    Synchronous,
    /// Birth and death trials of every site in one random sequence, each
    /// taking effect immediately.
    Asynchronous,
}

#[derive(Debug, Clone, Copy)]
enum SiteEvent {
    Birth(Site),
    Death(Site),
}

/// Cellular automaton advancing the lattice by a fixed step `tau`.
pub struct DiscreteSimulator<B: BirthRule> {
    order: UpdateOrder,
    lattice: Lattice,
    rates: RateModel,
    births: B,
    deaths: Vec<Bernoulli>,
    clock: Clock,
    rng: ChaCha12Rng,

    site_order: Vec<Site>,
    newborn: Vec<bool>,
    events: Vec<SiteEvent>,
}

impl<B: BirthRule> DiscreteSimulator<B> {
    pub fn new(order: UpdateOrder, cfg: &Config, mut rng: ChaCha12Rng) -> Result<Self> {
        let lattice = Lattice::new(cfg.lattice.size, cfg.n_species(), &mut rng)
            .context("failed to construct lattice")?;
        let rates = RateModel::new(&cfg.species);
        let clock = Clock::new(&cfg.clock);

        let births = B::from_rates(&rates, clock.tau()).context("failed to derive births")?;
        let deaths = rates
            .death_trials(clock.tau())
            .context("failed to derive deaths")?;

        let n_sites = lattice.n_sites();
        let (site_order, newborn, events): (Vec<Site>, Vec<bool>, Vec<SiteEvent>) = match order {
            UpdateOrder::Synchronous => ((0..n_sites).collect(), vec![false; n_sites], Vec::new()),
            UpdateOrder::Asynchronous => (
                Vec::new(),
                Vec::new(),
                (0..n_sites)
                    .flat_map(|site| [SiteEvent::Birth(site), SiteEvent::Death(site)])
                    .collect(),
            ),
        };

        Ok(Self {
            order,
            lattice,
            rates,
            births,
            deaths,
            clock,
            rng,
            site_order,
            newborn,
            events,
        })
    }

    pub fn rates(&self) -> &RateModel {
        &self.rates
    }

    /// Change the rates of `species` between steps. On error the simulator
    /// keeps its previous rates.
    pub fn set_rates(&mut self, species: Species, birth_rate: f64, death_rate: f64) -> Result<()> {
        let mut rates = self.rates.clone();
        rates.set_rates(species, birth_rate, death_rate)?;
        let births = B::from_rates(&rates, self.clock.tau())?;
        let deaths = rates.death_trials(self.clock.tau())?;

        self.rates = rates;
        self.births = births;
        self.deaths = deaths;
        Ok(())
    }

    fn step_synchronous(&mut self, obs: &mut dyn Observer) -> Result<()> {
        self.lattice.stage();

        for site in 0..self.lattice.n_sites() {
            if let Some(species) = self.lattice.species_at(Grid::Current, site) {
                if self.deaths[species].sample(&mut self.rng) {
                    self.lattice
                        .vacate(Grid::Scratch, species, site, &mut self.rng)?;
                    obs.on_death(site, species)?;
                }
            }
        }

        // Random visiting order settles contention for the same empty site.
        self.newborn.fill(false);
        self.site_order.shuffle(&mut self.rng);
        for i_site in 0..self.site_order.len() {
            let site = self.site_order[i_site];
            if self.newborn[site] {
                continue;
            }
            if let Some(species) = self.lattice.species_at(Grid::Scratch, site) {
                let n_births = self.births.birth_count(species, &mut self.rng);
                for _ in 0..n_births {
                    self.give_birth(Grid::Scratch, species, site, obs)?;
                }
            }
        }

        self.lattice.commit();

        Ok(())
    }

    fn step_asynchronous(&mut self, obs: &mut dyn Observer) -> Result<()> {
        self.events.shuffle(&mut self.rng);

        for i_event in 0..self.events.len() {
            match self.events[i_event] {
                SiteEvent::Birth(site) => {
                    if let Some(species) = self.lattice.species_at(Grid::Current, site) {
                        let n_births = self.births.birth_count(species, &mut self.rng);
                        for _ in 0..n_births {
                            self.give_birth(Grid::Current, species, site, obs)?;
                        }
                    }
                }
                SiteEvent::Death(site) => {
                    if let Some(species) = self.lattice.species_at(Grid::Current, site) {
                        if self.deaths[species].sample(&mut self.rng) {
                            self.lattice
                                .vacate(Grid::Current, species, site, &mut self.rng)?;
                            obs.on_death(site, species)?;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Attempt one birth from `site` onto a random neighbor; lost if the
    /// neighbor is occupied.
    fn give_birth(
        &mut self,
        grid: Grid,
        species: Species,
        site: Site,
        obs: &mut dyn Observer,
    ) -> Result<()> {
        let target = self.lattice.random_neighbor(site, &mut self.rng);
        if self.lattice.species_at(grid, target).is_some() {
            return Ok(());
        }
        self.lattice.occupy(grid, species, target);
        if grid == Grid::Scratch {
            self.newborn[target] = true;
        }
        obs.on_birth(target, species)
    }
}

impl<B: BirthRule> Simulator for DiscreteSimulator<B> {
    fn seed(&mut self, species: Species, obs: &mut dyn Observer) -> Result<()> {
        let site = self.lattice.seed(species, &mut self.rng)?;
        obs.on_birth(site, species)
    }

    fn step(&mut self, obs: &mut dyn Observer) -> Result<()> {
        match self.order {
            UpdateOrder::Synchronous => self.step_synchronous(obs)?,
            UpdateOrder::Asynchronous => self.step_asynchronous(obs)?,
        }
        self.clock.tick();
        obs.on_snapshot(&self.snapshot())
    }

    fn clock(&self) -> &Clock {
        &self.clock
    }

    fn lattice(&self) -> &Lattice {
        &self.lattice
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::observer::{Snapshot, testing::Recorder};
    use crate::rates::{MultiBirth, SingleBirth};

    fn build<B: BirthRule>(order: UpdateOrder, cfg: &Config, seed: u64) -> DiscreteSimulator<B> {
        DiscreteSimulator::<B>::new(order, cfg, ChaCha12Rng::seed_from_u64(seed)).unwrap()
    }

    fn populate<B: BirthRule>(sim: &mut DiscreteSimulator<B>, cfg: &Config, obs: &mut Recorder) {
        for (species, spec) in cfg.species.iter().enumerate() {
            for _ in 0..spec.n_init {
                sim.seed(species, obs).unwrap();
            }
        }
    }

    fn run<B: BirthRule>(order: UpdateOrder, cfg: &Config, seed: u64) -> Recorder {
        let mut sim = build::<B>(order, cfg, seed);
        let mut obs = Recorder::default();
        populate(&mut sim, cfg, &mut obs);
        while !sim.is_finished() {
            sim.step(&mut obs).unwrap();
            sim.lattice().check_invariants(Grid::Current).unwrap();
        }
        obs
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Notification {
        Birth(Site),
        Death(Site),
    }

    /// Keeps site-level notifications in the order they happen.
    #[derive(Default)]
    struct Journal {
        entries: Vec<Notification>,
    }

    impl Observer for Journal {
        fn on_birth(&mut self, site: Site, _species: Species) -> Result<()> {
            self.entries.push(Notification::Birth(site));
            Ok(())
        }

        fn on_death(&mut self, site: Site, _species: Species) -> Result<()> {
            self.entries.push(Notification::Death(site));
            Ok(())
        }

        fn on_snapshot(&mut self, _snapshot: &Snapshot) -> Result<()> {
            Ok(())
        }
    }

    fn run_all(cfg: &Config, seed: u64) -> Vec<Recorder> {
        vec![
            run::<SingleBirth>(UpdateOrder::Synchronous, cfg, seed),
            run::<MultiBirth>(UpdateOrder::Synchronous, cfg, seed),
            run::<SingleBirth>(UpdateOrder::Asynchronous, cfg, seed),
            run::<MultiBirth>(UpdateOrder::Asynchronous, cfg, seed),
        ]
    }

    #[test]
    fn certain_death_empties_lattice() {
        let cfg = test_config(3, 5.0, 1.0, &[(1, 0.0, 50.0)]);
        for obs in run_all(&cfg, 1) {
            assert_eq!(obs.records.len(), 5);
            assert!(obs.records.iter().all(|rec| rec.total == 0));
            assert_eq!(obs.n_births, 1);
            assert_eq!(obs.n_deaths, 1);
        }
    }

    #[test]
    fn pure_birth_never_decreases() {
        let cfg = test_config(60, 4.0, 0.5, &[(5, 0.6, 0.0), (5, 0.4, 0.0)]);
        for obs in run_all(&cfg, 2) {
            for pair in obs.records.windows(2) {
                for species in 0..2 {
                    assert!(pair[0].population[species] <= pair[1].population[species]);
                }
            }
            let last = obs.records.last().unwrap();
            assert!(last.total > 10);
            assert!(last.total < 60 * 60);
        }
    }

    #[test]
    fn one_snapshot_per_step() {
        let cfg = test_config(10, 3.0, 0.25, &[(20, 1.0, 0.5)]);
        for obs in run_all(&cfg, 3) {
            assert_eq!(obs.records.len(), 12);
            for (i_rec, rec) in obs.records.iter().enumerate() {
                assert!((rec.time - 0.25 * (i_rec + 1) as f64).abs() < 1e-12);
                assert_eq!(rec.population.iter().sum::<usize>(), rec.total);
            }
        }
    }

    #[test]
    fn synchronous_newborns_do_not_reproduce() {
        let cfg = test_config(7, 1.0, 1.0, &[(1, 50.0, 0.0)]);
        let obs = run::<SingleBirth>(UpdateOrder::Synchronous, &cfg, 4);
        assert_eq!(obs.records[0].total, 2);

        let obs = run::<MultiBirth>(UpdateOrder::Synchronous, &cfg, 4);
        assert!((2..=9).contains(&obs.records[0].total));
    }

    #[test]
    fn births_onto_occupied_sites_are_lost() {
        let cfg = test_config(2, 1.0, 1.0, &[(4, 50.0, 0.0)]);
        for obs in run_all(&cfg, 5) {
            assert_eq!(obs.records[0].total, 4);
            assert_eq!(obs.n_births, 4);
        }
    }

    #[test]
    fn rates_can_change_between_steps() {
        let cfg = test_config(5, 2.0, 1.0, &[(10, 0.0, 0.0)]);
        let mut sim = build::<SingleBirth>(UpdateOrder::Asynchronous, &cfg, 6);
        let mut obs = Recorder::default();
        populate(&mut sim, &cfg, &mut obs);

        sim.step(&mut obs).unwrap();
        assert_eq!(sim.lattice().total_population(), 10);

        sim.set_rates(0, 0.0, 50.0).unwrap();
        assert_eq!(sim.rates().death_rate(0), 50.0);
        sim.step(&mut obs).unwrap();
        assert_eq!(sim.lattice().total_population(), 0);
        assert!(sim.is_finished());
    }

    #[test]
    fn rejected_rates_keep_previous_trials() {
        let cfg = test_config(4, 3.0, 1.0, &[(8, 0.0, 0.0)]);
        let mut sim = build::<MultiBirth>(UpdateOrder::Synchronous, &cfg, 8);
        let mut obs = Recorder::default();
        populate(&mut sim, &cfg, &mut obs);

        assert!(sim.set_rates(0, 0.0, -2.0).is_err());
        assert!(sim.set_rates(0, -1.0, 0.0).is_err());
        assert_eq!(sim.rates().death_rate(0), 0.0);
        assert_eq!(sim.rates().birth_rate(0), 0.0);
        while !sim.is_finished() {
            sim.step(&mut obs).unwrap();
        }
        assert_eq!(sim.lattice().total_population(), 8);
        assert_eq!(obs.n_births, 8);
        assert_eq!(obs.n_deaths, 0);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let cfg = test_config(12, 3.0, 0.5, &[(30, 1.0, 0.3), (30, 0.8, 0.2)]);
        let obs_a = run::<MultiBirth>(UpdateOrder::Asynchronous, &cfg, 7);
        let obs_b = run::<MultiBirth>(UpdateOrder::Asynchronous, &cfg, 7);
        assert_eq!(obs_a.records, obs_b.records);
    }

    #[test]
    fn asynchronous_death_before_birth_slot_skips_birth() {
        let cfg = test_config(3, 1.0, 1.0, &[(1, 50.0, 50.0)]);
        let mut n_death_first = 0;
        let mut n_birth_first = 0;
        for seed in 0..200 {
            let mut sim = build::<SingleBirth>(UpdateOrder::Asynchronous, &cfg, seed);
            let mut journal = Journal::default();
            sim.seed(0, &mut journal).unwrap();
            let Notification::Birth(parent) = journal.entries[0] else {
                panic!("seeding must notify a birth");
            };
            journal.entries.clear();

            sim.step(&mut journal).unwrap();
            sim.lattice().check_invariants(Grid::Current).unwrap();
            if journal.entries[0] == Notification::Death(parent) {
                n_death_first += 1;
                assert_eq!(journal.entries, vec![Notification::Death(parent)]);
                assert_eq!(sim.lattice().total_population(), 0);
            } else {
                n_birth_first += 1;
                assert!(matches!(journal.entries[0], Notification::Birth(site) if site != parent));
                assert!(journal.entries.contains(&Notification::Death(parent)));
            }
        }
        assert!(n_death_first > 50, "{n_death_first}");
        assert!(n_birth_first > 50, "{n_birth_first}");
    }
}
