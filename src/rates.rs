//! Birth and death rates and their conversion into per-step probabilities
//! (discrete models) or propensities (continuous model).

use crate::config::SpeciesConfig;
use crate::lattice::{MOORE_SIZE, Species};
use anyhow::{Context, Result, ensure};
use rand::Rng;
use rand_distr::{Bernoulli, Distribution};

/// Probability that at least one event of a Poisson process with the given
/// `rate` happens within an interval of length `tau`: `1 - exp(-rate * tau)`.
pub fn event_probability(rate: f64, tau: f64) -> f64 {
    -(-rate * tau).exp_m1()
}

/// Number of events of a Poisson distribution with mean `lambda_tau`,
/// truncated at the size of the Moore neighborhood, by inverting the CDF at
/// the uniform draw `u`.
pub fn truncated_poisson(lambda_tau: f64, u: f64) -> usize {
    let mut mass = (-lambda_tau).exp();
    let mut cum_mass = mass;
    for n_events in 0..MOORE_SIZE {
        if n_events > 0 {
            mass *= lambda_tau / n_events as f64;
            cum_mass += mass;
        }
        if cum_mass >= u {
            return n_events;
        }
    }
    MOORE_SIZE
}

/// Per-species birth and death rates in continuous-time units.
#[derive(Debug, Clone, PartialEq)]
pub struct RateModel {
    birth_rate: Vec<f64>,
    death_rate: Vec<f64>,
}

impl RateModel {
    pub fn new(species: &[SpeciesConfig]) -> Self {
        Self {
            birth_rate: species.iter().map(|spec| spec.birth_rate).collect(),
            death_rate: species.iter().map(|spec| spec.death_rate).collect(),
        }
    }

    pub fn n_species(&self) -> usize {
        self.birth_rate.len()
    }

    pub fn birth_rate(&self, species: Species) -> f64 {
        self.birth_rate[species]
    }

    pub fn death_rate(&self, species: Species) -> f64 {
        self.death_rate[species]
    }

    /// Replace both rates of `species`, leaving the model untouched if
    /// either is negative or not finite.
    pub fn set_rates(&mut self, species: Species, birth_rate: f64, death_rate: f64) -> Result<()> {
        for (name, rate) in [("birth", birth_rate), ("death", death_rate)] {
            ensure!(
                rate.is_finite() && rate >= 0.0,
                "invalid {name} rate of species {species}: {rate}"
            );
        }
        self.birth_rate[species] = birth_rate;
        self.death_rate[species] = death_rate;
        Ok(())
    }

    /// Bernoulli death trial of each species over one step of length `tau`.
    pub fn death_trials(&self, tau: f64) -> Result<Vec<Bernoulli>> {
        self.death_rate
            .iter()
            .enumerate()
            .map(|(species, &rate)| {
                Bernoulli::new(event_probability(rate, tau))
                    .with_context(|| format!("invalid death rate of species {species}"))
            })
            .collect()
    }

    /// Instantaneous birth and death propensities for the given populations.
    pub fn propensities(&self, population: &[usize]) -> Propensities {
        let mut birth = Vec::with_capacity(self.n_species());
        let mut death = Vec::with_capacity(self.n_species());
        for (species, &n_ind) in population.iter().enumerate() {
            birth.push(self.birth_rate[species] * n_ind as f64);
            death.push(self.death_rate[species] * n_ind as f64);
        }
        let total = birth.iter().sum::<f64>() + death.iter().sum::<f64>();
        Propensities {
            birth,
            death,
            total,
        }
    }
}

/// Continuous-time event of the Gillespie engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Birth(Species),
    Death(Species),
}

/// Population-weighted rates of every event.
#[derive(Debug, Clone, PartialEq)]
pub struct Propensities {
    birth: Vec<f64>,
    death: Vec<f64>,
    total: f64,
}

impl Propensities {
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Select the event whose cumulative probability interval contains `u`,
    /// walking birth(0), death(0), birth(1), death(1), ...
    ///
    /// Returns `None` only if the total propensity is zero.
    pub fn select(&self, u: f64) -> Option<Event> {
        if self.total <= 0.0 {
            return None;
        }
        let mut upper = 0.0;
        let mut last = None;
        for (species, (&birth, &death)) in self.birth.iter().zip(&self.death).enumerate() {
            for (propensity, event) in [(birth, Event::Birth(species)), (death, Event::Death(species))] {
                if propensity <= 0.0 {
                    continue;
                }
                upper += propensity / self.total;
                if u < upper {
                    return Some(event);
                }
                last = Some(event);
            }
        }
        // Rounding can leave the cumulative sum slightly below one.
        last
    }
}

/// Conversion of a birth rate into the number of birth attempts an occupied
/// site makes during one discrete step.
pub trait BirthRule: Sized {
    fn from_rates(rates: &RateModel, tau: f64) -> Result<Self>;

    fn birth_count<R: Rng + ?Sized>(&self, species: Species, rng: &mut R) -> usize;
}

/// At most one birth per step, with probability `1 - exp(-birth_rate * tau)`.
#[derive(Debug, Clone)]
pub struct SingleBirth {
    trials: Vec<Bernoulli>,
}

impl BirthRule for SingleBirth {
    fn from_rates(rates: &RateModel, tau: f64) -> Result<Self> {
        let trials = (0..rates.n_species())
            .map(|species| {
                Bernoulli::new(event_probability(rates.birth_rate(species), tau))
                    .with_context(|| format!("invalid birth rate of species {species}"))
            })
            .collect::<Result<_>>()?;
        Ok(Self { trials })
    }

    fn birth_count<R: Rng + ?Sized>(&self, species: Species, rng: &mut R) -> usize {
        usize::from(self.trials[species].sample(rng))
    }
}

/// Poisson-distributed number of births per step, truncated at the size of
/// the Moore neighborhood.
#[derive(Debug, Clone)]
pub struct MultiBirth {
    lambda_tau: Vec<f64>,
}

impl BirthRule for MultiBirth {
    fn from_rates(rates: &RateModel, tau: f64) -> Result<Self> {
        let lambda_tau = (0..rates.n_species())
            .map(|species| rates.birth_rate(species) * tau)
            .collect();
        Ok(Self { lambda_tau })
    }

    fn birth_count<R: Rng + ?Sized>(&self, species: Species, rng: &mut R) -> usize {
        truncated_poisson(self.lambda_tau[species], rng.random())
    }
}
