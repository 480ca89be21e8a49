use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path, str::FromStr};

const MAX_SIZE: usize = 4096;
const MAX_SPECIES: usize = 64;
const DEFAULT_GLYPHS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Simulation configuration parameters.
///
/// Loaded from a TOML file ([`Config::from_file`]) or built from positional
/// command line values ([`Config::from_args`]), and validated before use.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub lattice: LatticeConfig,
    pub clock: ClockConfig,
    pub species: Vec<SpeciesConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct LatticeConfig {
    /// Side length of the square torus.
    pub size: usize,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Model time at which the run stops.
    pub max_time: f64,
    /// Discrete step length and output interval.
    pub tau: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SpeciesConfig {
    /// Initial number of individuals.
    pub n_init: usize,
    /// Birth rate per individual (continuous-time units).
    pub birth_rate: f64,
    /// Death rate per individual (continuous-time units).
    pub death_rate: f64,
    /// Character used when drawing the lattice.
    #[serde(default)]
    pub glyph: Option<char>,
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Pause after every drawn frame, in milliseconds.
    #[serde(default)]
    pub frame_delay_ms: u64,
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        contents.parse()
    }

    /// Build a [`Config`] from the positional values
    /// `size max_time tau (n_init birth_rate death_rate)+`.
    pub fn from_args(size: usize, max_time: f64, tau: f64, species_args: &[String]) -> Result<Self> {
        if species_args.is_empty() || species_args.len() % 3 != 0 {
            bail!(
                "species must be given as triples of (n_init birth_rate death_rate), got {} values",
                species_args.len()
            );
        }

        let species = species_args
            .chunks_exact(3)
            .enumerate()
            .map(|(i_species, triple)| {
                parse_species(triple).with_context(|| format!("invalid species {i_species}"))
            })
            .collect::<Result<_>>()?;

        let config = Config {
            lattice: LatticeConfig { size },
            clock: ClockConfig { max_time, tau },
            species,
            output: OutputConfig::default(),
        };

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    pub fn n_species(&self) -> usize {
        self.species.len()
    }

    /// Drawing character of every species, defaulting to `A`, `B`, ...
    pub fn glyphs(&self) -> Vec<char> {
        self.species
            .iter()
            .enumerate()
            .map(|(i_species, spec)| {
                spec.glyph
                    .unwrap_or_else(|| DEFAULT_GLYPHS.chars().nth(i_species).unwrap_or('#'))
            })
            .collect()
    }

    fn validate(&self) -> Result<()> {
        let size = self.lattice.size;
        check_num(size, 1..=MAX_SIZE).context("invalid lattice size")?;

        check_num(self.clock.max_time, 0.0..f64::INFINITY).context("invalid maximum time")?;
        check_num(self.clock.tau, f64::MIN_POSITIVE..f64::INFINITY)
            .context("invalid time step")?;

        check_num(self.species.len(), 1..=MAX_SPECIES).context("invalid number of species")?;
        for (i_species, spec) in self.species.iter().enumerate() {
            check_num(spec.birth_rate, 0.0..f64::INFINITY)
                .with_context(|| format!("invalid birth rate of species {i_species}"))?;
            check_num(spec.death_rate, 0.0..f64::INFINITY)
                .with_context(|| format!("invalid death rate of species {i_species}"))?;
        }

        let n_init: usize = self.species.iter().map(|spec| spec.n_init).sum();
        let n_sites = size * size;
        if n_init > n_sites {
            bail!("initial population {n_init} does not fit in {n_sites} sites");
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }
}

fn parse_species(triple: &[String]) -> Result<SpeciesConfig> {
    let n_init = triple[0]
        .parse()
        .with_context(|| format!("invalid initial population {:?}", triple[0]))?;
    let birth_rate = triple[1]
        .parse()
        .with_context(|| format!("invalid birth rate {:?}", triple[1]))?;
    let death_rate = triple[2]
        .parse()
        .with_context(|| format!("invalid death rate {:?}", triple[2]))?;
    Ok(SpeciesConfig {
        n_init,
        birth_rate,
        death_rate,
        glyph: None,
    })
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

#[cfg(test)]
pub fn test_config(size: usize, max_time: f64, tau: f64, species: &[(usize, f64, f64)]) -> Config {
    let config = Config {
        lattice: LatticeConfig { size },
        clock: ClockConfig { max_time, tau },
        species: species
            .iter()
            .map(|&(n_init, birth_rate, death_rate)| SpeciesConfig {
                n_init,
                birth_rate,
                death_rate,
                glyph: None,
            })
            .collect(),
        output: OutputConfig::default(),
    };
    config.validate().expect("invalid test config");
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML_STR: &str = r#"
[lattice]
size = 20

[clock]
max_time = 10.0
tau = 0.5

[[species]]
n_init = 40
birth_rate = 1.0
death_rate = 0.1
glyph = "x"

[[species]]
n_init = 20
birth_rate = 0.5
death_rate = 0.05
"#;

    fn args(vals: &[&str]) -> Vec<String> {
        vals.iter().map(|val| val.to_string()).collect()
    }

    #[test]
    fn parse_toml() {
        let cfg: Config = TOML_STR.parse().unwrap();
        assert_eq!(cfg.lattice.size, 20);
        assert_eq!(cfg.clock.tau, 0.5);
        assert_eq!(cfg.n_species(), 2);
        assert_eq!(cfg.species[1].death_rate, 0.05);
        assert_eq!(cfg.output.frame_delay_ms, 0);
        assert_eq!(cfg.glyphs(), vec!['x', 'B']);
    }

    #[test]
    fn args_match_toml() {
        let cfg = Config::from_args(
            20,
            10.0,
            0.5,
            &args(&["40", "1.0", "0.1", "20", "0.5", "0.05"]),
        )
        .unwrap();
        let mut from_toml: Config = TOML_STR.parse().unwrap();
        from_toml.species[0].glyph = None;
        assert_eq!(cfg, from_toml);
    }

    #[test]
    fn reject_incomplete_triple() {
        let err = Config::from_args(10, 1.0, 0.1, &args(&["5", "1.0"])).unwrap_err();
        assert!(err.to_string().contains("triples"));
    }

    #[test]
    fn reject_non_numeric_value() {
        assert!(Config::from_args(10, 1.0, 0.1, &args(&["5", "fast", "0.1"])).is_err());
    }

    #[test]
    fn reject_invalid_values() {
        assert!(Config::from_args(10, 1.0, 0.0, &args(&["5", "1.0", "0.1"])).is_err());
        assert!(Config::from_args(10, 1.0, 0.1, &args(&["5", "-1.0", "0.1"])).is_err());
        assert!(Config::from_args(10, 1.0, 0.1, &args(&["5", "1.0", "NaN"])).is_err());
        assert!(Config::from_args(0, 1.0, 0.1, &args(&["0", "1.0", "0.1"])).is_err());
    }

    #[test]
    fn reject_overcrowded_lattice() {
        let err = Config::from_args(3, 1.0, 0.1, &args(&["5", "1.0", "0.1", "5", "1.0", "0.1"]))
            .unwrap_err();
        assert!(format!("{err:#}").contains("does not fit"));
    }
}
