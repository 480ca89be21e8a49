use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use gillespie_ca::config::Config;
use gillespie_ca::engine::Algorithm;
use gillespie_ca::manager::{Manager, Mode};
use std::{io, io::BufWriter, path::PathBuf};

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    /// Seed of the random number generator (run `r` uses `seed + r`).
    #[arg(long)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Take every parameter from the command line.
    Args {
        #[arg(value_enum)]
        algorithm: Algorithm,

        /// Side length of the lattice.
        size: usize,

        /// Model time at which to stop.
        max_time: f64,

        /// Time step and output interval.
        tau: f64,

        /// Triples `n_init birth_rate death_rate`, one per species,
        /// optionally followed by a mode (plain, draw, trace, ten, hundred).
        #[arg(required = true, num_args = 3..)]
        values: Vec<String>,
    },

    /// Read the parameters from a TOML file.
    Config {
        #[arg(long)]
        file: PathBuf,

        #[arg(long, value_enum)]
        algorithm: Algorithm,

        #[arg(long, value_enum, default_value_t = Mode::Plain)]
        mode: Mode,
    },
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::debug!("{args:#?}");

    let (cfg, algorithm, mode) = match args.command {
        Command::Args {
            algorithm,
            size,
            max_time,
            tau,
            mut values,
        } => {
            let mode = match values.len() % 3 {
                1 => {
                    let token = values.pop().context("missing mode")?;
                    Mode::from_str(&token, true).map_err(|err| anyhow!("invalid mode: {err}"))?
                }
                _ => Mode::Plain,
            };
            let cfg = Config::from_args(size, max_time, tau, &values)
                .context("failed to construct cfg")?;
            (cfg, algorithm, mode)
        }
        Command::Config {
            file,
            algorithm,
            mode,
        } => {
            let cfg = Config::from_file(&file).context("failed to construct cfg")?;
            (cfg, algorithm, mode)
        }
    };
    log::info!("{algorithm:?} in {mode:?} mode");
    log::debug!("{cfg:#?}");

    let mgr = Manager::new(cfg, algorithm, mode, args.seed);
    let stdout = io::stdout();
    mgr.run_simulations(BufWriter::new(stdout.lock()))?;

    Ok(())
}
