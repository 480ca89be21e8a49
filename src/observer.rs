//! Passive observers of a simulation run.

use crate::lattice::{Site, Species};
use anyhow::{Context, Result};
use std::io::Write;
use std::{thread, time::Duration};

/// State reported at a fixed output time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot<'a> {
    pub time: f64,
    pub population: &'a [usize],
    pub total: usize,
}

/// Receives notifications after every state transition.
///
/// Nothing an observer returns feeds back into the simulation; an error
/// aborts the run.
pub trait Observer {
    fn on_birth(&mut self, _site: Site, _species: Species) -> Result<()> {
        Ok(())
    }

    fn on_death(&mut self, _site: Site, _species: Species) -> Result<()> {
        Ok(())
    }

    fn on_snapshot(&mut self, snapshot: &Snapshot) -> Result<()>;
}

/// Writes one line per snapshot: time, each species' population, total.
pub struct TableWriter<W: Write> {
    writer: W,
}

impl<W: Write> TableWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Observer for TableWriter<W> {
    fn on_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        let mut line = format!("{:.5}", snapshot.time);
        for n_ind in snapshot.population {
            line += &format!(" {n_ind}");
        }
        line += &format!(" {}", snapshot.total);
        writeln!(self.writer, "{line}").context("failed to write table line")?;
        Ok(())
    }
}

/// Logs every birth and death with its lattice coordinates.
pub struct TraceLogger {
    size: usize,
}

impl TraceLogger {
    pub fn new(size: usize) -> Self {
        Self { size }
    }
}

impl Observer for TraceLogger {
    fn on_birth(&mut self, site: Site, species: Species) -> Result<()> {
        let (row, col) = (site / self.size, site % self.size);
        log::info!("birth of species {species} onto ({row},{col})");
        Ok(())
    }

    fn on_death(&mut self, site: Site, species: Species) -> Result<()> {
        let (row, col) = (site / self.size, site % self.size);
        log::info!("death of species {species} at ({row},{col})");
        Ok(())
    }

    fn on_snapshot(&mut self, _snapshot: &Snapshot) -> Result<()> {
        Ok(())
    }
}

/// Draws the lattice as a character frame after every snapshot.
///
/// The lattice is mirrored from birth and death notifications, so the
/// renderer must observe the run from the very first seeded individual.
pub struct LatticeRenderer<W: Write> {
    writer: W,
    size: usize,
    glyphs: Vec<char>,
    cells: Vec<Option<Species>>,
    frame_delay: Option<Duration>,
}

impl<W: Write> LatticeRenderer<W> {
    pub const EMPTY_GLYPH: char = '.';

    pub fn new(writer: W, size: usize, glyphs: Vec<char>, frame_delay: Option<Duration>) -> Self {
        Self {
            writer,
            size,
            glyphs,
            cells: vec![None; size * size],
            frame_delay,
        }
    }

    pub fn frame(&self) -> String {
        let mut frame = String::with_capacity(self.size * (self.size + 1));
        for row in self.cells.chunks(self.size) {
            frame.extend(row.iter().map(|cell| match cell {
                Some(species) => self.glyphs.get(*species).copied().unwrap_or('?'),
                None => Self::EMPTY_GLYPH,
            }));
            frame.push('\n');
        }
        frame
    }
}

impl<W: Write> Observer for LatticeRenderer<W> {
    fn on_birth(&mut self, site: Site, species: Species) -> Result<()> {
        self.cells[site] = Some(species);
        Ok(())
    }

    fn on_death(&mut self, site: Site, _species: Species) -> Result<()> {
        self.cells[site] = None;
        Ok(())
    }

    fn on_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        writeln!(self.writer, "t = {:.5}", snapshot.time).context("failed to write frame")?;
        write!(self.writer, "{}", self.frame()).context("failed to write frame")?;
        self.writer.flush().context("failed to flush renderer")?;
        if let Some(delay) = self.frame_delay {
            thread::sleep(delay);
        }
        Ok(())
    }
}

/// Forwards every notification to each of its observers in turn.
#[derive(Default)]
pub struct Observers<'a> {
    obs_vec: Vec<Box<dyn Observer + 'a>>,
}

impl<'a> Observers<'a> {
    pub fn push(&mut self, obs: Box<dyn Observer + 'a>) {
        self.obs_vec.push(obs);
    }
}

impl Observer for Observers<'_> {
    fn on_birth(&mut self, site: Site, species: Species) -> Result<()> {
        for obs in &mut self.obs_vec {
            obs.on_birth(site, species)?;
        }
        Ok(())
    }

    fn on_death(&mut self, site: Site, species: Species) -> Result<()> {
        for obs in &mut self.obs_vec {
            obs.on_death(site, species)?;
        }
        Ok(())
    }

    fn on_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        for obs in &mut self.obs_vec {
            obs.on_snapshot(snapshot)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Owned copy of a [`Snapshot`].
    #[derive(Debug, Clone, PartialEq)]
    pub struct Record {
        pub time: f64,
        pub population: Vec<usize>,
        pub total: usize,
    }

    /// Keeps every snapshot and counts site-level notifications.
    #[derive(Default)]
    pub struct Recorder {
        pub records: Vec<Record>,
        pub n_births: usize,
        pub n_deaths: usize,
    }

    impl Observer for Recorder {
        fn on_birth(&mut self, _site: Site, _species: Species) -> Result<()> {
            self.n_births += 1;
            Ok(())
        }

        fn on_death(&mut self, _site: Site, _species: Species) -> Result<()> {
            self.n_deaths += 1;
            Ok(())
        }

        fn on_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
            self.records.push(Record {
                time: snapshot.time,
                population: snapshot.population.to_vec(),
                total: snapshot.total,
            });
            Ok(())
        }
    }
}
