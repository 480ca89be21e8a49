//! Toroidal lattice of species occupancy.

use crate::error::SimError;
use crate::random_set::UniformRandomSet;
use anyhow::{Result, bail};
use rand::Rng;

/// Species index in `[0, n_species)`.
pub type Species = usize;

/// Flattened row-major cell index `row * size + col`.
pub type Site = usize;

/// Row and column offsets of the Moore neighborhood.
pub const MOORE_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Number of sites in the Moore neighborhood.
pub const MOORE_SIZE: usize = MOORE_OFFSETS.len();

/// Selects one of the two grids held by a [`Lattice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grid {
    /// Authoritative state.
    Current,
    /// Working buffer of synchronous updates.
    Scratch,
}

/// `size x size` torus holding at most one individual per site.
///
/// Population counters and the free-space pool always describe the grid
/// that was last written through [`Lattice::occupy`] and [`Lattice::vacate`].
/// Synchronous updates write to [`Grid::Scratch`] between [`Lattice::stage`]
/// and [`Lattice::commit`], so after the commit they describe
/// [`Grid::Current`] again.
#[derive(Debug, Clone)]
pub struct Lattice {
    size: usize,
    current: Vec<Option<Species>>,
    scratch: Vec<Option<Species>>,
    population: Vec<usize>,
    total_population: usize,
    free_space: UniformRandomSet,
}

impl Lattice {
    /// Create an empty lattice. Every site starts in the free-space pool.
    pub fn new<R: Rng + ?Sized>(size: usize, n_species: usize, rng: &mut R) -> Result<Self> {
        let n_sites = size * size;
        let mut free_space = UniformRandomSet::new(n_sites);
        for site in 0..n_sites {
            free_space.insert(site, rng)?;
        }
        Ok(Self {
            size,
            current: vec![None; n_sites],
            scratch: vec![None; n_sites],
            population: vec![0; n_species],
            total_population: 0,
            free_space,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn n_sites(&self) -> usize {
        self.current.len()
    }

    pub fn n_species(&self) -> usize {
        self.population.len()
    }

    pub fn population(&self, species: Species) -> usize {
        self.population[species]
    }

    pub fn populations(&self) -> &[usize] {
        &self.population
    }

    pub fn total_population(&self) -> usize {
        self.total_population
    }

    pub fn free_sites(&self) -> usize {
        self.free_space.len()
    }

    pub fn site_of(&self, row: usize, col: usize) -> Site {
        row * self.size + col
    }

    pub fn coords(&self, site: Site) -> (usize, usize) {
        (site / self.size, site % self.size)
    }

    pub fn species_at(&self, grid: Grid, site: Site) -> Option<Species> {
        self.cells(grid)[site]
    }

    /// Place one individual of `species` on a uniformly random free site.
    ///
    /// # Errors
    /// Fails with [`SimError::EmptyCollection`] if the lattice is full.
    pub fn seed<R: Rng + ?Sized>(
        &mut self,
        species: Species,
        rng: &mut R,
    ) -> Result<Site, SimError> {
        let site = self.free_space.remove_random(rng)?;
        self.current[site] = Some(species);
        self.population[species] += 1;
        self.total_population += 1;
        Ok(site)
    }

    /// Mark the free `site` of `grid` as held by `species`.
    pub fn occupy(&mut self, grid: Grid, species: Species, site: Site) {
        let cells = self.cells_mut(grid);
        debug_assert!(cells[site].is_none(), "site {site} is not free");
        cells[site] = Some(species);
        self.population[species] += 1;
        self.total_population += 1;
        let removed = self.free_space.remove(site);
        debug_assert!(removed, "site {site} missing from the free-space pool");
    }

    /// Clear `site` of `grid`, which the caller guarantees holds `species`.
    ///
    /// # Errors
    /// Fails with [`SimError::CapacityExceeded`] if the free-space pool is
    /// already full, which means the bookkeeping is corrupt.
    pub fn vacate<R: Rng + ?Sized>(
        &mut self,
        grid: Grid,
        species: Species,
        site: Site,
        rng: &mut R,
    ) -> Result<(), SimError> {
        let cells = self.cells_mut(grid);
        debug_assert_eq!(cells[site], Some(species), "site {site} does not hold {species}");
        cells[site] = None;
        self.population[species] -= 1;
        self.total_population -= 1;
        self.free_space.insert(site, rng)
    }

    /// Uniformly random site of the Moore neighborhood of `site`, wrapping
    /// around the lattice edges.
    pub fn random_neighbor<R: Rng + ?Sized>(&self, site: Site, rng: &mut R) -> Site {
        let (row, col) = self.coords(site);
        let (d_row, d_col) = MOORE_OFFSETS[rng.random_range(0..MOORE_SIZE)];
        let size = self.size as isize;
        let row = (row as isize + d_row).rem_euclid(size) as usize;
        let col = (col as isize + d_col).rem_euclid(size) as usize;
        self.site_of(row, col)
    }

    /// Copy the current grid into the scratch grid.
    pub fn stage(&mut self) {
        self.scratch.copy_from_slice(&self.current);
    }

    /// Copy the scratch grid back into the current grid.
    pub fn commit(&mut self) {
        self.current.copy_from_slice(&self.scratch);
    }

    /// Verify the occupancy bookkeeping against the cells of `grid`.
    pub fn check_invariants(&self, grid: Grid) -> Result<()> {
        let mut counted = vec![0; self.n_species()];
        for (site, cell) in self.cells(grid).iter().enumerate() {
            match cell {
                Some(species) => {
                    counted[*species] += 1;
                    if self.free_space.contains(site) {
                        bail!("occupied site {site} is in the free-space pool");
                    }
                }
                None => {
                    if !self.free_space.contains(site) {
                        bail!("empty site {site} is missing from the free-space pool");
                    }
                }
            }
        }
        if counted != self.population {
            bail!(
                "species counters {:?} differ from lattice contents {counted:?}",
                self.population
            );
        }
        let sum: usize = counted.iter().sum();
        if sum != self.total_population {
            bail!(
                "total population {} differs from lattice contents {sum}",
                self.total_population
            );
        }
        Ok(())
    }

    fn cells(&self, grid: Grid) -> &[Option<Species>] {
        match grid {
            Grid::Current => &self.current,
            Grid::Scratch => &self.scratch,
        }
    }

    fn cells_mut(&mut self, grid: Grid) -> &mut [Option<Species>] {
        match grid {
            Grid::Current => &mut self.current,
            Grid::Scratch => &mut self.scratch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;
    use std::collections::HashSet;

    #[test]
    fn new_lattice_is_empty() {
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        let lattice = Lattice::new(4, 2, &mut rng).unwrap();
        assert_eq!(lattice.n_sites(), 16);
        assert_eq!(lattice.free_sites(), 16);
        assert_eq!(lattice.total_population(), 0);
        lattice.check_invariants(Grid::Current).unwrap();
    }

    #[test]
    fn occupy_and_vacate_keep_bookkeeping() {
        let mut rng = ChaCha12Rng::seed_from_u64(2);
        let mut lattice = Lattice::new(5, 3, &mut rng).unwrap();
        for species in [0, 1, 1, 2, 2, 2] {
            lattice.seed(species, &mut rng).unwrap();
        }
        assert_eq!(lattice.populations(), &[1, 2, 3]);
        lattice.check_invariants(Grid::Current).unwrap();

        let site = (0..25)
            .find(|&site| lattice.species_at(Grid::Current, site).is_none())
            .unwrap();
        lattice.occupy(Grid::Current, 0, site);
        assert_eq!(lattice.population(0), 2);
        assert_eq!(lattice.free_sites(), 25 - 7);
        lattice.check_invariants(Grid::Current).unwrap();

        lattice.vacate(Grid::Current, 0, site, &mut rng).unwrap();
        assert_eq!(lattice.total_population(), 6);
        lattice.check_invariants(Grid::Current).unwrap();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "missing from the free-space pool")]
    fn occupying_a_site_outside_the_pool_panics() {
        let mut rng = ChaCha12Rng::seed_from_u64(7);
        let mut lattice = Lattice::new(3, 1, &mut rng).unwrap();
        lattice.occupy(Grid::Current, 0, 4);
        lattice.occupy(Grid::Scratch, 0, 4);
    }

    #[test]
    fn seeding_a_full_lattice_fails() {
        let mut rng = ChaCha12Rng::seed_from_u64(3);
        let mut lattice = Lattice::new(2, 1, &mut rng).unwrap();
        for _ in 0..4 {
            lattice.seed(0, &mut rng).unwrap();
        }
        assert_eq!(lattice.seed(0, &mut rng), Err(SimError::EmptyCollection));
    }

    #[test]
    fn neighbors_wrap_around_boundary() {
        let mut rng = ChaCha12Rng::seed_from_u64(4);
        let size = 5;
        let lattice = Lattice::new(size, 1, &mut rng).unwrap();

        let boundary = (0..size * size).filter(|&site| {
            let (row, col) = lattice.coords(site);
            row == 0 || col == 0 || row == size - 1 || col == size - 1
        });
        for site in boundary {
            let (row, col) = lattice.coords(site);
            let expected: HashSet<Site> = MOORE_OFFSETS
                .iter()
                .map(|&(d_row, d_col)| {
                    let r = (row + size).wrapping_add_signed(d_row) % size;
                    let c = (col + size).wrapping_add_signed(d_col) % size;
                    lattice.site_of(r, c)
                })
                .collect();
            assert_eq!(expected.len(), MOORE_SIZE);

            let mut seen = HashSet::new();
            for _ in 0..400 {
                let neighbor = lattice.random_neighbor(site, &mut rng);
                assert!(neighbor < size * size);
                assert!(expected.contains(&neighbor), "{neighbor} not adjacent to {site}");
                seen.insert(neighbor);
            }
            assert_eq!(seen, expected);
        }
    }

    #[test]
    fn stage_and_commit_copy_grids() {
        let mut rng = ChaCha12Rng::seed_from_u64(5);
        let mut lattice = Lattice::new(3, 1, &mut rng).unwrap();
        let site = lattice.seed(0, &mut rng).unwrap();

        lattice.stage();
        assert_eq!(lattice.species_at(Grid::Scratch, site), Some(0));

        lattice.vacate(Grid::Scratch, 0, site, &mut rng).unwrap();
        assert_eq!(lattice.species_at(Grid::Current, site), Some(0));

        lattice.commit();
        assert_eq!(lattice.species_at(Grid::Current, site), None);
        lattice.check_invariants(Grid::Current).unwrap();
    }
}
