use crate::error::SimError;
use rand::Rng;

const ABSENT: usize = usize::MAX;

/// Set of unique integers over the universe `[0, capacity)` with O(1)
/// insertion, uniform random removal and uniform random peeking.
///
/// Elements live in a dense vector; `pos` maps every universe value to its
/// slot in that vector (or `ABSENT`), which also allows removing a given
/// element in O(1).
#[derive(Debug, Clone)]
pub struct UniformRandomSet {
    elems: Vec<usize>,
    pos: Vec<usize>,
}

impl UniformRandomSet {
    /// Create an empty set able to hold every value in `[0, capacity)`.
    pub fn new(capacity: usize) -> Self {
        Self {
            elems: Vec::with_capacity(capacity),
            pos: vec![ABSENT; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.pos.len()
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn contains(&self, ele: usize) -> bool {
        self.pos.get(ele).is_some_and(|&i_ele| i_ele != ABSENT)
    }

    /// Insert `ele`, which the caller guarantees is not already present.
    ///
    /// The new element is appended and then swapped with a uniformly random
    /// slot, so the storage order stays a uniform permutation.
    ///
    /// # Errors
    /// Returns [`SimError::CapacityExceeded`] if the set is full.
    pub fn insert<R: Rng + ?Sized>(&mut self, ele: usize, rng: &mut R) -> Result<(), SimError> {
        let capacity = self.capacity();
        if self.elems.len() == capacity || ele >= capacity {
            return Err(SimError::CapacityExceeded { capacity });
        }
        debug_assert!(!self.contains(ele), "element {ele} inserted twice");

        let i_last = self.elems.len();
        self.elems.push(ele);
        self.pos[ele] = i_last;

        let i_swap = rng.random_range(0..=i_last);
        self.swap_slots(i_swap, i_last);

        Ok(())
    }

    /// Remove and return a uniformly random element.
    ///
    /// # Errors
    /// Returns [`SimError::EmptyCollection`] if the set is empty.
    pub fn remove_random<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<usize, SimError> {
        if self.elems.is_empty() {
            return Err(SimError::EmptyCollection);
        }
        let i_ele = rng.random_range(0..self.elems.len());
        Ok(self.remove_slot(i_ele))
    }

    /// Return a uniformly random element without removing it.
    ///
    /// # Errors
    /// Returns [`SimError::EmptyCollection`] if the set is empty.
    pub fn peek_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<usize, SimError> {
        if self.elems.is_empty() {
            return Err(SimError::EmptyCollection);
        }
        let i_ele = rng.random_range(0..self.elems.len());
        Ok(self.elems[i_ele])
    }

    /// Remove `ele` if present. Returns whether it was present.
    pub fn remove(&mut self, ele: usize) -> bool {
        match self.pos.get(ele) {
            Some(&i_ele) if i_ele != ABSENT => {
                self.remove_slot(i_ele);
                true
            }
            _ => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.elems.iter().copied()
    }

    fn swap_slots(&mut self, i_a: usize, i_b: usize) {
        self.elems.swap(i_a, i_b);
        self.pos[self.elems[i_a]] = i_a;
        self.pos[self.elems[i_b]] = i_b;
    }

    fn remove_slot(&mut self, i_ele: usize) -> usize {
        let ele = self.elems.swap_remove(i_ele);
        self.pos[ele] = ABSENT;
        if let Some(&moved) = self.elems.get(i_ele) {
            self.pos[moved] = i_ele;
        }
        ele
    }
}
