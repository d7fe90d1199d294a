/// Set of still-unmatched input positions for one side of a run.
///
/// Backed by a liveness vector indexed by input position, so iteration is
/// always in input order and a taken position can never come back.
#[derive(Debug, Clone)]
pub struct Pool {
    live: Vec<bool>,
    remaining: usize,
}

impl Pool {
    pub fn new(len: usize) -> Self {
        Self {
            live: vec![true; len],
            remaining: len,
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.live.get(index).copied().unwrap_or(false)
    }

    /// Remove `index` from the pool. Returns false if it was already gone.
    pub fn take(&mut self, index: usize) -> bool {
        match self.live.get_mut(index) {
            Some(slot) if *slot => {
                *slot = false;
                self.remaining -= 1;
                true
            }
            _ => false,
        }
    }

    /// Live positions in input order, snapshotted so the caller may take
    /// from the pool while walking the result.
    pub fn indices(&self) -> Vec<usize> {
        self.iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.live
            .iter()
            .enumerate()
            .filter_map(|(i, live)| live.then_some(i))
    }

    pub fn len(&self) -> usize {
        self.remaining
    }

    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    /// Total number of positions the pool was created with.
    pub fn capacity(&self) -> usize {
        self.live.len()
    }
}
