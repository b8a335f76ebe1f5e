use std::collections::HashSet;

use uuid::Uuid;

/// Every pair of users that have already dined together.
#[derive(Debug, Clone, Default)]
pub struct PairHistory {
    pairs: HashSet<(Uuid, Uuid)>,
}

fn pair_key(a: &Uuid, b: &Uuid) -> (Uuid, Uuid) {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    (*lo, *hi)
}

impl PairHistory {
    /// Builds the pair set from the member lists of past dinners.
    pub fn from_groups(groups: &[Vec<Uuid>]) -> Self {
        let mut history = Self::default();
        for members in groups {
            history.record(members);
        }
        history
    }

    pub fn record(&mut self, members: &[Uuid]) {
        for (i, a) in members.iter().enumerate() {
            for b in &members[i + 1..] {
                if a != b {
                    self.pairs.insert(pair_key(a, b));
                }
            }
        }
    }

    pub fn met(&self, a: &Uuid, b: &Uuid) -> bool {
        self.pairs.contains(&pair_key(a, b))
    }

    /// How many of `selected` the candidate has already dined with.
    pub fn overlaps(&self, candidate: &Uuid, selected: &[Uuid]) -> usize {
        selected.iter().filter(|other| self.met(candidate, other)).count()
    }

    /// Number of repeated pairs inside a candidate group.
    pub fn repeated_pairs(&self, members: &[Uuid]) -> usize {
        members
            .iter()
            .enumerate()
            .map(|(i, a)| self.overlaps(a, &members[i + 1..]))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
