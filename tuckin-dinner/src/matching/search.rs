use std::collections::BTreeMap;

use rand::seq::index;
use rand::Rng;

use crate::domain::{Gender, Personality, PoolUser};

use super::history::PairHistory;
use super::score::{score_group, GroupScore};

/// Pools up to this size are searched exhaustively.
pub const EXHAUSTIVE_LIMIT: usize = 50;

/// Combinations evaluated before the exhaustive search stops early.
pub const MAX_CANDIDATES: usize = 1000;

/// Picks `size` members from `pool`, returning their indices in ascending order.
pub fn pick_group<R: Rng + ?Sized>(
    pool: &[PoolUser],
    size: usize,
    history: &PairHistory,
    rng: &mut R,
) -> Vec<usize> {
    if pool.len() <= size {
        return (0..pool.len()).collect();
    }
    let mut picked = if pool.len() <= EXHAUSTIVE_LIMIT {
        exhaustive(pool, size, history, rng)
    } else {
        bucketed(pool, size, history)
    };
    picked.sort_unstable();
    picked
}

fn exhaustive<R: Rng + ?Sized>(
    pool: &[PoolUser],
    size: usize,
    history: &PairHistory,
    rng: &mut R,
) -> Vec<usize> {
    let mut best: Option<(GroupScore, Vec<usize>)> = None;

    for combo in Combinations::new(pool.len(), size).take(MAX_CANDIDATES) {
        let members: Vec<&PoolUser> = combo.iter().map(|&i| &pool[i]).collect();
        let score = score_group(&members, history);
        if best.as_ref().map_or(true, |(b, _)| score > *b) {
            best = Some((score, combo));
        }
    }

    match best {
        Some((score, combo)) if score.total() > 0 => combo,
        _ => index::sample(rng, pool.len(), size).into_vec(),
    }
}

/// Index combinations of `k` out of `n`, in lexicographic order.
struct Combinations {
    n: usize,
    indices: Vec<usize>,
    done: bool,
}

impl Combinations {
    fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            indices: (0..k).collect(),
            done: k > n,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        if self.done {
            return None;
        }
        let current = self.indices.clone();

        let k = self.indices.len();
        let mut i = k;
        loop {
            if i == 0 {
                self.done = true;
                break;
            }
            i -= 1;
            if self.indices[i] < self.n - k + i {
                self.indices[i] += 1;
                for j in i + 1..k {
                    self.indices[j] = self.indices[j - 1] + 1;
                }
                break;
            }
        }
        Some(current)
    }
}

/// Gender-balanced pick for large pools: take ⌊k/2⌋ men and ⌈k/2⌉ women
/// (shifting seats when one side runs short), drawing both from the
/// personality types they share, most common first.
fn bucketed(pool: &[PoolUser], size: usize, history: &PairHistory) -> Vec<usize> {
    let mut buckets: BTreeMap<(Gender, Personality), Vec<usize>> = BTreeMap::new();
    for (i, user) in pool.iter().enumerate() {
        buckets.entry((user.gender, user.personality)).or_default().push(i);
    }
    let available = |gender: Gender| pool.iter().filter(|u| u.gender == gender).count();

    let mut want_male = size / 2;
    let mut want_female = size - want_male;
    let (males, females) = (available(Gender::Male), available(Gender::Female));
    if males < want_male {
        want_female += want_male - males;
        want_male = males;
    }
    if females < want_female {
        want_male += want_female - females;
        want_female = females;
    }

    let order = personality_order(&buckets);
    let mut selected: Vec<usize> = Vec::with_capacity(size);
    let mut selected_ids = Vec::with_capacity(size);

    for (gender, mut wanted) in [(Gender::Male, want_male), (Gender::Female, want_female)] {
        for personality in &order {
            let Some(bucket) = buckets.get_mut(&(gender, *personality)) else {
                continue;
            };
            while wanted > 0 && !bucket.is_empty() {
                let pos = bucket
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, &i)| history.overlaps(&pool[i].id, &selected_ids))
                    .map_or(0, |(pos, _)| pos);
                let chosen = bucket.remove(pos);
                selected.push(chosen);
                selected_ids.push(pool[chosen].id);
                wanted -= 1;
            }
            if wanted == 0 {
                break;
            }
        }
    }
    selected
}

/// Personalities present in both genders (by combined head-count, descending),
/// followed by the rest.
fn personality_order(buckets: &BTreeMap<(Gender, Personality), Vec<usize>>) -> Vec<Personality> {
    let count = |g: Gender, p: Personality| buckets.get(&(g, p)).map_or(0, Vec::len);

    let mut ranked: Vec<(bool, usize, Personality)> = Personality::ALL
        .iter()
        .map(|&p| {
            let (m, f) = (count(Gender::Male, p), count(Gender::Female, p));
            (m > 0 && f > 0, m + f, p)
        })
        .filter(|(_, total, _)| *total > 0)
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)).then(a.2.cmp(&b.2)));
    ranked.into_iter().map(|(_, _, p)| p).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::pool_user;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use Gender::{Female, Male};
    use Personality::{Analytical, Functional, Intuitive, Individual};

    #[test]
    fn combinations_are_lexicographic() {
        let all: Vec<Vec<usize>> = Combinations::new(4, 2).collect();
        assert_eq!(
            all,
            vec![vec![0, 1], vec![0, 2], vec![0, 3], vec![1, 2], vec![1, 3], vec![2, 3]]
        );
        assert_eq!(Combinations::new(5, 5).count(), 1);
        assert_eq!(Combinations::new(3, 4).count(), 0);
    }

    #[test]
    fn exhaustive_prefers_balanced_monoculture() {
        let pool = vec![
            pool_user(Male, Analytical, false),
            pool_user(Male, Analytical, false),
            pool_user(Male, Analytical, false),
            pool_user(Female, Analytical, false),
            pool_user(Female, Analytical, false),
            pool_user(Male, Functional, false),
            pool_user(Female, Functional, false),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let picked = pick_group(&pool, 4, &PairHistory::default(), &mut rng);

        let males = picked.iter().filter(|&&i| pool[i].gender == Male).count();
        assert_eq!(males, 2);
        assert!(picked.iter().all(|&i| pool[i].personality == Analytical));
    }

    #[test]
    fn exhaustive_avoids_repeat_pairs() {
        let pool = vec![
            pool_user(Male, Analytical, false),
            pool_user(Female, Analytical, false),
            pool_user(Male, Analytical, false),
            pool_user(Female, Analytical, false),
            pool_user(Male, Analytical, false),
        ];
        let history = PairHistory::from_groups(&[vec![pool[0].id, pool[1].id]]);
        let mut rng = StdRng::seed_from_u64(1);
        let picked = pick_group(&pool, 3, &history, &mut rng);

        assert!(!(picked.contains(&0) && picked.contains(&1)));
    }

    #[test]
    fn bucketed_balances_genders_for_large_pools() {
        let personalities = [Analytical, Functional, Intuitive, Individual];
        let mut pool = Vec::new();
        for i in 0..60 {
            let gender = if i % 3 == 0 { Female } else { Male };
            pool.push(pool_user(gender, personalities[i % 4], false));
        }
        let mut rng = StdRng::seed_from_u64(3);
        let picked = pick_group(&pool, 4, &PairHistory::default(), &mut rng);

        assert_eq!(picked.len(), 4);
        let females = picked.iter().filter(|&&i| pool[i].gender == Female).count();
        assert_eq!(females, 2);
        let first = pool[picked[0]].personality;
        assert!(picked.iter().all(|&i| pool[i].personality == first));
    }

    #[test]
    fn bucketed_shifts_seats_when_a_gender_runs_short() {
        let mut pool: Vec<PoolUser> = (0..55).map(|_| pool_user(Male, Analytical, false)).collect();
        pool.push(pool_user(Female, Analytical, false));
        let mut rng = StdRng::seed_from_u64(5);
        let picked = pick_group(&pool, 5, &PairHistory::default(), &mut rng);

        assert_eq!(picked.len(), 5);
        let females = picked.iter().filter(|&&i| pool[i].gender == Female).count();
        assert_eq!(females, 1);
    }
}
