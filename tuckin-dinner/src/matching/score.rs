use std::collections::BTreeMap;

use crate::domain::{Gender, Personality, PoolUser};

use super::history::PairHistory;

pub const REPEAT_PAIR_PENALTY: i32 = 10;

/// Compared lexicographically: fewer repeated pairs first, then gender
/// balance, then personality concentration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GroupScore {
    pub history_penalty: i32,
    pub gender: i32,
    pub personality: i32,
}

impl GroupScore {
    pub fn total(&self) -> i32 {
        self.history_penalty + self.gender + self.personality
    }
}

pub fn gender_score(males: usize, females: usize) -> i32 {
    match (males + females, males.min(females)) {
        (4, 2) => 10,
        (4, 1) => 5,
        (5, 2) => 10,
        (5, 1) => 5,
        (3, 1) => 10,
        _ => 1,
    }
}

/// Sum of squared counts per personality type, so larger monocultures win.
pub fn personality_score(personalities: impl IntoIterator<Item = Personality>) -> i32 {
    let mut counts: BTreeMap<Personality, i32> = BTreeMap::new();
    for p in personalities {
        *counts.entry(p).or_default() += 1;
    }
    counts.values().map(|c| c * c).sum()
}

pub fn score_group(members: &[&PoolUser], history: &PairHistory) -> GroupScore {
    let males = members.iter().filter(|u| u.gender == Gender::Male).count();
    let females = members.len() - males;
    let ids: Vec<_> = members.iter().map(|u| u.id).collect();

    GroupScore {
        history_penalty: -(history.repeated_pairs(&ids) as i32) * REPEAT_PAIR_PENALTY,
        gender: gender_score(males, females),
        personality: personality_score(members.iter().map(|u| u.personality)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::pool_user;
    use Gender::{Female, Male};
    use Personality::{Analytical, Functional, Intuitive};

    #[test]
    fn gender_balance_by_size() {
        assert_eq!(gender_score(2, 2), 10);
        assert_eq!(gender_score(3, 1), 5);
        assert_eq!(gender_score(0, 4), 1);
        assert_eq!(gender_score(3, 2), 10);
        assert_eq!(gender_score(1, 4), 5);
        assert_eq!(gender_score(5, 0), 1);
        assert_eq!(gender_score(2, 1), 10);
        assert_eq!(gender_score(0, 3), 1);
    }

    #[test]
    fn personality_prefers_monoculture() {
        assert_eq!(personality_score([Analytical; 4]), 16);
        assert_eq!(personality_score([Analytical, Analytical, Functional, Intuitive]), 6);
    }

    #[test]
    fn four_person_happy_group() {
        let members = [
            pool_user(Male, Analytical, false),
            pool_user(Male, Analytical, false),
            pool_user(Female, Analytical, false),
            pool_user(Female, Analytical, false),
        ];
        let refs: Vec<&PoolUser> = members.iter().collect();
        let score = score_group(&refs, &PairHistory::default());
        assert_eq!(score, GroupScore { history_penalty: 0, gender: 10, personality: 16 });
    }

    #[test]
    fn history_dominates_ordering() {
        let fresh = GroupScore { history_penalty: 0, gender: 1, personality: 4 };
        let repeated = GroupScore { history_penalty: -10, gender: 10, personality: 16 };
        assert!(fresh > repeated);
    }
}
