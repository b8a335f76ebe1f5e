/// Group sizes for a subpool of `n` users, largest first. `None` below 3.
///
/// Groups of 4 are the norm; 5s absorb the remainder, and 3s only appear for
/// the handful of pool sizes that cannot be written as 4a + 5b.
pub fn group_sizes(n: usize) -> Option<Vec<usize>> {
    let (fours, fives, threes) = match n {
        0..=2 => return None,
        3 => (0, 0, 1),
        6 => (0, 0, 2),
        7 => (1, 0, 1),
        11 => (2, 0, 1),
        _ => match n % 4 {
            0 => (n / 4, 0, 0),
            1 => ((n - 5) / 4, 1, 0),
            2 => ((n - 10) / 4, 2, 0),
            _ => ((n - 15) / 4, 3, 0),
        },
    };

    let mut sizes = Vec::with_capacity(fours + fives + threes);
    sizes.extend(std::iter::repeat(5).take(fives));
    sizes.extend(std::iter::repeat(4).take(fours));
    sizes.extend(std::iter::repeat(3).take(threes));
    Some(sizes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn special_cases() {
        assert_eq!(group_sizes(3), Some(vec![3]));
        assert_eq!(group_sizes(6), Some(vec![3, 3]));
        assert_eq!(group_sizes(7), Some(vec![4, 3]));
        assert_eq!(group_sizes(11), Some(vec![4, 4, 3]));
    }

    #[test]
    fn general_sizes_use_fours_and_fives() {
        assert_eq!(group_sizes(8), Some(vec![4, 4]));
        assert_eq!(group_sizes(9), Some(vec![5, 4]));
        assert_eq!(group_sizes(10), Some(vec![5, 5]));
        assert_eq!(group_sizes(15), Some(vec![5, 5, 5]));
        assert_eq!(group_sizes(19), Some(vec![5, 5, 5, 4]));
    }

    #[test]
    fn too_small_pools_have_no_partition() {
        assert_eq!(group_sizes(0), None);
        assert_eq!(group_sizes(2), None);
    }

    #[test]
    fn sizes_always_cover_the_pool() {
        for n in 3..200 {
            let sizes = group_sizes(n).unwrap();
            assert_eq!(sizes.iter().sum::<usize>(), n, "n = {n}");
            assert!(sizes.iter().all(|s| (3..=5).contains(s)));
            let threes = sizes.iter().filter(|s| **s == 3).count();
            if threes > 0 {
                assert!(matches!(n, 3 | 6 | 7 | 11), "unexpected 3 for n = {n}");
            }
        }
    }
}
