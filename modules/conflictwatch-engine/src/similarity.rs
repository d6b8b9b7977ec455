//! String-distance primitives for heuristic pair scoring.
//!
//! Case sensitivity is the caller's responsibility; scoring code lowercases
//! before calling. Lengths are counted in Unicode scalar values.

/// Minimum number of single-character insertions, deletions, or
/// substitutions turning `a` into `b`. Full dynamic-programming matrix,
/// two rolling rows.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let substitution = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j - 1] + substitution)
                .min(prev[j] + 1)
                .min(curr[j - 1] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Normalized similarity in [0, 1]: `1 - distance / max_len`.
/// Two empty strings are identical (1.0).
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - edit_distance(a, b) as f64 / max_len as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_distances() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("gwoza", "gwoza"), 0);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("abc", ""), 3);
    }

    #[test]
    fn identity_is_one() {
        for s in ["", "gwoza", "unknown gunmen", "Chibok LGA"] {
            assert_eq!(similarity(s, s), 1.0);
        }
    }

    #[test]
    fn symmetry() {
        let pairs = [("gwoza", "gwozza"), ("maiduguri", "maidugari"), ("", "x")];
        for (a, b) in pairs {
            assert_eq!(similarity(a, b), similarity(b, a));
        }
    }

    #[test]
    fn empty_strings_are_identical() {
        assert_eq!(similarity("", ""), 1.0);
    }

    #[test]
    fn garbled_town_names_stay_similar() {
        // The usual news-wire garbling: one dropped or doubled character.
        assert!(similarity("gwoza", "gwozza") > 0.8);
        assert!(similarity("maiduguri", "maidugari") > 0.8);
        assert!(similarity("gwoza", "damaturu") < 0.5);
    }

    #[test]
    fn counts_chars_not_bytes() {
        // Multi-byte characters count once each.
        assert_eq!(edit_distance("北", "南"), 1);
        assert_eq!(similarity("北東", "北西"), 0.5);
    }
}
