//! Weighted Levenshtein distance.
//!
//! The matcher ranks catalog titles with asymmetric operation costs, so this
//! kernel takes the three costs explicitly instead of assuming unit weights.

/// Cost of transforming `source` into `target` when inserting a character
/// costs `ins`, deleting one costs `del` and substituting one costs `sub`.
///
/// Operates on Unicode scalar values, not bytes. Two rolling rows keep the
/// memory at `2 * (|target| + 1)` cells.
pub fn distance(source: &str, target: &str, ins: usize, del: usize, sub: usize) -> usize {
    let source: Vec<char> = source.chars().collect();
    let target: Vec<char> = target.chars().collect();

    let mut prev_row: Vec<usize> = (0..=target.len()).map(|j| j * ins).collect();
    let mut cur_row = vec![0usize; target.len() + 1];

    for i in 1..=source.len() {
        cur_row[0] = i * del;
        for j in 1..=target.len() {
            let deletion = prev_row[j] + del;
            let insertion = cur_row[j - 1] + ins;
            let mut substitution = prev_row[j - 1];
            if source[i - 1] != target[j - 1] {
                substitution += sub;
            }
            cur_row[j] = deletion.min(insertion).min(substitution);
        }
        std::mem::swap(&mut prev_row, &mut cur_row);
    }

    prev_row[target.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_to_empty_is_zero() {
        assert_eq!(distance("", "", 1, 7, 100), 0);
    }

    #[test]
    fn insertions_from_empty_source() {
        assert_eq!(distance("", "a", 1, 7, 100), 1);
        assert_eq!(distance("", "abc", 1, 7, 100), 3);
    }

    #[test]
    fn deletions_to_empty_target() {
        assert_eq!(distance("a", "", 1, 7, 100), 7);
        assert_eq!(distance("abc", "", 1, 7, 100), 21);
    }

    #[test]
    fn expensive_substitution_prefers_delete_plus_insert() {
        // With sub = 100 the cheapest path for "a" -> "b" is delete + insert.
        assert_eq!(distance("a", "b", 1, 7, 100), 8);
        // With a cheap substitution it is taken directly.
        assert_eq!(distance("a", "b", 1, 7, 2), 2);
    }

    #[test]
    fn unit_costs_match_classic_levenshtein() {
        assert_eq!(distance("kitten", "sitting", 1, 1, 1), 3);
        assert_eq!(distance("flaw", "lawn", 1, 1, 1), 2);
    }

    #[test]
    fn identical_strings_cost_nothing() {
        assert_eq!(distance("the lion king", "the lion king", 1, 7, 100), 0);
        assert_eq!(distance("холодное сердце", "холодное сердце", 1, 7, 100), 0);
    }

    #[test]
    fn counts_code_points_not_bytes() {
        // One Cyrillic char appended: a single insertion, not two byte edits.
        assert_eq!(distance("кино", "кинот", 1, 7, 100), 1);
    }

    #[test]
    fn prefix_query_is_cheap() {
        // The matcher's cost triple makes a typed prefix a near-match.
        let full = distance("lion", "the lion king", 1, 7, 100);
        let noise = distance("the lion king zzz", "the lion king", 1, 7, 100);
        assert_eq!(full, "the ".len() + " king".len());
        assert_eq!(noise, 3 * 7);
    }
}
