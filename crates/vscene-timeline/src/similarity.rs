//! Gestalt (Ratcliff/Obershelp) string similarity.
//!
//! The matcher repeatedly takes the longest common contiguous block of two
//! character sequences and recurses on the unmatched remainders to the left
//! and right of it. The score is `2 * M / (len(a) + len(b))` where `M` is the
//! total length of every block found.
//!
//! Block selection follows the classic sequence-matcher rules, including the
//! "popular element" heuristic for second sequences of 200 or more
//! characters, so scores match the widely used reference implementation
//! digit for digit.

use std::collections::HashMap;

/// Second-sequence length at which popular characters stop seeding matches.
const POPULAR_MIN_LEN: usize = 200;

/// A common block: `a[a_start..a_start + size] == b[b_start..b_start + size]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MatchBlock {
    pub a_start: usize,
    pub b_start: usize,
    pub size: usize,
}

struct Matcher {
    a: Vec<char>,
    b: Vec<char>,
    /// Positions of each character of `b`, ascending.
    b2j: HashMap<char, Vec<usize>>,
}

impl Matcher {
    fn new(a: &str, b: &str) -> Self {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();

        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, c) in b.iter().enumerate() {
            b2j.entry(*c).or_default().push(j);
        }

        let n = b.len();
        if n >= POPULAR_MIN_LEN {
            let ntest = n / 100 + 1;
            b2j.retain(|_, idxs| idxs.len() <= ntest);
        }

        Self { a, b, b2j }
    }

    /// Longest block within `a[alo..ahi]` and `b[blo..bhi]`.
    ///
    /// Among equally long blocks the one starting earliest in `a` wins, and
    /// of those the one starting earliest in `b`.
    fn longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> MatchBlock {
        let (a, b) = (&self.a, &self.b);
        let (mut besti, mut bestj, mut bestsize) = (alo, blo, 0usize);

        // j2len[j] = length of the longest block ending at a[i-1], b[j]
        let mut j2len: HashMap<usize, usize> = HashMap::new();
        for i in alo..ahi {
            let mut next: HashMap<usize, usize> = HashMap::new();
            if let Some(positions) = self.b2j.get(&a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = if j > 0 {
                        j2len.get(&(j - 1)).copied().unwrap_or(0)
                    } else {
                        0
                    } + 1;
                    next.insert(j, k);
                    if k > bestsize {
                        besti = i + 1 - k;
                        bestj = j + 1 - k;
                        bestsize = k;
                    }
                }
            }
            j2len = next;
        }

        // Popular characters never seed a block but may still extend one.
        while besti > alo && bestj > blo && a[besti - 1] == b[bestj - 1] {
            besti -= 1;
            bestj -= 1;
            bestsize += 1;
        }
        while besti + bestsize < ahi
            && bestj + bestsize < bhi
            && a[besti + bestsize] == b[bestj + bestsize]
        {
            bestsize += 1;
        }

        MatchBlock {
            a_start: besti,
            b_start: bestj,
            size: bestsize,
        }
    }

    fn matching_blocks(&self) -> Vec<MatchBlock> {
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];
        let mut blocks = Vec::new();

        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let m = self.longest_match(alo, ahi, blo, bhi);
            if m.size == 0 {
                continue;
            }
            if alo < m.a_start && blo < m.b_start {
                queue.push((alo, m.a_start, blo, m.b_start));
            }
            if m.a_start + m.size < ahi && m.b_start + m.size < bhi {
                queue.push((m.a_start + m.size, ahi, m.b_start + m.size, bhi));
            }
            blocks.push(m);
        }
        blocks.sort();

        // Collapse blocks that touch in both sequences.
        let mut merged: Vec<MatchBlock> = Vec::with_capacity(blocks.len());
        for block in blocks {
            match merged.last_mut() {
                Some(last)
                    if last.a_start + last.size == block.a_start
                        && last.b_start + last.size == block.b_start =>
                {
                    last.size += block.size;
                }
                _ => merged.push(block),
            }
        }
        merged
    }
}

/// Common blocks of `a` and `b`, ascending and non-adjacent.
pub fn matching_blocks(a: &str, b: &str) -> Vec<MatchBlock> {
    Matcher::new(a, b).matching_blocks()
}

/// Similarity ratio of two strings in `[0, 1]`.
///
/// Two empty strings are identical and score `1.0`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let matcher = Matcher::new(a, b);
    let total = matcher.a.len() + matcher.b.len();
    if total == 0 {
        return 1.0;
    }
    let matched: usize = matcher.matching_blocks().iter().map(|m| m.size).sum();
    2.0 * matched as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-12,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_identity_scores_one() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("a cat on a mat", "a cat on a mat"), 1.0);
        assert_eq!(similarity("x", "x"), 1.0);
    }

    #[test]
    fn test_disjoint_scores_zero() {
        assert_eq!(similarity("x", "y"), 0.0);
        assert_eq!(similarity("abc", ""), 0.0);
        assert_eq!(similarity("", "abc"), 0.0);
    }

    #[test]
    fn test_known_ratios() {
        assert_close(similarity("abcd", "bcde"), 0.75);
        assert_close(similarity("kitten", "sitting"), 0.6153846153846154);
        assert_close(similarity("hello", "world"), 0.2);
        assert_close(similarity("a cat on a mat", "a cat on a hat"), 0.9285714285714286);
        assert_close(similarity("a dog running", "a dog runs fast"), 0.6428571428571429);
        assert_close(
            similarity("man riding a horse", "a man riding a horse"),
            0.9473684210526315,
        );
        assert_close(
            similarity("a kitchen with a stove", "a bedroom with a bed"),
            0.5714285714285714,
        );
    }

    #[test]
    fn test_blocks_are_merged_and_ordered() {
        let blocks = matching_blocks("abxcd", "abcd");
        assert_eq!(
            blocks,
            vec![
                MatchBlock { a_start: 0, b_start: 0, size: 2 },
                MatchBlock { a_start: 3, b_start: 2, size: 2 },
            ]
        );
    }

    #[test]
    fn test_unicode_counts_characters() {
        assert_close(similarity("café", "cafe"), 0.75);
    }

    #[test]
    fn test_popular_characters_do_not_seed_matches() {
        // Every character of `b` is popular, so only the extension from the
        // origin contributes a single matched character.
        let a = "a ".repeat(150);
        let b = "ab ".repeat(100);
        assert_close(similarity(&a, &b), 2.0 / 600.0);
    }
}
