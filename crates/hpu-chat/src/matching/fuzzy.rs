//! Edit-distance scorers on a 0–100 scale.
//!
//! `ratio` is the normalized Indel similarity (insertions and deletions only,
//! i.e. derived from the longest common subsequence). The remaining scorers
//! compose it the same way the usual fuzzy-matching toolkits do, ending in
//! `wratio`, the weighted combination used by default for question lookup.

use std::collections::BTreeSet;

const UNBASE_SCALE: f64 = 0.95;

/// Longest common subsequence length over chars.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn ratio_chars(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    let indel = total - 2 * lcs_len(a, b);
    100.0 * (1.0 - indel as f64 / total as f64)
}

/// Normalized Indel similarity. Two empty strings are identical (100).
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_chars(&a, &b)
}

/// Best `ratio` of the shorter string against any same-length window of the
/// longer one, including the partially overlapping windows at both ends.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 100.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let best = partial_ratio_chars(&a, &b);
    if a.len() == b.len() && best < 100.0 {
        return best.max(partial_ratio_chars(&b, &a));
    }
    best
}

fn partial_ratio_chars(a: &[char], b: &[char]) -> f64 {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let m = short.len();
    let n = long.len();

    let mut best = 0.0f64;
    let mut consider = |window: &[char]| {
        let score = ratio_chars(short, window);
        if score > best {
            best = score;
        }
        best >= 100.0
    };

    for end in 1..m {
        if consider(&long[..end]) {
            return 100.0;
        }
    }
    for start in 0..=(n - m) {
        if consider(&long[start..start + m]) {
            return 100.0;
        }
    }
    for start in (n - m + 1)..n {
        if consider(&long[start..]) {
            return 100.0;
        }
    }
    best
}

fn sorted_tokens(s: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens
}

pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&sorted_tokens(a).join(" "), &sorted_tokens(b).join(" "))
}

pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let set_a: BTreeSet<&str> = a.split_whitespace().collect();
    let set_b: BTreeSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let sect: Vec<&str> = set_a.intersection(&set_b).copied().collect();
    let diff_ab: Vec<&str> = set_a.difference(&set_b).copied().collect();
    let diff_ba: Vec<&str> = set_b.difference(&set_a).copied().collect();

    // One side is a subset of the other.
    if !sect.is_empty() && (diff_ab.is_empty() || diff_ba.is_empty()) {
        return 100.0;
    }

    let sect_joined = sect.join(" ");
    let join = |diff: &[&str]| {
        if sect_joined.is_empty() {
            diff.join(" ")
        } else {
            format!("{} {}", sect_joined, diff.join(" "))
        }
    };
    let combined_ab = join(&diff_ab);
    let combined_ba = join(&diff_ba);

    let mut best = ratio(&combined_ab, &combined_ba);
    if !sect_joined.is_empty() {
        best = best
            .max(ratio(&sect_joined, &combined_ab))
            .max(ratio(&sect_joined, &combined_ba));
    }
    best
}

pub fn partial_token_ratio(a: &str, b: &str) -> f64 {
    let split_a: Vec<&str> = a.split_whitespace().collect();
    let split_b: Vec<&str> = b.split_whitespace().collect();
    let set_a: BTreeSet<&str> = split_a.iter().copied().collect();
    let set_b: BTreeSet<&str> = split_b.iter().copied().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    // Any shared word is a perfect partial match.
    if set_a.intersection(&set_b).next().is_some() {
        return 100.0;
    }

    let result = partial_ratio(&sorted_tokens(a).join(" "), &sorted_tokens(b).join(" "));

    let diff_ab: Vec<&str> = set_a.difference(&set_b).copied().collect();
    let diff_ba: Vec<&str> = set_b.difference(&set_a).copied().collect();
    if split_a.len() == diff_ab.len() && split_b.len() == diff_ba.len() {
        return result;
    }
    result.max(partial_ratio(&diff_ab.join(" "), &diff_ba.join(" ")))
}

/// Weighted ratio: picks the most appropriate of the scorers above based on
/// how different the two lengths are.
pub fn wratio(a: &str, b: &str) -> f64 {
    let len_a = a.chars().count();
    let len_b = b.chars().count();
    if len_a == 0 || len_b == 0 {
        return 0.0;
    }

    let len_ratio = len_a.max(len_b) as f64 / len_a.min(len_b) as f64;
    let end_ratio = ratio(a, b);

    if len_ratio < 1.5 {
        let token_ratio = token_sort_ratio(a, b).max(token_set_ratio(a, b));
        return end_ratio.max(token_ratio * UNBASE_SCALE);
    }

    let partial_scale = if len_ratio <= 8.0 { 0.9 } else { 0.6 };
    end_ratio
        .max(partial_ratio(a, b) * partial_scale)
        .max(partial_token_ratio(a, b) * UNBASE_SCALE * partial_scale)
}
