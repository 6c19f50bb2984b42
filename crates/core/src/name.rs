// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker name generation.
//!
//! Names are drawn from the 26-symbol NATO phonetic alphabet. Once all 26
//! are in use, names grow by depth: `alpha-alpha`, `alpha-bravo`, ...,
//! `zulu-zulu`, then `alpha-alpha-alpha`, and so on. Depth only grows once
//! every shorter combination at the current depth is exhausted.

const NATO: [&str; 26] = [
    "alpha", "bravo", "charlie", "delta", "echo", "foxtrot", "golf", "hotel", "india", "juliett",
    "kilo", "lima", "mike", "november", "oscar", "papa", "quebec", "romeo", "sierra", "tango",
    "uniform", "victor", "whiskey", "xray", "yankee", "zulu",
];

/// Generates worker names in depth-then-alphabetical order.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameGenerator;

impl NameGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Depth of a name: 1 for a single symbol, 2 for `a-b`, etc.
    pub fn depth(name: &str) -> usize {
        name.split('-').count()
    }

    /// Ordering key used for display: depth ascending, then lexicographic
    /// within a depth. `zulu` (depth 1) sorts before `alpha-alpha` (depth 2)
    /// even though `a` < `z` lexicographically.
    pub fn order_key(name: &str) -> (usize, String) {
        (Self::depth(name), name.to_string())
    }

    /// Compare two names by display order (depth first, then lexicographic).
    pub fn compare(a: &str, b: &str) -> std::cmp::Ordering {
        Self::order_key(a).cmp(&Self::order_key(b))
    }

    /// Return the next `n` available names not present in `used`, in the
    /// order they would be assigned.
    pub fn next_available<'a>(
        &self,
        used: impl IntoIterator<Item = &'a str>,
        n: usize,
    ) -> Vec<String> {
        let used: std::collections::HashSet<&str> = used.into_iter().collect();
        let mut out = Vec::with_capacity(n);
        let mut depth = 1usize;
        while out.len() < n {
            for candidate in Self::combinations_at_depth(depth) {
                if out.len() == n {
                    break;
                }
                if !used.contains(candidate.as_str()) {
                    out.push(candidate);
                }
            }
            depth += 1;
            // Safety valve: NATO has 26 symbols, so depth 2 alone yields 676
            // combinations — this loop terminates long before any reasonable
            // worker count.
            if depth > 6 {
                break;
            }
        }
        out
    }

    /// Lexicographically ordered `depth`-symbol compound names
    /// (`alpha`, `bravo`, ..., `zulu` for depth 1; `alpha-alpha`, `alpha-bravo`,
    /// ... for depth 2).
    fn combinations_at_depth(depth: usize) -> Vec<String> {
        if depth == 0 {
            return Vec::new();
        }
        let mut combos: Vec<Vec<&str>> = vec![Vec::new()];
        for _ in 0..depth {
            let mut next = Vec::with_capacity(combos.len() * NATO.len());
            for combo in &combos {
                for symbol in NATO {
                    let mut extended = combo.clone();
                    extended.push(symbol);
                    next.push(extended);
                }
            }
            combos = next;
        }
        combos.into_iter().map(|parts| parts.join("-")).collect()
    }
}

#[cfg(test)]
#[path = "name_tests.rs"]
mod tests;
