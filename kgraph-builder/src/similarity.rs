// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Text similarity scoring
//!
//! Scores are in `[0, 1]`. Identical texts always score `1.0`; otherwise the
//! configured [`SimilarityMode`] decides. Edit-distance scoring needs the
//! `edit-distance` feature and degrades to Jaccard without it.

use kgraph_core::SimilarityMode;
use std::collections::HashSet;

/// Score given to texts where one contains the other
pub const CONTAINMENT_SCORE: f64 = 0.9;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimilarityScorer {
    mode: SimilarityMode,
}

impl SimilarityScorer {
    pub fn new(mode: SimilarityMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> SimilarityMode {
        self.mode
    }

    pub fn score(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        match self.mode {
            SimilarityMode::EditDistance => edit_ratio(a, b),
            SimilarityMode::Jaccard => jaccard(a, b),
        }
    }

    /// Like [`score`](Self::score), but a non-empty text contained in the
    /// other scores [`CONTAINMENT_SCORE`]
    pub fn score_with_containment(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        if !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a)) {
            return CONTAINMENT_SCORE;
        }
        self.score(a, b)
    }
}

/// Levenshtein distance over chars, normalized by the longer text. A
/// transposition costs two substitutions.
#[cfg(feature = "edit-distance")]
fn edit_ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

#[cfg(not(feature = "edit-distance"))]
fn edit_ratio(a: &str, b: &str) -> f64 {
    jaccard(a, b)
}

/// Jaccard index over the character sets of `a` and `b`. Empty union is `0.0`.
pub fn jaccard(a: &str, b: &str) -> f64 {
    let left: HashSet<char> = a.chars().collect();
    let right: HashSet<char> = b.chars().collect();
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_is_one() {
        for mode in [SimilarityMode::EditDistance, SimilarityMode::Jaccard] {
            assert_eq!(SimilarityScorer::new(mode).score("华夏", "华夏"), 1.0);
        }
    }

    #[test]
    fn test_jaccard() {
        assert_eq!(jaccard("abc", "xyz"), 0.0);
        assert_eq!(jaccard("", ""), 0.0);
        assert!((jaccard("abc", "abd") - 0.5).abs() < 1e-9);
    }

    #[cfg(feature = "edit-distance")]
    #[test]
    fn test_edit_distance_counts_chars() {
        let scorer = SimilarityScorer::new(SimilarityMode::EditDistance);
        // One substitution over four chars
        assert!((scorer.score("华夏科技", "华夏科学") - 0.75).abs() < 1e-9);
    }

    #[cfg(feature = "edit-distance")]
    #[test]
    fn test_edit_distance_transposition_costs_two_edits() {
        let scorer = SimilarityScorer::new(SimilarityMode::EditDistance);
        assert_eq!(scorer.score("ab", "ba"), 0.0);
        assert!((scorer.score("阿里巴巴", "阿里巴巴 ") - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_containment_shortcut() {
        let scorer = SimilarityScorer::default();
        assert_eq!(scorer.score_with_containment("华夏", "华夏科技有限公司"), CONTAINMENT_SCORE);
        assert!(scorer.score_with_containment("", "abc") < CONTAINMENT_SCORE);
    }
}
