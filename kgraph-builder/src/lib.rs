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

//! kgraph builder
//!
//! Write-side of the graph: building extracted mentions into entities and
//! relations, and merging duplicates after the fact.
//!
//! - [`builder`]: batch build with in-batch dedupe
//! - [`merge`]: duplicate candidates and entity merge
//! - [`normalizer`], [`similarity`]: text canonicalization and scoring

pub mod builder;
pub mod merge;
pub mod normalizer;
pub mod similarity;

pub use builder::{
    BuildGraphCommand, BuildGraphResult, ExtractedEntity, ExtractedRelation, FailedItem,
    GraphBuilder, ItemKind,
};
pub use merge::{
    CandidateQuery, EntityMergeCandidate, EntityMergeService, MergeCommand, MergeOutcome,
    MergeReport, MergeStrategy,
};
pub use normalizer::EntityNormalizer;
pub use similarity::{jaccard, SimilarityScorer};
