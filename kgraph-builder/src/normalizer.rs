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

//! Entity text normalization

use kgraph_core::EntityType;

/// Trailing honorifics stripped from person names, first match wins
pub const PERSON_TITLES: [&str; 4] = ["先生", "女士", "博士", "教授"];

/// Company suffixes recognised on enterprise names
pub const CORPORATE_SUFFIXES: [&str; 4] = ["有限公司", "有限责任公司", "股份有限公司", "集团"];

/// Canonicalizes extracted entity text before dedupe and persistence
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityNormalizer;

impl EntityNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Trim, then apply per-type rules. `None` only trims.
    ///
    /// Enterprise names keep their legal suffix.
    pub fn normalize(&self, text: &str, entity_type: Option<EntityType>) -> String {
        let text = text.trim();
        match entity_type {
            Some(EntityType::Person) => PERSON_TITLES
                .iter()
                .find_map(|title| text.strip_suffix(title))
                .unwrap_or(text)
                .to_string(),
            Some(EntityType::Enterprise) => {
                if let Some(suffix) = corporate_suffix(text) {
                    tracing::trace!(suffix, "Enterprise name carries corporate suffix");
                }
                text.to_string()
            }
            _ => text.to_string(),
        }
    }
}

/// The first listed corporate suffix `text` ends with
pub fn corporate_suffix(text: &str) -> Option<&'static str> {
    CORPORATE_SUFFIXES.iter().copied().find(|s| text.ends_with(s))
}
