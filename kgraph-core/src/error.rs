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

//! Error types shared by every kgraph crate

use thiserror::Error;

/// Result type for kgraph operations
pub type Result<T> = std::result::Result<T, KgraphError>;

/// Errors that can occur while reasoning over or mutating the graph
#[derive(Debug, Error)]
pub enum KgraphError {
    /// A referenced entity, relation, or rule does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Input rejected before any work was done
    #[error("Validation error: {0}")]
    Validation(String),

    /// The graph store failed
    #[error("Store error: {0}")]
    Store(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl KgraphError {
    pub fn entity_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "Entity",
            id: id.into(),
        }
    }

    pub fn relation_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "Relation",
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// True for [`KgraphError::NotFound`]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for KgraphError {
    fn from(err: serde_json::Error) -> Self {
        KgraphError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for KgraphError {
    fn from(err: toml::de::Error) -> Self {
        KgraphError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = KgraphError::entity_not_found("e-1");
        assert_eq!(err.to_string(), "Entity not found: e-1");
        assert!(err.is_not_found());
        assert!(!KgraphError::validation("bad").is_not_found());
    }
}
