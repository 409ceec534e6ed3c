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

//! Medical knowledge lookups
//!
//! Drug interactions, symptom to disease links and drug contraindications are
//! reached through the [`MedicalKnowledge`] trait and injected into the
//! healthcare reasoner. [`InMemoryKnowledge`] is the dataset-backed
//! implementation; it is immutable once built.

use async_trait::async_trait;
use kgraph_core::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// A known interaction between two drugs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugInteraction {
    pub drug1: String,
    pub drug2: String,
    /// contraindication, warning or caution
    pub interaction_type: String,
    /// high, moderate or low
    pub severity: String,
    #[serde(default)]
    pub mechanism: String,
    #[serde(default)]
    pub recommendation: String,
}

/// One disease a symptom points to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomDiseaseLink {
    pub disease_id: String,
    pub disease_name: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// How many symptoms the disease has in total
    pub total_symptoms: u32,
}

fn default_weight() -> f64 {
    1.0
}

/// Read-only medical lookups
#[async_trait]
pub trait MedicalKnowledge: Send + Sync {
    /// Interaction for an unordered pair of drug names
    async fn drug_interaction(&self, drug_a: &str, drug_b: &str) -> Result<Option<DrugInteraction>>;

    async fn diseases_for_symptom(&self, symptom: &str) -> Result<Vec<SymptomDiseaseLink>>;

    /// Disease names the drug must not be used for
    async fn contraindications(&self, drug: &str) -> Result<Vec<String>>;
}

fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Serialized form of a knowledge dataset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeDataset {
    #[serde(default)]
    pub interactions: Vec<DrugInteraction>,
    /// symptom name -> linked diseases
    #[serde(default)]
    pub symptoms: HashMap<String, Vec<SymptomDiseaseLink>>,
    /// drug name -> contraindicated disease names
    #[serde(default)]
    pub contraindications: HashMap<String, Vec<String>>,
}

/// Dataset-backed [`MedicalKnowledge`]
#[derive(Debug, Clone, Default)]
pub struct InMemoryKnowledge {
    interactions: HashMap<(String, String), DrugInteraction>,
    symptoms: HashMap<String, Vec<SymptomDiseaseLink>>,
    contraindications: HashMap<String, Vec<String>>,
}

impl InMemoryKnowledge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dataset(dataset: KnowledgeDataset) -> Self {
        let mut knowledge = Self::new();
        for interaction in dataset.interactions {
            knowledge = knowledge.with_interaction(interaction);
        }
        knowledge.symptoms = dataset.symptoms;
        knowledge.contraindications = dataset.contraindications;
        knowledge
    }

    /// Load a JSON [`KnowledgeDataset`]
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let dataset: KnowledgeDataset = serde_json::from_reader(reader)?;
        Ok(Self::from_dataset(dataset))
    }

    pub fn with_interaction(mut self, interaction: DrugInteraction) -> Self {
        let key = pair_key(&interaction.drug1, &interaction.drug2);
        self.interactions.insert(key, interaction);
        self
    }

    pub fn with_symptom_link(mut self, symptom: impl Into<String>, link: SymptomDiseaseLink) -> Self {
        self.symptoms.entry(symptom.into()).or_default().push(link);
        self
    }

    pub fn with_contraindication(mut self, drug: impl Into<String>, disease: impl Into<String>) -> Self {
        self.contraindications
            .entry(drug.into())
            .or_default()
            .push(disease.into());
        self
    }

    pub fn interaction_count(&self) -> usize {
        self.interactions.len()
    }
}

#[async_trait]
impl MedicalKnowledge for InMemoryKnowledge {
    async fn drug_interaction(&self, drug_a: &str, drug_b: &str) -> Result<Option<DrugInteraction>> {
        Ok(self.interactions.get(&pair_key(drug_a, drug_b)).cloned())
    }

    async fn diseases_for_symptom(&self, symptom: &str) -> Result<Vec<SymptomDiseaseLink>> {
        Ok(self.symptoms.get(symptom).cloned().unwrap_or_default())
    }

    async fn contraindications(&self, drug: &str) -> Result<Vec<String>> {
        Ok(self.contraindications.get(drug).cloned().unwrap_or_default())
    }
}
