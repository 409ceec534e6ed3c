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

//! Rule Evaluation Engine
//!
//! ```text
//!   Rule ──compile──▶ CompiledRule ──evaluate(ctx)──▶ RuleEvaluationResult
//!                        │
//!                        ├── condition 1 ─▶ every entity / relation ─┐
//!                        ├── condition 2 ─▶ every entity / relation ─┼─▶ union
//!                        └── condition n ─▶ ...                      ─┘
//! ```
//!
//! Conditions are OR-combined: a rule matches when any condition matches any
//! entity or relation, and the matched id lists accumulate over all
//! conditions. Rules are ordered by priority, highest first, ties keeping
//! input order.

use crate::context::RuleContext;
use crate::field::PathTarget;
use crate::operators::CompiledCondition;
use kgraph_core::{Result, Rule, RuleEvaluationResult};
use std::cmp::Reverse;
use std::collections::HashSet;

/// A rule with its conditions compiled
#[derive(Debug, Clone)]
pub struct CompiledRule<'r> {
    rule: &'r Rule,
    conditions: Vec<CompiledCondition>,
}

impl<'r> CompiledRule<'r> {
    pub fn compile(rule: &'r Rule) -> Result<Self> {
        let conditions = rule
            .conditions
            .iter()
            .map(CompiledCondition::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rule, conditions })
    }

    pub fn evaluate(&self, ctx: &RuleContext) -> RuleEvaluationResult {
        let rule = self.rule;
        if !rule.is_active {
            return RuleEvaluationResult::no_match(rule, "Rule is inactive");
        }

        let mut entities = Vec::new();
        let mut relations = Vec::new();
        let mut seen_entities = HashSet::new();
        let mut seen_relations = HashSet::new();
        let mut conditions_hit = 0usize;

        for condition in &self.conditions {
            let mut hit = false;
            match condition.path.target() {
                PathTarget::Entity => {
                    for entity in ctx.entities() {
                        if condition.test(&condition.path.resolve_entity(entity)) {
                            hit = true;
                            if seen_entities.insert(entity.id.as_str()) {
                                entities.push(entity.id.clone());
                            }
                        }
                    }
                }
                PathTarget::Relation => {
                    for relation in ctx.relations() {
                        if condition.test(&condition.path.resolve_relation(relation)) {
                            hit = true;
                            if seen_relations.insert(relation.id.as_str()) {
                                relations.push(relation.id.clone());
                            }
                        }
                    }
                }
                PathTarget::Unsupported => {}
            }
            if hit {
                conditions_hit += 1;
            }
        }

        let matched = !entities.is_empty() || !relations.is_empty();
        tracing::debug!(
            rule = %rule.name,
            matched,
            entities = entities.len(),
            relations = relations.len(),
            "Evaluated rule"
        );

        let message = if matched {
            format!("Rule matched: {}", rule.description)
        } else {
            "No matches found".to_string()
        };

        RuleEvaluationResult::new(&rule.id, &rule.name, matched)
            .with_entities(entities)
            .with_relations(relations)
            .with_message(message)
            .with_detail("conditions_matched", conditions_hit)
            .with_detail("conditions_total", self.conditions.len())
    }
}

/// Stateless rule evaluator
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate_rule(&self, rule: &Rule, ctx: &RuleContext) -> Result<RuleEvaluationResult> {
        Ok(CompiledRule::compile(rule)?.evaluate(ctx))
    }

    /// Evaluate every rule in priority order (descending, stable)
    pub fn evaluate_all_rules(
        &self,
        rules: &[Rule],
        ctx: &RuleContext,
    ) -> Result<Vec<RuleEvaluationResult>> {
        let mut ordered: Vec<&Rule> = rules.iter().collect();
        ordered.sort_by_key(|r| Reverse(r.priority));
        ordered
            .into_iter()
            .map(|rule| self.evaluate_rule(rule, ctx))
            .collect()
    }
}
