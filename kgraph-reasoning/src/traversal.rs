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

//! Graph traversal over a rule context
//!
//! Adjacency is indexed once per analysis. Depth-first search runs on an
//! explicit frame stack of `(node, depth, edge cursor)` so depth bounds are
//! exact and no recursion is involved.

use crate::context::RuleContext;
use kgraph_core::Relation;
use std::collections::{HashMap, HashSet, VecDeque};

/// How relations become traversable edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// source -> target only
    Forward,
    /// both ways
    Undirected,
}

/// One traversable step
#[derive(Debug, Clone, Copy)]
pub struct Edge<'a> {
    pub to: &'a str,
    pub relation: &'a Relation,
}

/// Per-node edge lists for the relations accepted by a filter
#[derive(Debug, Default)]
pub struct Adjacency<'a> {
    edges: HashMap<&'a str, Vec<Edge<'a>>>,
}

impl<'a> Adjacency<'a> {
    pub fn build<F>(ctx: &'a RuleContext, direction: Direction, accept: F) -> Self
    where
        F: Fn(&Relation) -> bool,
    {
        let mut edges: HashMap<&'a str, Vec<Edge<'a>>> = HashMap::new();
        for relation in ctx.relations().iter().filter(|r| accept(r)) {
            edges.entry(relation.source_id.as_str()).or_default().push(Edge {
                to: relation.target_id.as_str(),
                relation,
            });
            if direction == Direction::Undirected {
                edges.entry(relation.target_id.as_str()).or_default().push(Edge {
                    to: relation.source_id.as_str(),
                    relation,
                });
            }
        }
        Self { edges }
    }

    pub fn edges(&self, node: &str) -> &[Edge<'a>] {
        self.edges.get(node).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// A closed walk `start -> .. -> start`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedPath {
    /// First and last element are the start node
    pub nodes: Vec<String>,
    pub relations: Vec<String>,
}

impl ClosedPath {
    /// Edge count
    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Distinct nodes on the cycle
    pub fn distinct_nodes(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }
}

struct Frame<'a> {
    node: &'a str,
    depth: usize,
    cursor: usize,
}

/// Enumerate closed paths through `start` with `min_edges..=max_edges` edges.
///
/// Intermediate nodes are never repeated within a path and no relation is
/// used twice, so an undirected edge cannot close a cycle with itself.
pub fn closed_paths(
    adjacency: &Adjacency<'_>,
    start: &str,
    min_edges: usize,
    max_edges: usize,
) -> Vec<ClosedPath> {
    let mut found = Vec::new();
    if max_edges == 0 {
        return found;
    }

    let mut stack = vec![Frame {
        node: start,
        depth: 0,
        cursor: 0,
    }];
    let mut path_nodes: Vec<&str> = vec![start];
    let mut path_relations: Vec<&Relation> = Vec::new();

    loop {
        let (node, depth, cursor) = match stack.last_mut() {
            Some(frame) => {
                let snapshot = (frame.node, frame.depth, frame.cursor);
                frame.cursor += 1;
                snapshot
            }
            None => break,
        };

        let edges = adjacency.edges(node);
        let Some(edge) = edges.get(cursor) else {
            stack.pop();
            path_nodes.pop();
            path_relations.pop();
            continue;
        };

        let next_depth = depth + 1;
        if path_relations.iter().any(|r| r.id == edge.relation.id) {
            continue;
        }

        if edge.to == start {
            if next_depth >= min_edges && next_depth <= max_edges {
                let mut nodes: Vec<String> = path_nodes.iter().map(|n| n.to_string()).collect();
                nodes.push(start.to_string());
                let mut relations: Vec<String> =
                    path_relations.iter().map(|r| r.id.clone()).collect();
                relations.push(edge.relation.id.clone());
                found.push(ClosedPath { nodes, relations });
            }
            continue;
        }

        if next_depth >= max_edges || path_nodes.contains(&edge.to) {
            continue;
        }

        path_nodes.push(edge.to);
        path_relations.push(edge.relation);
        stack.push(Frame {
            node: edge.to,
            depth: next_depth,
            cursor: 0,
        });
    }

    found
}

/// A node reached by breadth-first search
#[derive(Debug, Clone)]
pub struct Discovery<'a> {
    pub node: &'a str,
    pub distance: usize,
    /// Relation the node was first reached through
    pub via: &'a Relation,
    /// `[start, .., node]`
    pub path: Vec<&'a str>,
}

/// Breadth-first search from `start`. Each node is discovered once, at its
/// first-discovery distance. `expand(distance)` decides whether a node at
/// that distance (the start is 0) has its own edges explored.
pub fn breadth_first<'a, F>(adjacency: &Adjacency<'a>, start: &'a str, mut expand: F) -> Vec<Discovery<'a>>
where
    F: FnMut(usize) -> bool,
{
    let mut discovered = Vec::new();
    let mut seen: HashSet<&str> = HashSet::from([start]);
    let mut paths: HashMap<&str, Vec<&str>> = HashMap::from([(start, vec![start])]);
    let mut queue: VecDeque<(&str, usize)> = VecDeque::new();
    if expand(0) {
        queue.push_back((start, 0));
    }

    while let Some((node, distance)) = queue.pop_front() {
        let parent_path = paths.get(node).cloned().unwrap_or_else(|| vec![node]);
        for edge in adjacency.edges(node) {
            if !seen.insert(edge.to) {
                continue;
            }
            let mut path = parent_path.clone();
            path.push(edge.to);
            paths.insert(edge.to, path.clone());
            discovered.push(Discovery {
                node: edge.to,
                distance: distance + 1,
                via: edge.relation,
                path,
            });
            if expand(distance + 1) {
                queue.push_back((edge.to, distance + 1));
            }
        }
    }

    discovered
}
