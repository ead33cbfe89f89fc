//! The model registry: validated cube definitions plus their join graph.
//!
//! Built once per deployment of definitions through [`ModelRegistryBuilder`],
//! immutable afterwards and safe to share across any number of concurrent
//! compiles.

use std::collections::HashMap;

use inflector::Inflector;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::error::{ModelError, ModelResult};

use super::cube::Cube;
use super::join::{parse_join_keys, JoinKey, Relationship};

/// A validated join edge of the registry graph, with its predicate parsed
/// into column key pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinEdge {
    /// Cube the join was declared on.
    pub source: String,
    pub target: String,
    pub relationship: Relationship,
    pub sql: String,
    pub keys: Vec<JoinKey>,
}

/// A join edge as seen while traversing from a given cube, which may be
/// against the declared direction.
#[derive(Debug, Clone, PartialEq)]
pub struct TraversedEdge {
    pub edge: JoinEdge,
    /// True when the edge is declared on the far cube and traversed backwards.
    pub reversed: bool,
}

impl TraversedEdge {
    /// The cube this traversal arrives at.
    pub fn to_cube(&self) -> &str {
        if self.reversed {
            &self.edge.source
        } else {
            &self.edge.target
        }
    }
}

/// Read-only registry of cubes and their relationships.
#[derive(Debug)]
pub struct ModelRegistry {
    cubes: HashMap<String, Cube>,
    order: Vec<String>,
    aliases: HashMap<String, String>,
    graph: DiGraph<String, JoinEdge>,
    node_indices: HashMap<String, NodeIndex>,
}

impl ModelRegistry {
    pub fn builder() -> ModelRegistryBuilder {
        ModelRegistryBuilder::default()
    }

    /// Look up a cube by name.
    pub fn lookup(&self, name: &str) -> ModelResult<&Cube> {
        self.cubes
            .get(name)
            .ok_or_else(|| ModelError::UnknownCube(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cubes.contains_key(name)
    }

    /// Cube names in registration order.
    pub fn cube_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    /// The deterministic SQL alias assigned to a cube.
    pub fn alias(&self, name: &str) -> ModelResult<&str> {
        self.aliases
            .get(name)
            .map(|s| s.as_str())
            .ok_or_else(|| ModelError::UnknownCube(name.to_string()))
    }

    /// Joins declared on `name`, in declaration order.
    pub fn outgoing_joins(&self, name: &str) -> ModelResult<Vec<&JoinEdge>> {
        let idx = self.node_index(name)?;
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .collect();
        // petgraph iterates most-recent-first; edge ids follow insertion order
        edges.sort_by_key(|e| e.id());
        Ok(edges.into_iter().map(|e| e.weight()).collect())
    }

    /// All edges usable to leave `name`, declared edges first (the binder
    /// qualifies `${CUBE}` against the declaring cube, so the resolver
    /// prefers them), then reverse traversals of edges declared elsewhere.
    pub fn traversable_edges(&self, name: &str) -> ModelResult<Vec<TraversedEdge>> {
        let idx = self.node_index(name)?;

        let mut outgoing: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .collect();
        outgoing.sort_by_key(|e| e.id());

        let mut incoming: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .collect();
        incoming.sort_by_key(|e| e.id());

        let mut edges = Vec::with_capacity(outgoing.len() + incoming.len());
        for e in outgoing {
            edges.push(TraversedEdge {
                edge: e.weight().clone(),
                reversed: false,
            });
        }
        for e in incoming {
            edges.push(TraversedEdge {
                edge: e.weight().clone(),
                reversed: true,
            });
        }
        Ok(edges)
    }

    fn node_index(&self, name: &str) -> ModelResult<NodeIndex> {
        self.node_indices
            .get(name)
            .copied()
            .ok_or_else(|| ModelError::UnknownCube(name.to_string()))
    }
}

/// Accumulates cube definitions, validating each, then seals the registry.
#[derive(Debug, Default)]
pub struct ModelRegistryBuilder {
    cubes: HashMap<String, Cube>,
    order: Vec<String>,
}

impl ModelRegistryBuilder {
    /// Register a cube definition.
    ///
    /// Validates name uniqueness, per-category member uniqueness, the
    /// single-primary-key invariant and measure fragment requirements.
    /// Join targets are checked at [`build`](Self::build) time, since
    /// definitions may reference each other in any registration order.
    pub fn register(mut self, cube: Cube) -> ModelResult<Self> {
        if self.cubes.contains_key(&cube.name) {
            return Err(ModelError::DuplicateCube(cube.name));
        }

        check_unique(&cube.name, "dimension", cube.dimensions.iter().map(|d| &d.name))?;
        check_unique(&cube.name, "measure", cube.measures.iter().map(|m| &m.name))?;
        check_unique(&cube.name, "segment", cube.segments.iter().map(|s| &s.name))?;

        let pk_count = cube.dimensions.iter().filter(|d| d.primary_key).count();
        if pk_count != 1 {
            return Err(ModelError::InvalidPrimaryKey {
                cube: cube.name,
                found: pk_count,
            });
        }

        for measure in &cube.measures {
            if measure.aggregation.requires_sql() && measure.sql.is_none() {
                return Err(ModelError::MissingMeasureSql {
                    cube: cube.name.clone(),
                    measure: measure.name.clone(),
                    aggregation: measure.aggregation.as_str(),
                });
            }
        }

        self.order.push(cube.name.clone());
        self.cubes.insert(cube.name.clone(), cube);
        Ok(self)
    }

    /// Validate cross-cube references and seal the registry.
    pub fn build(self) -> ModelResult<ModelRegistry> {
        let mut graph: DiGraph<String, JoinEdge> = DiGraph::new();
        let mut node_indices = HashMap::new();

        for name in &self.order {
            let idx = graph.add_node(name.clone());
            node_indices.insert(name.clone(), idx);
        }

        for name in &self.order {
            let cube = &self.cubes[name];
            for join in &cube.joins {
                let target_idx =
                    node_indices
                        .get(&join.target)
                        .copied()
                        .ok_or_else(|| ModelError::DanglingJoin {
                            cube: name.clone(),
                            target: join.target.clone(),
                        })?;
                let keys = parse_join_keys(name, &join.target, &join.sql)?;
                graph.add_edge(
                    node_indices[name],
                    target_idx,
                    JoinEdge {
                        source: name.clone(),
                        target: join.target.clone(),
                        relationship: join.relationship,
                        sql: join.sql.clone(),
                        keys,
                    },
                );
            }
        }

        let mut aliases: HashMap<String, String> = HashMap::new();
        let mut taken: HashMap<String, usize> = HashMap::new();
        for name in &self.order {
            let base = name.to_snake_case();
            let alias = match taken.get_mut(&base) {
                None => {
                    taken.insert(base.clone(), 1);
                    base
                }
                Some(n) => {
                    *n += 1;
                    format!("{}_{}", base, n)
                }
            };
            aliases.insert(name.clone(), alias);
        }

        Ok(ModelRegistry {
            cubes: self.cubes,
            order: self.order,
            aliases,
            graph,
            node_indices,
        })
    }
}

fn check_unique<'a>(
    cube: &str,
    category: &'static str,
    names: impl Iterator<Item = &'a String>,
) -> ModelResult<()> {
    let mut seen = std::collections::HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(ModelError::DuplicateMember {
                cube: cube.to_string(),
                category,
                name: name.clone(),
            });
        }
    }
    Ok(())
}
