//! Phase 2: join resolution.
//!
//! Breadth-first traversal over the registry's join graph, from the query
//! root, producing a deterministic join tree that covers every referenced
//! cube exactly once. Declared edges are traversable in both directions: a
//! `belongsTo` declared on the many side is enough to join from the one side.

use std::collections::{HashMap, VecDeque};

use crate::error::{CompileError, CompileResult};
use crate::model::{ModelRegistry, Relationship, TraversedEdge};

/// One emission-ordered join of the resolved tree.
#[derive(Debug, Clone)]
pub(crate) struct JoinStep {
    /// Cube already in the tree that this step joins from.
    pub from: String,
    /// Cube this step brings into the tree.
    pub to: String,
    pub traversed: TraversedEdge,
}

impl JoinStep {
    /// Whether this edge can multiply aggregate contributions.
    ///
    /// A `hasMany` declaration marks the relation as one-to-many whichever
    /// way it is traversed; a `belongsTo` traversed against its declaration
    /// is an undeclared one-to-many. `hasOne` and forward `belongsTo` joins
    /// attach at most one row and are safe.
    pub fn fans_out(&self) -> bool {
        match self.traversed.edge.relationship {
            Relationship::HasMany => true,
            Relationship::BelongsTo => self.traversed.reversed,
            Relationship::HasOne => false,
        }
    }

    /// Join key column on the `from` side.
    pub fn from_column(&self, key_index: usize) -> &str {
        let key = &self.traversed.edge.keys[key_index];
        if self.traversed.reversed {
            &key.target_column
        } else {
            &key.source_column
        }
    }

    /// Join key column on the `to` side.
    pub fn to_column(&self, key_index: usize) -> &str {
        let key = &self.traversed.edge.keys[key_index];
        if self.traversed.reversed {
            &key.source_column
        } else {
            &key.target_column
        }
    }

    pub fn key_count(&self) -> usize {
        self.traversed.edge.keys.len()
    }
}

/// The resolved join tree plus the aliases of every cube it touches.
#[derive(Debug, Clone)]
pub(crate) struct JoinPlan {
    pub root: String,
    pub steps: Vec<JoinStep>,
    pub aliases: HashMap<String, String>,
}

impl JoinPlan {
    /// Join key columns a cube contributes to edges incident to it, in step
    /// order, deduplicated.
    pub fn incident_key_columns(&self, cube: &str) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for step in &self.steps {
            for i in 0..step.key_count() {
                let column = if step.from == cube {
                    step.from_column(i)
                } else if step.to == cube {
                    step.to_column(i)
                } else {
                    continue;
                };
                if !columns.iter().any(|c| c == column) {
                    columns.push(column.to_string());
                }
            }
        }
        columns
    }
}

/// Resolve the join tree connecting `cubes`, rooted at `root`.
///
/// Fails with [`CompileError::UnreachableCube`] when a referenced cube has no
/// path from the root, and with [`CompileError::AmbiguousJoinPath`] when two
/// distinct shortest paths reach the same referenced cube (parallel edges
/// between one pair of cubes are not ambiguous - the edge declared on the
/// cube being joined from wins).
pub(crate) fn resolve_joins(
    root: &str,
    cubes: &[String],
    registry: &ModelRegistry,
) -> CompileResult<JoinPlan> {
    let mut depth: HashMap<String, usize> = HashMap::new();
    let mut parent: HashMap<String, (String, TraversedEdge)> = HashMap::new();
    // Distinct shortest-path predecessors per node. Parallel edges from one
    // predecessor collapse to a single entry (the declared-edge tie-break
    // picks among them), so they are not counted as ambiguity.
    let mut preds: HashMap<String, Vec<String>> = HashMap::new();
    let mut discovery: Vec<String> = Vec::new();
    let mut queue: VecDeque<String> = VecDeque::new();

    depth.insert(root.to_string(), 0);
    discovery.push(root.to_string());
    queue.push_back(root.to_string());

    while let Some(current) = queue.pop_front() {
        let current_depth = depth[&current];
        for traversed in registry
            .traversable_edges(&current)
            .map_err(|_| CompileError::UnknownCube(current.clone()))?
        {
            let to = traversed.to_cube().to_string();
            match depth.get(&to).copied() {
                None => {
                    depth.insert(to.clone(), current_depth + 1);
                    parent.insert(to.clone(), (current.clone(), traversed));
                    preds.insert(to.clone(), vec![current.clone()]);
                    discovery.push(to.clone());
                    queue.push_back(to);
                }
                Some(d) if d == current_depth + 1 => {
                    let entry = preds.entry(to).or_default();
                    if !entry.iter().any(|p| *p == current) {
                        entry.push(current.clone());
                    }
                }
                Some(_) => {}
            }
        }
    }

    // Shortest-path counts, folded over distinct predecessors. Discovery
    // order is nondecreasing in depth, so predecessors are always counted
    // before their successors.
    let mut path_count: HashMap<String, usize> = HashMap::new();
    path_count.insert(root.to_string(), 1);
    for cube in discovery.iter().skip(1) {
        let count = preds[cube].iter().map(|p| path_count[p]).sum();
        path_count.insert(cube.clone(), count);
    }

    for cube in cubes {
        if cube == root {
            continue;
        }
        if !depth.contains_key(cube) {
            return Err(CompileError::UnreachableCube {
                from: root.to_string(),
                to: cube.clone(),
            });
        }
        if path_count[cube] > 1 {
            return Err(CompileError::AmbiguousJoinPath {
                from: root.to_string(),
                to: cube.clone(),
            });
        }
    }

    // Collect the nodes of the minimal connecting subtree.
    let mut needed: Vec<String> = vec![root.to_string()];
    for cube in cubes {
        let mut current = cube.clone();
        while current != root {
            if !needed.iter().any(|n| *n == current) {
                needed.push(current.clone());
            }
            current = parent[&current].0.clone();
        }
    }

    // Emit steps in discovery order so parents always precede children.
    let mut steps = Vec::new();
    for cube in &discovery {
        if cube == root || !needed.iter().any(|n| n == cube) {
            continue;
        }
        let (from, traversed) = &parent[cube];
        steps.push(JoinStep {
            from: from.clone(),
            to: cube.clone(),
            traversed: traversed.clone(),
        });
    }

    let mut aliases = HashMap::new();
    for cube in &needed {
        let alias = registry
            .alias(cube)
            .map_err(|_| CompileError::UnknownCube(cube.clone()))?;
        aliases.insert(cube.clone(), alias.to_string());
    }

    Ok(JoinPlan {
        root: root.to_string(),
        steps,
        aliases,
    })
}
