//! Phase 4: fan-out analysis.
//!
//! Joining through a one-to-many relation repeats rows of every other cube
//! in the tree, so additive aggregates computed over the joined row set
//! double-count. The guard decides, per measure-carrying cube, whether its
//! aggregates must be computed in a pre-aggregated derived subquery before
//! the join instead of over the joined rows.

use std::collections::HashMap;

use super::joins::JoinPlan;
use super::resolve::ResolvedQuery;

/// How a cube's relation enters the FROM clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CubeStrategy {
    /// Join the base relation directly; aggregate over joined rows.
    Direct,
    /// Aggregate the base relation first, grouped by its join keys and
    /// requested dimensions, then join the collapsed rows.
    PreAggregate,
}

/// Decide the strategy for every measure-carrying cube of the plan.
///
/// A cube's aggregates need protection when the tree path between it and any
/// other joined cube crosses a multiplying edge (`JoinStep::fans_out`). In a
/// join tree every edge separates the cubes into two sides, each containing
/// at least one referenced cube, so every edge lies on such a path: one
/// multiplying step anywhere makes every measure cube pre-aggregate.
/// Dimension-only cubes never do - repeating their rows is exactly what
/// requesting a one-to-many dimension means.
pub(crate) fn plan_strategies(
    plan: &JoinPlan,
    resolved: &ResolvedQuery<'_>,
) -> HashMap<String, CubeStrategy> {
    let fans_out = plan.steps.iter().any(|step| step.fans_out());

    let mut strategies = HashMap::new();
    for measure in &resolved.measures {
        let strategy = if fans_out {
            CubeStrategy::PreAggregate
        } else {
            CubeStrategy::Direct
        };
        strategies.entry(measure.cube.name.clone()).or_insert(strategy);
    }
    strategies
}

pub(crate) fn is_pre_aggregated(
    strategies: &HashMap<String, CubeStrategy>,
    cube: &str,
) -> bool {
    strategies.get(cube) == Some(&CubeStrategy::PreAggregate)
}
