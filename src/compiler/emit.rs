//! Phase 5: statement emission.
//!
//! Assembles the final aggregate statement from the resolved request, the
//! join plan and the fan-out strategies: SELECT list (dimensions, truncated
//! time dimension, measures), FROM/LEFT JOIN clauses (base relations or
//! pre-aggregated derived subqueries), a single conjoined WHERE clause,
//! positional GROUP BY / ORDER BY and the row limit.

use std::collections::HashMap;

use inflector::Inflector;

use crate::error::{CompileError, CompileResult};
use crate::model::{
    Aggregation, Cube, DimensionType, FormatHint, Granularity, Measure, ModelRegistry,
};
use crate::sql::dialect::{Dialect, SqlDialect};
use crate::sql::expr::{
    self, case_when, count, count_star, lit_bool, lit_int, lit_null, raw, sum, table_col, Expr,
    ExprExt,
};
use crate::sql::query::{OrderByExpr, Query, SelectExpr, TableRef};
use crate::sql::token::{Token, TokenStream};

use super::binder::{bind, expand_formula, formula_dependencies, BindContext};
use super::fanout::{is_pre_aggregated, CubeStrategy};
use super::joins::{JoinPlan, JoinStep};
use super::request::{FilterOp, FilterValue};
use super::resolve::{ResolvedFilter, ResolvedQuery, ResolvedSegment};

/// One column of the emitted SELECT list, in statement order.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputColumn {
    /// The member reference exactly as requested.
    pub member: String,
    /// The column alias in the statement.
    pub alias: String,
    /// Formatting hint carried from the measure definition.
    pub format: Option<FormatHint>,
}

#[derive(Debug)]
pub(crate) struct EmittedQuery {
    pub query: Query,
    pub columns: Vec<OutputColumn>,
}

/// Emit the final statement.
pub(crate) fn emit(
    registry: &ModelRegistry,
    resolved: &ResolvedQuery<'_>,
    plan: &JoinPlan,
    strategies: &HashMap<String, CubeStrategy>,
    dialect: Dialect,
) -> CompileResult<EmittedQuery> {
    let mut selects: Vec<SelectExpr> = Vec::new();
    let mut columns: Vec<OutputColumn> = Vec::new();

    // Dimensions, in request order.
    for d in &resolved.dimensions {
        let cube_alias = &plan.aliases[&d.cube.name];
        let column_name = d.dimension.name.to_snake_case();
        let alias = format!("{}__{}", cube_alias, column_name);
        let e = if is_pre_aggregated(strategies, &d.cube.name) {
            table_col(cube_alias, &column_name)
        } else {
            let ctx = BindContext::new(&d.cube.name, &plan.aliases);
            raw(&bind(&d.dimension.sql, &ctx)?)
        };
        selects.push(SelectExpr::new(e).with_alias(&alias));
        columns.push(OutputColumn {
            member: d.reference.clone(),
            alias,
            format: None,
        });
    }

    // The time dimension, truncated to the requested granularity.
    if let Some(t) = &resolved.time_dimension {
        let cube_alias = &plan.aliases[&t.cube.name];
        let column_name = time_column_name(&t.dimension.name, t.granularity);
        let alias = format!("{}__{}", cube_alias, column_name);
        let e = if is_pre_aggregated(strategies, &t.cube.name) {
            table_col(cube_alias, &column_name)
        } else {
            let ctx = BindContext::new(&t.cube.name, &plan.aliases);
            date_trunc_expr(dialect, t.granularity, &bind(&t.dimension.sql, &ctx)?)
        };
        selects.push(SelectExpr::new(e).with_alias(&alias));
        columns.push(OutputColumn {
            member: t.reference.clone(),
            alias,
            format: None,
        });
    }

    let group_count = selects.len();

    // Measures, in request order.
    for rm in &resolved.measures {
        let cube_alias = &plan.aliases[&rm.cube.name];
        let alias = format!("{}__{}", cube_alias, rm.measure.name.to_snake_case());
        let e = measure_select_expr(rm.cube, rm.measure, resolved, plan, strategies, dialect)?;
        selects.push(SelectExpr::new(e).with_alias(&alias));
        columns.push(OutputColumn {
            member: rm.reference.clone(),
            alias,
            format: rm.measure.format,
        });
    }

    // FROM and JOINs.
    let root_cube = lookup(registry, &plan.root)?;
    let mut query = Query::new().select(selects).from(relation_for(
        root_cube, resolved, plan, strategies, dialect,
    )?);
    for step in &plan.steps {
        let cube = lookup(registry, &step.to)?;
        let table = relation_for(cube, resolved, plan, strategies, dialect)?;
        query = query.left_join(table, join_on_expr(step, plan));
    }

    // WHERE: segments then filters, skipping predicates already applied
    // inside a pre-aggregate subquery.
    let mut predicates: Vec<Expr> = Vec::new();
    for s in &resolved.segments {
        if is_pre_aggregated(strategies, &s.cube.name) {
            continue;
        }
        let ctx = BindContext::new(&s.cube.name, &plan.aliases);
        predicates.push(segment_expr(s, &ctx)?);
    }
    for f in &resolved.filters {
        if is_pre_aggregated(strategies, &f.cube.name) {
            continue;
        }
        let ctx = BindContext::new(&f.cube.name, &plan.aliases);
        predicates.push(filter_expr(f, &ctx, dialect)?);
    }
    if let Some(where_clause) = conjoin(predicates) {
        query = query.where_expr(where_clause);
    }

    for position in 1..=group_count {
        query = query.group_by(lit_int(position as i64));
    }

    if resolved.order.is_empty() {
        if group_count > 0 {
            query = query.order_by(OrderByExpr::asc(lit_int(1)));
        }
    } else {
        for entry in &resolved.order {
            let position = lit_int(entry.position as i64 + 1);
            query = query.order_by(if entry.descending {
                OrderByExpr::desc(position)
            } else {
                OrderByExpr::asc(position)
            });
        }
    }

    if let Some(limit) = resolved.limit {
        query = query.limit(limit);
    }

    Ok(EmittedQuery { query, columns })
}

/// The FROM/JOIN relation for a cube: its base source, or the pre-aggregated
/// derived subquery when the fan-out guard requires one. Either way the
/// relation carries the cube's alias, so bound fragments and join predicates
/// read identically.
fn relation_for(
    cube: &Cube,
    resolved: &ResolvedQuery<'_>,
    plan: &JoinPlan,
    strategies: &HashMap<String, CubeStrategy>,
    dialect: Dialect,
) -> CompileResult<TableRef> {
    let alias = &plan.aliases[&cube.name];
    if is_pre_aggregated(strategies, &cube.name) {
        let subquery = build_pre_aggregate(cube, resolved, plan, dialect)?;
        Ok(TableRef::derived(subquery).with_alias(alias))
    } else {
        Ok(TableRef::raw_subquery(&cube.sql).with_alias(alias))
    }
}

/// Build the pre-aggregate subquery for one cube: join keys, requested
/// dimensions and partial aggregates, grouped by keys and dimensions, with
/// the cube's own filters and segments applied before the join.
fn build_pre_aggregate(
    cube: &Cube,
    resolved: &ResolvedQuery<'_>,
    plan: &JoinPlan,
    dialect: Dialect,
) -> CompileResult<Query> {
    let alias = plan.aliases[&cube.name].clone();
    let inner_aliases: HashMap<String, String> =
        std::iter::once((cube.name.clone(), alias.clone())).collect();
    let ctx = BindContext::new(&cube.name, &inner_aliases);

    let mut selects: Vec<SelectExpr> = Vec::new();

    let keys = plan.incident_key_columns(&cube.name);
    for key in &keys {
        selects.push(SelectExpr::new(table_col(&alias, key)).with_alias(key));
    }

    let mut group_count = keys.len();
    for d in resolved.dimensions.iter().filter(|d| d.cube.name == cube.name) {
        let bound = bind(&d.dimension.sql, &ctx)?;
        selects.push(SelectExpr::new(raw(&bound)).with_alias(&d.dimension.name.to_snake_case()));
        group_count += 1;
    }
    if let Some(t) = resolved
        .time_dimension
        .as_ref()
        .filter(|t| t.cube.name == cube.name)
    {
        let bound = bind(&t.dimension.sql, &ctx)?;
        let column_name = time_column_name(&t.dimension.name, t.granularity);
        selects.push(
            SelectExpr::new(date_trunc_expr(dialect, t.granularity, &bound))
                .with_alias(&column_name),
        );
        group_count += 1;
    }

    for part in measure_parts(cube, resolved)? {
        let name = part.name.to_snake_case();
        match part.aggregation {
            Aggregation::Count => {
                let e = match &part.sql {
                    None => count_star(),
                    Some(sql) => count(raw(&bind(sql, &ctx)?)),
                };
                selects.push(SelectExpr::new(e).with_alias(&name));
            }
            Aggregation::Sum => {
                let e = sum(raw(&bind(part.sql.as_deref().unwrap_or_default(), &ctx)?));
                selects.push(SelectExpr::new(e).with_alias(&name));
            }
            Aggregation::Avg => {
                let bound = bind(part.sql.as_deref().unwrap_or_default(), &ctx)?;
                selects.push(
                    SelectExpr::new(sum(raw(&bound))).with_alias(&format!("{}__sum", name)),
                );
                selects.push(
                    SelectExpr::new(count(raw(&bound))).with_alias(&format!("{}__cnt", name)),
                );
            }
            // Formulas are computed in the outer query over re-aggregated
            // parts; measure_parts() never yields them.
            Aggregation::Number => {}
        }
    }

    let mut query = Query::new()
        .select(selects)
        .from(TableRef::raw_subquery(&cube.sql).with_alias(&alias));

    let mut predicates: Vec<Expr> = Vec::new();
    for s in resolved.segments.iter().filter(|s| s.cube.name == cube.name) {
        predicates.push(segment_expr(s, &ctx)?);
    }
    for f in resolved.filters.iter().filter(|f| f.cube.name == cube.name) {
        predicates.push(filter_expr(f, &ctx, dialect)?);
    }
    if let Some(where_clause) = conjoin(predicates) {
        query = query.where_expr(where_clause);
    }

    for position in 1..=group_count {
        query = query.group_by(lit_int(position as i64));
    }
    Ok(query)
}

/// The aggregated measures a pre-aggregate subquery must materialize:
/// every requested non-formula measure of the cube, plus the transitive
/// dependencies of requested formulas.
fn measure_parts<'m>(
    cube: &Cube,
    resolved: &ResolvedQuery<'m>,
) -> CompileResult<Vec<&'m Measure>> {
    let mut parts: Vec<&'m Measure> = Vec::new();
    let push = |parts: &mut Vec<&'m Measure>, m: &'m Measure| {
        if !parts.iter().any(|p| p.name == m.name) {
            parts.push(m);
        }
    };
    for rm in resolved.measures.iter().filter(|m| m.cube.name == cube.name) {
        if rm.measure.aggregation == Aggregation::Number {
            for dep in formula_dependencies(rm.cube, rm.measure)? {
                push(&mut parts, dep);
            }
        } else {
            push(&mut parts, rm.measure);
        }
    }
    Ok(parts)
}

/// The SELECT-list expression for one requested measure.
fn measure_select_expr(
    cube: &Cube,
    measure: &Measure,
    resolved: &ResolvedQuery<'_>,
    plan: &JoinPlan,
    strategies: &HashMap<String, CubeStrategy>,
    dialect: Dialect,
) -> CompileResult<Expr> {
    let ctx = BindContext::new(&cube.name, &plan.aliases);
    if is_pre_aggregated(strategies, &cube.name) {
        let cube_alias = &plan.aliases[&cube.name];
        match measure.aggregation {
            Aggregation::Count | Aggregation::Sum | Aggregation::Avg => {
                Ok(reaggregated_expr(cube_alias, measure))
            }
            Aggregation::Number => {
                // Raw columns live behind the subquery boundary, so the
                // formula may only reference sibling measures here.
                let text = expand_formula(cube, measure, &ctx, false, &mut |_, m| {
                    Ok(reaggregated_expr(cube_alias, m).to_sql(dialect))
                })?;
                Ok(raw(&text))
            }
        }
    } else {
        match measure.aggregation {
            Aggregation::Number => {
                let grouped_by_pk = resolved
                    .dimensions
                    .iter()
                    .any(|d| d.cube.name == cube.name && d.dimension.primary_key);
                let text = expand_formula(cube, measure, &ctx, grouped_by_pk, &mut |_, m| {
                    direct_measure_expr(m, &ctx).map(|e| e.to_sql(dialect))
                })?;
                Ok(raw(&text))
            }
            _ => direct_measure_expr(measure, &ctx),
        }
    }
}

/// A measure aggregated directly over (joined) base rows.
fn direct_measure_expr(measure: &Measure, ctx: &BindContext<'_>) -> CompileResult<Expr> {
    let e = match measure.aggregation {
        Aggregation::Count => match &measure.sql {
            None => count_star(),
            Some(sql) => count(raw(&bind(sql, ctx)?)),
        },
        Aggregation::Sum | Aggregation::Avg | Aggregation::Number => {
            let bound = bind(measure.sql.as_deref().unwrap_or_default(), ctx)?;
            match measure.aggregation {
                Aggregation::Sum => sum(raw(&bound)),
                Aggregation::Avg => expr::avg(raw(&bound)),
                // Formula text is already post-aggregation; callers expand
                // it before reaching here.
                _ => raw(&bound),
            }
        }
    };
    Ok(e)
}

/// A measure re-aggregated over its pre-aggregate parts.
fn reaggregated_expr(cube_alias: &str, measure: &Measure) -> Expr {
    let name = measure.name.to_snake_case();
    match measure.aggregation {
        Aggregation::Avg => {
            let part_sum = table_col(cube_alias, &format!("{}__sum", name));
            let part_cnt = table_col(cube_alias, &format!("{}__cnt", name));
            case_when(
                vec![(
                    sum(part_cnt.clone()).gt(lit_int(0)),
                    sum(part_sum).div(sum(part_cnt)),
                )],
                Some(lit_null()),
            )
        }
        _ => sum(table_col(cube_alias, &name)),
    }
}

/// ON clause of a join step: the parsed key equalities, conjoined.
fn join_on_expr(step: &JoinStep, plan: &JoinPlan) -> Expr {
    let from_alias = &plan.aliases[&step.from];
    let to_alias = &plan.aliases[&step.to];
    let mut on: Option<Expr> = None;
    for i in 0..step.key_count() {
        let eq = table_col(from_alias, step.from_column(i))
            .eq(table_col(to_alias, step.to_column(i)));
        on = Some(match on {
            None => eq,
            Some(prev) => prev.and(eq),
        });
    }
    on.unwrap_or_else(|| lit_bool(true))
}

fn segment_expr(segment: &ResolvedSegment<'_>, ctx: &BindContext<'_>) -> CompileResult<Expr> {
    Ok(raw(&bind(&segment.segment.sql, ctx)?).paren())
}

fn filter_expr(
    filter: &ResolvedFilter<'_>,
    ctx: &BindContext<'_>,
    dialect: Dialect,
) -> CompileResult<Expr> {
    let bound = bind(&filter.dimension.sql, ctx)?;
    let target = raw(&bound);
    let is_time = filter.dimension.dimension_type == DimensionType::Time;

    let literal = |v: &FilterValue| -> Expr {
        match v {
            FilterValue::String(s) if is_time => raw(&dialect.format_date_literal(s)),
            FilterValue::String(s) => expr::lit_str(s),
            FilterValue::Number(n) => number_literal(*n),
            FilterValue::Bool(b) => lit_bool(*b),
        }
    };

    let e = match filter.op {
        FilterOp::Equals => {
            if filter.values.len() == 1 {
                target.eq(literal(&filter.values[0]))
            } else {
                target.in_list(filter.values.iter().map(literal).collect(), false)
            }
        }
        FilterOp::NotEquals => {
            if filter.values.len() == 1 {
                target.ne(literal(&filter.values[0]))
            } else {
                target.in_list(filter.values.iter().map(literal).collect(), true)
            }
        }
        FilterOp::Contains => pattern_match(&target, &filter.values, false),
        FilterOp::NotContains => pattern_match(&target, &filter.values, true),
        FilterOp::Gt => target.gt(literal(&filter.values[0])),
        FilterOp::Gte => target.gte(literal(&filter.values[0])),
        FilterOp::Lt => target.lt(literal(&filter.values[0])),
        FilterOp::Lte => target.lte(literal(&filter.values[0])),
        FilterOp::Set => target.is_not_null(),
        FilterOp::NotSet => target.is_null(),
    };
    Ok(e.paren())
}

/// `ILIKE '%v%'` per value: any-of for contains, none-of for notContains.
fn pattern_match(target: &Expr, values: &[FilterValue], negated: bool) -> Expr {
    let mut combined: Option<Expr> = None;
    for value in values {
        let pattern = expr::lit_str(&format!("%{}%", pattern_text(value)));
        let like = target.clone().like(pattern, true, negated);
        combined = Some(match combined {
            None => like,
            Some(prev) if negated => prev.and(like),
            Some(prev) => prev.or(like),
        });
    }
    combined.unwrap_or_else(|| lit_bool(true))
}

fn pattern_text(value: &FilterValue) -> String {
    match value {
        FilterValue::String(s) => s.clone(),
        FilterValue::Number(n) => number_text(*n),
        FilterValue::Bool(b) => b.to_string(),
    }
}

fn number_literal(n: f64) -> Expr {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        lit_int(n as i64)
    } else {
        expr::lit_float(n)
    }
}

fn number_text(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}

fn date_trunc_expr(dialect: Dialect, granularity: Granularity, bound: &str) -> Expr {
    let mut inner = TokenStream::new();
    inner.push(Token::Raw(bound.to_string()));
    let rendered = dialect
        .emit_date_trunc(granularity.as_str(), &inner)
        .serialize(dialect);
    raw(&rendered)
}

fn time_column_name(dimension: &str, granularity: Granularity) -> String {
    format!("{}_{}", dimension.to_snake_case(), granularity.as_str())
}

fn conjoin(exprs: Vec<Expr>) -> Option<Expr> {
    exprs.into_iter().reduce(|a, b| a.and(b))
}

fn lookup<'m>(registry: &'m ModelRegistry, name: &str) -> CompileResult<&'m Cube> {
    registry
        .lookup(name)
        .map_err(|_| CompileError::UnknownCube(name.to_string()))
}
