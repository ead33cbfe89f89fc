//! Phase 3: expression binding.
//!
//! Cube fragments are template text with two placeholder forms: `${CUBE}`
//! (the owning cube) and `${OtherCube}` (a joined cube). Number-measure
//! formulas additionally reference sibling measures as `${measureName}`.
//! Binding is purely textual substitution against the join's alias map - the
//! fragment's SQL is otherwise opaque - followed by a check that no
//! placeholder survived. Bound text contains no placeholders, so binding is
//! idempotent.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CompileError, CompileResult};
use crate::model::{Aggregation, Cube, Measure};

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{(\w+)\}").expect("valid regex"));
static BARE_COLUMN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

/// Alias scope for one binding call: the owning cube plus every cube of the
/// current join. No ambient state - fragments bind only against what is
/// passed here.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BindContext<'a> {
    pub self_cube: &'a str,
    pub aliases: &'a HashMap<String, String>,
}

impl<'a> BindContext<'a> {
    pub fn new(self_cube: &'a str, aliases: &'a HashMap<String, String>) -> Self {
        Self { self_cube, aliases }
    }

    fn self_alias(&self) -> CompileResult<&'a str> {
        self.aliases
            .get(self.self_cube)
            .map(|s| s.as_str())
            .ok_or_else(|| CompileError::UnboundCubeReference {
                cube: self.self_cube.to_string(),
                fragment: String::new(),
            })
    }
}

/// Bind a dimension/segment/join fragment.
///
/// A fragment that is a single bare identifier is shorthand for a column of
/// the owning cube and is qualified with its alias; anything else has its
/// placeholders substituted in place.
pub(crate) fn bind(fragment: &str, ctx: &BindContext) -> CompileResult<String> {
    let trimmed = fragment.trim();
    if BARE_COLUMN_RE.is_match(trimmed) {
        return Ok(format!("{}.{}", ctx.self_alias()?, trimmed));
    }

    let mut out = String::with_capacity(fragment.len());
    let mut last = 0;
    for caps in PLACEHOLDER_RE.captures_iter(fragment) {
        let whole = caps.get(0).expect("match");
        let name = caps.get(1).expect("group").as_str();
        out.push_str(&fragment[last..whole.start()]);

        let alias = if name == "CUBE" {
            ctx.aliases.get(ctx.self_cube)
        } else {
            ctx.aliases.get(name)
        };
        match alias {
            Some(alias) => out.push_str(alias),
            None => {
                return Err(CompileError::UnboundCubeReference {
                    cube: name.to_string(),
                    fragment: fragment.to_string(),
                })
            }
        }
        last = whole.end();
    }
    out.push_str(&fragment[last..]);

    if out.contains("${") {
        return Err(CompileError::UnresolvedPlaceholder(out));
    }
    Ok(out)
}

/// Expand a number-measure formula into bound SQL text.
///
/// `${measureName}` references are resolved depth-first: nested number
/// measures expand recursively (parenthesized), aggregated measures are
/// rendered by `render_measure` - the emitter supplies the direct or
/// re-aggregated form. `${CUBE}` self-references read raw per-row columns
/// after aggregation, which is only meaningful when the cube is grouped by
/// its primary key; otherwise they are rejected.
pub(crate) fn expand_formula(
    cube: &Cube,
    measure: &Measure,
    ctx: &BindContext,
    grouped_by_primary_key: bool,
    render_measure: &mut dyn FnMut(&Cube, &Measure) -> CompileResult<String>,
) -> CompileResult<String> {
    let mut stack = vec![measure.name.clone()];
    expand_inner(
        cube,
        measure,
        ctx,
        grouped_by_primary_key,
        render_measure,
        &mut stack,
    )
}

fn expand_inner(
    cube: &Cube,
    measure: &Measure,
    ctx: &BindContext,
    grouped_by_primary_key: bool,
    render_measure: &mut dyn FnMut(&Cube, &Measure) -> CompileResult<String>,
    stack: &mut Vec<String>,
) -> CompileResult<String> {
    let fragment = measure.sql.as_deref().unwrap_or_default();
    let mut out = String::with_capacity(fragment.len());
    let mut last = 0;

    for caps in PLACEHOLDER_RE.captures_iter(fragment) {
        let whole = caps.get(0).expect("match");
        let name = caps.get(1).expect("group").as_str();
        out.push_str(&fragment[last..whole.start()]);
        last = whole.end();

        if name == "CUBE" {
            if !grouped_by_primary_key {
                return Err(CompileError::UngroupedFormulaColumns {
                    cube: cube.name.clone(),
                    measure: stack.first().cloned().unwrap_or_default(),
                });
            }
            out.push_str(ctx.self_alias()?);
            continue;
        }

        if let Some(sibling) = cube.find_measure(name) {
            if stack.iter().any(|s| s == name) {
                let mut path = stack.clone();
                path.push(name.to_string());
                return Err(CompileError::CyclicMeasureReference {
                    cube: cube.name.clone(),
                    path,
                });
            }
            if sibling.aggregation == Aggregation::Number {
                stack.push(name.to_string());
                let expanded = expand_inner(
                    cube,
                    sibling,
                    ctx,
                    grouped_by_primary_key,
                    render_measure,
                    stack,
                )?;
                stack.pop();
                out.push('(');
                out.push_str(&expanded);
                out.push(')');
            } else {
                out.push_str(&render_measure(cube, sibling)?);
            }
            continue;
        }

        match ctx.aliases.get(name) {
            Some(alias) => out.push_str(alias),
            None => {
                return Err(CompileError::UnboundCubeReference {
                    cube: name.to_string(),
                    fragment: fragment.to_string(),
                })
            }
        }
    }
    out.push_str(&fragment[last..]);

    if out.contains("${") {
        return Err(CompileError::UnresolvedPlaceholder(out));
    }
    Ok(out)
}

/// The aggregated measures a number formula depends on, transitively,
/// in first-reference order.
pub(crate) fn formula_dependencies<'m>(
    cube: &'m Cube,
    measure: &'m Measure,
) -> CompileResult<Vec<&'m Measure>> {
    let mut deps: Vec<&'m Measure> = Vec::new();
    let mut stack = vec![measure.name.clone()];
    collect_deps(cube, measure, &mut deps, &mut stack)?;
    Ok(deps)
}

fn collect_deps<'m>(
    cube: &'m Cube,
    measure: &'m Measure,
    deps: &mut Vec<&'m Measure>,
    stack: &mut Vec<String>,
) -> CompileResult<()> {
    let fragment = measure.sql.as_deref().unwrap_or_default();
    for caps in PLACEHOLDER_RE.captures_iter(fragment) {
        let name = caps.get(1).expect("group").as_str();
        let Some(sibling) = cube.find_measure(name) else {
            continue;
        };
        if stack.iter().any(|s| s == name) {
            let mut path = stack.clone();
            path.push(name.to_string());
            return Err(CompileError::CyclicMeasureReference {
                cube: cube.name.clone(),
                path,
            });
        }
        if sibling.aggregation == Aggregation::Number {
            stack.push(name.to_string());
            collect_deps(cube, sibling, deps, stack)?;
            stack.pop();
        } else if !deps.iter().any(|d| d.name == sibling.name) {
            deps.push(sibling);
        }
    }
    Ok(())
}
