//! Phase 1: request resolution.
//!
//! Resolves every member reference in a request against the registry,
//! validates operator/type compatibility, determines the query root and
//! collects the set of referenced cubes.

use crate::error::{CompileError, CompileResult};
use crate::model::{
    Cube, Dimension, DimensionType, Granularity, Measure, ModelRegistry, Segment,
};

use super::request::{
    Filter, FilterOp, FilterValue, MemberRef, QueryRequest, ValueArity,
};

/// A requested dimension, resolved.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedDimension<'m> {
    pub reference: String,
    pub cube: &'m Cube,
    pub dimension: &'m Dimension,
}

/// The requested time dimension, resolved.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedTimeDimension<'m> {
    pub reference: String,
    pub cube: &'m Cube,
    pub dimension: &'m Dimension,
    pub granularity: Granularity,
}

/// A requested measure, resolved.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedMeasure<'m> {
    pub reference: String,
    pub cube: &'m Cube,
    pub measure: &'m Measure,
}

/// A filter with its dimension resolved and validated.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedFilter<'m> {
    pub cube: &'m Cube,
    pub dimension: &'m Dimension,
    pub op: FilterOp,
    pub values: Vec<FilterValue>,
}

/// A requested segment, resolved.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedSegment<'m> {
    pub cube: &'m Cube,
    pub segment: &'m Segment,
}

/// An ordering entry resolved to a select-list position (0-based).
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResolvedOrder {
    pub position: usize,
    pub descending: bool,
}

/// The fully resolved request.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedQuery<'m> {
    pub root: String,
    pub dimensions: Vec<ResolvedDimension<'m>>,
    pub time_dimension: Option<ResolvedTimeDimension<'m>>,
    pub measures: Vec<ResolvedMeasure<'m>>,
    pub filters: Vec<ResolvedFilter<'m>>,
    pub segments: Vec<ResolvedSegment<'m>>,
    pub order: Vec<ResolvedOrder>,
    pub limit: Option<u64>,
    /// Every referenced cube, in first-reference order, root first.
    pub cubes: Vec<String>,
}

impl<'m> ResolvedQuery<'m> {
    /// Member references in select-list order: dimensions, time dimension,
    /// measures.
    pub fn select_members(&self) -> Vec<&str> {
        let mut members: Vec<&str> = self
            .dimensions
            .iter()
            .map(|d| d.reference.as_str())
            .collect();
        if let Some(t) = &self.time_dimension {
            members.push(t.reference.as_str());
        }
        members.extend(self.measures.iter().map(|m| m.reference.as_str()));
        members
    }
}

/// Resolve a request against the registry.
pub(crate) fn resolve<'m>(
    request: &QueryRequest,
    registry: &'m ModelRegistry,
) -> CompileResult<ResolvedQuery<'m>> {
    let mut dimensions = Vec::with_capacity(request.dimensions.len());
    for reference in &request.dimensions {
        let member = MemberRef::parse(reference)?;
        let cube = lookup_cube(registry, member.cube)?;
        let dimension = cube.find_dimension(member.member).ok_or_else(|| {
            CompileError::UnknownField {
                cube: member.cube.to_string(),
                field: member.member.to_string(),
            }
        })?;
        dimensions.push(ResolvedDimension {
            reference: reference.clone(),
            cube,
            dimension,
        });
    }

    let time_dimension = match &request.time_dimension {
        None => None,
        Some(t) => {
            let member = MemberRef::parse(&t.dimension)?;
            let cube = lookup_cube(registry, member.cube)?;
            let dimension = cube.find_dimension(member.member).ok_or_else(|| {
                CompileError::UnknownField {
                    cube: member.cube.to_string(),
                    field: member.member.to_string(),
                }
            })?;
            if dimension.dimension_type != DimensionType::Time {
                return Err(CompileError::TypeMismatch {
                    cube: member.cube.to_string(),
                    field: member.member.to_string(),
                    op: "granularity",
                    ty: dimension.dimension_type.as_str(),
                });
            }
            Some(ResolvedTimeDimension {
                reference: t.dimension.clone(),
                cube,
                dimension,
                granularity: t.granularity,
            })
        }
    };

    let mut measures = Vec::with_capacity(request.measures.len());
    for reference in &request.measures {
        let member = MemberRef::parse(reference)?;
        let cube = lookup_cube(registry, member.cube)?;
        let measure = cube.find_measure(member.member).ok_or_else(|| {
            CompileError::UnknownField {
                cube: member.cube.to_string(),
                field: member.member.to_string(),
            }
        })?;
        measures.push(ResolvedMeasure {
            reference: reference.clone(),
            cube,
            measure,
        });
    }

    let mut filters = Vec::with_capacity(request.filters.len());
    for filter in &request.filters {
        filters.push(resolve_filter(filter, registry)?);
    }

    let mut segments = Vec::with_capacity(request.segments.len());
    for reference in &request.segments {
        let member = MemberRef::parse(reference)?;
        let cube = lookup_cube(registry, member.cube)?;
        let segment = cube.find_segment(member.member).ok_or_else(|| {
            CompileError::UnknownField {
                cube: member.cube.to_string(),
                field: member.member.to_string(),
            }
        })?;
        segments.push(ResolvedSegment { cube, segment });
    }

    // The root anchors the join tree: the cube owning the first measure,
    // else the first dimension, else the time dimension.
    let root = measures
        .first()
        .map(|m| m.cube.name.clone())
        .or_else(|| dimensions.first().map(|d| d.cube.name.clone()))
        .or_else(|| time_dimension.as_ref().map(|t| t.cube.name.clone()))
        .ok_or(CompileError::EmptyRequest)?;

    let mut cubes = vec![root.clone()];
    let push_cube = |cubes: &mut Vec<String>, name: &str| {
        if !cubes.iter().any(|c| c == name) {
            cubes.push(name.to_string());
        }
    };
    for m in &measures {
        push_cube(&mut cubes, &m.cube.name);
    }
    for d in &dimensions {
        push_cube(&mut cubes, &d.cube.name);
    }
    if let Some(t) = &time_dimension {
        push_cube(&mut cubes, &t.cube.name);
    }
    for f in &filters {
        push_cube(&mut cubes, &f.cube.name);
    }
    for s in &segments {
        push_cube(&mut cubes, &s.cube.name);
    }

    let resolved = ResolvedQuery {
        root,
        dimensions,
        time_dimension,
        measures,
        filters,
        segments,
        order: Vec::new(),
        limit: request.limit,
        cubes,
    };

    let mut order = Vec::with_capacity(request.order.len());
    {
        let members = resolved.select_members();
        for entry in &request.order {
            let position = members
                .iter()
                .position(|m| *m == entry.member)
                .ok_or_else(|| CompileError::InvalidOrderBy(entry.member.clone()))?;
            order.push(ResolvedOrder {
                position,
                descending: entry.descending,
            });
        }
    }

    Ok(ResolvedQuery { order, ..resolved })
}

fn resolve_filter<'m>(
    filter: &Filter,
    registry: &'m ModelRegistry,
) -> CompileResult<ResolvedFilter<'m>> {
    let member = MemberRef::parse(&filter.member)?;
    let cube = lookup_cube(registry, member.cube)?;
    let dimension = cube
        .find_dimension(member.member)
        .ok_or_else(|| CompileError::UnknownField {
            cube: member.cube.to_string(),
            field: member.member.to_string(),
        })?;

    if !filter.op.applicable_to(dimension.dimension_type) {
        return Err(CompileError::TypeMismatch {
            cube: member.cube.to_string(),
            field: member.member.to_string(),
            op: filter.op.as_str(),
            ty: dimension.dimension_type.as_str(),
        });
    }

    match filter.op.value_arity() {
        ValueArity::None => {
            if !filter.values.is_empty() {
                return Err(CompileError::InvalidFilter {
                    member: filter.member.clone(),
                    op: filter.op.as_str(),
                    expected: "no values",
                    found: filter.values.len(),
                });
            }
        }
        ValueArity::AtLeastOne => {
            if filter.values.is_empty() {
                return Err(CompileError::InvalidFilter {
                    member: filter.member.clone(),
                    op: filter.op.as_str(),
                    expected: "at least one value",
                    found: 0,
                });
            }
            if filter.op.single_valued() && filter.values.len() != 1 {
                return Err(CompileError::InvalidFilter {
                    member: filter.member.clone(),
                    op: filter.op.as_str(),
                    expected: "exactly one value",
                    found: filter.values.len(),
                });
            }
        }
    }

    Ok(ResolvedFilter {
        cube,
        dimension,
        op: filter.op,
        values: filter.values.clone(),
    })
}

fn lookup_cube<'m>(registry: &'m ModelRegistry, name: &str) -> CompileResult<&'m Cube> {
    registry
        .lookup(name)
        .map_err(|_| CompileError::UnknownCube(name.to_string()))
}
