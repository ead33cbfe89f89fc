//! Binding behavior through the public compile path: placeholder
//! substitution, unbound references, formula expansion and its cycles.

use mica::model::{
    Cube, Dimension, DimensionType, Join, Measure, ModelRegistry, Relationship, Segment,
};
use mica::{compile, CompileError, CompileOptions, QueryRequest};

fn registry() -> ModelRegistry {
    let company = Cube::new("CompanyDirectory", "SELECT * FROM master.companies")
        .dimension(Dimension::new("id", "id", DimensionType::Number).primary_key())
        .dimension(Dimension::new("companyName", "company_name", DimensionType::String))
        .dimension(Dimension::new("inn", "inn", DimensionType::String))
        .measure(Measure::count("count"))
        .segment(Segment::new("active", "${CUBE}.is_active = true"));

    let osv = Cube::new("OsvDetailed", "SELECT * FROM history.osv_detailed")
        .dimension(Dimension::new("id", "id", DimensionType::Number).primary_key())
        .dimension(Dimension::new("account", "account", DimensionType::String))
        .dimension(Dimension::new("inn", "inn", DimensionType::String))
        .measure(Measure::sum("totalTurnoverDebit", "turnover_debit"))
        .segment(Segment::new(
            "companyMatched",
            "${CompanyDirectory}.inn IS NOT NULL",
        ))
        .join(Join::new(
            "CompanyDirectory",
            Relationship::BelongsTo,
            "${CUBE}.inn = ${CompanyDirectory}.inn",
        ));

    let pnl = Cube::new("ProfitAndLoss", "SELECT * FROM analytics.profit_v")
        .dimension(Dimension::new("id", "id", DimensionType::Number).primary_key())
        .dimension(Dimension::new("companyName", "company_name", DimensionType::String))
        .measure(Measure::sum("totalRevenue", "\"Revenue\""))
        .measure(Measure::sum(
            "netProfit",
            "\"Revenue\" - \"Cost of Goods\" - \"Overheads\"",
        ))
        .measure(Measure::number(
            "netMargin",
            "CASE WHEN ${totalRevenue} > 0 THEN (${netProfit} / ${totalRevenue}) * 100 ELSE 0 END",
        ))
        .measure(Measure::number("selfReferential", "${selfReferential} + 1"))
        .measure(Measure::number("perRow", "${CUBE}.extra / 2"));

    ModelRegistry::builder()
        .register(company)
        .unwrap()
        .register(osv)
        .unwrap()
        .register(pnl)
        .unwrap()
        .build()
        .unwrap()
}

#[test]
fn test_self_reference_binds_to_cube_alias() {
    let request = QueryRequest::new()
        .dimension("CompanyDirectory.companyName")
        .measure("CompanyDirectory.count")
        .segment("CompanyDirectory.active");

    let output = compile(&request, &registry(), CompileOptions::default()).unwrap();
    assert!(output.sql.contains("(company_directory.is_active = true)"));
    assert!(!output.sql.contains("${"));
}

#[test]
fn test_cross_cube_segment_binds_when_cube_is_joined() {
    let request = QueryRequest::new()
        .dimension("CompanyDirectory.companyName")
        .measure("OsvDetailed.totalTurnoverDebit")
        .segment("OsvDetailed.companyMatched");

    let output = compile(&request, &registry(), CompileOptions::default()).unwrap();
    assert!(output.sql.contains("(company_directory.inn IS NOT NULL)"));
}

#[test]
fn test_cross_cube_segment_fails_when_cube_is_absent() {
    let request = QueryRequest::new()
        .dimension("OsvDetailed.account")
        .measure("OsvDetailed.totalTurnoverDebit")
        .segment("OsvDetailed.companyMatched");

    let err = compile(&request, &registry(), CompileOptions::default());
    assert!(matches!(
        err,
        Err(CompileError::UnboundCubeReference { cube, .. }) if cube == "CompanyDirectory"
    ));
}

#[test]
fn test_formula_expands_to_aggregates() {
    let request = QueryRequest::new()
        .dimension("ProfitAndLoss.companyName")
        .measure("ProfitAndLoss.netMargin");

    let output = compile(&request, &registry(), CompileOptions::default()).unwrap();
    // The formula computes from aggregated sub-expressions, not raw rows.
    assert!(output.sql.contains("CASE WHEN SUM(\"Revenue\") > 0 THEN"));
    assert!(output
        .sql
        .contains("(SUM(\"Revenue\" - \"Cost of Goods\" - \"Overheads\") / SUM(\"Revenue\")) * 100"));
}

#[test]
fn test_cyclic_formula_rejected() {
    let request = QueryRequest::new()
        .dimension("ProfitAndLoss.companyName")
        .measure("ProfitAndLoss.selfReferential");

    let err = compile(&request, &registry(), CompileOptions::default());
    assert!(matches!(
        err,
        Err(CompileError::CyclicMeasureReference { .. })
    ));
}

#[test]
fn test_per_row_formula_requires_primary_key_grouping() {
    let request = QueryRequest::new()
        .dimension("ProfitAndLoss.companyName")
        .measure("ProfitAndLoss.perRow");

    let err = compile(&request, &registry(), CompileOptions::default());
    assert!(matches!(
        err,
        Err(CompileError::UngroupedFormulaColumns { .. })
    ));

    // Grouping by the primary key makes per-row references well-defined.
    let request = QueryRequest::new()
        .dimension("ProfitAndLoss.id")
        .measure("ProfitAndLoss.perRow");
    let output = compile(&request, &registry(), CompileOptions::default()).unwrap();
    assert!(output.sql.contains("profit_and_loss.extra / 2"));
}

#[test]
fn test_compiled_statement_has_no_placeholders() {
    let request = QueryRequest::new()
        .dimension("CompanyDirectory.companyName")
        .measure("OsvDetailed.totalTurnoverDebit")
        .segment("OsvDetailed.companyMatched")
        .segment("CompanyDirectory.active");

    let output = compile(&request, &registry(), CompileOptions::default()).unwrap();
    assert!(!output.sql.contains("${"));
    assert!(!output.sql.contains("CUBE"));
}
