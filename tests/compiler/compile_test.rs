//! End-to-end compilation tests over the financial reporting model.

use mica::model::{
    Cube, Dimension, DimensionType, FormatHint, Granularity, Join, Measure, ModelRegistry,
    Relationship, Segment,
};
use mica::{compile, CompileError, CompileOptions, Filter, FilterOp, FilterValue, QueryRequest};

fn registry() -> ModelRegistry {
    let company = Cube::new("CompanyDirectory", "SELECT * FROM master.companies")
        .with_title("Company directory")
        .dimension(Dimension::new("id", "id", DimensionType::Number).primary_key())
        .dimension(Dimension::new("companyName", "company_name", DimensionType::String))
        .dimension(Dimension::new("inn", "inn", DimensionType::String))
        .dimension(Dimension::new("isActive", "is_active", DimensionType::Boolean))
        .dimension(Dimension::new(
            "liquidationDate",
            "liquidation_date",
            DimensionType::Time,
        ))
        .measure(Measure::count("count"))
        .measure(Measure::count_of(
            "activeCount",
            "CASE WHEN is_active = true THEN 1 END",
        ))
        .segment(Segment::new("active", "${CUBE}.is_active = true"))
        .segment(Segment::new(
            "liquidated",
            "${CUBE}.liquidation_date IS NOT NULL",
        ));

    let osv = Cube::new("OsvDetailed", "SELECT * FROM history.osv_detailed")
        .dimension(Dimension::new("id", "id", DimensionType::Number).primary_key())
        .dimension(Dimension::new("account", "account", DimensionType::String))
        .dimension(Dimension::new("period", "period", DimensionType::String))
        .dimension(Dimension::new("inn", "inn", DimensionType::String))
        .dimension(Dimension::new("importDate", "import_date", DimensionType::Time))
        .measure(Measure::count("count"))
        .measure(
            Measure::sum("totalTurnoverDebit", "turnover_debit")
                .with_format(FormatHint::Currency),
        )
        .measure(Measure::sum("totalTurnoverCredit", "turnover_credit"))
        .segment(Segment::new(
            "activeAccounts",
            "${CUBE}.turnover_debit > 0 OR ${CUBE}.turnover_credit > 0",
        ))
        .join(Join::new(
            "CompanyDirectory",
            Relationship::BelongsTo,
            "${CUBE}.inn = ${CompanyDirectory}.inn",
        ));

    ModelRegistry::builder()
        .register(company)
        .unwrap()
        .register(osv)
        .unwrap()
        .build()
        .unwrap()
}

fn options() -> CompileOptions {
    CompileOptions::default()
}

#[test]
fn test_column_manifest_matches_request_order() {
    let request = QueryRequest::new()
        .dimension("CompanyDirectory.companyName")
        .time_dimension("OsvDetailed.importDate", Granularity::Month)
        .measure("OsvDetailed.totalTurnoverDebit")
        .measure("OsvDetailed.count");

    let output = compile(&request, &registry(), options()).unwrap();

    let members: Vec<&str> = output.columns.iter().map(|c| c.member.as_str()).collect();
    assert_eq!(
        members,
        vec![
            "CompanyDirectory.companyName",
            "OsvDetailed.importDate",
            "OsvDetailed.totalTurnoverDebit",
            "OsvDetailed.count",
        ]
    );

    let aliases: Vec<&str> = output.columns.iter().map(|c| c.alias.as_str()).collect();
    assert_eq!(
        aliases,
        vec![
            "company_directory__company_name",
            "osv_detailed__import_date_month",
            "osv_detailed__total_turnover_debit",
            "osv_detailed__count",
        ]
    );

    // The SELECT list carries the same aliases in the same order.
    let mut last = 0;
    for alias in &aliases {
        let pos = output.sql.find(&format!("AS \"{}\"", alias)).unwrap();
        assert!(pos > last);
        last = pos;
    }

    assert_eq!(output.columns[2].format, Some(FormatHint::Currency));
    assert_eq!(output.columns[0].format, None);
}

#[test]
fn test_segments_and_filters_conjoin_into_one_where_clause() {
    let request = QueryRequest::new()
        .dimension("CompanyDirectory.companyName")
        .measure("OsvDetailed.totalTurnoverDebit")
        .segment("CompanyDirectory.active")
        .segment("CompanyDirectory.liquidated")
        .filter(Filter::new(
            "CompanyDirectory.companyName",
            FilterOp::Equals,
            vec![FilterValue::String("Acme".into())],
        ));

    let output = compile(&request, &registry(), options()).unwrap();
    assert_eq!(output.sql.matches("WHERE").count(), 1);
    assert!(output.sql.contains(
        "WHERE (company_directory.is_active = true) \
         AND (company_directory.liquidation_date IS NOT NULL) \
         AND (company_directory.company_name = 'Acme')"
    ));
}

#[test]
fn test_removing_a_segment_keeps_the_join_plan() {
    let base = QueryRequest::new()
        .dimension("CompanyDirectory.companyName")
        .measure("OsvDetailed.totalTurnoverDebit")
        .segment("CompanyDirectory.active")
        .segment("CompanyDirectory.liquidated");
    let trimmed = QueryRequest::new()
        .dimension("CompanyDirectory.companyName")
        .measure("OsvDetailed.totalTurnoverDebit")
        .segment("CompanyDirectory.active");

    let with_both = compile(&base, &registry(), options()).unwrap();
    let with_one = compile(&trimmed, &registry(), options()).unwrap();

    let join_section = |sql: &str| {
        let from = sql.find(" FROM ").unwrap();
        let end = sql.find(" WHERE ").unwrap();
        sql[from..end].to_string()
    };
    assert_eq!(join_section(&with_both.sql), join_section(&with_one.sql));
    assert!(with_both.sql.contains("liquidation_date IS NOT NULL"));
    assert!(!with_one.sql.contains("liquidation_date IS NOT NULL"));
}

#[test]
fn test_time_granularity_uses_calendar_truncation() {
    let request = QueryRequest::new()
        .time_dimension("OsvDetailed.importDate", Granularity::Quarter)
        .measure("OsvDetailed.totalTurnoverDebit");

    let output = compile(&request, &registry(), options()).unwrap();
    assert!(output
        .sql
        .contains("DATE_TRUNC('quarter', osv_detailed.import_date) AS \"osv_detailed__import_date_quarter\""));
    assert!(output.sql.contains("GROUP BY 1"));
    assert!(output.sql.contains("ORDER BY 1 ASC"));
}

#[test]
fn test_multi_value_equals_compiles_to_in() {
    let request = QueryRequest::new()
        .dimension("OsvDetailed.account")
        .measure("OsvDetailed.totalTurnoverDebit")
        .filter(Filter::new(
            "OsvDetailed.account",
            FilterOp::Equals,
            vec![
                FilterValue::String("62".into()),
                FilterValue::String("90".into()),
            ],
        ));

    let output = compile(&request, &registry(), options()).unwrap();
    assert!(output
        .sql
        .contains("WHERE (osv_detailed.account IN ('62', '90'))"));
}

#[test]
fn test_contains_filter_uses_ilike() {
    let request = QueryRequest::new()
        .dimension("CompanyDirectory.companyName")
        .measure("CompanyDirectory.count")
        .filter(Filter::new(
            "CompanyDirectory.companyName",
            FilterOp::Contains,
            vec![FilterValue::String("oil".into())],
        ));

    let output = compile(&request, &registry(), options()).unwrap();
    assert!(output
        .sql
        .contains("WHERE (company_directory.company_name ILIKE '%oil%')"));
}

#[test]
fn test_time_comparison_uses_date_literal() {
    let request = QueryRequest::new()
        .dimension("OsvDetailed.account")
        .measure("OsvDetailed.totalTurnoverDebit")
        .filter(Filter::new(
            "OsvDetailed.importDate",
            FilterOp::Gte,
            vec![FilterValue::String("2024-01-01".into())],
        ));

    let output = compile(&request, &registry(), options()).unwrap();
    assert!(output
        .sql
        .contains("WHERE (osv_detailed.import_date >= DATE '2024-01-01')"));
}

#[test]
fn test_set_filter_compiles_to_null_check() {
    let request = QueryRequest::new()
        .dimension("CompanyDirectory.companyName")
        .measure("CompanyDirectory.count")
        .filter(Filter::new(
            "CompanyDirectory.liquidationDate",
            FilterOp::Set,
            vec![],
        ));

    let output = compile(&request, &registry(), options()).unwrap();
    assert!(output
        .sql
        .contains("WHERE (company_directory.liquidation_date IS NOT NULL)"));
}

#[test]
fn test_count_with_expression() {
    let request = QueryRequest::new().measure("CompanyDirectory.activeCount");

    let output = compile(&request, &registry(), options()).unwrap();
    assert!(output
        .sql
        .contains("COUNT(CASE WHEN is_active = true THEN 1 END)"));
}

#[test]
fn test_explicit_order_and_limit() {
    let request = QueryRequest::new()
        .dimension("OsvDetailed.account")
        .measure("OsvDetailed.totalTurnoverDebit")
        .order_by("OsvDetailed.totalTurnoverDebit", true)
        .with_limit(10);

    let output = compile(&request, &registry(), options()).unwrap();
    assert!(output.sql.ends_with("ORDER BY 2 DESC LIMIT 10"));
}

#[test]
fn test_default_order_is_first_dimension_ascending() {
    let request = QueryRequest::new()
        .dimension("OsvDetailed.account")
        .measure("OsvDetailed.totalTurnoverDebit");

    let output = compile(&request, &registry(), options()).unwrap();
    assert!(output.sql.ends_with("ORDER BY 1 ASC"));
}

#[test]
fn test_measures_only_query_has_no_grouping() {
    let request = QueryRequest::new()
        .measure("OsvDetailed.totalTurnoverDebit")
        .measure("OsvDetailed.totalTurnoverCredit");

    let output = compile(&request, &registry(), options()).unwrap();
    assert!(!output.sql.contains("GROUP BY"));
    assert!(!output.sql.contains("ORDER BY"));
}

#[test]
fn test_unknown_field_rejected() {
    let request = QueryRequest::new().measure("OsvDetailed.nope");
    assert!(matches!(
        compile(&request, &registry(), options()),
        Err(CompileError::UnknownField { cube, field }) if cube == "OsvDetailed" && field == "nope"
    ));
}

#[test]
fn test_unknown_cube_rejected() {
    let request = QueryRequest::new().measure("Mystery.count");
    assert!(matches!(
        compile(&request, &registry(), options()),
        Err(CompileError::UnknownCube(cube)) if cube == "Mystery"
    ));
}

#[test]
fn test_unqualified_member_rejected() {
    let request = QueryRequest::new().measure("count");
    assert!(matches!(
        compile(&request, &registry(), options()),
        Err(CompileError::InvalidMember(_))
    ));
}

#[test]
fn test_contains_on_boolean_rejected() {
    let request = QueryRequest::new()
        .dimension("CompanyDirectory.companyName")
        .measure("CompanyDirectory.count")
        .filter(Filter::new(
            "CompanyDirectory.isActive",
            FilterOp::Contains,
            vec![FilterValue::String("tru".into())],
        ));

    assert!(matches!(
        compile(&request, &registry(), options()),
        Err(CompileError::TypeMismatch { op: "contains", ty: "boolean", .. })
    ));
}

#[test]
fn test_ordering_operator_takes_exactly_one_value() {
    let request = QueryRequest::new()
        .dimension("OsvDetailed.account")
        .measure("OsvDetailed.totalTurnoverDebit")
        .filter(Filter::new(
            "OsvDetailed.importDate",
            FilterOp::Gt,
            vec![
                FilterValue::String("2024-01-01".into()),
                FilterValue::String("2024-02-01".into()),
            ],
        ));

    assert!(matches!(
        compile(&request, &registry(), options()),
        Err(CompileError::InvalidFilter { .. })
    ));
}

#[test]
fn test_order_by_unrequested_member_rejected() {
    let request = QueryRequest::new()
        .dimension("OsvDetailed.account")
        .measure("OsvDetailed.totalTurnoverDebit")
        .order_by("OsvDetailed.count", false);

    assert!(matches!(
        compile(&request, &registry(), options()),
        Err(CompileError::InvalidOrderBy(member)) if member == "OsvDetailed.count"
    ));
}

#[test]
fn test_empty_request_rejected() {
    assert!(matches!(
        compile(&QueryRequest::new(), &registry(), options()),
        Err(CompileError::EmptyRequest)
    ));
}

#[test]
fn test_granularity_on_non_time_dimension_rejected() {
    let request = QueryRequest::new()
        .time_dimension("OsvDetailed.account", Granularity::Month)
        .measure("OsvDetailed.totalTurnoverDebit");

    assert!(matches!(
        compile(&request, &registry(), options()),
        Err(CompileError::TypeMismatch { op: "granularity", .. })
    ));
}

#[test]
fn test_duckdb_dialect_compiles() {
    let request = QueryRequest::new()
        .dimension("CompanyDirectory.companyName")
        .measure("OsvDetailed.totalTurnoverDebit");

    let output = compile(
        &request,
        &registry(),
        CompileOptions::default().with_dialect(mica::Dialect::DuckDb),
    )
    .unwrap();
    assert_eq!(output.dialect, mica::Dialect::DuckDb);
    assert!(output.sql.contains("LEFT JOIN"));
}
