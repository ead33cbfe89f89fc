//! Fan-out guard tests: one-to-many joins must never distort aggregates.

use mica::model::{
    Cube, Dimension, DimensionType, Join, Measure, ModelRegistry, Relationship,
};
use mica::{compile, CompileOptions, Filter, FilterOp, FilterValue, QueryRequest};

/// Company —hasMany→ OsvDetailed, declared on the company side only.
fn has_many_registry() -> ModelRegistry {
    let company = Cube::new("CompanyDirectory", "SELECT * FROM master.companies")
        .dimension(Dimension::new("id", "id", DimensionType::Number).primary_key())
        .dimension(Dimension::new("companyName", "company_name", DimensionType::String))
        .measure(Measure::count("count"))
        .join(Join::new(
            "OsvDetailed",
            Relationship::HasMany,
            "${CUBE}.id = ${OsvDetailed}.company_id",
        ));

    let osv = Cube::new("OsvDetailed", "SELECT * FROM history.osv_detailed")
        .dimension(Dimension::new("id", "id", DimensionType::Number).primary_key())
        .dimension(Dimension::new("account", "account", DimensionType::String))
        .measure(Measure::count("count"))
        .measure(Measure::sum("totalTurnoverDebit", "turnover_debit"))
        .measure(Measure::avg("avgTurnover", "turnover_debit"));

    ModelRegistry::builder()
        .register(company)
        .unwrap()
        .register(osv)
        .unwrap()
        .build()
        .unwrap()
}

/// OsvDetailed —belongsTo→ CompanyDirectory: the safe many-to-one shape.
fn belongs_to_registry() -> ModelRegistry {
    let company = Cube::new("CompanyDirectory", "SELECT * FROM master.companies")
        .dimension(Dimension::new("id", "id", DimensionType::Number).primary_key())
        .dimension(Dimension::new("companyName", "company_name", DimensionType::String))
        .dimension(Dimension::new("inn", "inn", DimensionType::String));

    let osv = Cube::new("OsvDetailed", "SELECT * FROM history.osv_detailed")
        .dimension(Dimension::new("id", "id", DimensionType::Number).primary_key())
        .dimension(Dimension::new("inn", "inn", DimensionType::String))
        .measure(Measure::sum("totalTurnoverDebit", "turnover_debit"))
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

#[test]
fn test_has_many_dimension_triggers_pre_aggregation() {
    let request = QueryRequest::new()
        .dimension("CompanyDirectory.companyName")
        .measure("OsvDetailed.totalTurnoverDebit");

    let output = compile(&request, &has_many_registry(), CompileOptions::default()).unwrap();
    insta::assert_snapshot!(
        output.sql,
        @r#"SELECT company_directory.company_name AS "company_directory__company_name", SUM("osv_detailed"."total_turnover_debit") AS "osv_detailed__total_turnover_debit" FROM (SELECT "osv_detailed"."company_id" AS "company_id", SUM(osv_detailed.turnover_debit) AS "total_turnover_debit" FROM (SELECT * FROM history.osv_detailed) AS "osv_detailed" GROUP BY 1) AS "osv_detailed" LEFT JOIN (SELECT * FROM master.companies) AS "company_directory" ON "osv_detailed"."company_id" = "company_directory"."id" GROUP BY 1 ORDER BY 1 ASC"#
    );
}

#[test]
fn test_measure_only_query_aggregates_directly() {
    let request = QueryRequest::new().measure("OsvDetailed.totalTurnoverDebit");

    let output = compile(&request, &has_many_registry(), CompileOptions::default()).unwrap();
    assert_eq!(
        output.sql,
        "SELECT SUM(osv_detailed.turnover_debit) AS \"osv_detailed__total_turnover_debit\" \
         FROM (SELECT * FROM history.osv_detailed) AS \"osv_detailed\""
    );
}

#[test]
fn test_pre_aggregation_keeps_the_same_inner_aggregate() {
    // The grouped query must sum exactly the expression the plain total
    // sums, only inside a subquery collapsed to one row per join key.
    let registry = has_many_registry();

    let total_only = QueryRequest::new().measure("OsvDetailed.totalTurnoverDebit");
    let with_dimension = QueryRequest::new()
        .dimension("CompanyDirectory.companyName")
        .measure("OsvDetailed.totalTurnoverDebit");

    let plain = compile(&total_only, &registry, CompileOptions::default()).unwrap();
    let grouped = compile(&with_dimension, &registry, CompileOptions::default()).unwrap();

    assert!(plain.sql.contains("SUM(osv_detailed.turnover_debit)"));
    assert!(grouped.sql.contains("SUM(osv_detailed.turnover_debit)"));
    assert!(grouped.sql.contains("GROUP BY 1) AS \"osv_detailed\""));
    assert!(grouped
        .sql
        .contains("SUM(\"osv_detailed\".\"total_turnover_debit\")"));
}

#[test]
fn test_belongs_to_join_stays_direct() {
    let request = QueryRequest::new()
        .dimension("CompanyDirectory.companyName")
        .measure("OsvDetailed.totalTurnoverDebit");

    let output = compile(&request, &belongs_to_registry(), CompileOptions::default()).unwrap();
    assert_eq!(
        output.sql,
        "SELECT company_directory.company_name AS \"company_directory__company_name\", \
         SUM(osv_detailed.turnover_debit) AS \"osv_detailed__total_turnover_debit\" \
         FROM (SELECT * FROM history.osv_detailed) AS \"osv_detailed\" \
         LEFT JOIN (SELECT * FROM master.companies) AS \"company_directory\" \
         ON \"osv_detailed\".\"inn\" = \"company_directory\".\"inn\" \
         GROUP BY 1 ORDER BY 1 ASC"
    );
}

#[test]
fn test_one_side_count_is_pre_aggregated() {
    let request = QueryRequest::new()
        .dimension("OsvDetailed.account")
        .measure("CompanyDirectory.count");

    let output = compile(&request, &has_many_registry(), CompileOptions::default()).unwrap();
    // The company side collapses to one row per primary key before joining
    // the multiplying side.
    assert!(output.sql.contains("COUNT(*) AS \"count\""));
    assert!(output.sql.contains("GROUP BY 1) AS \"company_directory\""));
    assert!(output.sql.contains("SUM(\"company_directory\".\"count\")"));
}

#[test]
fn test_avg_re_aggregates_from_sum_and_count_parts() {
    let request = QueryRequest::new()
        .dimension("CompanyDirectory.companyName")
        .measure("OsvDetailed.avgTurnover");

    let output = compile(&request, &has_many_registry(), CompileOptions::default()).unwrap();
    assert!(output
        .sql
        .contains("SUM(osv_detailed.turnover_debit) AS \"avg_turnover__sum\""));
    assert!(output
        .sql
        .contains("COUNT(osv_detailed.turnover_debit) AS \"avg_turnover__cnt\""));
    assert!(output.sql.contains(
        "CASE WHEN SUM(\"osv_detailed\".\"avg_turnover__cnt\") > 0 \
         THEN SUM(\"osv_detailed\".\"avg_turnover__sum\") / SUM(\"osv_detailed\".\"avg_turnover__cnt\") \
         ELSE NULL END"
    ));
}

#[test]
fn test_filters_on_pre_aggregated_cube_apply_before_join() {
    let request = QueryRequest::new()
        .dimension("CompanyDirectory.companyName")
        .measure("OsvDetailed.totalTurnoverDebit")
        .filter(Filter::new(
            "OsvDetailed.account",
            FilterOp::Equals,
            vec![FilterValue::String("62".into())],
        ));

    let output = compile(&request, &has_many_registry(), CompileOptions::default()).unwrap();
    let subquery_end = output.sql.find("GROUP BY 1) AS \"osv_detailed\"").unwrap();
    let where_pos = output.sql.find("WHERE (osv_detailed.account = '62')").unwrap();
    assert!(
        where_pos < subquery_end,
        "filter must be applied inside the pre-aggregate subquery: {}",
        output.sql
    );
}
