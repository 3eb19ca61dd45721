//! Registration and infusion behavior of the context.

use dbpulse::{
    Context, Cursor, PulseError, QueryDef, QueryResult, RandomVariant, ScenarioDef, Value,
};

fn ctx_with(source: &str) -> Context {
    Context::with_sources(vec![source.to_string()])
}

#[test]
fn infusion_synthesizes_implicit_queries() {
    let ctx = ctx_with("-- name: select_all\nSELECT * FROM t;");
    ctx.infuse().unwrap();

    assert!(ctx.has_query("select_all"));
    let overview = ctx.queries_overview();
    assert_eq!(overview.len(), 1);
    assert_eq!(overview[0].1.as_deref(), Some("SELECT * FROM t;"));
}

#[test]
fn infusion_synthesizes_random_variants_from_options() {
    let ctx = ctx_with("-- name: select_all, option: return_random\nSELECT * FROM t;");
    ctx.infuse().unwrap();

    assert!(ctx.has_query("select_all"));
    assert!(ctx.has_query("select_all_return_random"));
}

#[test]
fn unrecognized_options_are_skipped_without_failing() {
    let ctx = ctx_with("-- name: select_all, option: frobnicate\nSELECT * FROM t;");
    ctx.infuse().unwrap();

    assert!(ctx.has_query("select_all"));
    assert!(!ctx.has_query("select_all_frobnicate"));
}

#[test]
fn options_attach_to_explicitly_registered_queries() {
    let ctx = ctx_with("-- name: select_all, option: return_random\nSELECT * FROM t;");
    ctx.add_query(QueryDef::auto("select_all")).unwrap();
    ctx.infuse().unwrap();

    assert!(ctx.has_query("select_all_return_random"));
}

#[test]
fn infusion_synthesizes_scenarios_with_ordered_auto_run() {
    // a carries order 2, b and c both carry -1; the tie keeps their
    // encounter order.
    let source = "\
-- name: a, scenario: s[2]
SELECT a;
-- name: b, scenario: s[-1]
SELECT b;
-- name: c, scenario: s[-1]
SELECT c;
";
    let ctx = ctx_with(source);
    ctx.infuse().unwrap();

    let scenarios = ctx.scenarios_overview();
    assert_eq!(scenarios.len(), 1);
    assert_eq!(scenarios[0].0, "s");
    assert_eq!(scenarios[0].1, vec!["b", "c", "a"]);
}

#[test]
fn annotations_replace_explicit_scenario_auto_run_lists() {
    let ctx = ctx_with("-- name: q, scenario: s\nSELECT 1;");
    ctx.add_scenario(ScenarioDef::auto("s").auto_run(&["x", "y"]))
        .unwrap();
    ctx.infuse().unwrap();

    let scenarios = ctx.scenarios_overview();
    assert_eq!(scenarios[0].1, vec!["q"]);
}

#[test]
fn scenarios_absent_from_annotations_keep_their_auto_run_lists() {
    let ctx = ctx_with("-- name: q\nSELECT 1;");
    ctx.add_scenario(ScenarioDef::auto("s").auto_run(&["q"]))
        .unwrap();
    ctx.infuse().unwrap();

    let scenarios = ctx.scenarios_overview();
    assert_eq!(scenarios[0].1, vec!["q"]);
}

#[test]
fn infusion_is_idempotent() {
    let source = "\
-- name: a, option: return_random, scenario: s[1]
SELECT a;
-- name: b, scenario: s[-2]
SELECT b;
";
    let ctx = ctx_with(source);
    ctx.infuse().unwrap();

    let queries_once = ctx.queries_overview();
    let scenarios_once = ctx.scenarios_overview();

    ctx.infuse().unwrap();
    ctx.infuse().unwrap();

    assert_eq!(ctx.queries_overview(), queries_once);
    assert_eq!(ctx.scenarios_overview(), scenarios_once);
    assert!(ctx.is_infused());
}

#[test]
fn auto_query_without_matching_sql_is_fatal() {
    let ctx = Context::new();
    ctx.add_query(QueryDef::auto("missing")).unwrap();

    let err = ctx.infuse().unwrap_err();
    assert!(matches!(
        err,
        PulseError::MatchingSqlNotFound { query, match_name }
            if query == "missing" && match_name == "missing"
    ));
}

#[test]
fn user_query_without_matching_sql_only_warns() {
    let ctx = Context::new();
    ctx.add_query(QueryDef::user("manual", |_c: &mut dyn Cursor, _p: &[Value]| Ok(None)))
        .unwrap();

    ctx.infuse().unwrap();
    let overview = ctx.queries_overview();
    assert_eq!(overview[0].1, None);
}

#[test]
fn match_statement_redirects_sql_resolution() {
    let ctx = ctx_with("-- name: shared\nSELECT shared;");
    ctx.add_query(QueryDef::auto("alias").match_statement("shared"))
        .unwrap();
    ctx.infuse().unwrap();

    let sql: Vec<Option<String>> = ctx
        .queries_overview()
        .into_iter()
        .filter(|(name, _)| name == "alias")
        .map(|(_, sql)| sql)
        .collect();
    assert_eq!(sql, vec![Some("SELECT shared;".to_string())]);
}

#[test]
fn statements_with_blank_bodies_count_as_missing() {
    let ctx = ctx_with("-- name: empty\n\n");
    let err = ctx.infuse().unwrap_err();
    assert!(matches!(err, PulseError::MatchingSqlNotFound { .. }));
}

#[test]
fn duplicate_query_registration_fails() {
    let ctx = Context::new();
    ctx.add_query(QueryDef::auto("q")).unwrap();

    let err = ctx.add_query(QueryDef::auto("q")).unwrap_err();
    assert!(matches!(err, PulseError::QueryAlreadyExists(name) if name == "q"));
}

#[test]
fn distinct_query_names_register_fine() {
    let ctx = Context::new();
    ctx.add_query(QueryDef::auto("q1")).unwrap();
    ctx.add_query(QueryDef::auto("q2")).unwrap();
    assert_eq!(ctx.query_names(), vec!["q1", "q2"]);
}

#[test]
fn duplicate_scenario_registration_fails() {
    let ctx = Context::new();
    ctx.add_scenario(ScenarioDef::auto("s")).unwrap();

    let err = ctx.add_scenario(ScenarioDef::auto("s")).unwrap_err();
    assert!(matches!(err, PulseError::ScenarioAlreadyExists(name) if name == "s"));
}

#[test]
fn random_variant_requires_registered_source() {
    let ctx = Context::new();
    let err = ctx
        .add_random_variant("ghost", RandomVariant::new())
        .unwrap_err();
    assert!(matches!(err, PulseError::RandomSourceMissing(name) if name == "ghost"));
}

#[test]
fn random_variant_inherits_match_and_derives_name() {
    let ctx = ctx_with("-- name: shared\nSELECT shared;");
    ctx.add_query(
        QueryDef::user("picker", |c: &mut dyn Cursor, _p: &[Value]| {
            c.execute("SELECT shared;", &[])?;
            Ok(Some(QueryResult::from_cursor(c)?))
        })
        .match_statement("shared"),
    )
    .unwrap();
    ctx.add_random_variant("picker", RandomVariant::new())
        .unwrap();
    ctx.infuse().unwrap();

    assert!(ctx.has_query("picker_return_random"));
    let sql: Vec<Option<String>> = ctx
        .queries_overview()
        .into_iter()
        .filter(|(name, _)| name == "picker_return_random")
        .map(|(_, sql)| sql)
        .collect();
    assert_eq!(sql, vec![Some("SELECT shared;".to_string())]);
}

#[test]
fn registration_after_infusion_is_allowed() {
    let ctx = ctx_with("-- name: q\nSELECT 1;");
    ctx.infuse().unwrap();

    ctx.add_query(QueryDef::user("late", |_c: &mut dyn Cursor, _p: &[Value]| Ok(None)))
        .unwrap();
    assert!(ctx.has_query("late"));
}
