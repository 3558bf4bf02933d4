//! Property tests for query serialisation and result-cap clamping.

use poi_gateway_core::{
    GeoCenter, MAX_RESULTS_CEILING, QueryRequest, TagRule, build_query, clamp_max_results,
};
use proptest::prelude::*;
use serde_json::{Value, json};

fn tag_rule() -> impl Strategy<Value = TagRule> {
    (
        "[a-z:_]{1,12}",
        prop::collection::vec("[A-Za-z0-9 \"\\\\_-]{0,10}", 0..4),
    )
        .prop_map(|(key, values)| TagRule { key, values })
}

fn center() -> impl Strategy<Value = GeoCenter> {
    (-90.0f64..=90.0, -180.0f64..=180.0).prop_map(|(lat, lng)| GeoCenter::new(lat, lng))
}

fn wire_max_results() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<f64>().prop_map(|n| json!(n)),
        any::<i64>().prop_map(|n| json!(n)),
        ".{0,8}".prop_map(Value::String),
        any::<bool>().prop_map(Value::Bool),
        Just(Value::Null),
    ]
}

fn limit_of(query: &str) -> u16 {
    query
        .rsplit_once("out center ")
        .and_then(|(_, tail)| tail.strip_suffix(';'))
        .and_then(|limit| limit.parse().ok())
        .expect("query should end with an `out center N;` statement")
}

proptest! {
    #[test]
    fn clamped_cap_is_always_in_range(raw in proptest::option::of(any::<f64>())) {
        let cap = clamp_max_results(raw);
        prop_assert!((1..=MAX_RESULTS_CEILING).contains(&cap));
    }

    #[test]
    fn built_query_limit_is_always_in_range(
        rules in prop::collection::vec(tag_rule(), 0..3),
        centre in center(),
        raw in wire_max_results(),
    ) {
        let request = QueryRequest {
            rules: Some(rules),
            center: Some(centre),
            radius_meters: None,
            max_results: Some(raw),
        };
        let spec = request.into_spec().expect("rules and center are present");
        let limit = limit_of(&spec.to_query());
        prop_assert!((1..=MAX_RESULTS_CEILING).contains(&limit));
    }

    #[test]
    fn identical_input_builds_identical_query(
        rules in prop::collection::vec(tag_rule(), 0..4),
        centre in center(),
        radius in 1.0f64..50_000.0,
        cap in proptest::option::of(any::<f64>()),
    ) {
        let first = build_query(&rules, centre, radius, cap);
        let second = build_query(&rules.clone(), centre, radius, cap);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn reordering_rules_with_distinct_keys_changes_the_query(
        first in tag_rule(),
        second in tag_rule(),
        centre in center(),
    ) {
        prop_assume!(first.key != second.key);
        prop_assume!(!first.values.is_empty() && !second.values.is_empty());
        let forward = build_query(&[first.clone(), second.clone()], centre, 1_000.0, None);
        let reversed = build_query(&[second, first], centre, 1_000.0, None);
        prop_assert_ne!(forward, reversed);
    }
}
