use proptest::prelude::*;
use queryfilter_core::{
    parse_search_params, stringify_search_params, QuerySearchParams, SearchParams,
    DEFAULT_PARAMETER_LIMIT,
};
use serde_json::{json, Map, Value};

// Starts with a letter so a nested key never reads as an array index; no
// brackets, which would re-split on decode.
fn arb_key() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9 _.~*%&=+-]{0,6}"
}

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = "\\PC{0,12}".prop_map(Value::String);
    // four container levels below the root key, within the default depth of 5
    leaf.prop_recursive(4, 48, 21, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..=21).prop_map(Value::Array),
            prop::collection::btree_map(arb_key(), inner, 1..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn arb_params() -> impl Strategy<Value = SearchParams> {
    prop::collection::btree_map(arb_key(), arb_value(), 0..6)
        .prop_map(|m| SearchParams::from(m.into_iter().collect::<Map<String, Value>>()))
}

proptest! {
    #[test]
    fn parse_inverts_stringify(p in arb_params()) {
        let encoded = stringify_search_params(&p).unwrap();
        prop_assume!(encoded.split('&').count() < DEFAULT_PARAMETER_LIMIT);
        prop_assert_eq!(parse_search_params(&encoded), p);
    }

    #[test]
    fn question_mark_is_optional(raw in "[a-z0-9=&%+?\\[\\] ]{0,40}") {
        prop_assert_eq!(parse_search_params(&format!("?{raw}")), parse_search_params(&raw));
    }

    #[test]
    fn typed_params_round_trip(
        table_id in proptest::option::of("\\PC{0,16}"),
        query in proptest::option::of("\\PC{0,40}"),
        query_from in proptest::option::of(any::<u32>()),
        after in proptest::option::of("[A-Za-z0-9+/=]{0,24}"),
    ) {
        let p = QuerySearchParams { table_id, query, query_from, after };
        let raw = p.to_query_string().unwrap();
        prop_assert_eq!(QuerySearchParams::parse(&format!("?{raw}")).unwrap(), p);
    }
}

#[test]
fn mixed_shapes_round_trip() {
    let p = match json!({
        "tableId": "6f1c",
        "query": "select * from t where a = 'b&c'",
        "rows": [{"k": "1"}, {"k": "2", "v": ["x"]}],
        "unicode": "tëst ✓",
        "empty": ""
    }) {
        Value::Object(map) => SearchParams::from(map),
        other => panic!("not a map: {other}"),
    };
    let encoded = stringify_search_params(&p).unwrap();
    assert_eq!(parse_search_params(&encoded), p, "via {encoded}");
}

#[test]
fn typed_bridge_via_search_params() {
    let parsed = parse_search_params("tableId=t1&after=c");
    let typed: QuerySearchParams = parsed.clone().into_typed().unwrap();
    assert_eq!(typed.table_id.as_deref(), Some("t1"));
    assert_eq!(SearchParams::from_typed(&typed).unwrap(), parsed);
}
