//! Property tests for path and snippet parsing.

use proptest::prelude::*;
use serde_json::{json, Value};

use cdss::domain::ports::PathAccessor;
use cdss::domain::services::snippet;
use cdss::domain::value_objects::ObjectPath;
use cdss::JsonPathAccessor;

fn segment() -> impl Strategy<Value = String> {
    let name = proptest::string::string_regex("[a-z][a-zA-Z0-9_]{0,8}").unwrap();
    let guard = proptest::option::of(proptest::string::string_regex("[A-Za-z0-9=]{1,8}").unwrap());
    (name, guard).prop_map(|(name, guard)| match guard {
        Some(guard) => format!("{}[{}]", name, guard),
        None => name,
    })
}

fn plain_path() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(
        proptest::string::string_regex("[a-z][a-z0-9_]{0,8}").unwrap(),
        1..=5,
    )
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: Path parsing never panics on arbitrary input.
    #[test]
    fn property_path_parse_never_panics(s in "(?s).{0,128}") {
        let _ = ObjectPath::parse(&s);
    }

    /// PROPERTY: Snippet parsing never panics on arbitrary input.
    #[test]
    fn property_snippet_parse_never_panics(s in "(?s).{0,128}") {
        let _ = snippet::parse(&s);
    }

    /// PROPERTY: A well-formed path prints back to its source text.
    #[test]
    fn property_path_display_matches_source(segments in proptest::collection::vec(segment(), 1..=6)) {
        let text = segments.join(".");
        let path = ObjectPath::parse(&text).unwrap();
        prop_assert_eq!(path.segments().len(), segments.len());
        prop_assert_eq!(path.to_string(), text);
    }

    /// PROPERTY: Whatever `set` writes, `get` reads back.
    #[test]
    fn property_set_then_get(names in plain_path(), n in any::<i64>()) {
        let accessor = JsonPathAccessor::default();
        let path = ObjectPath::parse(&names.join(".")).unwrap();
        let mut target = json!({});

        accessor.set(&mut target, &path, Value::from(n)).unwrap();

        prop_assert_eq!(accessor.get(&target, &path), Some(&Value::from(n)));
        prop_assert!(accessor.is_set(&target, &path));
    }
}
