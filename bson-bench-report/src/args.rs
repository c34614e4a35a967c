//! Report Arguments
//!
//! The perf.send schema only accepts numeric arguments. Each known option name has
//! a coercion rule; unknown names fall back to a generic rule that emits
//! [`NON_NUMERIC_SENTINEL`] for anything that is not a boolean or a number.

use bson_bench_ipc::{OperationOptions, OptionValue};
use std::collections::BTreeMap;

/// Value emitted for options that have no numeric representation
pub const NON_NUMERIC_SENTINEL: f64 = -1.0;

/// Report key that replaces the `validation` option
pub const UTF8_VALIDATION_ARG: &str = "utf8Validation";

/// How an option becomes a report argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionRule {
    /// `false` → 0, `true` → 1
    Boolean,
    /// Passed through as a number
    Numeric,
    /// Collapsed into a single `utf8Validation` flag
    Utf8Validation,
}

/// Options the libraries under test understand
pub const KNOWN_OPTIONS: &[(&str, CoercionRule)] = &[
    ("promoteValues", CoercionRule::Boolean),
    ("promoteBuffers", CoercionRule::Boolean),
    ("promoteLongs", CoercionRule::Boolean),
    ("bsonRegExp", CoercionRule::Boolean),
    ("allowObjectSmallerThanBufferSize", CoercionRule::Boolean),
    ("useBigInt64", CoercionRule::Boolean),
    ("evalFunctions", CoercionRule::Boolean),
    ("cacheFunctions", CoercionRule::Boolean),
    ("checkKeys", CoercionRule::Boolean),
    ("ignoreUndefined", CoercionRule::Boolean),
    ("serializeFunctions", CoercionRule::Boolean),
    ("index", CoercionRule::Numeric),
    ("validation", CoercionRule::Utf8Validation),
];

/// Rule for a known option name
pub fn rule_for(name: &str) -> Option<CoercionRule> {
    KNOWN_OPTIONS
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, rule)| *rule)
}

fn bool_number(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

fn generic(value: &OptionValue) -> f64 {
    match value {
        OptionValue::Bool(b) | OptionValue::Utf8Validation(b) => bool_number(*b),
        OptionValue::Number(n) => *n,
        OptionValue::Other(_) => NON_NUMERIC_SENTINEL,
    }
}

/// Coerce every option to a number.
///
/// `utf8_always_validated` is set for libraries that validate UTF-8 regardless of
/// options; their `utf8Validation` argument is always 1.
pub fn coerce_options(
    options: &OperationOptions,
    utf8_always_validated: bool,
) -> BTreeMap<String, f64> {
    let mut args = BTreeMap::new();
    for option in options.iter() {
        match rule_for(&option.name) {
            Some(CoercionRule::Utf8Validation) => {
                let flag = utf8_always_validated
                    || match option.value {
                        OptionValue::Utf8Validation(b) | OptionValue::Bool(b) => b,
                        _ => true,
                    };
                args.insert(UTF8_VALIDATION_ARG.to_string(), bool_number(flag));
            }
            Some(CoercionRule::Boolean) | Some(CoercionRule::Numeric) | None => {
                args.insert(option.name.clone(), generic(&option.value));
            }
        }
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(json: &str) -> OperationOptions {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_boolean_options() {
        let args = coerce_options(
            &options(r#"{ "promoteLongs": true, "checkKeys": false, "useBigInt64": true }"#),
            false,
        );
        assert_eq!(args["promoteLongs"], 1.0);
        assert_eq!(args["checkKeys"], 0.0);
        assert_eq!(args["useBigInt64"], 1.0);
    }

    #[test]
    fn test_index_passes_through() {
        let args = coerce_options(&options(r#"{ "index": 0 }"#), false);
        assert_eq!(args["index"], 0.0);
        let args = coerce_options(&options(r#"{ "index": 12 }"#), false);
        assert_eq!(args["index"], 12.0);
    }

    #[test]
    fn test_validation_becomes_utf8_flag() {
        let args = coerce_options(&options(r#"{ "validation": { "utf8": false } }"#), false);
        assert_eq!(args.get("validation"), None);
        assert_eq!(args[UTF8_VALIDATION_ARG], 0.0);

        let args = coerce_options(&options(r#"{ "validation": { "utf8": true } }"#), false);
        assert_eq!(args[UTF8_VALIDATION_ARG], 1.0);
    }

    #[test]
    fn test_validation_forced_for_always_validating_library() {
        let args = coerce_options(&options(r#"{ "validation": { "utf8": false } }"#), true);
        assert_eq!(args[UTF8_VALIDATION_ARG], 1.0);
    }

    #[test]
    fn test_unknown_options_fallback() {
        let args = coerce_options(
            &options(r#"{ "raw": true, "depth": 4, "fieldsAsRaw": { "a": true }, "name": "x" }"#),
            false,
        );
        assert_eq!(args["raw"], 1.0);
        assert_eq!(args["depth"], 4.0);
        assert_eq!(args["fieldsAsRaw"], NON_NUMERIC_SENTINEL);
        assert_eq!(args["name"], NON_NUMERIC_SENTINEL);
    }

    #[test]
    fn test_rule_lookup() {
        assert_eq!(rule_for("promoteValues"), Some(CoercionRule::Boolean));
        assert_eq!(rule_for("index"), Some(CoercionRule::Numeric));
        assert_eq!(rule_for("validation"), Some(CoercionRule::Utf8Validation));
        assert_eq!(rule_for("somethingNew"), None);
    }
}
