//! # Comparator
//!
//! Recursive structural diff over decoded JSON (`spec.md` §4.6). Given
//! two [`Response`]s and a [`ComparisonConfig`], produces an
//! [`APIComparison`] with a match rate and an ordered list of
//! [`DiffEntry`]. The walk is pure and synchronous — it has no
//! dependency on I/O or time beyond the caller-supplied `request_id`/
//! `rule_id`/duration, which keeps it trivially idempotent (`spec.md`
//! §8 property 5: comparing the same two responses twice yields
//! byte-identical diff lists).

use std::time::{Duration, Instant};

use serde_json::Value;

use crate::config::ComparisonDefaults;
use crate::domain::{APIComparison, ComparisonConfig, DiffEntry, DiffKind, Response};
use crate::error::CoreError;

pub struct Comparator {
    array_element_cap: usize,
}

impl Comparator {
    pub fn new(defaults: &ComparisonDefaults) -> Self {
        Self {
            array_element_cap: defaults.array_element_cap,
        }
    }

    pub fn compare(
        &self,
        request_id: &str,
        rule_id: &str,
        legacy: &Response,
        modern: &Response,
        config: &ComparisonConfig,
    ) -> APIComparison {
        let started = Instant::now();

        let legacy_json = legacy.as_json();
        let modern_json = modern.as_json();

        let (match_rate, diffs, compared_fields, matched_fields) =
            match (legacy_json, modern_json) {
                (Err(legacy_err), Err(modern_err)) => {
                    let decode_err = CoreError::ComparisonDecodeFailed(format!(
                        "legacy: {legacy_err}, modern: {modern_err}"
                    ));
                    tracing::warn!(request_id, rule_id, error = %decode_err, "neither response body decoded as JSON, falling back to byte equality");
                    let equal = legacy.body() == modern.body();
                    (if equal { 1.0 } else { 0.0 }, Vec::new(), 0, 0)
                }
                (Err(err), Ok(_)) => {
                    let decode_err = CoreError::ComparisonDecodeFailed(err.to_string());
                    tracing::warn!(request_id, rule_id, error = %decode_err, "legacy response body failed to decode as JSON");
                    (
                        0.0,
                        vec![DiffEntry {
                            kind: DiffKind::TypeMismatch,
                            path: String::new(),
                            legacy_value: None,
                            modern_value: None,
                            message: Some(decode_err.to_string()),
                        }],
                        1,
                        0,
                    )
                }
                (Ok(_), Err(err)) => {
                    let decode_err = CoreError::ComparisonDecodeFailed(err.to_string());
                    tracing::warn!(request_id, rule_id, error = %decode_err, "modern response body failed to decode as JSON");
                    (
                        0.0,
                        vec![DiffEntry {
                            kind: DiffKind::TypeMismatch,
                            path: String::new(),
                            legacy_value: None,
                            modern_value: None,
                            message: Some(decode_err.to_string()),
                        }],
                        1,
                        0,
                    )
                }
                (Ok(legacy_value), Ok(modern_value)) => {
                    let mut diffs = Vec::new();
                    let (total, matched) = self.walk(
                        "",
                        &legacy_value,
                        &modern_value,
                        config,
                        &mut diffs,
                    );
                    let rate = if total > 0 {
                        matched as f64 / total as f64
                    } else {
                        1.0
                    };
                    (rate, diffs, total, matched)
                }
            };

        APIComparison {
            comparison_id: uuid::Uuid::new_v4().to_string(),
            request_id: request_id.to_string(),
            rule_id: rule_id.to_string(),
            legacy_response: Some(legacy.clone()),
            modern_response: Some(modern.clone()),
            match_rate,
            diffs,
            compared_fields,
            matched_fields,
            duration: started.elapsed().max(Duration::from_nanos(1)),
            timestamp: chrono::Utc::now(),
        }
    }

    fn walk(
        &self,
        path: &str,
        legacy: &Value,
        modern: &Value,
        config: &ComparisonConfig,
        diffs: &mut Vec<DiffEntry>,
    ) -> (u64, u64) {
        if !path.is_empty() && config.ignore_fields.iter().any(|f| f == path) {
            return (0, 0);
        }

        if kind_of(legacy) != kind_of(modern) {
            diffs.push(DiffEntry {
                kind: DiffKind::TypeMismatch,
                path: path.to_string(),
                legacy_value: Some(legacy.clone()),
                modern_value: Some(modern.clone()),
                message: None,
            });
            return (1, 0);
        }

        match (legacy, modern) {
            (Value::Object(l), Value::Object(m)) => {
                let mut total = 0;
                let mut matched = 0;
                let mut keys: Vec<&String> = l.keys().chain(m.keys()).collect();
                keys.sort();
                keys.dedup();

                for key in keys {
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{path}.{key}")
                    };
                    if config.ignore_fields.iter().any(|f| f == &child_path) {
                        continue;
                    }

                    match (l.get(key), m.get(key)) {
                        (Some(lv), Some(mv)) => {
                            let (t, mt) = self.walk(&child_path, lv, mv, config, diffs);
                            total += t;
                            matched += mt;
                        }
                        (Some(lv), None) => {
                            diffs.push(DiffEntry {
                                kind: DiffKind::Extra,
                                path: child_path,
                                legacy_value: Some(lv.clone()),
                                modern_value: None,
                                message: None,
                            });
                            total += 1;
                        }
                        (None, Some(mv)) => {
                            diffs.push(DiffEntry {
                                kind: DiffKind::Missing,
                                path: child_path,
                                legacy_value: None,
                                modern_value: Some(mv.clone()),
                                message: None,
                            });
                            total += 1;
                        }
                        (None, None) => unreachable!("key came from the union of both maps"),
                    }
                }
                (total, matched)
            }
            (Value::Array(l), Value::Array(m)) => {
                let mut total = 0;
                let mut matched = 0;

                if l.len() != m.len() {
                    diffs.push(DiffEntry {
                        kind: DiffKind::ValueMismatch,
                        path: path.to_string(),
                        legacy_value: Some(Value::from(l.len())),
                        modern_value: Some(Value::from(m.len())),
                        message: Some("Array length mismatch".to_string()),
                    });
                    total += 1;
                }

                let compare_count = l.len().min(m.len()).min(self.array_element_cap);
                for i in 0..compare_count {
                    let child_path = format!("{path}[{i}]");
                    let (t, mt) = self.walk(&child_path, &l[i], &m[i], config, diffs);
                    total += t;
                    matched += mt;
                }
                (total, matched)
            }
            (Value::Null, Value::Null) => (1, 1),
            (Value::Bool(l), Value::Bool(m)) => {
                if l == m {
                    (1, 1)
                } else {
                    diffs.push(mismatch(path, legacy, modern));
                    (1, 0)
                }
            }
            (Value::String(l), Value::String(m)) => {
                if l == m {
                    (1, 1)
                } else {
                    diffs.push(mismatch(path, legacy, modern));
                    (1, 0)
                }
            }
            (Value::Number(l), Value::Number(m)) => {
                let (lf, mf) = (l.as_f64().unwrap_or(f64::NAN), m.as_f64().unwrap_or(f64::NAN));
                if (lf - mf).abs() <= config.allowable_numeric_difference {
                    (1, 1)
                } else {
                    diffs.push(mismatch(path, legacy, modern));
                    (1, 0)
                }
            }
            _ => unreachable!("kind_of guarantees matching variants reach here"),
        }
    }
}

fn mismatch(path: &str, legacy: &Value, modern: &Value) -> DiffEntry {
    DiffEntry {
        kind: DiffKind::ValueMismatch,
        path: path.to_string(),
        legacy_value: Some(legacy.clone()),
        modern_value: Some(modern.clone()),
        message: None,
    }
}

#[derive(PartialEq, Eq)]
enum Kind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

fn kind_of(value: &Value) -> Kind {
    match value {
        Value::Null => Kind::Null,
        Value::Bool(_) => Kind::Bool,
        Value::Number(_) => Kind::Number,
        Value::String(_) => Kind::String,
        Value::Array(_) => Kind::Array,
        Value::Object(_) => Kind::Object,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn response(body: &str) -> Response {
        Response::new(200, HashMap::new(), body.as_bytes().to_vec())
    }

    fn comparator() -> Comparator {
        Comparator::new(&ComparisonDefaults {
            default_ignore_fields: vec![],
            default_allowable_numeric_difference: 0.01,
            array_element_cap: 10,
        })
    }

    fn config(ignore: &[&str]) -> ComparisonConfig {
        ComparisonConfig {
            enabled: true,
            ignore_fields: ignore.iter().map(|s| s.to_string()).collect(),
            allowable_numeric_difference: 0.01,
            strict_mode: false,
            save_history: true,
        }
    }

    #[test]
    fn identical_bodies_have_full_match_rate() {
        let c = comparator();
        let legacy = response(r#"{"id":1,"name":"Alice"}"#);
        let modern = response(r#"{"id":1,"name":"Alice"}"#);
        let result = c.compare("r1", "rule1", &legacy, &modern, &config(&[]));
        assert_eq!(result.match_rate, 1.0);
        assert!(result.diffs.is_empty());
    }

    #[test]
    fn ignore_field_suppresses_the_only_difference() {
        let c = comparator();
        let legacy = response(r#"{"id":1,"ts":"a"}"#);
        let modern = response(r#"{"id":1,"ts":"b"}"#);
        let result = c.compare("r1", "rule1", &legacy, &modern, &config(&["ts"]));
        assert_eq!(result.match_rate, 1.0);
        assert!(result.diffs.is_empty());
    }

    #[test]
    fn numeric_drift_within_tolerance_is_not_a_diff() {
        let c = comparator();
        let legacy = response(r#"{"price":10.00}"#);
        let modern = response(r#"{"price":10.005}"#);
        let result = c.compare("r1", "rule1", &legacy, &modern, &config(&[]));
        assert_eq!(result.match_rate, 1.0);
        assert!(result.diffs.is_empty());
    }

    #[test]
    fn extra_field_in_legacy_only_is_reported_as_extra() {
        let c = comparator();
        let legacy = response(r#"{"id":1,"email":"a@b"}"#);
        let modern = response(r#"{"id":1}"#);
        let result = c.compare("r1", "rule1", &legacy, &modern, &config(&[]));
        assert_eq!(result.match_rate, 0.5);
        assert_eq!(result.diffs.len(), 1);
        assert_eq!(result.diffs[0].kind, DiffKind::Extra);
        assert_eq!(result.diffs[0].path, "email");
    }

    #[test]
    fn array_element_cap_hides_differences_past_index_ten() {
        let c = comparator();
        let mut l: Vec<i64> = (0..1000).collect();
        l[500] = -1;
        let legacy = response(&serde_json::json!({"xs": l}).to_string());
        let m: Vec<i64> = (0..1000).collect();
        let modern = response(&serde_json::json!({"xs": m}).to_string());
        let result = c.compare("r1", "rule1", &legacy, &modern, &config(&[]));
        assert!(result.diffs.is_empty(), "diff at index 500 should be past the cap");
    }

    #[test]
    fn array_difference_within_cap_is_reported() {
        let c = comparator();
        let legacy = response(&serde_json::json!({"xs": [0,1,2,99,4,5,6,7]}).to_string());
        let modern = response(&serde_json::json!({"xs": [0,1,2,3,4,5,6,7]}).to_string());
        let result = c.compare("r1", "rule1", &legacy, &modern, &config(&[]));
        assert_eq!(result.diffs.len(), 1);
        assert_eq!(result.diffs[0].path, "xs[3]");
    }

    #[test]
    fn array_length_mismatch_emits_one_entry() {
        let c = comparator();
        let legacy = response(&serde_json::json!({"xs": [1,2,3]}).to_string());
        let modern = response(&serde_json::json!({"xs": [1,2]}).to_string());
        let result = c.compare("r1", "rule1", &legacy, &modern, &config(&[]));
        assert_eq!(result.diffs.len(), 1);
        assert_eq!(result.diffs[0].message.as_deref(), Some("Array length mismatch"));
    }

    #[test]
    fn comparing_the_same_pair_twice_is_idempotent() {
        let c = comparator();
        let legacy = response(r#"{"id":1,"nested":{"a":1,"b":[1,2,3]}}"#);
        let modern = response(r#"{"id":2,"nested":{"a":1,"b":[1,9,3]}}"#);
        let cfg = config(&[]);
        let first = c.compare("r1", "rule1", &legacy, &modern, &cfg);
        let second = c.compare("r1", "rule1", &legacy, &modern, &cfg);
        assert_eq!(first.match_rate, second.match_rate);
        assert_eq!(first.diffs.len(), second.diffs.len());
        for (a, b) in first.diffs.iter().zip(second.diffs.iter()) {
            assert_eq!(a.kind, b.kind);
            assert_eq!(a.path, b.path);
        }
    }

    #[test]
    fn both_bodies_undecodable_falls_back_to_byte_equality() {
        let c = comparator();
        let legacy = response("not json");
        let modern = response("not json");
        let result = c.compare("r1", "rule1", &legacy, &modern, &config(&[]));
        assert_eq!(result.match_rate, 1.0);

        let modern2 = response("also not json");
        let result2 = c.compare("r1", "rule1", &legacy, &modern2, &config(&[]));
        assert_eq!(result2.match_rate, 0.0);
    }
}
