//! Exhaustive validation of a metrics document.
//!
//! The walk never stops at the first problem: every metric and every field is
//! checked and all issues are returned together.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::ConfigIssue;

/// Keys every metric entry must carry.
pub const REQUIRED_KEYS: [&str; 5] = [
    "label",
    "namespace",
    "metric_name",
    "dimensions",
    "acceptable_bounds",
];

/// Validates a parsed metrics document and returns every issue found.
#[must_use]
pub fn validate_document(root: &Value) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();

    let Some(root) = root.as_object() else {
        issues.push(ConfigIssue::root(
            "",
            r#"must be an object: { "metrics": [...] }"#,
        ));
        return issues;
    };

    let Some(metrics) = root.get("metrics").and_then(Value::as_array) else {
        issues.push(ConfigIssue::root("metrics", "must be present and be an array"));
        return issues;
    };

    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    for (index, metric) in metrics.iter().enumerate() {
        validate_metric(index, metric, &mut issues);

        let label = metric
            .get("label")
            .and_then(Value::as_str)
            .filter(|l| !l.trim().is_empty());
        if let Some(label) = label {
            match first_seen.get(label) {
                Some(first) => issues.push(ConfigIssue::metric(
                    index,
                    "label",
                    format!("duplicate label '{label}' (first used by Metric #{first})"),
                )),
                None => {
                    first_seen.insert(label, index);
                }
            }
        }
    }

    issues
}

fn validate_metric(index: usize, metric: &Value, issues: &mut Vec<ConfigIssue>) {
    let Some(metric) = metric.as_object() else {
        issues.push(ConfigIssue::metric(index, "", "must be a JSON object"));
        return;
    };

    for key in REQUIRED_KEYS {
        if !metric.contains_key(key) {
            issues.push(ConfigIssue::metric(index, key, "missing required key"));
        }
    }

    for key in ["label", "namespace", "metric_name"] {
        if let Some(value) = metric.get(key) {
            if !is_non_blank_str(value) {
                issues.push(ConfigIssue::metric(index, key, "must be a non-empty string"));
            }
        }
    }

    if let Some(dimensions) = metric.get("dimensions") {
        validate_dimensions(index, dimensions, issues);
    }
    if let Some(bounds) = metric.get("acceptable_bounds") {
        validate_bounds(index, bounds, issues);
    }

    if let Some(diff) = metric.get("diff") {
        if !diff.as_f64().is_some_and(|d| d >= 0.0) {
            issues.push(ConfigIssue::metric(index, "diff", "must be a non-negative number"));
        }
    }

    if let Some(title) = metric.get("title") {
        if !is_non_blank_str(title) {
            issues.push(ConfigIssue::metric(
                index,
                "title",
                "must be a non-empty string if provided",
            ));
        }
    }

    if let Some(period) = metric.get("period") {
        let valid = period
            .as_u64()
            .is_some_and(|p| p > 0 && p <= u64::from(u32::MAX));
        if !valid {
            issues.push(ConfigIssue::metric(index, "period", "must be a positive integer"));
        }
    }

    if let Some(stat) = metric.get("stat") {
        if !is_non_blank_str(stat) {
            issues.push(ConfigIssue::metric(index, "stat", "must be a non-empty string"));
        }
    }

    if let Some(mentions) = metric.get("mentions") {
        validate_mentions(index, mentions, issues);
    }
}

fn validate_dimensions(index: usize, dimensions: &Value, issues: &mut Vec<ConfigIssue>) {
    let Some(dimensions) = dimensions.as_array() else {
        issues.push(ConfigIssue::metric(
            index,
            "dimensions",
            "must be a list of objects with 'Name' and 'Value'",
        ));
        return;
    };

    for (k, dimension) in dimensions.iter().enumerate() {
        let valid = dimension.as_object().is_some_and(|d| {
            d.get("Name").is_some_and(Value::is_string)
                && d.get("Value").is_some_and(Value::is_string)
        });
        if !valid {
            issues.push(ConfigIssue::metric(
                index,
                format!("dimensions[{k}]"),
                "must be an object with string 'Name' and 'Value'",
            ));
        }
    }
}

fn validate_bounds(index: usize, bounds: &Value, issues: &mut Vec<ConfigIssue>) {
    let Some(bounds) = bounds.as_object() else {
        issues.push(ConfigIssue::metric(
            index,
            "acceptable_bounds",
            "must contain 'lower' and 'upper'",
        ));
        return;
    };

    let lower = bound_value(index, bounds, "lower", issues);
    let upper = bound_value(index, bounds, "upper", issues);

    if let (Some(lower), Some(upper)) = (lower, upper) {
        if lower > upper {
            issues.push(ConfigIssue::metric(
                index,
                "acceptable_bounds",
                format!("lower ({lower}) cannot be greater than upper ({upper})"),
            ));
        }
    }
}

fn bound_value(
    index: usize,
    bounds: &Map<String, Value>,
    key: &str,
    issues: &mut Vec<ConfigIssue>,
) -> Option<f64> {
    let field = format!("acceptable_bounds.{key}");
    match bounds.get(key) {
        None => {
            issues.push(ConfigIssue::metric(index, field, "missing required key"));
            None
        }
        Some(value) => {
            let number = value.as_f64();
            if number.is_none() {
                issues.push(ConfigIssue::metric(index, field, "must be a number"));
            }
            number
        }
    }
}

fn validate_mentions(index: usize, mentions: &Value, issues: &mut Vec<ConfigIssue>) {
    let Some(mentions) = mentions.as_object() else {
        issues.push(ConfigIssue::metric(index, "mentions", "must be an object"));
        return;
    };

    for key in mentions.keys() {
        match key.as_str() {
            "title" => {}
            "label" => issues.push(ConfigIssue::metric(
                index,
                "mentions.label",
                "is not supported; use 'mentions.title' only",
            )),
            other => issues.push(ConfigIssue::metric(
                index,
                format!("mentions.{other}"),
                "unknown key; only 'title' is allowed",
            )),
        }
    }

    let Some(watchers) = mentions.get("title") else {
        return;
    };
    let Some(watchers) = watchers.as_array() else {
        issues.push(ConfigIssue::metric(index, "mentions.title", "must be an array"));
        return;
    };

    for (j, watcher) in watchers.iter().enumerate() {
        let Some(watcher) = watcher.as_object() else {
            issues.push(ConfigIssue::metric(
                index,
                format!("mentions.title[{j}]"),
                "must be an object with 'email' and 'name'",
            ));
            continue;
        };

        let email_ok = watcher
            .get("email")
            .and_then(Value::as_str)
            .is_some_and(|e| e.trim().contains('@'));
        if !email_ok {
            issues.push(ConfigIssue::metric(
                index,
                format!("mentions.title[{j}].email"),
                "must be a valid email/UPN",
            ));
        }

        if !watcher.get("name").is_some_and(is_non_blank_str) {
            issues.push(ConfigIssue::metric(
                index,
                format!("mentions.title[{j}].name"),
                "must be a non-empty string",
            ));
        }
    }
}

fn is_non_blank_str(value: &Value) -> bool {
    value.as_str().is_some_and(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn valid_metric() -> Value {
        json!({
            "label": "cpu",
            "namespace": "AWS/EC2",
            "metric_name": "CPUUtilization",
            "dimensions": [{"Name": "InstanceId", "Value": "i-123"}],
            "acceptable_bounds": {"lower": 0, "upper": 80}
        })
    }

    fn with(key: &str, value: Value) -> Value {
        let mut metric = valid_metric();
        metric[key] = value;
        json!({ "metrics": [metric] })
    }

    fn fields(issues: &[ConfigIssue]) -> Vec<String> {
        issues.iter().map(|i| i.field.clone()).collect()
    }

    #[test]
    fn valid_document_has_no_issues() {
        let doc = json!({ "metrics": [valid_metric()] });
        assert!(validate_document(&doc).is_empty());
    }

    #[test]
    fn empty_metrics_array_is_valid() {
        assert!(validate_document(&json!({ "metrics": [] })).is_empty());
    }

    #[test_case(json!([]) ; "root array")]
    #[test_case(json!("metrics") ; "root string")]
    fn root_must_be_object(root: Value) {
        let issues = validate_document(&root);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].metric, None);
    }

    #[test_case(json!({}) ; "missing")]
    #[test_case(json!({"metrics": {}}) ; "object")]
    fn metrics_must_be_array(root: Value) {
        let issues = validate_document(&root);
        assert_eq!(fields(&issues), vec!["metrics"]);
    }

    #[test]
    fn non_object_metric() {
        let issues = validate_document(&json!({ "metrics": [42] }));
        assert_eq!(issues, vec![ConfigIssue::metric(0, "", "must be a JSON object")]);
    }

    #[test]
    fn every_missing_key_is_reported() {
        let issues = validate_document(&json!({ "metrics": [{}] }));
        assert_eq!(fields(&issues), REQUIRED_KEYS.to_vec());
    }

    #[test_case("diff", json!(-1) ; "negative diff")]
    #[test_case("diff", json!("10") ; "string diff")]
    #[test_case("title", json!("  ") ; "blank title")]
    #[test_case("period", json!(0) ; "zero period")]
    #[test_case("period", json!(1.5) ; "fractional period")]
    #[test_case("stat", json!("") ; "empty stat")]
    #[test_case("label", json!("") ; "empty label")]
    #[test_case("namespace", json!(7) ; "numeric namespace")]
    fn invalid_optional_field(key: &str, value: Value) {
        let issues = validate_document(&with(key, value));
        assert_eq!(fields(&issues), vec![key]);
    }

    #[test]
    fn zero_diff_is_valid() {
        assert!(validate_document(&with("diff", json!(0))).is_empty());
    }

    #[test]
    fn inverted_bounds() {
        let issues = validate_document(&with("acceptable_bounds", json!({"lower": 5, "upper": 1})));
        assert_eq!(fields(&issues), vec!["acceptable_bounds"]);
        assert!(issues[0].message.contains("cannot be greater"));
    }

    #[test]
    fn equal_bounds_are_valid() {
        let doc = with("acceptable_bounds", json!({"lower": 5, "upper": 5}));
        assert!(validate_document(&doc).is_empty());
    }

    #[test]
    fn bounds_fields_checked_separately() {
        let issues = validate_document(&with("acceptable_bounds", json!({"lower": "0"})));
        assert_eq!(
            fields(&issues),
            vec!["acceptable_bounds.lower", "acceptable_bounds.upper"]
        );
    }

    #[test]
    fn bad_dimension_entry() {
        let doc = with("dimensions", json!([{"Name": "a", "Value": "b"}, {"Name": "c"}]));
        assert_eq!(fields(&validate_document(&doc)), vec!["dimensions[1]"]);
    }

    #[test]
    fn mentions_label_rejected() {
        let doc = with("mentions", json!({"label": []}));
        let issues = validate_document(&doc);
        assert_eq!(fields(&issues), vec!["mentions.label"]);
        assert!(issues[0].message.contains("mentions.title"));
    }

    #[test]
    fn mentions_entries_checked() {
        let doc = with(
            "mentions",
            json!({"title": [
                {"email": "ann@example.com", "name": "Ann"},
                {"email": "bob", "name": " "},
                "carl"
            ]}),
        );
        assert_eq!(
            fields(&validate_document(&doc)),
            vec![
                "mentions.title[1].email",
                "mentions.title[1].name",
                "mentions.title[2]"
            ]
        );
    }

    #[test]
    fn duplicate_labels_reported_on_later_entry() {
        let doc = json!({ "metrics": [valid_metric(), valid_metric()] });
        let issues = validate_document(&doc);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].metric, Some(1));
        assert!(issues[0].message.contains("Metric #0"));
    }

    #[test]
    fn issues_from_all_metrics_are_collected() {
        let mut bad = valid_metric();
        bad["diff"] = json!(-2);
        let doc = json!({ "metrics": [{"label": "x"}, valid_metric(), bad] });

        let issues = validate_document(&doc);
        let indices: Vec<_> = issues.iter().filter_map(|i| i.metric).collect();
        assert!(indices.contains(&0));
        assert!(indices.contains(&2));
        assert!(!indices.contains(&1));
    }
}
