//! Filter, sort and aggregation evaluation over in-memory records.
//!
//! Groups are evaluated left to right without operator precedence, which is enough for
//! the filters the SDK builds (`[a, "AND", b, "AND", c]`, `[a, "OR", b]`).
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

pub fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(record, |value, key| value.get(key))
}

/// Whether `record` satisfies `filter`. `null` and `[]` match everything.
pub fn matches(filter: &Value, record: &Value) -> Result<bool, String> {
    let Some(items) = filter.as_array() else {
        return match filter {
            Value::Null => Ok(true),
            other => Err(format!("invalid filter: {other}")),
        };
    };

    match items.as_slice() {
        [] => Ok(true),
        [Value::String(not), inner] if not == "!" => Ok(!matches(inner, record)?),
        [Value::String(field), Value::String(op), expected] => {
            compare(field, op, expected, record)
        }
        _ => group(items, record),
    }
}

fn group(items: &[Value], record: &Value) -> Result<bool, String> {
    let mut result: Option<bool> = None;
    let mut connector = String::from("and");

    for item in items {
        if let Value::String(next) = item {
            connector = next.to_lowercase();
            continue;
        }
        let value = matches(item, record)?;
        result = Some(match (result, connector.as_str()) {
            (None, _) => value,
            (Some(acc), "and") => acc && value,
            (Some(acc), "or") => acc || value,
            (Some(_), other) => return Err(format!("unknown connector '{other}'")),
        });
        connector = String::from("and");
    }

    Ok(result.unwrap_or(true))
}

fn compare(field: &str, op: &str, expected: &Value, record: &Value) -> Result<bool, String> {
    let actual = lookup(record, field).unwrap_or(&Value::Null);
    let ordering = order(actual, expected);

    Ok(match op.to_lowercase().as_str() {
        "=" => loosely_equal(actual, expected),
        "<>" | "!=" => !loosely_equal(actual, expected),
        ">" => ordering == Some(Ordering::Greater),
        ">=" => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        "<" => ordering == Some(Ordering::Less),
        "<=" => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        "contains" => text(actual).contains(&text(expected)),
        "notcontains" => !text(actual).contains(&text(expected)),
        "startswith" => text(actual).starts_with(&text(expected)),
        "endswith" => text(actual).ends_with(&text(expected)),
        other => return Err(format!("unknown operator '{other}'")),
    })
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_lowercase(),
        Value::Null => String::new(),
        other => other.to_string().to_lowercase(),
    }
}

pub fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Total order used for sorting: nulls first, then whatever [`order`] says.
pub fn sort_order(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => order(a, b).unwrap_or(Ordering::Equal),
    }
}

enum Column {
    Field(String),
    Function {
        name: String,
        arg: String,
        alias: String,
    },
}

impl Column {
    fn alias(&self) -> &str {
        match self {
            Column::Field(name) => name,
            Column::Function { alias, .. } => alias,
        }
    }
}

/// Runs an aggregation (`{params, fields, group?}`) over `records`.
///
/// Supports plain fields plus `COUNT`, `SUM`, `MIN`, `MAX` and `AVG` of one field;
/// grouping is only allowed on plain fields.
pub fn aggregate(records: &[&Value], aggregation: &Value) -> Result<Vec<Value>, String> {
    let params = aggregation
        .get("params")
        .and_then(Value::as_array)
        .ok_or("aggregation without params")?;

    let columns = params
        .iter()
        .map(|param| {
            let parts: Vec<&str> = param
                .as_array()
                .map(|p| p.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            match parts.as_slice() {
                [field] => Ok(Column::Field(field.to_string())),
                [name, arg, .., alias] => Ok(Column::Function {
                    name: name.to_uppercase(),
                    arg: arg.to_string(),
                    alias: alias.to_string(),
                }),
                _ => Err(format!("invalid aggregation param: {param}")),
            }
        })
        .collect::<Result<Vec<_>, String>>()?;

    let group_fields = aggregation
        .get("group")
        .and_then(Value::as_array)
        .map(|group| {
            group
                .iter()
                .map(|alias| {
                    let alias = alias.as_str().unwrap_or_default();
                    match columns.iter().find(|c| c.alias() == alias) {
                        Some(Column::Field(field)) => Ok(field.clone()),
                        _ => Err(format!("cannot group by '{alias}'")),
                    }
                })
                .collect::<Result<Vec<_>, String>>()
        })
        .transpose()?
        .unwrap_or_default();

    let mut buckets: Vec<(Vec<Value>, Vec<&Value>)> = Vec::new();
    if group_fields.is_empty() {
        buckets.push((Vec::new(), records.to_vec()));
    } else {
        for &record in records {
            let key: Vec<Value> = group_fields
                .iter()
                .map(|f| lookup(record, f).cloned().unwrap_or(Value::Null))
                .collect();
            match buckets.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(record),
                None => buckets.push((key, vec![record])),
            }
        }
    }

    buckets
        .iter()
        .map(|(_, members)| {
            let mut row = Map::new();
            for column in &columns {
                let value = match column {
                    Column::Field(field) => members
                        .first()
                        .and_then(|r| lookup(r, field))
                        .cloned()
                        .unwrap_or(Value::Null),
                    Column::Function { name, arg, .. } => apply(name, arg, members)?,
                };
                row.insert(column.alias().to_string(), value);
            }
            Ok(Value::Object(row))
        })
        .collect()
}

fn apply(function: &str, arg: &str, records: &[&Value]) -> Result<Value, String> {
    if function == "COUNT" {
        let count = records
            .iter()
            .filter(|r| arg == "*" || lookup(r, arg).is_some_and(|v| !v.is_null()))
            .count();
        return Ok(Value::from(count));
    }

    let numbers: Vec<f64> = records
        .iter()
        .filter_map(|r| lookup(r, arg).and_then(Value::as_f64))
        .collect();

    let result = match function {
        "SUM" => Some(numbers.iter().sum::<f64>()),
        "MIN" => numbers.iter().copied().reduce(f64::min),
        "MAX" => numbers.iter().copied().reduce(f64::max),
        "AVG" => (!numbers.is_empty()).then(|| numbers.iter().sum::<f64>() / numbers.len() as f64),
        other => return Err(format!("unsupported aggregate function '{other}'")),
    };

    Ok(result.map(number).unwrap_or(Value::Null))
}

fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Value::from(value as i64)
    } else {
        Number::from_f64(value).map(Value::Number).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn evaluates_triples_and_groups() {
        let record = json!({"name": "Ada", "age": 36, "address": {"city": "London"}});

        assert!(matches(&json!(["age", ">", 30]), &record).unwrap());
        assert!(matches(&json!(["address.city", "=", "London"]), &record).unwrap());
        assert!(matches(&json!(["name", "startswith", "a"]), &record).unwrap());
        assert!(
            matches(
                &json!([["age", "<", 10], "OR", ["name", "contains", "da"]]),
                &record
            )
            .unwrap()
        );
        assert!(
            !matches(
                &json!([["age", ">", 10], "AND", ["name", "=", "Bob"]]),
                &record
            )
            .unwrap()
        );
        assert!(matches(&json!(["!", ["name", "=", "Bob"]]), &record).unwrap());
        assert!(matches(&json!([]), &record).unwrap());
    }

    #[test]
    fn rejects_unknown_operators() {
        let err = matches(&json!(["age", "~", 1]), &json!({})).unwrap_err();
        assert!(err.contains('~'));
    }

    #[test]
    fn aggregates_by_group() {
        let a = json!({"kind": "x", "qty": 2});
        let b = json!({"kind": "y", "qty": 5});
        let c = json!({"kind": "x", "qty": 3});
        let records = vec![&a, &b, &c];

        let rows = aggregate(
            &records,
            &json!({
                "params": [["kind"], ["SUM", "qty", "total"], ["COUNT", "qty", "n"]],
                "fields": ["kind", "qty"],
                "group": ["kind"]
            }),
        )
        .unwrap();

        assert_eq!(
            rows,
            vec![
                json!({"kind": "x", "total": 5, "n": 2}),
                json!({"kind": "y", "total": 5, "n": 1}),
            ]
        );
    }

    #[test]
    fn average_is_fractional() {
        let a = json!({"qty": 1});
        let b = json!({"qty": 2});
        let rows = aggregate(
            &[&a, &b],
            &json!({"params": [["AVG", "qty", "avg"]], "fields": ["qty"]}),
        )
        .unwrap();
        assert_eq!(rows, vec![json!({"avg": 1.5})]);
    }
}
