//! Shape-agnostic helpers for turning vendor JSON into entity fields.
//!
//! Vendors return collections either as arrays or as objects keyed by identifier.
//! [`records`] flattens both into one ordered sequence so per-record mappers never see the
//! difference. [`Record`] gives typed, failing access to a record's fields: a missing field
//! or a value that does not coerce is an [`Error::Normalization`], never a default.

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Flatten a list response into its records, in response order.
///
/// Arrays yield their elements, objects yield their values, and `null` yields nothing.
///
/// # Errors
///
/// Returns [`Error::Normalization`] for scalar bodies and for elements that are not objects.
pub fn records(body: Value, kind: &'static str) -> Result<Vec<Map<String, Value>>> {
    let items: Vec<Value> = match body {
        Value::Array(items) => items,
        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        Value::Null => Vec::new(),
        other => {
            return Err(Error::Normalization(format!(
                "{kind} list: expected an array or object, got {}",
                type_name(&other)
            )))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(map) => Ok(map),
            other => Err(Error::Normalization(format!(
                "{kind} list: entry {index} is {}, expected an object",
                type_name(&other)
            ))),
        })
        .collect()
}

/// Typed view over one raw vendor record.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    kind: &'static str,
    fields: &'a Map<String, Value>,
}

impl<'a> Record<'a> {
    /// Wrap a raw record of the given resource kind.
    #[must_use]
    pub const fn new(kind: &'static str, fields: &'a Map<String, Value>) -> Self {
        Self { kind, fields }
    }

    /// Raw access to an optional field. `null` counts as absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    /// A required field, as is.
    ///
    /// # Errors
    ///
    /// Fails if the field is missing.
    pub fn value(&self, key: &str) -> Result<&'a Value> {
        self.fields.get(key).ok_or_else(|| self.missing(key))
    }

    /// A required identifier. Strings are kept, integers are rendered.
    ///
    /// # Errors
    ///
    /// Fails if the field is missing or is neither a string nor an integer.
    pub fn id(&self, key: &str) -> Result<String> {
        match self.value(key)? {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
            other => Err(self.invalid(key, "an identifier", other)),
        }
    }

    /// A required string.
    ///
    /// # Errors
    ///
    /// Fails if the field is missing or not a string.
    pub fn string(&self, key: &str) -> Result<String> {
        match self.value(key)? {
            Value::String(s) => Ok(s.clone()),
            other => Err(self.invalid(key, "a string", other)),
        }
    }

    /// An optional string; empty strings count as absent.
    ///
    /// # Errors
    ///
    /// Fails if the field is present but not a string.
    pub fn opt_string(&self, key: &str) -> Result<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.invalid(key, "a string", other)),
        }
    }

    /// A required non-negative integer, from a JSON integer or an integer string.
    ///
    /// # Errors
    ///
    /// Fails if the field is missing or does not parse as an unsigned integer.
    pub fn integer(&self, key: &str) -> Result<u64> {
        let value = self.value(key)?;
        let parsed = match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| self.invalid(key, "an integer", value))
    }

    /// A required float, from a JSON number or a numeric string.
    ///
    /// # Errors
    ///
    /// Fails if the field is missing or does not parse as a finite number.
    pub fn float(&self, key: &str) -> Result<f64> {
        let value = self.value(key)?;
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed
            .filter(|f| f.is_finite())
            .ok_or_else(|| self.invalid(key, "a number", value))
    }

    fn missing(&self, key: &str) -> Error {
        Error::Normalization(format!("{} record is missing `{key}`", self.kind))
    }

    fn invalid(&self, key: &str, expected: &str, got: &Value) -> Error {
        Error::Normalization(format!(
            "{} record field `{key}` is not {expected}: {got}",
            self.kind
        ))
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn one(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn records_from_array_keep_order() {
        let body = json!([{"id": "b"}, {"id": "a"}]);
        let items = records(body, "image").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["id"], "b");
        assert_eq!(items[1]["id"], "a");
    }

    #[test]
    fn records_from_keyed_object_keep_response_order() {
        let body: Value = serde_json::from_str(
            r#"{"160": {"OSID": 160}, "127": {"OSID": 127}, "148": {"OSID": 148}}"#,
        )
        .unwrap();
        let ids: Vec<_> = records(body, "image")
            .unwrap()
            .iter()
            .map(|r| Record::new("image", r).id("OSID").unwrap())
            .collect();
        assert_eq!(ids, vec!["160", "127", "148"]);
    }

    #[test]
    fn records_from_null_and_empty() {
        assert!(records(Value::Null, "node").unwrap().is_empty());
        assert!(records(json!([]), "node").unwrap().is_empty());
        assert!(records(json!({}), "node").unwrap().is_empty());
    }

    #[test]
    fn records_reject_scalars() {
        let err = records(json!("nope"), "node").unwrap_err();
        assert!(matches!(err, Error::Normalization(_)));

        let err = records(json!([{"a": 1}, 3]), "node").unwrap_err();
        assert_eq!(
            err,
            Error::Normalization("node list: entry 1 is a number, expected an object".into())
        );
    }

    #[test]
    fn integer_coercion() {
        let raw = one(json!({"ram": "512", "disk": 20, "bad": "4096 MB", "neg": -1}));
        let record = Record::new("size", &raw);
        assert_eq!(record.integer("ram").unwrap(), 512);
        assert_eq!(record.integer("disk").unwrap(), 20);
        assert!(matches!(
            record.integer("bad").unwrap_err(),
            Error::Normalization(_)
        ));
        assert!(record.integer("neg").is_err());
        assert_eq!(
            record.integer("missing").unwrap_err(),
            Error::Normalization("size record is missing `missing`".into())
        );
    }

    #[test]
    fn float_coercion_preserves_value() {
        let raw = one(json!({"price": "5.00", "bw": 0.25, "text": "cheap", "flag": true}));
        let record = Record::new("size", &raw);
        assert!((record.float("price").unwrap() - 5.0).abs() < f64::EPSILON);
        assert!((record.float("bw").unwrap() - 0.25).abs() < f64::EPSILON);
        assert!(record.float("text").is_err());
        assert!(record.float("flag").is_err());

        for x in [0.0_f64, 1.5, 8.0, 12345.678] {
            let raw = one(json!({ "v": x.to_string() }));
            let parsed = Record::new("size", &raw).float("v").unwrap();
            assert!((parsed - x).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn ids_accept_strings_and_integers() {
        let raw = one(json!({"a": "576965", "b": 127, "c": 1.5, "d": null}));
        let record = Record::new("node", &raw);
        assert_eq!(record.id("a").unwrap(), "576965");
        assert_eq!(record.id("b").unwrap(), "127");
        assert!(record.id("c").is_err());
        assert!(record.id("d").is_err());
    }

    #[test]
    fn optional_strings() {
        let raw = one(json!({"empty": "", "set": "10.0.0.1", "null": null, "num": 3}));
        let record = Record::new("node", &raw);
        assert_eq!(record.opt_string("empty").unwrap(), None);
        assert_eq!(record.opt_string("null").unwrap(), None);
        assert_eq!(record.opt_string("absent").unwrap(), None);
        assert_eq!(record.opt_string("set").unwrap().as_deref(), Some("10.0.0.1"));
        assert!(record.opt_string("num").is_err());
        assert!(record.get("null").is_none());
    }
}
