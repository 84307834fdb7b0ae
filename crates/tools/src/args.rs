//! Typed access to the flat argument object
//!
//! Missing required fields and wrong types surface as `ToolFault`s, which
//! reach the client through the same envelope as any other fault.

use serde_json::Value;

use crate::{Arguments, ToolFault};

type Result<T> = std::result::Result<T, ToolFault>;

pub fn required_str<'a>(args: &'a Arguments, name: &'static str) -> Result<&'a str> {
    match args.get(name) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(invalid(name, "a string", other)),
        None => Err(ToolFault::MissingArgument(name)),
    }
}

pub fn optional_str<'a>(args: &'a Arguments, name: &'static str) -> Result<Option<&'a str>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(invalid(name, "a string", other)),
    }
}

pub fn optional_bool(args: &Arguments, name: &'static str, default: bool) -> Result<bool> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(other) => Err(invalid(name, "a boolean", other)),
    }
}

pub fn optional_f64(args: &Arguments, name: &'static str, default: f64) -> Result<f64> {
    match optional_number(args, name)? {
        Some(n) => Ok(n),
        None => Ok(default),
    }
}

pub fn optional_u64(args: &Arguments, name: &'static str, default: u64) -> Result<u64> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| invalid(name, "a non-negative integer", &Value::Number(n.clone()))),
        Some(other) => Err(invalid(name, "a non-negative integer", other)),
    }
}

pub fn optional_number(args: &Arguments, name: &'static str) -> Result<Option<f64>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| invalid(name, "a number", &Value::Number(n.clone()))),
        Some(other) => Err(invalid(name, "a number", other)),
    }
}

fn invalid(name: &'static str, expected: &str, got: &Value) -> ToolFault {
    ToolFault::InvalidArgument {
        name,
        message: format!("expected {expected}, got {got}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::arguments;
    use serde_json::json;

    #[test]
    fn required_str_faults_on_absence_and_type() {
        let args = arguments(json!({ "url": "https://a.test", "count": 3 }));
        assert_eq!(required_str(&args, "url").unwrap(), "https://a.test");
        assert!(matches!(
            required_str(&args, "missing"),
            Err(ToolFault::MissingArgument("missing"))
        ));
        assert!(matches!(
            required_str(&args, "count"),
            Err(ToolFault::InvalidArgument { name: "count", .. })
        ));
    }

    #[test]
    fn optional_values_fall_back_to_defaults() {
        let args = arguments(json!({ "flag": true, "nullish": null }));
        assert_eq!(optional_bool(&args, "flag", false).unwrap(), true);
        assert_eq!(optional_bool(&args, "absent", true).unwrap(), true);
        assert_eq!(optional_bool(&args, "nullish", true).unwrap(), true);
        assert_eq!(optional_f64(&args, "absent", 500.0).unwrap(), 500.0);
        assert_eq!(optional_u64(&args, "absent", 20).unwrap(), 20);
        assert!(optional_str(&args, "absent").unwrap().is_none());
    }

    #[test]
    fn numbers_reject_wrong_shapes() {
        let args = arguments(json!({ "amount": "lots", "pages": -1 }));
        assert!(optional_f64(&args, "amount", 0.0).is_err());
        assert!(optional_u64(&args, "pages", 0).is_err());
    }
}
