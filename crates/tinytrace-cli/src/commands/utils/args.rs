use tinytrace::core::value::Dict;
use tinytrace::core::{Key, Value};

/// Parse one command-line program argument.
///
/// Tried in order: integer, float, JSON literal, then the raw string. JSON
/// arrays become lists and objects become dicts; object keys that read as
/// integers become integer keys so `{"1": [2]}` can feed a graph keyed by
/// vertex number. Object keys keep the order they were written in.
pub fn parse_arg(arg: &str) -> Value {
    if let Ok(int) = arg.parse::<i64>() {
        return Value::Int(int);
    }
    if let Ok(float) = arg.parse::<f64>() {
        return Value::Float(float);
    }
    match serde_json::from_str::<serde_json::Value>(arg) {
        Ok(json) => from_json(json),
        Err(_) => Value::Str(arg.to_string()),
    }
}

pub fn parse_args(args: &[String]) -> Vec<Value> {
    args.iter().map(|arg| parse_arg(arg)).collect()
}

fn from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::None,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(int) => Value::Int(int),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::Str(s),
        serde_json::Value::Array(items) => Value::List(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(map) => {
            let dict: Dict = map.into_iter().map(|(key, value)| (json_key(key), from_json(value))).collect();
            Value::Dict(dict)
        }
    }
}

fn json_key(key: String) -> Key {
    match key.parse::<i64>() {
        Ok(int) => Key::Int(int),
        Err(_) => Key::Str(key),
    }
}
