//! JSON codec for script values
//!
//! Argument and result payloads cross the host boundary as JSON text. Plain
//! JSON maps onto the script's value types directly; the engine-only values
//! use reserved single-key objects.

use std::collections::BTreeMap;

use serde_json::{json, Map, Number, Value};

use crate::executor::types::Val;
use crate::executor::ErrorInfo;

const ERROR_KEY: &str = "$error";
const FUTURE_KEY: &str = "$future";

pub fn val_to_json(val: &Val) -> Value {
    match val {
        Val::Null => Value::Null,
        Val::Bool(b) => Value::Bool(*b),
        Val::Int(n) => Value::Number((*n).into()),
        // Non-finite floats have no JSON form
        Val::Float(x) => Number::from_f64(*x).map(Value::Number).unwrap_or(Value::Null),
        Val::Str(s) => Value::String(s.clone()),
        Val::List(items) | Val::Gather(items) => {
            Value::Array(items.iter().map(val_to_json).collect())
        }
        Val::Obj(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), val_to_json(v)))
                .collect::<Map<String, Value>>(),
        ),
        Val::Error(err) => json!({ ERROR_KEY: { "code": err.code, "message": err.message } }),
        Val::Future(id) => json!({ FUTURE_KEY: id }),
    }
}

pub fn json_to_val(value: &Value) -> Val {
    match value {
        Value::Null => Val::Null,
        Value::Bool(b) => Val::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Val::Int(i),
            None => Val::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => Val::Str(s.clone()),
        Value::Array(items) => Val::List(items.iter().map(json_to_val).collect()),
        Value::Object(map) => {
            if let Some(special) = special_object(map) {
                return special;
            }
            Val::Obj(
                map.iter()
                    .map(|(k, v)| (k.clone(), json_to_val(v)))
                    .collect::<BTreeMap<String, Val>>(),
            )
        }
    }
}

fn special_object(map: &Map<String, Value>) -> Option<Val> {
    if map.len() != 1 {
        return None;
    }
    if let Some(Value::Object(err)) = map.get(ERROR_KEY) {
        let code = err.get("code")?.as_str()?;
        let message = err.get("message")?.as_str()?;
        return Some(Val::Error(ErrorInfo::new(code, message)));
    }
    let id = map.get(FUTURE_KEY)?.as_u64()?;
    u32::try_from(id).ok().map(Val::Future)
}

/// Parse JSON text into a value
pub fn parse(text: &str) -> Result<Val, serde_json::Error> {
    serde_json::from_str::<Value>(text).map(|v| json_to_val(&v))
}

/// Render a value as compact JSON text
pub fn render(val: &Val) -> String {
    val_to_json(val).to_string()
}
