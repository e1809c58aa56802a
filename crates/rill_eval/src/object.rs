//! Object model: property, index, and method resolution on values.
//!
//! The evaluator never resolves members itself; everything goes through
//! the [`ObjectModel`] trait so hosts can plug their own reflection (or
//! none at all). The bundled [`StandardModel`] covers the built-in value
//! shapes: map-like, sequence-like, and string receivers.
//!
//! A lookup distinguishes "no such member" ([`Lookup::Missing`], which the
//! evaluator maps to null or an error depending on policy) from an
//! invocation that found its target and failed (an `Err`).
//!
//! Each model instance carries a generation number; member-resolution
//! hints cached on AST nodes record the generation they were computed
//! under and are recomputed when a script is evaluated under a different
//! model.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{invocation_failed, EvalError};
use crate::value::Value;

/// Result of resolving a member: found (with the produced value) or
/// absent. Invocation failures are `Err` at the call site instead.
#[derive(Clone, Debug, PartialEq)]
pub enum Lookup {
    Found(Value),
    Missing,
}

/// Member access and method invocation over host objects.
///
/// Implementations must be `Send + Sync`: one model instance serves
/// concurrent evaluations of shared scripts.
pub trait ObjectModel: Send + Sync {
    /// Identity of this model for node-level hint caching. Two model
    /// instances with different generations never share hints.
    fn generation(&self) -> u64;

    /// Read `target[key]` / `target.key`.
    fn get_member(&self, target: &Value, key: &Value) -> Result<Lookup, EvalError>;

    /// Write `target[key] = value`. `Missing` means the target has no
    /// such writable member.
    fn set_member(&self, target: &Value, key: &Value, value: Value) -> Result<Lookup, EvalError>;

    /// Invoke `target.name(args)`.
    fn invoke(&self, target: &Value, name: &str, args: &[Value]) -> Result<Lookup, EvalError>;

    /// Instantiate `new "class" (args)`. `Missing` when the model knows
    /// no such class.
    fn construct(&self, class: &str, args: &[Value]) -> Result<Lookup, EvalError>;
}

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Built-in model for rill's own value shapes.
///
/// Map members are keyed by the string form of the key; list and string
/// members are integer indices plus a `length`/`size` pseudo-property.
#[derive(Debug)]
pub struct StandardModel {
    generation: u64,
}

impl StandardModel {
    pub fn new() -> Self {
        StandardModel {
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl Default for StandardModel {
    fn default() -> Self {
        StandardModel::new()
    }
}

/// Normalize an index that may be a numeric string.
fn as_index(key: &Value) -> Option<i64> {
    match key {
        Value::Int(i) => Some(*i),
        Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
        Value::Str(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl ObjectModel for StandardModel {
    fn generation(&self) -> u64 {
        self.generation
    }

    fn get_member(&self, target: &Value, key: &Value) -> Result<Lookup, EvalError> {
        match target {
            Value::Map(entries) => {
                let key = key.to_string();
                Ok(entries
                    .read()
                    .get(&key)
                    .cloned()
                    .map_or(Lookup::Missing, Lookup::Found))
            }
            Value::List(items) => {
                if let Some(idx) = as_index(key) {
                    let items = items.read();
                    let len = items.len();
                    return Ok(usize::try_from(idx)
                        .ok()
                        .filter(|&i| i < len)
                        .map_or(Lookup::Missing, |i| Lookup::Found(items[i].clone())));
                }
                match key.to_string().as_str() {
                    "length" | "size" => Ok(Lookup::Found(Value::Int(items.read().len() as i64))),
                    "empty" => Ok(Lookup::Found(Value::Bool(items.read().is_empty()))),
                    _ => Ok(Lookup::Missing),
                }
            }
            Value::Str(s) => {
                if let Some(idx) = as_index(key) {
                    return Ok(usize::try_from(idx)
                        .ok()
                        .and_then(|i| s.chars().nth(i))
                        .map_or(Lookup::Missing, |c| Lookup::Found(Value::string(c.to_string()))));
                }
                match key.to_string().as_str() {
                    "length" | "size" => Ok(Lookup::Found(Value::Int(s.chars().count() as i64))),
                    "empty" => Ok(Lookup::Found(Value::Bool(s.is_empty()))),
                    _ => Ok(Lookup::Missing),
                }
            }
            _ => Ok(Lookup::Missing),
        }
    }

    fn set_member(&self, target: &Value, key: &Value, value: Value) -> Result<Lookup, EvalError> {
        match target {
            Value::Map(entries) => {
                entries.write().insert(key.to_string(), value.clone());
                Ok(Lookup::Found(value))
            }
            Value::List(items) => {
                let Some(idx) = as_index(key) else {
                    return Ok(Lookup::Missing);
                };
                let mut items = items.write();
                let len = items.len();
                match usize::try_from(idx).ok() {
                    Some(i) if i < len => {
                        items[i] = value.clone();
                        Ok(Lookup::Found(value))
                    }
                    // Appending at the end index grows the list.
                    Some(i) if i == len => {
                        items.push(value.clone());
                        Ok(Lookup::Found(value))
                    }
                    _ => Ok(Lookup::Missing),
                }
            }
            _ => Ok(Lookup::Missing),
        }
    }

    fn invoke(&self, target: &Value, name: &str, args: &[Value]) -> Result<Lookup, EvalError> {
        let arity = |expected: usize| -> Result<(), EvalError> {
            if args.len() == expected {
                Ok(())
            } else {
                Err(invocation_failed(
                    name,
                    format!("expected {expected} argument(s), got {}", args.len()),
                ))
            }
        };
        match (target, name) {
            // Shared surface.
            (_, "toString") => {
                arity(0)?;
                Ok(Lookup::Found(Value::string(target.to_string())))
            }
            (Value::List(items), "size") => {
                arity(0)?;
                Ok(Lookup::Found(Value::Int(items.read().len() as i64)))
            }
            (Value::List(items), "isEmpty") => {
                arity(0)?;
                Ok(Lookup::Found(Value::Bool(items.read().is_empty())))
            }
            (Value::List(items), "contains") => {
                arity(1)?;
                Ok(Lookup::Found(Value::Bool(items.read().contains(&args[0]))))
            }
            (Value::List(items), "indexOf") => {
                arity(1)?;
                let idx = items.read().iter().position(|v| *v == args[0]);
                Ok(Lookup::Found(
                    idx.map_or(Value::Int(-1), |i| Value::Int(i as i64)),
                ))
            }
            (Value::List(items), "add" | "push") => {
                arity(1)?;
                items.write().push(args[0].clone());
                Ok(Lookup::Found(Value::Bool(true)))
            }
            (Value::List(items), "get") => {
                arity(1)?;
                let got = as_index(&args[0])
                    .and_then(|i| usize::try_from(i).ok())
                    .and_then(|i| items.read().get(i).cloned());
                Ok(Lookup::Found(got.unwrap_or(Value::Null)))
            }
            (Value::List(items), "join") => {
                arity(1)?;
                let sep = args[0].to_string();
                let joined = items
                    .read()
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(&sep);
                Ok(Lookup::Found(Value::string(joined)))
            }
            (Value::Map(entries), "size") => {
                arity(0)?;
                Ok(Lookup::Found(Value::Int(entries.read().len() as i64)))
            }
            (Value::Map(entries), "isEmpty") => {
                arity(0)?;
                Ok(Lookup::Found(Value::Bool(entries.read().is_empty())))
            }
            (Value::Map(entries), "containsKey") => {
                arity(1)?;
                let key = args[0].to_string();
                Ok(Lookup::Found(Value::Bool(entries.read().contains_key(&key))))
            }
            (Value::Map(entries), "get") => {
                arity(1)?;
                let key = args[0].to_string();
                Ok(Lookup::Found(
                    entries.read().get(&key).cloned().unwrap_or(Value::Null),
                ))
            }
            (Value::Map(entries), "put") => {
                arity(2)?;
                let prev = entries
                    .write()
                    .insert(args[0].to_string(), args[1].clone());
                Ok(Lookup::Found(prev.unwrap_or(Value::Null)))
            }
            (Value::Map(entries), "keys") => {
                arity(0)?;
                let mut keys: Vec<String> = entries.read().keys().cloned().collect();
                keys.sort_unstable();
                Ok(Lookup::Found(Value::list(
                    keys.into_iter().map(Value::string).collect(),
                )))
            }
            (Value::Map(entries), "values") => {
                arity(0)?;
                let map = entries.read();
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort_unstable();
                Ok(Lookup::Found(Value::list(
                    keys.into_iter().map(|k| map[k].clone()).collect(),
                )))
            }
            (Value::Str(s), "length" | "size") => {
                arity(0)?;
                Ok(Lookup::Found(Value::Int(s.chars().count() as i64)))
            }
            (Value::Str(s), "isEmpty") => {
                arity(0)?;
                Ok(Lookup::Found(Value::Bool(s.is_empty())))
            }
            (Value::Str(s), "toUpperCase") => {
                arity(0)?;
                Ok(Lookup::Found(Value::string(s.to_uppercase())))
            }
            (Value::Str(s), "toLowerCase") => {
                arity(0)?;
                Ok(Lookup::Found(Value::string(s.to_lowercase())))
            }
            (Value::Str(s), "trim") => {
                arity(0)?;
                Ok(Lookup::Found(Value::string(s.trim().to_owned())))
            }
            (Value::Str(s), "contains") => {
                arity(1)?;
                Ok(Lookup::Found(Value::Bool(s.contains(&args[0].to_string()))))
            }
            (Value::Str(s), "startsWith") => {
                arity(1)?;
                Ok(Lookup::Found(Value::Bool(
                    s.starts_with(&args[0].to_string()),
                )))
            }
            (Value::Str(s), "endsWith") => {
                arity(1)?;
                Ok(Lookup::Found(Value::Bool(s.ends_with(&args[0].to_string()))))
            }
            (Value::Str(s), "indexOf") => {
                arity(1)?;
                let needle = args[0].to_string();
                let idx = s.find(&needle).map_or(-1, |byte| {
                    s[..byte].chars().count() as i64
                });
                Ok(Lookup::Found(Value::Int(idx)))
            }
            (Value::Str(s), "split") => {
                arity(1)?;
                let sep = args[0].to_string();
                Ok(Lookup::Found(Value::list(
                    s.split(sep.as_str())
                        .map(|p| Value::string(p.to_owned()))
                        .collect(),
                )))
            }
            (Value::Str(s), "substring") => {
                if args.len() != 1 && args.len() != 2 {
                    return Err(invocation_failed(name, "expected 1 or 2 arguments"));
                }
                let chars: Vec<char> = s.chars().collect();
                let from = as_index(&args[0])
                    .and_then(|i| usize::try_from(i).ok())
                    .unwrap_or(0)
                    .min(chars.len());
                let to = args
                    .get(1)
                    .and_then(as_index)
                    .and_then(|i| usize::try_from(i).ok())
                    .unwrap_or(chars.len())
                    .clamp(from, chars.len());
                Ok(Lookup::Found(Value::string(
                    chars[from..to].iter().collect::<String>(),
                )))
            }
            _ => Ok(Lookup::Missing),
        }
    }

    fn construct(&self, class: &str, args: &[Value]) -> Result<Lookup, EvalError> {
        match class {
            "list" => Ok(Lookup::Found(Value::list(args.to_vec()))),
            "map" => Ok(Lookup::Found(Value::map(Default::default()))),
            "str" => Ok(Lookup::Found(Value::string(
                args.iter().map(ToString::to_string).collect::<String>(),
            ))),
            _ => Ok(Lookup::Missing),
        }
    }
}

/// Shared handle hosts pass around.
pub type SharedModel = Arc<dyn ObjectModel>;
