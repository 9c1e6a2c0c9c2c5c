//! Action decoding
//!
//! Actions arrive as JSON objects tagged by `type`. Decoding checks that the
//! required parameters are present and well-formed; values stay raw JSON so
//! handlers can evaluate `{{ }}` markers against the live context.

use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Error, ErrorCode, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Unknown levels log at `info`
    pub fn parse(level: &str) -> Self {
        match level.to_ascii_lowercase().as_str() {
            "debug" | "trace" => LogLevel::Debug,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

/// What `push`/`unshift` insert
#[derive(Debug, Clone, PartialEq)]
pub enum Insert {
    /// `value`: one element
    Value(Value),
    /// `items`: every element of an array
    Items(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Set {
        path: String,
        value: Value,
    },
    Push {
        path: String,
        insert: Insert,
    },
    Pop {
        path: String,
    },
    Shift {
        path: String,
    },
    Unshift {
        path: String,
        insert: Insert,
    },
    Splice {
        path: String,
        start: Value,
        delete_count: Option<Value>,
        items: Option<Value>,
    },
    Call {
        method: String,
        params: Option<Value>,
        result_to: Option<String>,
    },
    Emit {
        event: String,
        data: Option<Value>,
    },
    Navigate {
        to: Value,
    },
    Log {
        level: LogLevel,
        message: Value,
    },
    If {
        cond: Value,
        then: Vec<Value>,
        otherwise: Vec<Value>,
    },
    Loop {
        var: String,
        index_var: String,
        items: Value,
        body: Vec<Value>,
    },
    Batch {
        actions: Vec<Value>,
    },
    /// Not built in; dispatched to a method of the same name
    Custom {
        kind: String,
    },
}

impl Action {
    pub fn kind(&self) -> &str {
        match self {
            Action::Set { .. } => "set",
            Action::Push { .. } => "push",
            Action::Pop { .. } => "pop",
            Action::Shift { .. } => "shift",
            Action::Unshift { .. } => "unshift",
            Action::Splice { .. } => "splice",
            Action::Call { .. } => "call",
            Action::Emit { .. } => "emit",
            Action::Navigate { .. } => "navigate",
            Action::Log { .. } => "log",
            Action::If { .. } => "if",
            Action::Loop { .. } => "loop",
            Action::Batch { .. } => "batch",
            Action::Custom { kind } => kind,
        }
    }

    /// Decode one raw action
    pub fn decode(raw: &Value) -> Result<Action> {
        let Value::Object(obj) = raw else {
            return Err(invalid("action", "must be an object"));
        };
        let kind = match obj.get("type") {
            Some(Value::String(kind)) => kind.as_str(),
            Some(_) => return Err(invalid("type", "must be a string")),
            None => return Err(missing("action", "type")),
        };
        let params = Params { kind, obj };

        let action = match kind {
            "set" => Action::Set {
                path: params.string("path")?,
                value: params.required("value")?.clone(),
            },
            "push" => Action::Push {
                path: params.string("path")?,
                insert: params.insert()?,
            },
            "pop" => Action::Pop {
                path: params.string("path")?,
            },
            "shift" => Action::Shift {
                path: params.string("path")?,
            },
            "unshift" => Action::Unshift {
                path: params.string("path")?,
                insert: params.insert()?,
            },
            "splice" => Action::Splice {
                path: params.string("path")?,
                start: params.required("start")?.clone(),
                delete_count: params.optional("deleteCount").cloned(),
                items: params.optional("items").cloned(),
            },
            "call" => Action::Call {
                method: params.string("method")?,
                params: params.optional("params").cloned(),
                result_to: params.optional_string("resultTo")?,
            },
            "emit" => Action::Emit {
                event: params.string("event")?,
                data: params.optional("data").cloned(),
            },
            "navigate" => Action::Navigate {
                to: params.required("to")?.clone(),
            },
            "log" => Action::Log {
                level: params
                    .optional_string("level")?
                    .map(|level| LogLevel::parse(&level))
                    .unwrap_or(LogLevel::Info),
                message: params.required("message")?.clone(),
            },
            "if" => Action::If {
                cond: params.required("cond")?.clone(),
                then: params.actions("then")?.unwrap_or_default(),
                otherwise: params.actions("else")?.unwrap_or_default(),
            },
            "loop" => Action::Loop {
                var: params.string("var")?,
                index_var: params
                    .optional_string("indexVar")?
                    .unwrap_or_else(|| "index".to_string()),
                items: params.required("in")?.clone(),
                body: params
                    .actions("body")?
                    .ok_or_else(|| missing(kind, "body"))?,
            },
            "batch" => Action::Batch {
                actions: params
                    .actions("actions")?
                    .ok_or_else(|| missing(kind, "actions"))?,
            },
            other => Action::Custom {
                kind: other.to_string(),
            },
        };
        Ok(action)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind())
    }
}

/* ===================== Parameter Access ===================== */

fn missing(kind: &str, param: &str) -> Error {
    Error::action(
        ErrorCode::ActionMissingParam,
        format!("Action '{}' requires '{}'", kind, param),
    )
    .with_metadata("param", param)
}

fn invalid(param: &str, reason: &str) -> Error {
    Error::action(
        ErrorCode::ActionInvalidParam,
        format!("Parameter '{}' {}", param, reason),
    )
    .with_metadata("param", param)
}

struct Params<'a> {
    kind: &'a str,
    obj: &'a Map<String, Value>,
}

impl<'a> Params<'a> {
    /// Present and not null
    fn optional(&self, name: &str) -> Option<&'a Value> {
        self.obj.get(name).filter(|v| !v.is_null())
    }

    /// Present; an explicit `null` counts
    fn required(&self, name: &str) -> Result<&'a Value> {
        self.obj.get(name).ok_or_else(|| missing(self.kind, name))
    }

    fn string(&self, name: &str) -> Result<String> {
        match self.optional(name) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            Some(Value::String(_)) | None => Err(missing(self.kind, name)),
            Some(_) => Err(invalid(name, "must be a string")),
        }
    }

    fn optional_string(&self, name: &str) -> Result<Option<String>> {
        match self.optional(name) {
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(invalid(name, "must be a string")),
            None => Ok(None),
        }
    }

    /// An action list; a single action object is accepted as a list of one
    fn actions(&self, name: &str) -> Result<Option<Vec<Value>>> {
        match self.optional(name) {
            Some(Value::Array(items)) => Ok(Some(items.clone())),
            Some(action @ Value::Object(_)) => Ok(Some(vec![action.clone()])),
            Some(_) => Err(invalid(name, "must be an action list")),
            None => Ok(None),
        }
    }

    fn insert(&self) -> Result<Insert> {
        if let Some(items) = self.optional("items") {
            return Ok(Insert::Items(items.clone()));
        }
        match self.obj.get("value") {
            Some(value) => Ok(Insert::Value(value.clone())),
            None => Err(missing(self.kind, "value")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_state_actions() {
        assert_eq!(
            Action::decode(&json!({"type": "set", "path": "a.b", "value": 1})).unwrap(),
            Action::Set {
                path: "a.b".to_string(),
                value: json!(1)
            }
        );
        assert_eq!(
            Action::decode(&json!({"type": "push", "path": "xs", "items": "{{ more }}"})).unwrap(),
            Action::Push {
                path: "xs".to_string(),
                insert: Insert::Items(json!("{{ more }}"))
            }
        );
        assert!(matches!(
            Action::decode(&json!({"type": "splice", "path": "xs", "start": 0})).unwrap(),
            Action::Splice {
                delete_count: None,
                items: None,
                ..
            }
        ));
    }

    #[test]
    fn test_set_accepts_explicit_null() {
        let action = Action::decode(&json!({"type": "set", "path": "a", "value": null})).unwrap();
        assert_eq!(action.kind(), "set");
    }

    #[test]
    fn test_missing_params() {
        for raw in [
            json!({"path": "a"}),
            json!({"type": "set", "value": 1}),
            json!({"type": "set", "path": "a"}),
            json!({"type": "push", "path": "a"}),
            json!({"type": "call"}),
            json!({"type": "loop", "var": "x", "in": []}),
            json!({"type": "batch"}),
            json!({"type": "navigate"}),
            json!({"type": "if", "then": []}),
        ] {
            let err = Action::decode(&raw).unwrap_err();
            assert_eq!(err.code(), ErrorCode::ActionMissingParam, "{}", raw);
        }
    }

    #[test]
    fn test_invalid_params() {
        for raw in [
            json!("set"),
            json!({"type": 3}),
            json!({"type": "set", "path": 1, "value": 1}),
            json!({"type": "batch", "actions": "nope"}),
            json!({"type": "call", "method": "m", "resultTo": 5}),
        ] {
            let err = Action::decode(&raw).unwrap_err();
            assert_eq!(err.code(), ErrorCode::ActionInvalidParam, "{}", raw);
        }
    }

    #[test]
    fn test_loop_defaults() {
        let action =
            Action::decode(&json!({"type": "loop", "var": "item", "in": "{{ xs }}", "body": {"type": "log", "message": "x"}}))
                .unwrap();
        match action {
            Action::Loop {
                index_var, body, ..
            } => {
                assert_eq!(index_var, "index");
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected loop, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_custom() {
        let action = Action::decode(&json!({"type": "slow", "ms": 10})).unwrap();
        assert_eq!(
            action,
            Action::Custom {
                kind: "slow".to_string()
            }
        );
        assert_eq!(action.to_string(), "slow");
    }

    #[test]
    fn test_log_levels() {
        assert_eq!(LogLevel::parse("WARN"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("verbose"), LogLevel::Info);
        let action = Action::decode(&json!({"type": "log", "message": "hi"})).unwrap();
        assert!(matches!(action, Action::Log { level: LogLevel::Info, .. }));
    }
}
