// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Script predicate glue
//!
//! The interpreter itself lives outside this crate. A script receives one
//! resource and must produce an object with a boolean `matching` field:
//!
//! ```text
//! { "matching": true, "message": "optional text" }
//! ```

use anyhow::Result;
use kube::ResourceExt;
use kube::core::DynamicObject;
use serde_json::Value;

use crate::error::EvaluationError;
use crate::kubernetes::kinds::ResourceKind;

/// Runs predicate scripts against a single resource
///
/// Implementations own their timeout and retry policy; any error they return
/// fails the constraint for the cluster being evaluated.
pub trait ScriptEvaluator: Send + Sync {
    fn evaluate(&self, script: &str, resource: &DynamicObject) -> Result<Value>;
}

impl<F> ScriptEvaluator for F
where
    F: Fn(&str, &DynamicObject) -> Result<Value> + Send + Sync,
{
    fn evaluate(&self, script: &str, resource: &DynamicObject) -> Result<Value> {
        self(script, resource)
    }
}

/// Evaluator used when no interpreter is configured; every script call fails
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScriptEvaluator;

impl ScriptEvaluator for NoScriptEvaluator {
    fn evaluate(&self, _script: &str, _resource: &DynamicObject) -> Result<Value> {
        anyhow::bail!("no script evaluator configured")
    }
}

/// Human-readable identity of a resource for error messages
pub fn describe(obj: &DynamicObject) -> String {
    let kind = ResourceKind::of(obj)
        .map(|k| k.to_string())
        .unwrap_or_else(|| "<unknown kind>".to_string());
    match obj.namespace() {
        Some(ns) => format!("{} {}/{}", kind, ns, obj.name_any()),
        None => format!("{} {}", kind, obj.name_any()),
    }
}

/// Run `script` against `obj` and interpret the result
pub fn run_predicate(
    evaluator: &dyn ScriptEvaluator,
    script: &str,
    obj: &DynamicObject,
) -> Result<bool, EvaluationError> {
    let failed = |message: String| EvaluationError::PredicateEvaluation {
        resource: describe(obj),
        message,
    };
    let value = evaluator
        .evaluate(script, obj)
        .map_err(|e| failed(format!("{e:#}")))?;
    interpret(&value).map_err(failed)
}

fn interpret(value: &Value) -> Result<bool, String> {
    match value {
        Value::Object(map) => match map.get("matching") {
            Some(Value::Bool(matching)) => Ok(*matching),
            Some(other) => Err(format!("'matching' must be a boolean, got {other}")),
            None => Err("result has no 'matching' field".to_string()),
        },
        other => Err(format!("expected an object with a 'matching' field, got {other}")),
    }
}
