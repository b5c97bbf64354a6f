//! Request-time evaluation of on-demand feature views.
//!
//! Evaluation is pure: the transform sees only the union of resolved base
//! feature values and request-supplied fields, and must produce exactly the
//! declared output fields. Dependency ordering between on-demand views is the
//! registry's job; callers pass views already sorted dependencies-first.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::registry::{OnDemandFeatureView, Value, ValueType};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("on-demand view {view} produced outputs {actual:?}, declared {expected:?}")]
    OutputMismatch {
        view: String,
        expected: Vec<String>,
        actual: Vec<String>,
    },
    #[error("on-demand view {view} produced {field} with a value not matching {declared:?}")]
    OutputType {
        view: String,
        field: String,
        declared: ValueType,
    },
}

/// Applies one on-demand view to a single row of input values. Declared
/// inputs missing from the row are presented to the transform as null.
pub fn evaluate(
    view: &OnDemandFeatureView,
    row: &BTreeMap<String, Value>,
) -> Result<BTreeMap<String, Value>, EvalError> {
    let mut input = row.clone();
    for reference in &view.inputs {
        input
            .entry(reference.field.clone())
            .or_insert(Value::Null);
    }

    let produced = view.transform.apply(&input);

    let expected: Vec<String> = view.outputs.iter().map(|field| field.name.clone()).collect();
    let actual: Vec<String> = produced.keys().cloned().collect();
    if actual.len() != expected.len()
        || !expected.iter().all(|name| produced.contains_key(name))
    {
        let mut expected_sorted = expected;
        expected_sorted.sort();
        return Err(EvalError::OutputMismatch {
            view: view.name.clone(),
            expected: expected_sorted,
            actual,
        });
    }

    for field in &view.outputs {
        let value = &produced[&field.name];
        if !value.matches(field.value_type) {
            return Err(EvalError::OutputType {
                view: view.name.clone(),
                field: field.name.clone(),
                declared: field.value_type,
            });
        }
    }

    Ok(produced)
}

/// Evaluates a dependency-ordered chain of on-demand views, feeding each
/// view's outputs into the rows seen by later views.
pub fn evaluate_chain(
    views: &[&OnDemandFeatureView],
    row: &mut BTreeMap<String, Value>,
) -> Result<(), EvalError> {
    for view in views {
        let outputs = evaluate(view, row)?;
        row.extend(outputs);
    }
    Ok(())
}
