//! Plan and step wire model.
//!
//! A plan is either a bare array of steps or an object carrying
//! `define_operators` plus `plan`. Steps stay as raw JSON until the
//! router detects their tier from the keys present.

use crate::dsl::CustomOp;
use serde::Deserialize;
use serde_json::Value;

/// Tier-1 surgery operator names. `delete_node` doubles as a primitive;
/// the step shape (`target` vs `params`) disambiguates.
pub const SURGERY_OPS: &[&str] = &[
    "rename_identifier",
    "delete_node",
    "copy_node",
    "move_node",
    "swap_nodes",
    "reorder_children",
];

/// Which formal tier a step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// AST surgery over existing subtrees.
    Surgery,
    /// Parameterized template instantiation.
    Template,
    /// Typed fragment insertion.
    Fragment,
    /// Primitive, composed, or legacy operator.
    Other,
}

/// Detect the tier from a step's shape. The caller does not need to
/// think about tiers, just use the right keys.
pub fn detect_tier(step: &Value) -> Tier {
    if let Some(op) = step.get("op").and_then(Value::as_str) {
        if SURGERY_OPS.contains(&op) && (step.get("target").is_some() || step.get("parent").is_some())
        {
            return Tier::Surgery;
        }
    }
    if step.get("template").is_some() {
        return Tier::Template;
    }
    if step.get("fragment").is_some() {
        return Tier::Fragment;
    }
    Tier::Other
}

/// The two accepted plan document forms.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PlanDoc {
    Object {
        #[serde(default)]
        define_operators: Vec<CustomOp>,
        #[serde(default)]
        plan: Vec<Value>,
    },
    Bare(Vec<Value>),
}

impl PlanDoc {
    pub fn into_parts(self) -> (Vec<CustomOp>, Vec<Value>) {
        match self {
            PlanDoc::Bare(steps) => (Vec::new(), steps),
            PlanDoc::Object {
                define_operators,
                plan,
            } => (define_operators, plan),
        }
    }
}

/// Parse a plan document from JSON, rejecting shapes that cannot be a
/// plan at all.
pub fn parse_plan(value: &Value) -> Result<(Vec<CustomOp>, Vec<Value>), String> {
    let doc: PlanDoc =
        serde_json::from_value(value.clone()).map_err(|e| format!("invalid plan document: {e}"))?;
    let (custom_ops, steps) = doc.into_parts();
    if steps.is_empty() {
        return Err("plan is empty".to_string());
    }
    for (i, step) in steps.iter().enumerate() {
        if !step.is_object() {
            return Err(format!("step {i} is not an object"));
        }
        if step.get("op").is_none()
            && step.get("template").is_none()
            && step.get("fragment").is_none()
        {
            return Err(format!(
                "step {i} must have one of 'op', 'template', or 'fragment'"
            ));
        }
    }
    Ok((custom_ops, steps))
}
