//! Stage-tagged values

use super::Stage;
use crate::frontend::types::TypeDesc;
use crate::runtime::Value;
use serde::Serialize;
use std::fmt;

/// A value tagged with the stage that produced it and its type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageValue {
    pub stage: Stage,
    pub ty: TypeDesc,
    pub value: Value,
}

impl StageValue {
    /// Value produced by meta-stage execution
    pub fn meta(value: Value) -> Self {
        Self {
            stage: Stage::Meta,
            ty: value.type_desc(),
            value,
        }
    }
}

impl fmt::Display for StageValue {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}: {} = {}", self.stage, self.ty, self.value)
    }
}

/// Serialized view used by `check --store`
#[derive(Debug, Clone, Serialize)]
pub struct StageValueView {
    pub stage: Stage,
    pub ty: TypeDesc,
    pub value: String,
}

impl From<&StageValue> for StageValueView {
    fn from(value: &StageValue) -> Self {
        Self {
            stage: value.stage,
            ty: value.ty.clone(),
            value: value.value.to_string(),
        }
    }
}
