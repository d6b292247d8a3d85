// In: src/config.rs

//! Configuration for the message layer.
//!
//! `MessageConfig` is meant to be built once at the pipeline boundary (from a
//! JSON document or from code) and shared read-only. It names the tensors that
//! derived message kinds look up by default and lists the columns a source stage
//! must preallocate so that downstream stages can write into them.

use arrow_schema::DataType;
use serde::{Deserialize, Serialize};

use crate::error::MessageError;

//==================================================================================
// I. Column Preallocation
//==================================================================================

/// A column that downstream stages expect to find in every batch.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

//==================================================================================
// II. The Unified MessageConfig
//==================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct MessageConfig {
    /// Tensor holding the message-row id of every tensor row.
    #[serde(default = "default_id_tensor_name")]
    pub id_tensor_name: String,

    /// Tensor holding model output probabilities on response messages.
    #[serde(default = "default_probs_tensor_name")]
    pub probs_tensor_name: String,

    /// Columns appended (all-null) to a batch when it enters the pipeline.
    #[serde(default)]
    pub needed_columns: Vec<ColumnSpec>,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            id_tensor_name: default_id_tensor_name(),
            probs_tensor_name: default_probs_tensor_name(),
            needed_columns: Vec::new(),
        }
    }
}

impl MessageConfig {
    /// Parses a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, MessageError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn default_id_tensor_name() -> String {
    "seq_ids".to_string()
}

fn default_probs_tensor_name() -> String {
    "probs".to_string()
}
