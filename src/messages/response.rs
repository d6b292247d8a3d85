// In: src/messages/response.rs

use ndarray::{Array2, ArrayView2};

use super::derived::{Derived, MessageExtension};
use super::tensor::MultiTensorMessage;
use crate::config::MessageConfig;
use crate::error::MessageError;

/// Names the tensor holding model output. Adds no per-row data of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseAttributes {
    probs_tensor_name: String,
}

impl ResponseAttributes {
    pub fn new(probs_tensor_name: impl Into<String>) -> Self {
        Self {
            probs_tensor_name: probs_tensor_name.into(),
        }
    }

    pub fn with_config(config: &MessageConfig) -> Self {
        Self::new(config.probs_tensor_name.clone())
    }

    pub fn probs_tensor_name(&self) -> &str {
        &self.probs_tensor_name
    }
}

impl Default for ResponseAttributes {
    fn default() -> Self {
        Self::with_config(&MessageConfig::default())
    }
}

impl MessageExtension for ResponseAttributes {}

/// A tensor message carrying inference results.
pub type MultiResponseMessage = Derived<MultiTensorMessage, ResponseAttributes>;

impl MultiResponseMessage {
    pub fn get_probs_tensor(&self) -> Result<Array2<f32>, MessageError> {
        self.get_tensor(self.extension().probs_tensor_name())
    }

    pub fn set_probs_tensor(&self, values: ArrayView2<'_, f32>) -> Result<(), MessageError> {
        self.set_tensor(self.extension().probs_tensor_name(), values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{MultiMessage, TensorAttributes, TensorMemory};
    use crate::meta::MessageMeta;
    use arrow::array::{ArrayRef, Int64Array};
    use arrow::datatypes::{DataType, Field, Schema};
    use ndarray::array;
    use std::sync::Arc;

    #[test]
    fn test_probs_name_comes_from_config() {
        let config = MessageConfig {
            probs_tensor_name: "scores".to_string(),
            ..Default::default()
        };
        assert_eq!(ResponseAttributes::with_config(&config).probs_tensor_name(), "scores");
        assert_eq!(ResponseAttributes::default().probs_tensor_name(), "probs");
    }

    #[test]
    fn test_set_probs_tensor_writes_through_tensor_window() {
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int64, false)]));
        let column: ArrayRef = Arc::new(Int64Array::from(vec![0, 1, 2, 3]));
        let meta = Arc::new(MessageMeta::try_new(schema, vec![column]).unwrap());
        let memory = Arc::new(TensorMemory::new(4));

        let msg: MultiResponseMessage = Derived::new(
            Derived::new(
                MultiMessage::new(meta, 1, Some(2)).unwrap(),
                TensorAttributes::new(memory.clone(), 1, Some(2)).unwrap(),
            ),
            ResponseAttributes::default(),
        );

        msg.set_probs_tensor(array![[0.25], [0.75]].view()).unwrap();

        assert_eq!(msg.get_probs_tensor().unwrap(), array![[0.25], [0.75]]);
        assert_eq!(
            memory.get_tensor("probs", 0, 4).unwrap(),
            array![[0.0], [0.25], [0.75], [0.0]]
        );
    }
}
