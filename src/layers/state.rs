use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{GanError, Result};
use crate::tensor::Tensor;

/// Named snapshot of every parameter and buffer of a network.
///
/// Keys are dotted paths such as `layers.0.weight` or
/// `layers.1.running_mean`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDict {
    pub entries: BTreeMap<String, Tensor>,
}

impl StateDict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Tensor) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Tensor> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up `key` and check it has `shape`.
    pub fn require(&self, key: &str, shape: &[usize]) -> Result<&Tensor> {
        let t = self
            .entries
            .get(key)
            .ok_or_else(|| GanError::StateDict(format!("missing key {key}")))?;
        if t.shape != shape {
            return Err(GanError::StateDict(format!(
                "{key}: expected shape {shape:?}, found {:?}",
                t.shape
            )));
        }
        Ok(t)
    }

    /// Total number of stored scalars.
    pub fn numel(&self) -> usize {
        self.entries.values().map(Tensor::numel).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_checks_presence_and_shape() {
        let mut sd = StateDict::new();
        sd.insert("a.weight", Tensor::zeros(vec![2, 3]));
        assert!(sd.require("a.weight", &[2, 3]).is_ok());
        assert!(matches!(
            sd.require("a.weight", &[3, 2]),
            Err(GanError::StateDict(_))
        ));
        assert!(matches!(sd.require("b", &[1]), Err(GanError::StateDict(_))));
        assert_eq!(sd.numel(), 6);
    }
}
