use anyhow::Result;

/// A dataset held by the facade while a benchmark run iterates it. Loading
/// and interpretation of the items belong to the caller.
#[derive(Debug, Clone)]
pub struct RawDataset {
    pub name: String,
    pub items: Vec<String>,
}

impl RawDataset {
    pub fn new(name: impl Into<String>, items: Vec<String>) -> RawDataset {
        RawDataset {
            name: name.into(),
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// External scoring collaborator. The facade only iterates and predicts;
/// building per-item inputs and turning raw predictions into a score happen
/// here.
pub trait Scorer {
    /// Builds one model input per dataset item from the benchmark prompt.
    fn prepare(&self, prompt: &str, dataset: &RawDataset) -> Result<Vec<String>>;

    /// Post-processes the raw predictions and computes the score.
    fn score(&self, dataset: &RawDataset, raw_preds: Vec<String>) -> Result<f64>;
}
