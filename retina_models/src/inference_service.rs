use crate::{
    config::ModelInfo,
    error::{BatchError, ModelError},
    preprocess::{preprocess_bytes, preprocess_path},
    state::ModelRegistry,
};
use indexmap::IndexMap;
use ndarray::{Array, Ix4};
use serde::Serialize;
use std::{path::Path, sync::Arc, time::Instant};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ModelPrediction {
    pub prediction: usize,
    /// Seconds, rounded to 4 decimals.
    pub inference_time: f64,
    pub params: usize,
    pub accuracy: f64,
    pub train_time: String,
}

pub type Predictions = IndexMap<String, ModelPrediction>;

#[derive(Debug, Clone)]
pub struct InferenceService {
    registry: Arc<ModelRegistry>,
    image_size: u32,
}

impl InferenceService {
    pub fn new(registry: Arc<ModelRegistry>, image_size: u32) -> Self {
        Self {
            registry,
            image_size,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn model_info(&self) -> IndexMap<String, ModelInfo> {
        self.registry
            .entries()
            .map(|entry| (entry.name.clone(), entry.info.clone()))
            .collect()
    }

    pub fn predict_path(&self, path: &Path) -> Result<Predictions, ModelError> {
        let input = preprocess_path(path, self.image_size)?;
        self.predict(&input)
    }

    pub fn predict_bytes(&self, image_data: &[u8]) -> Result<Predictions, ModelError> {
        let input = preprocess_bytes(image_data, self.image_size)?;
        self.predict(&input)
    }

    /// Runs every registered model on `input`. The first failing model aborts the run.
    pub fn predict(&self, input: &Array<f32, Ix4>) -> Result<Predictions, ModelError> {
        let mut results = IndexMap::with_capacity(self.registry.len());

        for entry in self.registry.entries() {
            let start = Instant::now();
            let scores = entry.classifier.classify(input)?;
            let elapsed = start.elapsed().as_secs_f64();

            let prediction =
                argmax(&scores).ok_or_else(|| ModelError::EmptyOutput(entry.name.clone()))?;

            tracing::debug!(
                "Model {}: class={}, score={:.3}, time={:.4}s",
                entry.name,
                prediction,
                scores[prediction],
                elapsed
            );

            results.insert(
                entry.name.clone(),
                ModelPrediction {
                    prediction,
                    inference_time: round4(elapsed),
                    params: entry.params(),
                    accuracy: entry.info.accuracy,
                    train_time: entry.info.train_time.clone(),
                },
            );
        }

        Ok(results)
    }
}

/// Index of the largest score; the first one wins on ties.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .map(|(index, value)| (index, *value))
        .reduce(|accum, row| if row.1 > accum.1 { row } else { accum })
        .map(|(index, _)| index)
}

pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Per-model latency sums across the images of one batch upload.
#[derive(Debug, Clone)]
pub struct BatchTimings {
    totals: IndexMap<String, f64>,
    images: usize,
}

impl BatchTimings {
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            totals: names.into_iter().map(|n| (n.to_string(), 0.0)).collect(),
            images: 0,
        }
    }

    pub fn record(&mut self, predictions: &Predictions) {
        for (name, prediction) in predictions {
            *self.totals.entry(name.clone()).or_insert(0.0) += prediction.inference_time;
        }
        self.images += 1;
    }

    pub fn images(&self) -> usize {
        self.images
    }

    pub fn averages(&self) -> Result<IndexMap<String, f64>, BatchError> {
        if self.images == 0 {
            return Err(BatchError::EmptyBatch);
        }

        Ok(self
            .totals
            .iter()
            .map(|(name, total)| (name.clone(), round4(total / self.images as f64)))
            .collect())
    }
}
