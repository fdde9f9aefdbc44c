use crate::{
    backend::{default_device, InferenceBackend},
    burn_service::BurnClassifier,
    config::{Architecture, ModelEntryConfig, ModelInfo, ModelsConfig},
    error::ModelError,
    model_service::Classifier,
    network::{SimpleCnn, Vgg16Bn},
};
use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
    sync::Arc,
};

pub struct ModelEntry {
    pub name: String,
    pub classifier: Arc<dyn Classifier>,
    pub info: ModelInfo,
    params: usize,
}

impl ModelEntry {
    pub fn new(name: &str, classifier: Arc<dyn Classifier>, info: ModelInfo) -> Self {
        let params = classifier.num_params();
        Self {
            name: name.to_string(),
            classifier,
            info,
            params,
        }
    }

    pub fn params(&self) -> usize {
        self.params
    }
}

impl std::fmt::Debug for ModelEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEntry")
            .field("name", &self.name)
            .field("info", &self.info)
            .field("params", &self.params)
            .finish()
    }
}

/// Named, weight-loaded networks in declaration order. Immutable once built.
#[derive(Debug)]
pub struct ModelRegistry {
    entries: Vec<ModelEntry>,
}

impl ModelRegistry {
    pub fn new(entries: Vec<ModelEntry>) -> Result<Self, ModelError> {
        if entries.is_empty() {
            return Err(ModelError::InvalidRegistry(
                "at least one model is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = entries.iter().find(|e| !seen.insert(e.name.as_str())) {
            return Err(ModelError::InvalidRegistry(format!(
                "duplicate model name {}",
                duplicate.name
            )));
        }

        Ok(Self { entries })
    }

    /// Builds every configured network and loads its weights. Any failure aborts.
    /// Entries naming the same architecture, weights file and class count share
    /// one loaded network.
    pub fn load(config: &ModelsConfig) -> Result<Self, ModelError> {
        let device = default_device();
        let mut loaded: HashMap<(Architecture, PathBuf, usize), Arc<dyn Classifier>> =
            HashMap::new();

        let mut entries = Vec::with_capacity(config.entries.len());
        for entry in &config.entries {
            let weights_path = config.get_weights_path(entry);
            let key = (entry.architecture, weights_path.clone(), entry.num_classes);
            let classifier = match loaded.get(&key) {
                Some(classifier) => {
                    tracing::info!(
                        "{} shares the network loaded from {:?}",
                        entry.name,
                        weights_path
                    );
                    classifier.clone()
                }
                None => {
                    let classifier = load_classifier(entry, &weights_path, &device)?;
                    loaded.insert(key, classifier.clone());
                    classifier
                }
            };
            entries.push(ModelEntry::new(&entry.name, classifier, entry.info()));
        }

        tracing::info!("Loaded {} models", entries.len());
        Self::new(entries)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ModelEntry> {
        self.entries.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ModelEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn load_classifier(
    entry: &ModelEntryConfig,
    weights_path: &std::path::Path,
    device: &<InferenceBackend as burn::tensor::backend::Backend>::Device,
) -> Result<Arc<dyn Classifier>, ModelError> {
    tracing::info!(
        "Loading {} ({}, {} classes)",
        entry.name,
        entry.architecture.as_str(),
        entry.num_classes
    );

    let classifier: Arc<dyn Classifier> = match entry.architecture {
        Architecture::SimpleCnn => Arc::new(BurnClassifier::from_pytorch(
            &entry.name,
            SimpleCnn::<InferenceBackend>::new(entry.num_classes, device),
            weights_path,
            device,
        )?),
        Architecture::Vgg16Bn => Arc::new(BurnClassifier::from_pytorch(
            &entry.name,
            Vgg16Bn::<InferenceBackend>::new(entry.num_classes, device),
            weights_path,
            device,
        )?),
    };

    Ok(classifier)
}
