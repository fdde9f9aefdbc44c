use crate::{
    backend::InferenceBackend,
    network::{Network, SimpleCnn, Vgg16Bn},
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct ModelsConfig {
    #[serde(default = "default_image_size")]
    pub image_size: u32,
    pub weights_dir: PathBuf,
    pub entries: Vec<ModelEntryConfig>,
}

fn default_image_size() -> u32 {
    224
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelEntryConfig {
    pub name: String,
    pub architecture: Architecture,
    pub weights_file: String,
    #[serde(default = "default_num_classes")]
    pub num_classes: usize,
    pub accuracy: f64,
    pub train_time: String,
}

fn default_num_classes() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    SimpleCnn,
    Vgg16Bn,
}

impl Architecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::SimpleCnn => "simple_cnn",
            Architecture::Vgg16Bn => "vgg16_bn",
        }
    }

    pub fn min_image_size(&self) -> u32 {
        let side = match self {
            Architecture::SimpleCnn => SimpleCnn::<InferenceBackend>::min_input_side(),
            Architecture::Vgg16Bn => Vgg16Bn::<InferenceBackend>::min_input_side(),
        };
        side as u32
    }
}

/// Static metadata reported alongside every prediction.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ModelInfo {
    pub accuracy: f64,
    pub train_time: String,
}

impl ModelEntryConfig {
    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            accuracy: self.accuracy,
            train_time: self.train_time.clone(),
        }
    }
}

impl ModelsConfig {
    pub fn get_weights_path(&self, entry: &ModelEntryConfig) -> PathBuf {
        self.weights_dir.join(&entry.weights_file)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.entries.is_empty() {
            return Err("No models configured".to_string());
        }
        if self.image_size == 0 {
            return Err("Image size must be positive".to_string());
        }

        let mut seen = HashSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.name.as_str()) {
                return Err(format!("Duplicate model name: {}", entry.name));
            }
            if self.image_size < entry.architecture.min_image_size() {
                return Err(format!(
                    "Image size {} is too small for {} ({}), which needs at least {}",
                    self.image_size,
                    entry.name,
                    entry.architecture.as_str(),
                    entry.architecture.min_image_size()
                ));
            }
            if entry.num_classes == 0 {
                return Err(format!("Model {} must have at least one class", entry.name));
            }
            let path = self.get_weights_path(entry);
            if !path.exists() {
                return Err(format!("Weights file not found: {:?}", path));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn entry(name: &str, weights_file: &str) -> ModelEntryConfig {
        ModelEntryConfig {
            name: name.to_string(),
            architecture: Architecture::SimpleCnn,
            weights_file: weights_file.to_string(),
            num_classes: 5,
            accuracy: 73.49,
            train_time: "37m".to_string(),
        }
    }

    #[test]
    fn test_validate_accepts_existing_weights() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("cnn.pth")).unwrap();

        let config = ModelsConfig {
            image_size: 224,
            weights_dir: dir.path().to_path_buf(),
            entries: vec![entry("CNN", "cnn.pth"), entry("Model C", "cnn.pth")],
        };

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_weights() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModelsConfig {
            image_size: 224,
            weights_dir: dir.path().to_path_buf(),
            entries: vec![entry("CNN", "missing.pth")],
        };

        let err = config.validate().unwrap_err();
        assert!(err.contains("missing.pth"));
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("cnn.pth")).unwrap();
        let config = ModelsConfig {
            image_size: 224,
            weights_dir: dir.path().to_path_buf(),
            entries: vec![entry("CNN", "cnn.pth"), entry("CNN", "cnn.pth")],
        };

        assert_eq!(config.validate().unwrap_err(), "Duplicate model name: CNN");
    }

    #[test]
    fn test_validate_rejects_image_size_below_pooling_depth() {
        let dir = tempfile::tempdir().unwrap();
        File::create(dir.path().join("cnn.pth")).unwrap();
        let mut vgg = entry("VGG 16", "cnn.pth");
        vgg.architecture = Architecture::Vgg16Bn;

        let mut config = ModelsConfig {
            image_size: 4,
            weights_dir: dir.path().to_path_buf(),
            entries: vec![entry("CNN", "cnn.pth")],
        };
        assert!(config.validate().unwrap_err().contains("too small"));

        config.image_size = 8;
        assert!(config.validate().is_ok());

        config.entries.push(vgg);
        assert!(config.validate().unwrap_err().contains("VGG 16"));

        config.image_size = 32;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_model_list() {
        let config = ModelsConfig {
            image_size: 224,
            weights_dir: PathBuf::from("models"),
            entries: vec![],
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_architecture_deserializes_from_snake_case() {
        let arch: Architecture = serde_json::from_str("\"vgg16_bn\"").unwrap();
        assert_eq!(arch, Architecture::Vgg16Bn);
        assert_eq!(arch.as_str(), "vgg16_bn");
    }
}
