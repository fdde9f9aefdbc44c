use crate::{
    backend::InferenceBackend,
    error::ModelError,
    model_service::Classifier,
    network::Network,
};
use burn::{
    module::{Module, ModuleVisitor, ParamId},
    record::{FullPrecisionSettings, Recorder},
    tensor::{backend::Backend, Tensor, TensorData},
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use ndarray::{Array, Ix4};
use std::{path::Path, sync::Mutex};

type Device = <InferenceBackend as Backend>::Device;

pub struct BurnClassifier<N> {
    name: String,
    network: Mutex<N>,
    num_params: usize,
    device: Device,
}

impl<N: Network<InferenceBackend>> BurnClassifier<N> {
    pub fn new(name: &str, network: N, device: &Device) -> Self {
        let num_params = network.trainable_params();
        Self {
            name: name.to_string(),
            network: Mutex::new(network),
            num_params,
            device: device.clone(),
        }
    }

    /// Loads a PyTorch state dict into `network`, which only supplies the shapes.
    pub fn from_pytorch(
        name: &str,
        network: N,
        weights_path: &Path,
        device: &Device,
    ) -> Result<Self, ModelError> {
        if !weights_path.exists() {
            return Err(ModelError::WeightsNotFound(weights_path.to_path_buf()));
        }

        let expected_shapes = param_shapes(&network);
        let args = N::pytorch_key_remaps().iter().fold(
            LoadArgs::new(weights_path.to_path_buf()),
            |args, (pattern, replacement)| args.with_key_remap(pattern, replacement),
        );

        let recorder = PyTorchFileRecorder::<FullPrecisionSettings>::default();
        let record: N::Record = Recorder::<InferenceBackend>::load(&recorder, args, device)
            .map_err(|e| ModelError::WeightsLoad {
                path: weights_path.to_path_buf(),
                reason: format!("{:?}", e),
            })?;

        // load_record swaps tensors in without looking at their shapes
        let network = network.load_record(record);
        let loaded_shapes = param_shapes(&network);
        if let Some(reason) = shape_mismatch(&expected_shapes, &loaded_shapes) {
            return Err(ModelError::WeightsLoad {
                path: weights_path.to_path_buf(),
                reason,
            });
        }

        tracing::info!(
            "Loaded {} from {:?} ({} trainable parameters)",
            name,
            weights_path,
            network.trainable_params()
        );

        Ok(Self::new(name, network, device))
    }

    pub fn run_inference(&self, input: &Array<f32, Ix4>) -> Result<Vec<f32>, ModelError> {
        let shape: [usize; 4] = [
            input.shape()[0],
            input.shape()[1],
            input.shape()[2],
            input.shape()[3],
        ];
        let min_side = N::min_input_side();
        if shape[0] == 0 || shape[1] != 3 || shape[2] < min_side || shape[3] < min_side {
            return Err(ModelError::Forward {
                model: self.name.clone(),
                reason: format!(
                    "expected input [N, 3, H, W] with N >= 1 and H, W >= {}, got {:?}",
                    min_side, shape
                ),
            });
        }

        let network = self
            .network
            .lock()
            .map_err(|e| ModelError::LockPoisoned(e.to_string()))?;

        let data = TensorData::new(input.iter().copied().collect::<Vec<f32>>(), shape);
        let tensor = Tensor::<InferenceBackend, 4>::from_data(data, &self.device);

        network
            .forward(tensor)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| ModelError::Forward {
                model: self.name.clone(),
                reason: format!("failed to extract scores: {:?}", e),
            })
    }
}

impl<N: Network<InferenceBackend> + Send + 'static> Classifier for BurnClassifier<N> {
    fn classify(&self, input: &Array<f32, Ix4>) -> Result<Vec<f32>, ModelError> {
        self.run_inference(input)
    }

    fn num_params(&self) -> usize {
        self.num_params
    }
}

/// Dims of every float tensor in the module, in visiting order.
struct ParamShapes(Vec<Vec<usize>>);

impl<B: Backend> ModuleVisitor<B> for ParamShapes {
    fn visit_float<const D: usize>(&mut self, _id: ParamId, tensor: &Tensor<B, D>) {
        self.0.push(tensor.dims().to_vec());
    }
}

fn param_shapes<B: Backend, M: Module<B>>(module: &M) -> Vec<Vec<usize>> {
    let mut shapes = ParamShapes(Vec::new());
    module.visit(&mut shapes);
    shapes.0
}

fn shape_mismatch(expected: &[Vec<usize>], loaded: &[Vec<usize>]) -> Option<String> {
    if expected.len() != loaded.len() {
        return Some(format!(
            "expected {} tensors, found {}",
            expected.len(),
            loaded.len()
        ));
    }

    expected
        .iter()
        .zip(loaded)
        .position(|(e, l)| e != l)
        .map(|index| {
            format!(
                "tensor {} has shape {:?}, the network expects {:?}",
                index, loaded[index], expected[index]
            )
        })
}
