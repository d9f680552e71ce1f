// src/inference.rs

use crate::error::DetectorError;
use crate::types::Config;
use ort::{
    execution_providers::CUDAExecutionProvider,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use tracing::{debug, info};

pub struct InferenceEngine {
    session: Session,
    input_name: String,
}

impl InferenceEngine {
    pub fn new(config: &Config) -> Result<Self, DetectorError> {
        info!("Initializing inference engine");
        info!("Model path: {}", config.model.path);

        let load_err = |e: ort::Error| DetectorError::ModelLoad(e.to_string());

        let mut session_builder = Session::builder().map_err(load_err)?;

        if config.inference.use_cuda {
            info!("Enabling CUDA execution provider");
            session_builder = session_builder
                .with_execution_providers([CUDAExecutionProvider::default()
                    .with_device_id(0)
                    .build()])
                .map_err(load_err)?;
        }

        info!("Building ONNX Runtime session...");
        let session = session_builder
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(load_err)?
            .with_intra_threads(config.inference.num_threads)
            .map_err(load_err)?
            .with_inter_threads(1)
            .map_err(load_err)?
            .commit_from_file(&config.model.path)
            .map_err(|e| {
                DetectorError::ModelLoad(format!("{}: {}", config.model.path, e))
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| DetectorError::ModelLoad("model declares no inputs".to_string()))?;

        info!("✓ Inference engine initialized (input '{}')", input_name);

        Ok(Self {
            session,
            input_name,
        })
    }

    /// Runs one `1x3xSxS` tensor through the model, returning the first
    /// output's shape and data.
    pub fn infer(&mut self, input: Vec<f32>, size: usize) -> Result<(Vec<i64>, Vec<f32>), DetectorError> {
        debug!("Running inference");

        let infer_err = |e: ort::Error| DetectorError::Inference(e.to_string());

        let input_value = Tensor::from_array(([1usize, 3, size, size], input)).map_err(infer_err)?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .map_err(infer_err)?;

        let (shape, data) = outputs[0].try_extract_tensor::<f32>().map_err(infer_err)?;
        let dims: Vec<i64> = shape.iter().copied().collect();

        debug!("Model output shape: {:?}", dims);
        Ok((dims, data.to_vec()))
    }
}
