//! In-process model runners
//!
//! These runners stand in for a neural-network execution backend behind
//! the [`ModelRunner`] seam. Both honour the two-step contract: describe
//! the output tensors first, then fill pre-allocated buffers in order.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use infergraph_core::adapter::{ModelRunner, TensorDesc, TensorShape};
use infergraph_core::buffer::Buffer;
use infergraph_core::config::{RunContext, StageConfig};
use infergraph_core::error::{Error, Result};

/// Checks that a `model_path` config item, when present, names a readable
/// file. Absent items are skipped, matching runtimes that only load
/// weights for configured stages.
fn load_model_path(config: &StageConfig) -> Result<Option<PathBuf>> {
    let Some(path) = config.get("model_path") else {
        debug!("no model_path configured, running without weights");
        return Ok(None);
    };

    std::fs::metadata(path)
        .map_err(|err| Error::Adapter(format!("cannot load model {path}: {err}")))?;
    debug!(model = path, "model loaded");
    Ok(Some(PathBuf::from(path)))
}

/// Reduces the whole input to one scalar: the mean of its bytes
///
/// Produces a single `[1, 1]` f32 tensor per run.
#[derive(Debug, Default)]
pub struct MeanModel {
    /// Weights file recorded at init, if configured
    model_path: Option<PathBuf>,
}

impl MeanModel {
    /// Create an uninitialized runner
    pub fn new() -> Self {
        Self::default()
    }
}

impl ModelRunner for MeanModel {
    fn init(&mut self, config: &StageConfig) -> Result<()> {
        self.model_path = load_model_path(config)?;
        Ok(())
    }

    fn prepare_outputs(&self, inputs: &[Buffer]) -> Result<Vec<TensorDesc>> {
        if inputs.len() != 1 {
            return Err(Error::Adapter(format!(
                "expected one input tensor, got {}",
                inputs.len()
            )));
        }
        Ok(vec![TensorDesc::f32(TensorShape::new(vec![1, 1]))])
    }

    fn run(
        &self,
        _ctx: &RunContext,
        inputs: &[Buffer],
        outputs: &mut [Buffer],
        _timeout_hint: Option<Duration>,
    ) -> Result<()> {
        let bytes = inputs[0].as_slice();
        let mean = if bytes.is_empty() {
            0.0
        } else {
            let sum: u64 = bytes.iter().map(|&b| u64::from(b)).sum();
            sum as f32 / bytes.len() as f32
        };

        outputs[0].copy_from_typed(&[mean])
    }
}

/// Replays a fixed list of output tensors on every run
///
/// Useful wherever deterministic multi-output behaviour is needed without
/// a real network: each run emits the configured tensors in order.
#[derive(Debug)]
pub struct ConstModel {
    tensors: Vec<(TensorShape, Vec<f32>)>,
}

impl ConstModel {
    /// Create a runner replaying `tensors`
    ///
    /// Fails with [`Error::Config`] when a value list does not fill its
    /// shape.
    pub fn new(tensors: Vec<(TensorShape, Vec<f32>)>) -> Result<Self> {
        for (shape, values) in &tensors {
            if shape.num_elements() != values.len() {
                return Err(Error::Config(format!(
                    "{} values do not fill shape {shape}",
                    values.len()
                )));
            }
        }
        Ok(Self { tensors })
    }
}

impl ModelRunner for ConstModel {
    fn init(&mut self, config: &StageConfig) -> Result<()> {
        load_model_path(config)?;
        Ok(())
    }

    fn prepare_outputs(&self, _inputs: &[Buffer]) -> Result<Vec<TensorDesc>> {
        Ok(self
            .tensors
            .iter()
            .map(|(shape, _)| TensorDesc::f32(shape.clone()))
            .collect())
    }

    fn run(
        &self,
        _ctx: &RunContext,
        _inputs: &[Buffer],
        outputs: &mut [Buffer],
        _timeout_hint: Option<Duration>,
    ) -> Result<()> {
        for ((_, values), output) in self.tensors.iter().zip(outputs.iter_mut()) {
            output.copy_from_typed(values)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    use infergraph_core::memory::MemoryPool;

    fn alloc_outputs(descs: &[TensorDesc]) -> Vec<Buffer> {
        let pool = Arc::new(MemoryPool::unbounded());
        descs
            .iter()
            .map(|d| Buffer::allocate(d.byte_len(), &pool).unwrap())
            .collect()
    }

    #[test]
    fn test_mean_model_reduces_bytes() {
        let model = MeanModel::new();
        let inputs = vec![Buffer::from_vec(vec![10, 20, 30, 40])];

        let descs = model.prepare_outputs(&inputs).unwrap();
        assert_eq!(descs.len(), 1);
        assert_eq!(descs[0].shape.dims(), &[1, 1]);

        let mut outputs = alloc_outputs(&descs);
        model
            .run(&RunContext::default(), &inputs, &mut outputs, None)
            .unwrap();

        assert_eq!(outputs[0].to_typed_vec::<f32>().unwrap(), vec![25.0]);
    }

    #[test]
    fn test_mean_model_rejects_multiple_inputs() {
        let model = MeanModel::new();
        let inputs = vec![Buffer::from_vec(vec![1]), Buffer::from_vec(vec![2])];
        assert!(matches!(
            model.prepare_outputs(&inputs),
            Err(Error::Adapter(_))
        ));
    }

    #[test]
    fn test_init_without_model_path_is_allowed() {
        let mut model = MeanModel::new();
        model.init(&StageConfig::new()).unwrap();
    }

    #[test]
    fn test_init_fails_on_unreadable_model_path() {
        let mut model = MeanModel::new();
        let config = StageConfig::new().with("model_path", "/nonexistent/resnet18.bin");
        assert!(matches!(model.init(&config), Err(Error::Adapter(_))));
    }

    #[test]
    fn test_init_accepts_readable_model_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"weights").unwrap();

        let mut model = MeanModel::new();
        let config = StageConfig::new().with("model_path", file.path().to_str().unwrap());
        model.init(&config).unwrap();
        assert_eq!(model.model_path.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_const_model_replays_tensors_in_order() {
        let model = ConstModel::new(vec![
            (TensorShape::new(vec![2]), vec![1.0, 2.0]),
            (TensorShape::new(vec![1, 3]), vec![4.0, 5.0, 6.0]),
        ])
        .unwrap();

        let inputs = vec![Buffer::from_vec(vec![0])];
        let descs = model.prepare_outputs(&inputs).unwrap();
        assert_eq!(descs[0].shape.dims(), &[2]);
        assert_eq!(descs[1].shape.dims(), &[1, 3]);

        let mut outputs = alloc_outputs(&descs);
        model
            .run(&RunContext::default(), &inputs, &mut outputs, None)
            .unwrap();

        assert_eq!(outputs[0].to_typed_vec::<f32>().unwrap(), vec![1.0, 2.0]);
        assert_eq!(
            outputs[1].to_typed_vec::<f32>().unwrap(),
            vec![4.0, 5.0, 6.0]
        );
    }

    #[test]
    fn test_const_model_rejects_ragged_fixture() {
        assert!(matches!(
            ConstModel::new(vec![(TensorShape::new(vec![3]), vec![1.0])]),
            Err(Error::Config(_))
        ));
    }
}
