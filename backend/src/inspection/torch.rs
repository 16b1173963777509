use std::path::Path;

use ndarray::Array2;
use tch::nn::ModuleT;
use tch::{CModule, Device, Kind, Tensor};

use super::classifier::{Classifier, ClassifierError};
use super::normalizer::{INPUT_SHAPE, NormalizedTensor};

/// TorchScript classifier taking channels-last `1x150x150x3` input.
pub struct TorchClassifier {
    model: CModule,
    device: Device,
}

impl TorchClassifier {
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let device = Device::cuda_if_available();
        let model = CModule::load_on_device(path, device).map_err(|e| ClassifierError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        log::info!("TorchScript model loaded from {} on {:?}", path.display(), device);
        Ok(Self { model, device })
    }
}

impl Classifier for TorchClassifier {
    fn forward(&mut self, input: &NormalizedTensor) -> Result<Array2<f32>, ClassifierError> {
        let tensor = input_tensor(input).to_device(self.device);
        let output = tch::no_grad(|| self.model.forward_t(&tensor, false));
        output_matrix(&output)
    }
}

/// NHWC float tensor on the CPU, same layout as the normalizer output.
fn input_tensor(input: &NormalizedTensor) -> Tensor {
    let shape: Vec<i64> = INPUT_SHAPE.iter().map(|&d| d as i64).collect();
    Tensor::from_slice(&input.to_vec()).view(shape.as_slice())
}

/// Copies model output into a `rows x classes` matrix. A bare `[classes]`
/// vector is read as a single row.
fn output_matrix(output: &Tensor) -> Result<Array2<f32>, ClassifierError> {
    let (rows, cols) = match output.size().as_slice() {
        &[rows, cols] => (rows as usize, cols as usize),
        &[cols] => (1, cols as usize),
        other => {
            return Err(ClassifierError::Backend(format!(
                "unexpected output shape {:?}",
                other
            )));
        }
    };

    let flat = output.to_kind(Kind::Float).to_device(Device::Cpu).view([-1]);
    let mut scores = vec![0.0f32; rows * cols];
    flat.copy_data(&mut scores, rows * cols);

    Array2::from_shape_vec((rows, cols), scores)
        .map_err(|e| ClassifierError::Backend(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array4, arr2};

    #[test]
    fn input_is_channels_last() {
        let mut values = Array4::<f32>::zeros(INPUT_SHAPE);
        values[[0, 2, 7, 1]] = 0.5;
        values[[0, 149, 0, 2]] = 1.0;
        let tensor = input_tensor(&NormalizedTensor::from_array(values).unwrap());

        assert_eq!(tensor.size(), vec![1, 150, 150, 3]);
        assert_eq!(tensor.kind(), Kind::Float);
        assert_eq!(tensor.double_value(&[0, 2, 7, 1]), 0.5);
        assert_eq!(tensor.double_value(&[0, 149, 0, 2]), 1.0);
        assert_eq!(tensor.double_value(&[0, 7, 2, 1]), 0.0);
    }

    #[test]
    fn reads_batch_by_class_output() {
        let output = Tensor::from_slice(&[0.1f32, 0.6, 0.3]).view([1, 3]);
        assert_eq!(output_matrix(&output).unwrap(), arr2(&[[0.1f32, 0.6, 0.3]]));
    }

    #[test]
    fn reads_flat_output_as_one_row() {
        let output = Tensor::from_slice(&[0.25f64, 0.75]);
        assert_eq!(output_matrix(&output).unwrap(), arr2(&[[0.25f32, 0.75]]));
    }

    #[test]
    fn rejects_higher_rank_output() {
        let output = Tensor::from_slice(&[0.0f32; 8]).view([2, 2, 2]);
        match output_matrix(&output) {
            Err(ClassifierError::Backend(msg)) => assert!(msg.contains("[2, 2, 2]"), "{}", msg),
            other => panic!("unexpected {:?}", other),
        }
    }
}
