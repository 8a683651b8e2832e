use candle_core::Device;

use crate::error::EvalError;

/// Device the vocoder runs on, chosen once and handed to the model at load.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    device: Device,
}

impl ExecutionContext {
    pub fn cpu() -> Self {
        Self {
            device: Device::Cpu,
        }
    }

    /// Accepts `cpu`, `cuda`, `metal` or `auto` (first CUDA device when
    /// available, CPU otherwise).
    pub fn from_label(label: &str) -> Result<Self, EvalError> {
        let device = match label.trim().to_ascii_lowercase().as_str() {
            "cpu" | "" => Device::Cpu,
            "cuda" => Device::new_cuda(0).map_err(|e| EvalError::runtime("CUDA init", e))?,
            "metal" => Device::new_metal(0).map_err(|e| EvalError::runtime("Metal init", e))?,
            "auto" => Device::cuda_if_available(0)
                .map_err(|e| EvalError::runtime("device auto-selection", e))?,
            other => {
                return Err(EvalError::configuration(format!(
                    "unknown device '{other}', expected cpu, cuda, metal or auto"
                )))
            }
        };
        Ok(Self { device })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn label(&self) -> String {
        if self.device.is_cuda() {
            "cuda".to_string()
        } else if self.device.is_metal() {
            "metal".to_string()
        } else {
            "cpu".to_string()
        }
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::cpu()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_labels() {
        assert_eq!(ExecutionContext::cpu().label(), "cpu");
        assert_eq!(ExecutionContext::from_label("CPU").unwrap().label(), "cpu");
    }

    #[test]
    fn unknown_device_is_configuration_error() {
        let err = ExecutionContext::from_label("tpu").unwrap_err();
        assert!(matches!(err, EvalError::Configuration { .. }));
    }

    #[test]
    fn auto_always_resolves() {
        assert!(ExecutionContext::from_label("auto").is_ok());
    }
}
