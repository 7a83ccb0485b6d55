use anyhow::{Result, bail};
use candle_core::utils::{cuda_is_available, metal_is_available};
use candle_core::{DType, Device};
use serde_json::Value;
use std::fs::File;
use std::path::{Path, PathBuf};

#[allow(unused_imports)]
use tracing::{debug, info, warn};

pub(crate) fn device() -> Result<Device> {
    if cuda_is_available() {
        info!("Running on CUDA device");
        Ok(Device::new_cuda(0)?)
    } else if metal_is_available() {
        info!("Running on Metal device");
        Ok(Device::new_metal(0)?)
    } else {
        info!("Running on CPU");
        Ok(Device::Cpu)
    }
}

pub(crate) fn parse_dtype(dtype: &Option<String>, default: DType) -> Result<DType> {
    match dtype.as_deref() {
        Some("f16") => Ok(DType::F16),
        Some("bf16") => Ok(DType::BF16),
        Some("f32") => Ok(DType::F32),
        Some(dtype) => bail!("Unsupported dtype {dtype}"),
        None => Ok(default),
    }
}

/// Finds the safetensors files for a checkpoint: a sharded layout via
/// `model.safetensors.index.json`, or a single `model.safetensors`.
pub(crate) fn load_safetensor_model_files(model_path: &Path) -> Result<Vec<PathBuf>> {
    let index_path = model_path.join("model.safetensors.index.json");
    if !index_path.exists() {
        let single = model_path.join("model.safetensors");
        if single.exists() {
            return Ok(vec![single]);
        }
        bail!(
            "No model.safetensors or model.safetensors.index.json in {}",
            model_path.display()
        );
    }

    let model_index_file = File::open(&index_path)?;
    let model_index_json: Value = serde_json::from_reader(&model_index_file)?;
    let model_weight_map = match model_index_json.get("weight_map") {
        None => bail!("no weight map in {}", index_path.display()),
        Some(Value::Object(map)) => map,
        Some(_) => bail!("weight map in {} is not a map", index_path.display()),
    };

    let mut safetensors_files = std::collections::HashSet::new();
    for value in model_weight_map.values() {
        if let Some(file) = value.as_str() {
            safetensors_files.insert(file.to_string());
        }
    }

    let safetensors_files: Vec<_> = safetensors_files
        .iter()
        .map(|v| model_path.join(v))
        .collect();

    Ok(safetensors_files)
}

/// Fails with a useful message when the configured weights directory is
/// missing or not a directory.
pub(crate) fn check_model_dir(model_dir: &Path) -> Result<()> {
    if !model_dir.exists() {
        bail!("Model directory does not exist: {}", model_dir.display());
    } else if !model_dir.is_dir() {
        bail!("Model path is not a directory: {}", model_dir.display());
    }
    Ok(())
}
