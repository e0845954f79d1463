//! The mesh generation capability. The image-to-shape pipeline is a pretrained
//! model we only call into; each backend here is one way of reaching it.

use crate::config::{Backend, GeneratorSettings, NUM_CHUNKS, NUM_INFERENCE_STEPS, OCTREE_RESOLUTION};
use crate::mesh::Mesh;
use anyhow::{anyhow, Result};
use image::RgbaImage;
use serde::Serialize;

pub mod remote;
#[cfg(feature = "torch")]
pub mod torch;

/// Representation the pipeline should return its meshes in
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    Trimesh,
}

/// Everything passed to the pipeline besides the image
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct GenerationParams {
    pub num_inference_steps: u32,
    pub octree_resolution: u32,
    pub num_chunks: u32,
    pub output_type: OutputType,
    pub seed: u32,
}

impl GenerationParams {
    /// The fixed hyperparameters with the given seed
    pub fn with_seed(seed: u32) -> Self {
        GenerationParams {
            num_inference_steps: NUM_INFERENCE_STEPS,
            octree_resolution: OCTREE_RESOLUTION,
            num_chunks: NUM_CHUNKS,
            output_type: OutputType::Trimesh,
            seed,
        }
    }
}

/// A loaded image-to-mesh model. Implementations are not assumed to be
/// thread safe: the worker owns exactly one and calls it from one thread.
pub trait MeshGenerator: Send {
    fn name(&self) -> &str;

    /// Run the pipeline once. May return several candidate meshes.
    fn generate(&mut self, image: &RgbaImage, params: &GenerationParams) -> Result<Vec<Mesh>>;
}

/// Load the backend selected in the settings. Blocking; call it on the
/// thread that will own the generator.
pub fn load(settings: &GeneratorSettings) -> Result<Box<dyn MeshGenerator>> {
    match settings.backend {
        Backend::Remote => Ok(Box::new(remote::RemoteGenerator::new(&settings.url)?)),
        Backend::Torchscript => load_torchscript(settings),
    }
}

#[cfg(feature = "torch")]
fn load_torchscript(settings: &GeneratorSettings) -> Result<Box<dyn MeshGenerator>> {
    let model = settings
        .model
        .as_deref()
        .ok_or_else(|| anyhow!("generator.model must name a TorchScript file"))?;
    Ok(Box::new(torch::TorchScriptGenerator::new(model)?))
}

#[cfg(not(feature = "torch"))]
fn load_torchscript(_settings: &GeneratorSettings) -> Result<Box<dyn MeshGenerator>> {
    Err(anyhow!(
        "the torchscript backend needs image2stl built with the `torch` feature"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_params() {
        let params = GenerationParams::with_seed(7);
        assert_eq!(params.num_inference_steps, 5);
        assert_eq!(params.octree_resolution, 380);
        assert_eq!(params.num_chunks, 20000);
        assert_eq!(params.seed, 7);

        let json = serde_json::to_value(params).unwrap();
        assert_eq!(json["output_type"], "trimesh");
    }

    #[cfg(not(feature = "torch"))]
    #[test]
    fn test_torchscript_needs_feature() {
        let settings = GeneratorSettings {
            backend: Backend::Torchscript,
            url: String::new(),
            model: Some("pipeline.pt".into()),
        };
        let err = load(&settings).err().unwrap();
        assert!(err.to_string().contains("`torch` feature"));
    }
}
