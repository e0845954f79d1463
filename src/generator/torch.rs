//! Backend running a TorchScript export of the pipeline in-process.
//!
//! The exported module is called as
//! `forward(image, num_inference_steps, octree_resolution, num_chunks)` where
//! `image` is a `[1, 4, H, W]` float tensor in `[0, 1]`, and returns a list of
//! `(vertices [N, 3] float, faces [M, 3] int)` tuples.

use super::{GenerationParams, MeshGenerator};
use crate::mesh::Mesh;
use anyhow::{anyhow, Result};
use image::RgbaImage;
use tch::{no_grad, Device, IValue, Kind, Tensor};
use tracing::info;

#[derive(Debug)]
pub struct TorchScriptGenerator {
    model: tch::CModule,
    device: Device,
}

impl TorchScriptGenerator {
    pub fn new(filename: &str) -> Result<Self> {
        let device = Device::cuda_if_available();
        let mut model = tch::CModule::load_on_device(filename, device)?;
        model.set_eval();
        info!("loaded TorchScript pipeline {filename} on {device:?}");
        Ok(TorchScriptGenerator { model, device })
    }

    fn image_tensor(&self, image: &RgbaImage) -> Tensor {
        let (width, height) = image.dimensions();
        let img = Tensor::from_slice(image.as_raw())
            .view([height as i64, width as i64, 4])
            .permute([2, 0, 1])
            .unsqueeze(0)
            .to_kind(Kind::Float)
            .to_device(self.device);
        img / 255.
    }
}

impl MeshGenerator for TorchScriptGenerator {
    fn name(&self) -> &str {
        "torchscript"
    }

    fn generate(&mut self, image: &RgbaImage, params: &GenerationParams) -> Result<Vec<Mesh>> {
        tch::manual_seed(params.seed as i64);

        let inputs = [
            IValue::Tensor(self.image_tensor(image)),
            IValue::Int(params.num_inference_steps as i64),
            IValue::Int(params.octree_resolution as i64),
            IValue::Int(params.num_chunks as i64),
        ];
        let output = no_grad(|| self.model.forward_is(&inputs))?;

        match output {
            IValue::GenericList(items) | IValue::Tuple(items) => {
                items.into_iter().map(mesh_from_ivalue).collect()
            }
            _ => Err(anyhow!("pipeline did not return a list of meshes")),
        }
    }
}

fn mesh_from_ivalue(value: IValue) -> Result<Mesh> {
    let (vertices, faces) = match value {
        IValue::Tuple(mut parts) if parts.len() == 2 => {
            let faces = parts.pop();
            let vertices = parts.pop();
            match (vertices, faces) {
                (Some(IValue::Tensor(v)), Some(IValue::Tensor(f))) => (v, f),
                _ => return Err(anyhow!("mesh tuple must hold two tensors")),
            }
        }
        _ => return Err(anyhow!("expected a (vertices, faces) tuple")),
    };

    let vertices = triples::<f32>(&vertices.to_kind(Kind::Float), "vertices")?;
    let faces = triples::<i64>(&faces.to_kind(Kind::Int64), "faces")?
        .into_iter()
        .map(|[a, b, c]| Ok([u32::try_from(a)?, u32::try_from(b)?, u32::try_from(c)?]))
        .collect::<Result<Vec<_>>>()?;

    Ok(Mesh::new(vertices, faces))
}

/// Read an `[N, 3]` tensor into rows
fn triples<T: tch::kind::Element + Copy>(t: &Tensor, what: &str) -> Result<Vec<[T; 3]>> {
    let size = t.size();
    if size.len() != 2 || size[1] != 3 {
        return Err(anyhow!("{what} must have shape [N, 3], got {size:?}"));
    }
    let flat = t.to_device(Device::Cpu).contiguous().view([-1]);
    let data = Vec::<T>::try_from(&flat)?;
    Ok(data.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertices() -> Tensor {
        Tensor::from_slice(&[0f32, 0., 0., 1., 0., 0., 0., 1., 0.]).view([-1, 3])
    }

    fn mesh_value(vertices: Tensor, faces: Tensor) -> IValue {
        IValue::Tuple(vec![IValue::Tensor(vertices), IValue::Tensor(faces)])
    }

    #[test]
    fn test_tuple_to_mesh() {
        let faces = Tensor::from_slice(&[0i64, 1, 2]).view([-1, 3]);
        let mesh = mesh_from_ivalue(mesh_value(vertices(), faces)).unwrap();
        assert_eq!(mesh.vertices, vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        assert_eq!(mesh.faces, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_wrong_shape() {
        let flat = Tensor::from_slice(&[0f32, 0., 1., 0.]).view([-1, 2]);
        let faces = Tensor::from_slice(&[0i64, 1, 2]).view([-1, 3]);
        let err = mesh_from_ivalue(mesh_value(flat, faces)).unwrap_err();
        assert!(err.to_string().starts_with("vertices must have shape [N, 3]"));
    }

    #[test]
    fn test_negative_face_index() {
        let faces = Tensor::from_slice(&[0i64, -1, 2]).view([-1, 3]);
        assert!(mesh_from_ivalue(mesh_value(vertices(), faces)).is_err());
    }

    #[test]
    fn test_not_a_tuple() {
        let err = mesh_from_ivalue(IValue::Int(3)).unwrap_err();
        assert_eq!(err.to_string(), "expected a (vertices, faces) tuple");

        let one = IValue::Tuple(vec![IValue::Tensor(vertices())]);
        assert!(mesh_from_ivalue(one).is_err());
    }
}
