//! Backend that forwards generation to a pipeline server hosting the model.
//!
//! The server receives `POST <url>` with
//! `{"image": <base64 png>, "seed", "num_inference_steps", "octree_resolution",
//! "num_chunks", "output_type"}` and answers
//! `{"meshes": [{"vertices": [[x, y, z], ..], "faces": [[a, b, c], ..]}, ..]}`.

use super::{GenerationParams, MeshGenerator};
use crate::mesh::Mesh;
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use image::{ImageOutputFormat, RgbaImage};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::debug;

#[derive(Serialize)]
struct PipelineRequest<'a> {
    image: String,
    #[serde(flatten)]
    params: &'a GenerationParams,
}

#[derive(Deserialize)]
struct PipelineResponse {
    meshes: Vec<Mesh>,
}

#[derive(Debug)]
pub struct RemoteGenerator {
    client: Client,
    url: String,
}

impl RemoteGenerator {
    /// Build the client. Must not be called from inside an async runtime.
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::builder()
            // generation takes as long as it takes
            .timeout(None)
            .build()
            .context("building pipeline client")?;
        Ok(RemoteGenerator {
            client,
            url: url.to_string(),
        })
    }
}

impl MeshGenerator for RemoteGenerator {
    fn name(&self) -> &str {
        "remote"
    }

    fn generate(&mut self, image: &RgbaImage, params: &GenerationParams) -> Result<Vec<Mesh>> {
        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
            .context("encoding image for the pipeline")?;

        let req = PipelineRequest {
            image: general_purpose::STANDARD.encode(png),
            params,
        };

        debug!("posting generation request to {}", self.url);
        let res = self.client.post(&self.url).json(&req).send()?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().unwrap_or_default();
            return Err(anyhow!("pipeline answered {status}: {}", body.trim()));
        }

        let res: PipelineResponse = res.json().context("reading pipeline response")?;
        Ok(res.meshes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test::{serve, test_image};
    use serde_json::{json, Value};

    #[test]
    fn test_generate() {
        let body = json!({
            "meshes": [
                {"vertices": [[0, 0, 0], [1, 0, 0], [0, 1, 0]], "faces": [[0, 1, 2]]},
                {"vertices": [], "faces": []}
            ]
        });
        let (url, request) = serve("200 OK", "application/json", body.to_string().into_bytes());

        let mut generator = RemoteGenerator::new(&url).unwrap();
        let meshes = generator
            .generate(&test_image(), &GenerationParams::with_seed(1234))
            .unwrap();

        assert_eq!(meshes.len(), 2);
        assert_eq!(meshes[0].faces, vec![[0, 1, 2]]);
        assert_eq!(meshes[0].vertices[1], [1.0, 0.0, 0.0]);

        let sent: Value = serde_json::from_slice(&request.join().unwrap()).unwrap();
        assert_eq!(sent["seed"], 1234);
        assert_eq!(sent["num_inference_steps"], 5);
        assert_eq!(sent["octree_resolution"], 380);
        assert_eq!(sent["num_chunks"], 20000);
        assert_eq!(sent["output_type"], "trimesh");

        let png = general_purpose::STANDARD
            .decode(sent["image"].as_str().unwrap())
            .unwrap();
        let echoed = image::load_from_memory(&png).unwrap().into_rgba8();
        assert_eq!(echoed, test_image());
    }

    #[test]
    fn test_pipeline_error() {
        let (url, _) = serve(
            "500 Internal Server Error",
            "text/plain",
            b"CUDA out of memory\n".to_vec(),
        );
        let mut generator = RemoteGenerator::new(&url).unwrap();
        let err = generator
            .generate(&test_image(), &GenerationParams::with_seed(0))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "pipeline answered 500 Internal Server Error: CUDA out of memory"
        );
    }

    #[test]
    fn test_bad_response() {
        let (url, _) = serve("200 OK", "application/json", b"{\"mesh\": 1}".to_vec());
        let mut generator = RemoteGenerator::new(&url).unwrap();
        let err = generator
            .generate(&test_image(), &GenerationParams::with_seed(0))
            .unwrap_err();
        assert!(format!("{err:#}").starts_with("reading pipeline response"));
    }
}
