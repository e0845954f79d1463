//! image2stl configuration. The generation hyperparameters are fixed at compile
//! time; the listener and the generator backend are read at startup from an
//! optional TOML file and `IMAGE2STL_*` environment variables.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;

/// Default log filter when `RUST_LOG` is unset
pub const RUST_LOG: &str = "info,actix_web=info";

/// Config file looked up (without extension) when none is given on the command line
pub const DEFAULT_CONFIG_FILE: &str = "image2stl";

/// Denoising steps of the flow-matching sampler
pub const NUM_INFERENCE_STEPS: u32 = 5;

/// Resolution of the octree the surface is extracted from
pub const OCTREE_RESOLUTION: u32 = 380;

/// Maximum number of chunks the volume decoder may split the grid into
pub const NUM_CHUNKS: u32 = 20000;

/// Name of the file offered to the client
pub const STL_FILENAME: &str = "model.stl";

/// MIME type of a binary STL
pub const STL_CONTENT_TYPE: &str = "application/vnd.ms-pki.stl";

/// Body of `GET /`
pub const USAGE: &str = "\
image2stl: convert an image into a 3D printable mesh using a pretrained
image-to-shape diffusion model (Hunyuan3D-DiT, mini-turbo).

Endpoints:
  GET  /           - Overview and instructions
  GET  /status     - State of the generation worker
  POST /image2stl  - Accepts JSON { \"image\": <URL, data URL or base64> }
                     and returns the mesh as a binary STL (model.stl)
";

/// Which implementation of the mesh generation capability to load
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Forward requests to a pipeline server hosting the model
    Remote,

    /// Run a TorchScript export of the pipeline in-process
    Torchscript,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Remote => "remote",
            Backend::Torchscript => "torchscript",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,

    /// Number of HTTP worker threads, actix's default when unset
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorSettings {
    pub backend: Backend,

    /// Pipeline endpoint for the remote backend
    pub url: String,

    /// TorchScript file for the torchscript backend
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub generator: GeneratorSettings,
}

impl Settings {
    /// Layer the defaults, the config file and the environment. A file given
    /// explicitly must exist; the default one is optional.
    pub fn load(file: Option<&str>) -> anyhow::Result<Self> {
        Self::load_with_env(file, None)
    }

    /// Like [`Settings::load`], reading variables from `env` instead of the
    /// process environment when given
    pub fn load_with_env(
        file: Option<&str>,
        env: Option<HashMap<String, String>>,
    ) -> anyhow::Result<Self> {
        let (path, required) = match file {
            Some(path) => (path, true),
            None => (DEFAULT_CONFIG_FILE, false),
        };

        let settings = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000_i64)?
            .set_default("generator.backend", "remote")?
            .set_default("generator.url", "http://127.0.0.1:8001/generate")?
            .add_source(File::with_name(path).required(required))
            .add_source(
                Environment::with_prefix("IMAGE2STL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    pub fn bind_addr(&self) -> (String, u16) {
        (self.server.host.clone(), self.server.port)
    }
}
