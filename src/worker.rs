//! The generation worker owns the loaded model on a dedicated thread and runs
//! one generation at a time, in the order requests arrive. Request handlers
//! never touch the model directly; they enqueue a job and wait for the reply.

use crate::error::{Error, Result};
use crate::generator::{GenerationParams, MeshGenerator};
use crate::mesh::Mesh;
use crate::seed::SeedSource;
use image::RgbaImage;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::thread;
use tokio::sync::{mpsc, oneshot};
use tracing::*;

/// The current status of the worker
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Currently generating a mesh
    Working,

    /// Waiting for a job
    Idle,

    /// The worker thread is gone
    Error,
}

struct Job {
    image: RgbaImage,
    reply: oneshot::Sender<Result<Mesh>>,
}

#[derive(Debug)]
struct Shared {
    status: Mutex<WorkerStatus>,
    queued: AtomicUsize,
    served: AtomicU64,
}

impl Shared {
    fn set_status(&self, status: WorkerStatus) {
        if let Ok(mut s) = self.status.lock() {
            *s = status;
        }
    }
}

/// Handle to the worker thread. Cheap to clone; every clone feeds the same queue.
#[derive(Clone)]
pub struct Worker {
    jobs: mpsc::UnboundedSender<Job>,
    shared: Arc<Shared>,
    backend: Arc<str>,
}

impl Worker {
    /// Start the worker thread and load the model on it with `load`. Blocks
    /// until the model is loaded, and fails if loading fails.
    pub fn spawn<F, S>(load: F, seeds: S) -> anyhow::Result<Self>
    where
        F: FnOnce() -> anyhow::Result<Box<dyn MeshGenerator>> + Send + 'static,
        S: SeedSource + 'static,
    {
        let (jobs, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = std_mpsc::channel();
        let shared = Arc::new(Shared {
            status: Mutex::new(WorkerStatus::Idle),
            queued: AtomicUsize::new(0),
            served: AtomicU64::new(0),
        });

        let thread_shared = shared.clone();
        thread::Builder::new()
            .name("generator".into())
            .spawn(move || {
                let generator = match load() {
                    Ok(generator) => {
                        let _ = ready_tx.send(Ok(generator.name().to_string()));
                        generator
                    }
                    Err(e) => {
                        thread_shared.set_status(WorkerStatus::Error);
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                run(generator, seeds, rx, &thread_shared);
                thread_shared.set_status(WorkerStatus::Error);
            })?;

        let backend = ready_rx
            .recv()
            .map_err(|_| anyhow::anyhow!("generator thread exited while loading the model"))??;
        info!("generation worker ready with the {backend} backend");

        Ok(Worker {
            jobs,
            shared,
            backend: backend.into(),
        })
    }

    /// Queue `image` for generation and wait for its mesh
    pub async fn generate(&self, image: RgbaImage) -> Result<Mesh> {
        let (reply, rx) = oneshot::channel();
        self.shared.queued.fetch_add(1, Ordering::SeqCst);
        if self.jobs.send(Job { image, reply }).is_err() {
            self.shared.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(not_running());
        }
        rx.await.map_err(|_| not_running())?
    }

    pub fn status(&self) -> WorkerStatus {
        if self.jobs.is_closed() {
            return WorkerStatus::Error;
        }
        self.shared
            .status
            .lock()
            .map(|s| *s)
            .unwrap_or(WorkerStatus::Error)
    }

    /// Jobs waiting behind the one in progress
    pub fn queued(&self) -> usize {
        self.shared.queued.load(Ordering::SeqCst)
    }

    /// Jobs finished, successfully or not
    pub fn served(&self) -> u64 {
        self.shared.served.load(Ordering::SeqCst)
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }
}

fn not_running() -> Error {
    Error::Generation("generation worker is not running".into())
}

fn run<S: SeedSource>(
    mut generator: Box<dyn MeshGenerator>,
    mut seeds: S,
    mut jobs: mpsc::UnboundedReceiver<Job>,
    shared: &Shared,
) {
    while let Some(job) = jobs.blocking_recv() {
        shared.queued.fetch_sub(1, Ordering::SeqCst);
        shared.set_status(WorkerStatus::Working);

        let params = GenerationParams::with_seed(seeds.next_seed());
        let (width, height) = job.image.dimensions();
        info!("generating mesh for {width}x{height} image with seed {}", params.seed);

        let result = generate_one(generator.as_mut(), &job.image, &params);
        match &result {
            Ok(mesh) => info!(
                "generated mesh with {} vertices and {} triangles",
                mesh.vertex_count(),
                mesh.triangle_count()
            ),
            Err(e) => warn!("generation failed: {e}"),
        }

        shared.served.fetch_add(1, Ordering::SeqCst);
        shared.set_status(WorkerStatus::Idle);

        if job.reply.send(result).is_err() {
            debug!("client went away before its mesh was ready");
        }
    }
    info!("generation worker shutting down");
}

/// Run the generator once and keep the first candidate
fn generate_one(
    generator: &mut dyn MeshGenerator,
    image: &RgbaImage,
    params: &GenerationParams,
) -> Result<Mesh> {
    let meshes = panic::catch_unwind(AssertUnwindSafe(|| generator.generate(image, params)))
        .map_err(|panic| {
            let msg = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "generator panicked".into());
            Error::Generation(msg)
        })?
        .map_err(Error::generation)?;

    meshes
        .into_iter()
        .next()
        .ok_or_else(|| Error::Generation("pipeline returned no meshes".into()))
}
