pub mod config;
pub mod decode;
pub mod error;
pub mod export;
pub mod generator;
pub mod mesh;
pub mod seed;
pub mod server;
pub mod worker;

pub use error::{Error, Result};

/// Shared test fixtures
#[cfg(test)]
pub(crate) mod util {
    pub mod test {
        use crate::generator::{GenerationParams, MeshGenerator};
        use crate::mesh::Mesh;
        use base64::{engine::general_purpose, Engine as _};
        use image::{ImageOutputFormat, Rgba, RgbaImage};
        use std::io::{BufRead, BufReader, Read, Write};
        use std::net::TcpListener;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::{Arc, Mutex};
        use std::thread::{self, JoinHandle};
        use std::time::Duration;

        /// A small RGBA image with a translucent corner
        pub fn test_image() -> RgbaImage {
            let mut img = RgbaImage::from_pixel(8, 6, Rgba([200, 40, 40, 255]));
            img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
            img.put_pixel(7, 5, Rgba([10, 250, 10, 128]));
            img
        }

        pub fn png_bytes() -> Vec<u8> {
            let mut png = Vec::new();
            test_image()
                .write_to(&mut std::io::Cursor::new(&mut png), ImageOutputFormat::Png)
                .unwrap();
            png
        }

        pub fn png_base64() -> String {
            general_purpose::STANDARD.encode(png_bytes())
        }

        /// Answer exactly one HTTP request on a local port with `status` and
        /// `body`. Returns the URL and a handle yielding the request body.
        pub fn serve(status: &str, content_type: &str, body: Vec<u8>) -> (String, JoinHandle<Vec<u8>>) {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let url = format!("http://{}/generate", listener.local_addr().unwrap());
            let head = format!(
                "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );

            let handle = thread::spawn(move || {
                let (stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream);
                let mut content_length = 0;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        if name.eq_ignore_ascii_case("content-length") {
                            content_length = value.trim().parse().unwrap();
                        }
                    }
                }
                let mut request = vec![0; content_length];
                reader.read_exact(&mut request).unwrap();

                let mut stream = reader.into_inner();
                stream.write_all(head.as_bytes()).unwrap();
                stream.write_all(&body).unwrap();
                stream.flush().unwrap();
                request
            });

            (url, handle)
        }

        pub fn serve_once(status: &str, body: Vec<u8>) -> String {
            serve(status, "application/octet-stream", body).0
        }

        /// Generator returning canned meshes
        pub struct StubGenerator {
            meshes: Vec<Mesh>,
            fail: Option<String>,
            panic: bool,
            delay: Duration,
            active: Arc<AtomicUsize>,
            pub seeds: Arc<Mutex<Vec<u32>>>,
            pub max_active: Arc<AtomicUsize>,
        }

        impl StubGenerator {
            pub fn new(meshes: Vec<Mesh>) -> Self {
                StubGenerator {
                    meshes,
                    fail: None,
                    panic: false,
                    delay: Duration::ZERO,
                    active: Arc::new(AtomicUsize::new(0)),
                    seeds: Arc::new(Mutex::new(Vec::new())),
                    max_active: Arc::new(AtomicUsize::new(0)),
                }
            }

            pub fn failing(msg: &str) -> Self {
                StubGenerator {
                    fail: Some(msg.to_string()),
                    ..Self::new(vec![])
                }
            }

            pub fn panicking() -> Self {
                StubGenerator {
                    panic: true,
                    ..Self::new(vec![])
                }
            }

            pub fn with_delay(mut self, millis: u64) -> Self {
                self.delay = Duration::from_millis(millis);
                self
            }
        }

        impl MeshGenerator for StubGenerator {
            fn name(&self) -> &str {
                "stub"
            }

            fn generate(
                &mut self,
                _image: &RgbaImage,
                params: &GenerationParams,
            ) -> anyhow::Result<Vec<Mesh>> {
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_active.fetch_max(now, Ordering::SeqCst);
                self.seeds.lock().unwrap().push(params.seed);
                thread::sleep(self.delay);
                self.active.fetch_sub(1, Ordering::SeqCst);

                if self.panic {
                    panic!("tensor shape mismatch");
                }
                match &self.fail {
                    Some(msg) => Err(anyhow::anyhow!("{msg}")),
                    None => Ok(self.meshes.clone()),
                }
            }
        }
    }
}
