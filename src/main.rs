use actix_web::{middleware, web, App, HttpServer};
use image2stl::config::{Settings, RUST_LOG};
use image2stl::generator;
use image2stl::seed::ClockSeed;
use image2stl::server::{self, AppState};
use image2stl::worker::Worker;
use std::{env, process};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: ./image2stl [config file]";

fn get_args() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    match args.len() {
        1 => None,
        2 if args[1] != "-h" && args[1] != "--help" => Some(args[1].clone()),
        _ => {
            println!("{USAGE}");
            process::exit(1);
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(RUST_LOG)),
        )
        .init();

    let settings = Settings::load(get_args().as_deref())?;
    info!(
        "loading the {} generator backend",
        settings.generator.backend.name()
    );

    // The model is loaded once, on the thread that will own it
    let generator_settings = settings.generator.clone();
    let worker = Worker::spawn(move || generator::load(&generator_settings), ClockSeed)?;
    let state = web::Data::new(AppState::new(worker));

    let (host, port) = settings.bind_addr();
    info!("listening on {host}:{port}");

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(server::cors())
            .wrap(middleware::Logger::default())
            .configure(server::configure)
    });
    if let Some(workers) = settings.server.workers {
        server = server.workers(workers);
    }

    server.bind((host, port))?.run().await?;
    Ok(())
}
