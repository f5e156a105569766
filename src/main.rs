mod app;
mod backend;
mod clipboard;
mod commands;
mod config;
mod history;
mod journal;
mod logging;
mod recording;
mod ui;

#[tokio::main]
async fn main() {
    if let Err(e) = app::run().await {
        tracing::error!("{e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
