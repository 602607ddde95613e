mod app;
mod panels;

use app::LlamaChatApp;
use eframe::egui;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> eframe::Result<()> {
    // File log in the temp dir alongside stdout
    let file_appender = tracing_appender::rolling::never(std::env::temp_dir(), "llamachat.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("llamachat_services=debug,llamachat_gui=info")
        }))
        .with(fmt::layer().with_writer(std::io::stdout))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    tracing::info!("LlamaChat starting");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 700.0])
            .with_min_inner_size([600.0, 400.0])
            .with_title("LlamaChat"),
        ..Default::default()
    };

    eframe::run_native(
        "LlamaChat",
        options,
        Box::new(|cc| Ok(Box::new(LlamaChatApp::new(cc)?))),
    )
}
