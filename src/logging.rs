use tracing_subscriber::EnvFilter;

use crate::config::ServerSettings;

pub fn init(settings: &ServerSettings) {
    let filter = build_filter(std::env::var("RUST_LOG").ok(), &settings.log_level);

    if settings.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn build_filter(rust_log: Option<String>, log_level: &str) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(log_level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}
