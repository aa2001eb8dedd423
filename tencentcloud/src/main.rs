use tencentcloud::TencentCloudProvider;
use tfplug::server::{ProviderServer, ServerConfig};
use tracing_subscriber::EnvFilter;

/// Maps TF_LOG onto a filter, logs only reach stderr since stdout carries the handshake
fn log_filter() -> EnvFilter {
    let level = match std::env::var("TF_LOG")
        .unwrap_or_default()
        .to_uppercase()
        .as_str()
    {
        "TRACE" => "trace",
        "DEBUG" => "debug",
        "WARN" => "warn",
        "ERROR" => "error",
        _ => "info",
    };
    EnvFilter::try_from_env("TENCENTCLOUD_LOG").unwrap_or_else(|_| EnvFilter::new(level))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let provider = TencentCloudProvider::new();
    let server = ProviderServer::new(provider, ServerConfig::from_env());

    server.run().await?;

    Ok(())
}
