// Chart Defaults - Web Server
// REST API for seeding and rebuilding default charts of accounts

use anyhow::{Context, Result};
use tracing::info;

use chart_defaults::api::{router, AppState};
use chart_defaults::logging::init_tracing;
use chart_defaults::{open_database, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();
    init_tracing(&config.log_filter);

    println!("🌐 Chart Defaults - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let conn = open_database(&config).with_context(|| {
        format!("Failed to open database {}", config.database_path.display())
    })?;
    println!("✓ Database opened: {}", config.database_path.display());

    let app = router(AppState::new(conn));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "server listening");
    println!("\n🚀 Server running on http://{}", config.bind_addr);
    println!("   API: http://{}/api/defaults/status", config.bind_addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
