use std::sync::Arc;

use {
    async_trait::async_trait,
    clap::Parser,
    sqlx::sqlite::SqlitePoolOptions,
    tracing::info,
    tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter},
};

use {
    sango_common::mask_msisdn,
    sango_gateway::{build_app, Gateway, GatewayConfig},
    sango_outbound::{ReplyPayload, ReplySink, SendError},
    sango_router::DomainRegistry,
};

#[derive(Parser)]
#[command(name = "sango", about = "Conversational routing gateway")]
struct Cli {
    /// Address to bind to.
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8780)]
    port: u16,

    /// SQLite database URL.
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://sango.db?mode=rwc")]
    database_url: String,

    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

/// Stand-in send adapter: logs validated outbound payloads instead of
/// delivering them. Real deployments plug a transport client in here.
struct LogSink;

#[async_trait]
impl ReplySink for LogSink {
    async fn send(&self, recipient: &str, payload: ReplyPayload) -> Result<(), SendError> {
        info!(
            recipient = %mask_msisdn(recipient),
            payload = %serde_json::to_string(&payload).unwrap_or_default(),
            "outbound reply"
        );
        Ok(())
    }
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "sango starting");

    let config = GatewayConfig::load(cli.config.as_deref())?;
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&cli.database_url)
        .await?;
    sango_store::run_migrations(&pool).await?;

    // Domain handlers plug in here at startup.
    let registry = DomainRegistry::new();

    let gateway = Arc::new(Gateway::new(pool, config, registry, Arc::new(LogSink))?);
    let app = build_app(Arc::clone(&gateway));

    let sweeper = Arc::clone(&gateway);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            let swept = sweeper.sweep_rate_limiter();
            if swept > 0 {
                tracing::debug!(swept, "rate limiter keys swept");
            }
        }
    });

    let addr = format!("{}:{}", cli.bind, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
