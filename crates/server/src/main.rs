mod api;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use posterbot_core::catalog::Catalog;
use posterbot_core::harvester::Harvester;
use posterbot_core::journal::{stdout_journal, RedactTable};
use posterbot_core::matcher::{run_refresher, TitleIndex};
use posterbot_core::telegram;
use posterbot_core::tmdb::{MovieApi, TmdbClient};
use posterbot_core::{load_config, validate_config, Config};

use api::create_router;
use state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        // The journal may be the thing that failed, so report on stderr.
        eprintln!("fatal: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config_path = std::env::var("POSTERBOT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    let config = load_config(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    validate_config(&config).context("validating config")?;

    // All tracing output drains through the journal, with both secrets
    // blanked before a line can reach stdout.
    let redact = RedactTable::new()
        .hide(&config.themoviedb_key, "<themoviedb_key>")
        .hide(&config.bot_config.telegram_token, "<telegram_token>");
    let (writer, _journal_guard) = stdout_journal(redact);
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(writer))
        .init();

    info!("configuration loaded from {}", config_path.display());

    let registry = prometheus::Registry::new();
    for metric in posterbot_core::metrics::all_metrics() {
        registry.register(metric).context("registering metrics")?;
    }

    // Opening the catalog applies the schema; do it before any task races
    // to use it.
    let bot_catalog = Catalog::open(&config.db_name).context("opening the catalog")?;

    let (shutdown, _) = broadcast::channel(1);

    let tmdb: Arc<dyn MovieApi> = Arc::new(
        TmdbClient::new(
            config.themoviedb_key.clone(),
            &config.harvester.supported_languages,
        )
        .context("building the TMDB client")?,
    );
    tmdb.configure().await.context("initial TMDB configuration")?;

    let harvester = Harvester::new(
        Arc::clone(&tmdb),
        config.db_name.clone(),
        config.harvester.clone(),
    );
    let harvester_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { harvester.run(shutdown).await }
    });

    let titles = Arc::new(TitleIndex::new());
    let refresher_task = tokio::spawn(run_refresher(
        Arc::clone(&titles),
        config.db_name.clone(),
        shutdown.subscribe(),
    ));

    let telegram_client = telegram::Client::new(
        config.bot_config.telegram_token.clone(),
        config.bot_config.telegram_bot_api_address.clone(),
    )
    .context("building the Bot API client")?;

    let webhook_path = format!("/{}", config.bot_config.telegram_token);
    let webhook_url = format!(
        "https://{}:{}{}",
        config.bot_config.webhook_address, config.bot_config.webhook_port, webhook_path
    );
    register_webhook(&telegram_client, &config, &webhook_url).await?;

    let state = Arc::new(AppState::new(
        titles,
        telegram_client,
        bot_catalog,
        registry,
    ));
    let app = create_router(state, &webhook_path);

    let tls = RustlsConfig::from_pem_file(
        &config.bot_config.public_cert,
        &config.bot_config.private_key,
    )
    .await
    .context("loading TLS materials")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.bot_config.webhook_port));
    let handle = axum_server::Handle::new();
    tokio::spawn(watch_signals(shutdown.clone(), handle.clone()));

    info!("webhook server listening on {addr}");
    axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .context("webhook server error")?;

    // The harvester finishes its current transaction before exiting; give
    // it and the refresher the time they need.
    info!("webhook server stopped, waiting for background tasks");
    let _ = harvester_task.await;
    let _ = refresher_task.await;

    info!("application finished");
    Ok(())
}

/// Registers the webhook unless Telegram already points at us with our
/// certificate.
async fn register_webhook(
    client: &telegram::Client,
    config: &Config,
    webhook_url: &str,
) -> Result<()> {
    let current = client
        .get_webhook_info()
        .await
        .context("querying webhook info")?;
    if current.url == webhook_url && current.has_custom_certificate {
        info!("webhook is already set, skipping registration");
        return Ok(());
    }

    let certificate = tokio::fs::read(&config.bot_config.public_cert)
        .await
        .context("reading the public certificate")?;
    client
        .set_webhook(webhook_url, certificate)
        .await
        .context("registering the webhook")?;
    info!("webhook registered");
    Ok(())
}

/// SIGINT/SIGTERM fan out to every task and start the 60 s drain of the
/// webhook listener.
async fn watch_signals(shutdown: broadcast::Sender<()>, handle: axum_server::Handle) {
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("cannot install the SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
    let _ = shutdown.send(());
    handle.graceful_shutdown(Some(Duration::from_secs(60)));
}
