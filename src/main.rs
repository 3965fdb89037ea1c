use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arrowtower::chain::{Minter, RelayMinter};
use arrowtower::store::postgres::PgStore;
use arrowtower::{api, cli, config, jobs, seed, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "arrowtower=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => run_server(cfg, port).await,
        Some(cli::Commands::Mint { wallet }) => run_mint(cfg, &wallet).await,
        Some(cli::Commands::Seed) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            db.migrate().await?;
            seed::run(&db).await
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    tracing::info!("Connecting to database...");
    let db = PgStore::connect(&cfg.database_url).await?;

    tracing::info!("Running migrations...");
    db.migrate().await?;

    let minter: Arc<dyn Minter> = Arc::new(RelayMinter::new(
        &cfg.relay_url,
        cfg.relay_api_key.clone(),
        cfg.relay_timeout_secs,
    ));

    let (queue, receiver) = jobs::mint_worker::MintQueue::new();
    jobs::mint_worker::spawn_worker(
        Arc::new(db.clone()),
        minter.clone(),
        cfg.public_base_url.clone(),
        receiver,
    );

    // Vouchers left over from a previous process go back on the queue before
    // any new traffic can enqueue behind them.
    let recovered = jobs::completion::recover_unfinished(&db, &queue).await?;
    if recovered > 0 {
        tracing::info!(recovered, "startup recovery complete");
    }

    jobs::completion::spawn_sweep(db.clone(), queue.clone(), cfg.sweep_interval_secs);
    tracing::info!(
        interval_secs = cfg.sweep_interval_secs,
        "completion sweep scheduled"
    );

    let state = Arc::new(AppState {
        db,
        queue,
        minter,
        config: cfg,
    });

    let app = axum::Router::new()
        // Health endpoints (no auth)
        .route("/healthz", axum::routing::get(|| async { "ok" }))
        .route("/readyz", axum::routing::get(readiness_check))
        .nest("/api/v1", api::api_router(state.clone()))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Arrow Tower service listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Ready means the database answers; a process with a dead pool should be
/// pulled from rotation even though it is alive.
async fn readiness_check(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Result<&'static str, axum::http::StatusCode> {
    match state.db.ping().await {
        Ok(()) => Ok("ok"),
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed: database unreachable");
            Err(axum::http::StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// Operator mint from the command line, mirroring the server-side worker's
/// chain boundary. Usage: `arrowtower mint --wallet 0x…`
async fn run_mint(cfg: config::Config, wallet: &str) -> anyhow::Result<()> {
    let minter = RelayMinter::new(&cfg.relay_url, cfg.relay_api_key.clone(), cfg.relay_timeout_secs);

    let status = minter.user_status(wallet).await?;
    println!(
        "On-chain status: completed_tour={} minted={}",
        status.completed_tour, status.minted
    );

    let receipt = minter.mint(wallet).await?;
    if receipt.is_noop() {
        println!("User already holds the NFT; no transaction sent.");
    } else {
        println!(
            "Minted.\n  Token ID: {}\n  Tx hash:  {}",
            receipt.token_id, receipt.tx_hash
        );
    }
    Ok(())
}
