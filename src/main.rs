use clap::Parser;
use ingreedy::{
    api::{handlers::AppState, routes},
    cli::{commands, Cli, Commands},
    config::Settings,
    db,
    indexer::CorpusHandle,
    store, Error, Result,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ingreedy=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let settings = Settings::from_env()?;
    settings.validate()?;

    match cli.command {
        Commands::Serve { port, host } => {
            serve(settings, port, host).await?;
        }
        Commands::Migrate => {
            migrate(settings).await?;
        }
        Commands::Import { path } => {
            import_recipes(settings, path).await?;
        }
        Commands::Rebuild { export } => {
            rebuild(settings, export).await?;
        }
        Commands::Search {
            ingredients,
            max_results,
        } => {
            search_recipes(settings, ingredients, max_results).await?;
        }
    }

    Ok(())
}

async fn serve(mut settings: Settings, port: Option<u16>, host: Option<String>) -> Result<()> {
    if let Some(port) = port {
        settings.server.port = port;
    }
    if let Some(host) = host {
        settings.server.host = host;
    }

    info!("Starting Ingreedy server");
    info!("Database: {}", settings.database.url);
    info!("Server: {}:{}", settings.server.host, settings.server.port);

    let pool = db::init_pool_with_config(&settings.database).await?;
    info!(
        "Database connection established (max_connections: {}, min_connections: {})",
        settings.database.max_connections, settings.database.min_connections
    );

    db::run_migrations(&pool).await?;
    info!("Database migrations completed");

    // Serve an empty corpus if there is nothing to build from yet; a later
    // POST /api/admin/rebuild picks up imported data.
    let corpus = Arc::new(CorpusHandle::empty(settings.engine.clone()));
    match store::rebuild_corpus(&pool, &corpus, &settings, None).await {
        Ok(summary) => info!(
            "Corpus ready: {} recipes from {} ({} excluded)",
            summary.recipes, summary.source, summary.excluded
        ),
        Err(Error::DataUnavailable(reason)) => {
            warn!("Starting with an empty corpus: {}", reason);
        }
        Err(e) => return Err(e),
    }

    let state = AppState {
        pool,
        corpus,
        settings: settings.clone(),
    };
    let app = routes::create_router(state, &settings);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    println!("\n========================================");
    println!("Ingreedy Recipe Search");
    println!("========================================");
    println!("Address: http://{addr}");
    println!("\nAPI Endpoints:");
    println!("  POST /api/recipes/search");
    println!("  GET  /api/recipes?ingredients=a,b");
    println!("  GET  /api/recipes/random");
    println!("  GET  /api/recipes/:id");
    println!("  GET  /api/recipes/:id/similar");
    println!("  GET  /api/ingredients");
    println!("  GET  /api/stats");
    println!("  POST /api/admin/rebuild");
    println!("\nPress Ctrl+C to stop");
    println!("========================================\n");

    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| Error::Internal(format!("Server error: {e}")))?;

    info!("Shutting down...");
    Ok(())
}

async fn migrate(settings: Settings) -> Result<()> {
    info!("Running database migrations");

    let pool = db::init_pool(&settings.database.url).await?;
    db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed successfully");
    Ok(())
}

async fn import_recipes(settings: Settings, path: PathBuf) -> Result<()> {
    let pool = db::init_pool(&settings.database.url).await?;
    db::run_migrations(&pool).await?;

    let report = commands::import(&pool, &path).await?;
    println!(
        "✓ Imported {} recipes from {} ({} duplicates skipped)",
        report.inserted,
        path.display(),
        report.duplicates
    );
    Ok(())
}

async fn rebuild(settings: Settings, export: Option<PathBuf>) -> Result<()> {
    let pool = db::init_pool(&settings.database.url).await?;
    db::run_migrations(&pool).await?;

    let summary = commands::rebuild(&pool, &settings, export.as_deref()).await?;
    println!(
        "✓ Rebuilt corpus from {}: {} recipes, {} excluded, {} processed rows stored",
        summary.source, summary.recipes, summary.excluded, summary.processed_rows
    );
    if let Some(count) = summary.exported {
        println!("  Exported {count} processed recipes");
    }
    Ok(())
}

async fn search_recipes(
    settings: Settings,
    ingredients: Vec<String>,
    max_results: Option<usize>,
) -> Result<()> {
    let server_url = settings
        .server
        .external_url
        .unwrap_or_else(|| format!("http://{}:{}", settings.server.host, settings.server.port));

    commands::search(&server_url, &ingredients, max_results).await
}
