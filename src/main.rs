use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpServer};
use anyhow::Context;
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use pinmap::cache::InMemoryCache;
use pinmap::config::{AppConfig, NotifyMode};
use pinmap::notify::{InlineOutbox, NotificationOutbox, QueuedOutbox};
use pinmap::openapi::ApiDoc;
use pinmap::repo::Repo;
use pinmap::{config, AppState};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds; production sets the environment externally.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cfg = AppConfig::from_env().context("invalid configuration (see .env.example)")?;
    info!("Bootstrapping pinmap server");
    info!("Frontend URL: {}", cfg.frontend_url);

    let repo = build_repo(&cfg).await?;

    let outbox: Arc<dyn NotificationOutbox> = match cfg.notify_mode {
        NotifyMode::Inline => Arc::new(InlineOutbox::new(repo.clone())),
        NotifyMode::Queued => {
            // worker lives for the whole process; it exits when the last sender drops
            let (outbox, _worker) = QueuedOutbox::spawn(repo.clone());
            Arc::new(outbox)
        }
    };
    info!("Notification delivery: {:?}", cfg.notify_mode);

    let bind_addr = cfg.bind_addr.clone();
    let frontend_url = cfg.frontend_url.clone();
    let state = AppState::new(repo, Arc::new(InMemoryCache::new()), outbox, cfg);

    let openapi = ApiDoc::openapi();
    info!("OpenAPI spec generated");

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            // during local dev allow React/Vite default ports
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://127.0.0.1:5173")
            .allowed_origin(&frontend_url)
            .allow_any_header()
            .allowed_methods(["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .configure(config)
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind(&bind_addr)
    .with_context(|| format!("binding {bind_addr}"))?;

    info!("Listening on http://{bind_addr}");
    server.run().await?;
    Ok(())
}

#[cfg(feature = "postgres-store")]
async fn build_repo(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Repo>> {
    use sqlx::postgres::PgPoolOptions;

    let Some(db_url) = cfg.database_url.as_deref() else {
        return in_memory_repo();
    };
    let pool = PgPoolOptions::new()
        .max_connections(cfg.database_max_connections)
        .connect(db_url)
        .await
        .context("connecting to DATABASE_URL")?;
    sqlx::migrate!("./migrations").run(&pool).await.context("running migrations")?;
    info!("Using Postgres repository backend");
    Ok(Arc::new(pinmap::repo::pg::PgRepo::new(pool)))
}

#[cfg(not(feature = "postgres-store"))]
async fn build_repo(_cfg: &AppConfig) -> anyhow::Result<Arc<dyn Repo>> {
    in_memory_repo()
}

#[cfg(feature = "inmem-store")]
fn in_memory_repo() -> anyhow::Result<Arc<dyn Repo>> {
    info!("Using in-memory repository backend");
    Ok(Arc::new(pinmap::repo::inmem::InMemRepo::new()))
}

#[cfg(not(feature = "inmem-store"))]
fn in_memory_repo() -> anyhow::Result<Arc<dyn Repo>> {
    anyhow::bail!("DATABASE_URL is not set and the in-memory store is not compiled in")
}
