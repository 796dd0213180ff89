use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use axum::{routing::get, Router};
use diesel::{Connection, PgConnection};
use diesel_async::{
    pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager},
    AsyncPgConnection,
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::media::MediaStore;

mod engagement;
mod media;
mod models;
mod ranking;
mod routes;
mod schema;
mod slug;
#[cfg(test)]
mod testing;

type State = axum::extract::State<Arc<AppState>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(serde::Serialize, serde::Deserialize, Debug)]
struct AuthConfig {
    header: String,
    #[serde(default)]
    admin: Vec<String>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Default)]
struct DebugConfig {
    #[serde(default)]
    assume_user: Option<String>,
}

fn default_pool_size() -> usize {
    8
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
struct DatabaseConfig {
    url: String,
    #[serde(default = "default_pool_size")]
    pool_size: usize,
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
struct ServerConfig {
    port: u16,
}

fn default_max_upload_mb() -> u32 {
    5
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
struct MediaConfig {
    root: PathBuf,
    #[serde(default = "default_max_upload_mb")]
    max_upload_mb: u32,
}

fn default_per_page() -> i64 {
    12
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
struct PaginationConfig {
    #[serde(default = "default_per_page")]
    per_page: i64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            per_page: default_per_page(),
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug)]
struct Config {
    #[serde(default)]
    debug: DebugConfig,
    auth: AuthConfig,
    database: DatabaseConfig,
    server: ServerConfig,
    media: MediaConfig,
    #[serde(default)]
    pagination: PaginationConfig,
}

struct AppState {
    config: Config,
    db: Pool<AsyncPgConnection>,
    media: MediaStore,
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    toml::from_str(
        &std::fs::read_to_string(path)
            .with_context(|| format!("Could not load the configuration file '{path}'"))?,
    )
    .with_context(|| "Could not parse the configuration file")
}

fn run_migrations(url: &str) -> anyhow::Result<()> {
    let mut conn = PgConnection::establish(url)
        .with_context(|| format!("While connecting to the database at {url}"))?;

    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("Could not run the database migrations: {e}"))?;

    for version in applied {
        tracing::debug!("Applied migration {version}");
    }

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let body_limit = routes::forms::upload_body_limit(state.config.media.max_upload_mb);

    Router::new()
        .route("/", get(routes::index))
        .route("/about", get(routes::about))
        .route("/books", get(routes::books::all_books))
        .route("/books/recommended", get(routes::recommended::recommended))
        .route("/books/mine", get(routes::books::my_books))
        .route("/books/favourites", get(routes::books::favourite_books))
        .route("/books/author/:author", get(routes::books::author_books))
        .route("/books/genre/:genre", get(routes::books::genre_books))
        .route("/books/profile/:name", get(routes::books::profile_books))
        .route(
            "/books/add",
            get(routes::add::add_book).post(routes::add::do_add_book),
        )
        .route("/book/:id/:slug", get(routes::get_book::get_book))
        .route(
            "/book/:id/:slug/edit",
            get(routes::edit::edit_book).post(routes::edit::do_edit_book),
        )
        .route(
            "/book/:id/:slug/delete",
            get(routes::delete::delete_book).post(routes::delete::do_delete_book),
        )
        .route("/profile/:id", get(routes::profile::profile))
        .route(
            "/profile/:id/user",
            get(routes::profile::edit_profile).post(routes::profile::do_edit_profile),
        )
        .route(
            "/profile/:id/delete",
            axum::routing::post(routes::profile::do_delete_profile),
        )
        .route(
            "/profile/:id/save_book",
            axum::routing::post(routes::profile::do_save_book),
        )
        .route(
            "/profile/:id/like_book",
            axum::routing::post(routes::profile::do_like_book),
        )
        .route("/media/*image", get(routes::serve_media::serve_media))
        .layer(body_limit)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args();
    args.next();

    let cfg: Config = if let Some(arg) = args.next() {
        load_config(&arg)?
    } else if let Ok(arg) = std::env::var("BIBLIOTHEQUE_CONFIG") {
        load_config(&arg)?
    } else {
        anyhow::bail!("No configuration was supplied");
    };

    let url = cfg.database.url.clone();
    tokio::task::spawn_blocking(move || run_migrations(&url))
        .await
        .with_context(|| "Migration task panicked")??;

    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&cfg.database.url);
    let db = Pool::builder(manager)
        .max_size(cfg.database.pool_size)
        .build()
        .with_context(|| "Could not create the database pool")?;

    std::fs::create_dir_all(&cfg.media.root).with_context(|| {
        format!(
            "Could not create the media directory {}",
            cfg.media.root.display()
        )
    })?;

    let port = cfg.server.port;
    let media = MediaStore::new(cfg.media.root.clone());

    let state = Arc::new(AppState {
        config: cfg,
        db,
        media,
    });

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .with_context(|| "Could not create TCP Listener")?;

    tracing::info!("Listening on port {port}");

    axum::serve(listener, app).await?;

    Ok(())
}
