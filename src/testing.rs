//! Helpers for tests that go through multipart forms or a real database.
//!
//! Database tests run against an embedded PostgreSQL cluster. When the cluster
//! cannot be started they are skipped, unless `REQUIRE_TEST_CLUSTER=1`.

use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
};

use axum::{
    body::Body,
    extract::{FromRequest, Multipart},
    http::{header, Request},
};
use diesel::prelude::*;
use diesel_async::{
    pooled_connection::{deadpool::Pool, AsyncDieselConnectionManager},
    AsyncPgConnection, RunQueryDsl,
};
use pg_embedded_setup_unpriv::{TemporaryDatabase, TestCluster};
use tokio::runtime::Runtime;
use uuid::Uuid;

use crate::{
    media::MediaStore,
    models::{BookPreview, NewBook, NewUser, User},
    schema::{book, users},
    slug::book_slug,
    AppState, AuthConfig, Config, DatabaseConfig, DebugConfig, MediaConfig, PaginationConfig,
    ServerConfig,
};

pub const BOUNDARY: &str = "bibliotheque-test-boundary";

pub const ADMIN: &str = "admin";

pub fn multipart_body(fields: &[(&str, &str)], image: Option<&[u8]>) -> Vec<u8> {
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }

    if let Some(image) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"cover.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(image);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(body.into())
        .unwrap()
}

pub async fn multipart(fields: &[(&str, &str)], image: Option<&[u8]>) -> Multipart {
    let request = multipart_request("/", multipart_body(fields, image));
    Multipart::from_request(request, &()).await.unwrap()
}

static CLUSTER_LOCK: Mutex<()> = Mutex::new(());

pub struct TestDatabase {
    pub pool: Pool<AsyncPgConnection>,
    pub runtime: Runtime,
    _database: TemporaryDatabase,
    _cluster: TestCluster,
    _guard: MutexGuard<'static, ()>,
}

/// Starts a cluster with a freshly migrated database, or `None` if the test
/// should be skipped.
pub fn test_database(pool_size: usize) -> Option<TestDatabase> {
    // One cluster at a time, they share the installation directory
    let guard = CLUSTER_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    match start_database(pool_size, guard) {
        Ok(database) => Some(database),
        Err(reason) => {
            if std::env::var("REQUIRE_TEST_CLUSTER").as_deref() == Ok("1") {
                panic!("Test cluster setup failed: {reason}");
            }
            eprintln!("SKIP-TEST-CLUSTER: {reason}");
            None
        }
    }
}

fn start_database(
    pool_size: usize,
    guard: MutexGuard<'static, ()>,
) -> Result<TestDatabase, String> {
    let runtime = Runtime::new().map_err(|e| e.to_string())?;

    let cluster = TestCluster::new().map_err(|e| format!("start cluster: {e:?}"))?;
    let name = format!("test_{}", Uuid::new_v4().simple());
    let database = cluster
        .temporary_database(name.as_str())
        .map_err(|e| format!("create database: {e:?}"))?;

    crate::run_migrations(database.url()).map_err(|e| format!("{e:#}"))?;

    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database.url());
    let pool = Pool::builder(manager)
        .max_size(pool_size)
        .build()
        .map_err(|e| e.to_string())?;

    Ok(TestDatabase {
        pool,
        runtime,
        _database: database,
        _cluster: cluster,
        _guard: guard,
    })
}

impl TestDatabase {
    pub fn app_state(&self, media_root: &Path) -> Arc<AppState> {
        Arc::new(AppState {
            config: Config {
                debug: DebugConfig::default(),
                auth: AuthConfig {
                    header: "Remote-User".into(),
                    admin: vec![ADMIN.into()],
                },
                database: DatabaseConfig {
                    url: String::new(),
                    pool_size: self.pool.status().max_size,
                },
                server: ServerConfig { port: 0 },
                media: MediaConfig {
                    root: media_root.to_owned(),
                    max_upload_mb: 5,
                },
                pagination: PaginationConfig::default(),
            },
            db: self.pool.clone(),
            media: MediaStore::new(media_root.to_owned()),
        })
    }
}

pub async fn create_user(conn: &mut AsyncPgConnection, name: &str) -> User {
    diesel::insert_into(users::table)
        .values(&NewUser { name })
        .returning(User::as_returning())
        .get_result(conn)
        .await
        .unwrap()
}

pub async fn create_book(conn: &mut AsyncPgConnection, owner: Uuid, title: &str) -> BookPreview {
    diesel::insert_into(book::table)
        .values(&NewBook {
            owner,
            title: title.into(),
            author: "Anonymous".into(),
            language: "English".into(),
            genre: "Fiction".into(),
            description: "A book.".into(),
            image: None,
            posted: None,
            slug: book_slug(title, "Anonymous"),
        })
        .returning(BookPreview::as_returning())
        .get_result(conn)
        .await
        .unwrap()
}
