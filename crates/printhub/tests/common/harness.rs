//! Test harness for isolated test execution.
//!
//! `TestHarness` owns a temporary directory holding the SQLite file and the
//! upload directory, and wires intake, dispatch and the HTTP router on top.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum_test::TestServer;
use tempfile::TempDir;

use printhub::config::ServerConfig;
use printhub::{
    router, AppState, Database, FileBlobStore, FileEntry, JobDispatcher, OrderId, OrderIntake,
    TransitionPolicy,
};

pub struct TestHarness {
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub db: Database,
    pub intake: OrderIntake,
    pub dispatcher: JobDispatcher,
    // Dropped last so the database closes before its directory is removed.
    temp_dir: TempDir,
}

impl TestHarness {
    /// Harness with the default (permissive) transition policy.
    pub fn new() -> Self {
        Self::with_policy(TransitionPolicy::Permissive)
    }

    pub fn with_policy(policy: TransitionPolicy) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("data").join("printhub.db");
        let upload_dir = temp_dir.path().join("uploads");

        let db = Database::open(&db_path).expect("Failed to open database");
        let blobs = Arc::new(FileBlobStore::new(&upload_dir));

        Self {
            intake: OrderIntake::new(db.clone(), blobs),
            dispatcher: JobDispatcher::new(db.clone(), policy),
            db,
            db_path,
            upload_dir,
            temp_dir,
        }
    }

    pub fn state(&self) -> AppState {
        AppState::new(self.intake.clone(), self.dispatcher.clone())
    }

    pub fn server(&self) -> TestServer {
        self.server_with(&ServerConfig::default())
    }

    pub fn server_with(&self, config: &ServerConfig) -> TestServer {
        TestServer::builder()
            .build(router(self.state(), config))
            .expect("Failed to build test server")
    }

    /// Inserts a pending order directly, bypassing the blob store.
    pub fn seed_order(&self, files: Vec<FileEntry>) -> OrderId {
        self.intake
            .submit_order(files, "bkash".to_string(), None)
            .expect("Failed to seed order")
    }

    /// A second, independent connection to the same database file.
    pub fn reopen(&self) -> Database {
        Database::open(&self.db_path).expect("Failed to reopen database")
    }

    pub fn temp_path(&self) -> &std::path::Path {
        self.temp_dir.path()
    }
}
