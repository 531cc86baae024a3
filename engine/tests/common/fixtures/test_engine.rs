//! Fully wired engine over an in-memory database and a fake executor

use anyhow::Result;
use axum::Router;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

use engine::config::Config;
use engine::consistency::ConsistencyRegistry;
use engine::database::Database;
use engine::dispatcher::{EventDispatcher, TickReport};
use engine::events::{PublishData, ScheduledEvent};
use engine::handlers::HandlerRegistry;
use engine::imports::ImportScanner;
use engine::models::ModelCatalog;
use engine::policy::RetryPolicy;
use engine::throttle::ConcurrencyThrottle;
use engine::web::{create_router, AppState};

use super::fake_executor::FakeExecutor;
use super::test_config::TestConfigBuilder;
use super::test_database::TestDatabase;

pub struct TestEngine {
    pub db: TestDatabase,
    pub executor: Arc<FakeExecutor>,
    pub config: Arc<Config>,
    pub dispatcher: Arc<EventDispatcher>,
    pub scanner: Option<Arc<ImportScanner>>,
    pub models_dir: TempDir,
}

impl TestEngine {
    pub async fn new() -> Result<Self> {
        Self::with_config(|builder| builder).await
    }

    /// Engine whose config is adjusted by `f`; the model root is a temp dir
    pub async fn with_config<F>(f: F) -> Result<Self>
    where
        F: FnOnce(TestConfigBuilder) -> TestConfigBuilder,
    {
        let models_dir = TempDir::new()?;
        let config = Arc::new(f(TestConfigBuilder::new().with_models_path(models_dir.path())).build());

        let db = TestDatabase::new().await?;
        let database = db.database();
        let executor = Arc::new(FakeExecutor::new());
        let catalog = ModelCatalog::new(models_dir.path());

        let imports_config = &config.events.check_for_imports;
        let scanner = if imports_config.is_usable() {
            Some(Arc::new(ImportScanner::from_config(database.clone(), imports_config)?))
        } else {
            None
        };

        let handlers = HandlerRegistry::standard(
            database.clone(),
            executor.clone(),
            catalog.clone(),
            scanner.clone(),
            &config,
        );
        let consistency =
            ConsistencyRegistry::standard(database.clone(), catalog, imports_config.clone());
        let throttle = ConcurrencyThrottle::new(database.clone(), &config.events.run_training);
        let policy = RetryPolicy::from_config(&config);

        let dispatcher = Arc::new(EventDispatcher::new(
            database, handlers, consistency, throttle, policy,
        ));

        Ok(Self {
            db,
            executor,
            config,
            dispatcher,
            scanner,
            models_dir,
        })
    }

    pub fn database(&self) -> Arc<Database> {
        self.db.database()
    }

    /// Create `name/trainconfig.json` under the model root
    pub fn create_model(&self, name: &str) -> PathBuf {
        let dir = self.models_dir.path().join(name);
        fs::create_dir_all(&dir).expect("Failed to create model dir");
        let config = dir.join("trainconfig.json");
        fs::write(&config, "{}").expect("Failed to write model config");
        config
    }

    pub fn remove_model(&self, name: &str) {
        fs::remove_dir_all(self.models_dir.path().join(name)).expect("Failed to remove model");
    }

    pub async fn publish(&self, data: &PublishData) -> Result<ScheduledEvent> {
        self.database().publish_event(data).await
    }

    pub async fn tick(&self) -> Result<TickReport> {
        self.dispatcher.tick().await
    }

    /// Current stored state of an event
    pub async fn event(&self, id: Uuid) -> ScheduledEvent {
        self.database()
            .get_event(id)
            .await
            .expect("Failed to load event")
            .expect("event must exist")
    }

    pub fn router(&self) -> Router {
        create_router(AppState::new(
            self.config.clone(),
            self.database(),
            self.dispatcher.clone(),
        ))
    }
}
