use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use engine::consistency::ConsistencyRegistry;
use engine::executor::{HttpTrainingExecutor, TrainingExecutor};
use engine::handlers::HandlerRegistry;
use engine::models::ModelCatalog;
use engine::policy::RetryPolicy;
use engine::throttle::ConcurrencyThrottle;
use engine::web::{start_web_server, AppState};
use engine::{ConfigManager, Database, EngineScheduler, EventDispatcher, ImportScanner};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with reduced verbosity
    let env_filter = EnvFilter::from_default_env()
        .add_directive("engine=info".parse()?)
        .add_directive("tower_http=warn".parse()?)
        .add_directive("tokio_cron_scheduler=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?)
        .add_directive("sqlx=warn".parse()?);

    fmt().with_env_filter(env_filter).init();

    info!("Starting scheduled event engine");

    // Load configuration
    let config_path = ConfigManager::config_path_from_env();
    let config_manager = ConfigManager::new(config_path.clone()).await?;
    let config = config_manager.get_current_config();
    info!("Configuration loaded from {}", config_path);

    // Initialize database
    let database = Arc::new(Database::new(&config.database_path).await?);
    info!("Database initialized at {}", config.database_path);

    let executor: Arc<dyn TrainingExecutor> = Arc::new(HttpTrainingExecutor::new(&config.executor)?);
    info!("Training executor client ready for {}", config.executor.base_url);

    let catalog = ModelCatalog::new(&config.models.topic_models_path);

    let imports_config = &config.events.check_for_imports;
    let scanner = if imports_config.is_usable() {
        match ImportScanner::from_config(database.clone(), imports_config) {
            Ok(scanner) => {
                info!("Import scanner ready for {}", imports_config.data_path);
                Some(Arc::new(scanner))
            }
            Err(e) => {
                error!("Import scanner could not be created: {}", e);
                None
            }
        }
    } else {
        if imports_config.enabled {
            warn!("Import scanning enabled but storage location is incomplete, scanner disabled");
        }
        None
    };

    let handlers = HandlerRegistry::standard(
        database.clone(),
        executor,
        catalog.clone(),
        scanner.clone(),
        &config,
    );
    info!("Registered handlers: {:?}", handlers.registered());

    let consistency =
        ConsistencyRegistry::standard(database.clone(), catalog, imports_config.clone());
    let throttle = ConcurrencyThrottle::new(database.clone(), &config.events.run_training);
    let policy = RetryPolicy::from_config(&config);

    let dispatcher = Arc::new(EventDispatcher::new(
        database.clone(),
        handlers,
        consistency,
        throttle,
        policy,
    ));

    // Exactly one running-tasks check after every start
    let check = database.rearm_running_tasks_check().await?;
    info!("Running-tasks check re-armed as event {}", check.id);

    let scheduler = EngineScheduler::new(dispatcher.clone(), scanner, config.clone()).await?;
    let jobs = scheduler.start().await?;
    info!("Scheduler started with {} jobs", jobs);

    // Start web server
    let state = AppState::new(config, database, dispatcher);
    if let Err(e) = start_web_server(state).await {
        error!("Admin API stopped: {}", e);
        scheduler.shutdown().await?;
        return Err(e);
    }

    Ok(())
}
