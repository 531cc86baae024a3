pub mod config;
pub mod consistency;
pub mod constants;
pub mod database;
pub mod dispatcher;
pub mod errors;
pub mod events;
pub mod executor;
pub mod handlers;
pub mod imports;
pub mod models;
pub mod policy;
pub mod scheduler;
pub mod throttle;
pub mod web;

// Re-export commonly used types
pub use config::{Config, ConfigManager};
pub use database::Database;
pub use dispatcher::{EventDispatcher, TickReport};
pub use events::{EventPayload, PublishData, ScheduledEvent, ScheduledEventStatus, ScheduledEventType};
pub use imports::ImportScanner;
pub use scheduler::EngineScheduler;
