//! This module provides reusable test utilities:
//! - Mock HTTP servers (training executor, WebHDFS)
//! - A scripted in-process training executor
//! - Test configuration builders
//! - In-memory test databases and a fully wired engine
//! - Common test data

// Each test binary uses a different subset of the fixtures
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod fake_executor;
pub mod mock_executor;
pub mod mock_webhdfs;
pub mod test_config;
pub mod test_data;
pub mod test_database;
pub mod test_engine;

// Re-export commonly used items
pub use fake_executor::FakeExecutor;
pub use mock_executor::MockExecutorServer;
pub use mock_webhdfs::MockWebHdfsServer;
pub use test_config::TestConfigBuilder;
pub use test_data::*;
pub use test_database::TestDatabase;
pub use test_engine::TestEngine;
