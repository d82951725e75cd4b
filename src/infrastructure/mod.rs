// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod jsonl_store;
pub mod mailer;
pub mod memory_store;
pub mod report;
pub mod weather;
