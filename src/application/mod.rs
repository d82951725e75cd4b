// Application layer - Use cases built on the domain and store contracts
pub mod alerts;
pub mod csv_import;
pub mod ingestion;
pub mod query;
pub mod store;
