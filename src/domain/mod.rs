// Domain layer - Core models and the filter-translation logic
pub mod filter;
pub mod measurement;
