pub mod fundamentals_queries;
pub mod pg_store;
