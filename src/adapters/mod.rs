pub mod memory;
pub mod postgres;

pub use memory::{InMemoryStoreRepository, InMemoryTransactionRepository};
pub use postgres::{PostgresStoreRepository, PostgresTransactionRepository};
