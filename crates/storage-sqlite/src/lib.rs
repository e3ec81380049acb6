//! SQLite storage for the order sync engine.
//!
//! Reads go through an r2d2 pool of diesel connections; all writes are funneled
//! through the single write actor in [`db::write_actor`].

pub mod db;
pub mod errors;
pub mod orders;
pub mod products;
pub mod schema;

pub use db::{create_pool, get_connection, init, run_migrations, spawn_writer, DbPool, WriteHandle};
pub use errors::StorageError;
pub use orders::{OrderRelationRepository, OrderRepository};
pub use products::ProductRepository;
