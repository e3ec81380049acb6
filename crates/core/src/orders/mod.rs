//! Order synchronization: normalization, deduplication, bulk persistence and
//! child relation reconciliation.

mod config;
mod dedup;
mod index;
mod normalizer;
mod orders_model;
mod orders_service;
mod orders_traits;
mod partition;
mod relations;
mod report;
mod writer;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::*;
pub use dedup::*;
pub use index::*;
pub use normalizer::*;
pub use orders_model::*;
pub use orders_service::*;
pub use orders_traits::*;
pub use partition::*;
pub use relations::*;
pub use report::*;
pub use writer::*;
