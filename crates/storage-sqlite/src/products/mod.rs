//! Product catalog rows referenced by order items.

mod model;
mod repository;

pub use model::{NewProductDB, ProductDB};
pub use repository::ProductRepository;
pub(crate) use repository::{existing_skus, insert_placeholder_products};
