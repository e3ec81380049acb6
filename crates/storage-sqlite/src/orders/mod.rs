mod model;
mod relations_repository;
mod repository;


pub use model::*;
pub use relations_repository::OrderRelationRepository;
pub use repository::OrderRepository;
