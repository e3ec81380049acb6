pub mod errors;
pub mod events;
pub mod orders;
pub mod utils;

pub use errors::{Error, Result};
