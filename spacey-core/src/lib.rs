pub mod config;
pub mod errors;
pub mod estimator;
pub mod models;
pub mod store;
pub mod usecase;

pub use config::*;
pub use errors::*;
pub use estimator::*;
pub use models::*;
pub use store::*;
pub use usecase::*;
