pub mod db;
pub mod entities;
pub mod jobs;
pub mod models;
pub mod recommendations;
pub mod schema;
pub mod vector;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
