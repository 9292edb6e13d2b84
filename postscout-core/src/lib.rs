pub mod config;
pub mod criteria;
pub mod error;
pub mod error_utils;
pub mod types;

pub use config::*;
pub use criteria::*;
pub use error::*;
pub use error_utils::*;
pub use types::*;
