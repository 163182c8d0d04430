//! Data Transfer Objects (DTOs) for API requests and responses

pub mod catalog;
pub mod common;
pub mod compensation;
pub mod reservation;

pub use catalog::*;
pub use common::*;
pub use compensation::*;
pub use reservation::*;
