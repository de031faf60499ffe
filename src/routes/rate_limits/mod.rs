pub mod handler;
pub mod model;

pub use handler::rate_limits;
