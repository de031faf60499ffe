pub mod handler;
pub mod model;

pub use handler::list_users;
