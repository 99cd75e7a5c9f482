pub mod api;
pub mod interests;
pub mod models;
