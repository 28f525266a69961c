pub mod models;
pub mod services;

// Re-export the persistence surface for external use
pub use models::*;
pub use services::*;
