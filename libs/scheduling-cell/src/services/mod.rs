pub mod appointments;
pub mod cache;
pub mod catalog;
pub mod directory;

pub use appointments::AppointmentService;
pub use cache::AppointmentCache;
pub use catalog::CatalogService;
pub use directory::{DirectoryLookup, DirectoryService};
