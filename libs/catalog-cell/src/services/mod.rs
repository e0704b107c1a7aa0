pub mod catalog;
pub mod import;

pub use catalog::CatalogService;
pub use import::{CatalogImporter, SeedSources};
