pub mod inspect;
pub mod migrations;
pub mod pool;
pub mod rows;
pub mod state;

pub use migrations::{Migration, MigrationStatus, Migrator};
pub use pool::{connect, connect_in_memory, ping, DbPool};
pub use state::AppState;
