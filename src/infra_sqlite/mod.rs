mod record_store_sqlite;
mod roster_store_sqlite;
mod schema;
mod settings_store_sqlite;

pub use record_store_sqlite::*;
pub use roster_store_sqlite::*;
pub use schema::*;
pub use settings_store_sqlite::*;
