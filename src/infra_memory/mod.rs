mod record_store_memory;
mod roster_store_memory;
mod settings_store_memory;

pub use record_store_memory::*;
pub use roster_store_memory::*;
pub use settings_store_memory::*;
