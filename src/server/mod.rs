mod dispatcher;
mod server;
mod sweeper;
mod telegram_gateway;
pub mod texts;

pub use dispatcher::*;
pub use server::*;
pub use sweeper::*;
pub use telegram_gateway::*;
