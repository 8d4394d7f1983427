mod admin_service;
mod gateway;
mod verification_service;

pub use admin_service::*;
pub use gateway::*;
pub use verification_service::*;
