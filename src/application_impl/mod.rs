mod admin_service_impl;
mod join_gateway_fake;
mod runtime_settings;
mod verification_engine;

pub use admin_service_impl::*;
pub use join_gateway_fake::*;
pub use runtime_settings::*;
pub use verification_engine::*;
