pub mod env_validator;
pub mod logging;
pub mod rpc_validator;
