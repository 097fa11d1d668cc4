pub mod build_info;
pub mod env;
pub mod load_config;
pub mod memory;
pub mod shutdown;
