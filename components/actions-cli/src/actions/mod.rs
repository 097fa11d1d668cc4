pub mod commands;
pub mod pipeline;
pub mod pipeline_config;
