pub mod context;
pub mod entrypoint;
