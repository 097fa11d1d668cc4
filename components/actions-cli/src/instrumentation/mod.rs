pub mod layer;
pub mod logging;
pub mod record;
pub mod registry;
pub mod report;
pub mod rotation;
pub mod stream;
