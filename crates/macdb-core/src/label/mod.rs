//! Security labels and the persistent label-id registry.

mod registry;
mod types;

pub use registry::LabelRegistry;
pub use types::{LabelId, SecurityLabel};
