pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

pub use traits::ImageGenerator;

/// Handle through which use cases reach their injected generator.
pub type SharedGenerator = Arc<dyn ImageGenerator>;
