//! Secret store implementations.

#[cfg(feature = "mock")]
pub mod memory;

#[cfg(feature = "aws")]
pub mod aws;

use crate::registry::StorageRegistry;

/// Registers all compiled backends with `registry`.
pub fn register_all(registry: &mut StorageRegistry) {
    #[cfg(feature = "mock")]
    memory::register(registry);

    #[cfg(feature = "aws")]
    aws::register(registry);

    #[cfg(not(any(feature = "mock", feature = "aws")))]
    let _ = registry;
}
