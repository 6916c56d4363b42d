//! Sequential identifier allocation for new projects.
//!
//! The allocator is seeded once at startup with the highest identifier found
//! among the existing projects. Every call to [`IdAllocator::next`] then returns
//! the next value. Allocation is a single atomic update, so concurrent
//! requests never receive the same identifier. Once the counter reaches
//! `u32::MAX` allocation fails instead of wrapping around.

use devops_client::Project;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::{info, warn};

use crate::errors::{ProvisioningError, ProvisioningResult};
use crate::names::{parse_project_name, AzpId};

#[cfg(test)]
#[path = "id_allocator_tests.rs"]
mod tests;

/// Allocates project identifiers.
///
/// # Examples
///
/// ```rust
/// use provisioner_core::IdAllocator;
///
/// let allocator = IdAllocator::with_seed(6);
/// assert_eq!(allocator.next().unwrap().value(), 7);
/// assert_eq!(allocator.next().unwrap().value(), 8);
///
/// let exhausted = IdAllocator::with_seed(u32::MAX);
/// assert!(exhausted.next().is_err());
/// ```
#[derive(Debug, Default)]
pub struct IdAllocator {
    counter: AtomicU32,
    seeded: AtomicBool,
    warned: AtomicBool,
}

impl IdAllocator {
    /// Creates an unseeded allocator. The first identifier is 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an allocator whose first identifier is `seed + 1`.
    pub fn with_seed(seed: u32) -> Self {
        let allocator = Self::new();
        allocator.seed(seed);
        allocator
    }

    /// Raises the counter to `value`. The counter never moves backwards.
    pub fn seed(&self, value: u32) {
        self.counter.fetch_max(value, Ordering::SeqCst);
        self.seeded.store(true, Ordering::SeqCst);
    }

    /// Seeds the allocator from the highest `AZP-NNN_` identifier in `projects`.
    ///
    /// Projects that do not follow the naming convention are ignored. Returns the
    /// seed that was applied.
    pub fn seed_from_projects(&self, projects: &[Project]) -> u32 {
        let highest = projects
            .iter()
            .filter_map(|p| parse_project_name(&p.name))
            .map(|(id, _)| id.value())
            .max()
            .unwrap_or(0);

        self.seed(highest);
        info!(
            seed = highest,
            project_count = projects.len(),
            "Seeded project id allocator"
        );
        highest
    }

    /// Allocates the next identifier.
    ///
    /// # Errors
    /// Returns `ProvisioningError::IdSpaceExhausted` once `u32::MAX` has been
    /// handed out. The counter is left unchanged.
    pub fn next(&self) -> ProvisioningResult<AzpId> {
        if !self.seeded.load(Ordering::SeqCst) && !self.warned.swap(true, Ordering::SeqCst) {
            warn!("Allocating a project id before the allocator was seeded; ids may collide with existing projects");
        }

        self.counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_add(1)
            })
            .map(|previous| AzpId::new(previous + 1))
            .map_err(|last| ProvisioningError::IdSpaceExhausted { last })
    }

    /// Returns the identifier the next call to [`IdAllocator::next`] would return, without allocating it.
    ///
    /// # Errors
    /// Returns `ProvisioningError::IdSpaceExhausted` when no identifier is left.
    pub fn peek_next(&self) -> ProvisioningResult<AzpId> {
        let last = self.counter.load(Ordering::SeqCst);
        last.checked_add(1)
            .map(AzpId::new)
            .ok_or(ProvisioningError::IdSpaceExhausted { last })
    }
}
