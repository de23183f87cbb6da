//! Aircraft descriptor lookup
//!
//! Aircraft beacons only carry a device address. Descriptor providers map
//! that address to registration, competition number and similar metadata.
//! The client queries its providers in configured order and attaches the
//! first hit to the beacon before notifying listeners.

use std::collections::HashMap;
use std::sync::Arc;

use crate::protocol::beacon::AircraftDescriptor;

/// Capability that resolves an aircraft address to its descriptor
pub trait AircraftDescriptorProvider: Send + Sync {
    /// Returns the descriptor for `address`, or `None` if unknown
    fn find_descriptor(&self, address: &str) -> Option<AircraftDescriptor>;
}

/// Queries `providers` in order and returns the first descriptor found
pub fn find_descriptor(
    providers: &[Arc<dyn AircraftDescriptorProvider>],
    address: &str,
) -> Option<AircraftDescriptor> {
    providers
        .iter()
        .find_map(|provider| provider.find_descriptor(address))
}

/// Provider backed by an in-memory map
///
/// Useful for a handful of locally known aircraft (club fleet, test
/// fixtures) placed in front of a remote database provider.
#[derive(Debug, Clone, Default)]
pub struct StaticDescriptorProvider {
    descriptors: HashMap<String, AircraftDescriptor>,
}

impl StaticDescriptorProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the descriptor for `address`
    pub fn with(mut self, address: impl Into<String>, descriptor: AircraftDescriptor) -> Self {
        self.descriptors.insert(address.into(), descriptor);
        self
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl FromIterator<(String, AircraftDescriptor)> for StaticDescriptorProvider {
    fn from_iter<I: IntoIterator<Item = (String, AircraftDescriptor)>>(iter: I) -> Self {
        Self {
            descriptors: iter.into_iter().collect(),
        }
    }
}

impl AircraftDescriptorProvider for StaticDescriptorProvider {
    fn find_descriptor(&self, address: &str) -> Option<AircraftDescriptor> {
        self.descriptors.get(address).cloned()
    }
}
