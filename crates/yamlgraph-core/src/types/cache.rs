use std::collections::HashMap;
use std::sync::Arc;

use super::{TypeDescriptor, TypeDescriptorFactory, TypeKey};
use crate::error::Result;

/// Per-pass memo over a [`TypeDescriptorFactory`].
///
/// Repeated lookups of the same type hand back the same allocation, so
/// descriptors can be compared with [`Arc::ptr_eq`].
pub struct DescriptorCache {
    factory: Arc<dyn TypeDescriptorFactory>,
    entries: HashMap<TypeKey, Arc<TypeDescriptor>>,
}

impl DescriptorCache {
    pub fn new(factory: Arc<dyn TypeDescriptorFactory>) -> Self {
        Self {
            factory,
            entries: HashMap::new(),
        }
    }

    pub fn find(&mut self, ty: &TypeKey) -> Result<Arc<TypeDescriptor>> {
        if let Some(descriptor) = self.entries.get(ty) {
            return Ok(Arc::clone(descriptor));
        }
        let descriptor = Arc::new(self.factory.describe(ty)?);
        self.entries.insert(ty.clone(), Arc::clone(&descriptor));
        Ok(descriptor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
