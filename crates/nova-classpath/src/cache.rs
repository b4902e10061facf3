use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{ClassBytesProvider, ClasspathError};

type Slot = Arc<Mutex<Option<Arc<[u8]>>>>;

/// Read-through cache of class-file bytes keyed by binary name.
///
/// Concurrent misses on the same key wait for a single provider load. Failed loads are not
/// cached: the error goes to the caller that attempted the load and the next lookup retries.
/// Entries live until [`ClassBytesCache::clear`].
pub struct ClassBytesCache<P> {
    provider: P,
    slots: Mutex<HashMap<String, Slot>>,
}

impl<P> std::fmt::Debug for ClassBytesCache<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassBytesCache")
            .field("entries", &self.slots.lock().len())
            .finish_non_exhaustive()
    }
}

impl<P: ClassBytesProvider> ClassBytesCache<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Cached bytes for `binary_name`, loading them on a miss.
    pub fn get(&self, binary_name: &str) -> Result<Arc<[u8]>, ClasspathError> {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(binary_name.to_string()).or_default())
        };

        // The map lock is released; only callers of this key wait here.
        let mut cached = slot.lock();
        if let Some(bytes) = cached.as_ref() {
            return Ok(Arc::clone(bytes));
        }

        let bytes: Arc<[u8]> = match self.provider.load(binary_name) {
            Ok(bytes) => bytes.into(),
            Err(err) => {
                drop(cached);
                self.forget_empty(binary_name, &slot);
                return Err(err);
            }
        };
        tracing::debug!(
            target: "nova.classpath",
            class = binary_name,
            len = bytes.len(),
            "cached class bytes"
        );
        *cached = Some(Arc::clone(&bytes));
        Ok(bytes)
    }

    /// Drops the map entry for a failed load unless another caller has since filled or
    /// replaced it, or is loading into it.
    fn forget_empty(&self, binary_name: &str, slot: &Slot) {
        let mut slots = self.slots.lock();
        let unused = slots.get(binary_name).is_some_and(|current| {
            Arc::ptr_eq(current, slot) && current.try_lock().is_some_and(|c| c.is_none())
        });
        if unused {
            slots.remove(binary_name);
        }
    }

    /// Whether `binary_name` is currently cached (loaded successfully).
    pub fn contains(&self, binary_name: &str) -> bool {
        let Some(slot) = self.slots.lock().get(binary_name).cloned() else {
            return false;
        };
        let cached = slot.lock();
        cached.is_some()
    }

    /// Number of successfully cached classes.
    pub fn len(&self) -> usize {
        let slots: Vec<Slot> = self.slots.lock().values().cloned().collect();
        slots.iter().filter(|slot| slot.lock().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached entry.
    pub fn clear(&self) {
        let mut slots = self.slots.lock();
        tracing::debug!(
            target: "nova.classpath",
            entries = slots.len(),
            "clearing class bytes cache"
        );
        slots.clear();
    }
}

impl<P: ClassBytesProvider> ClassBytesProvider for ClassBytesCache<P> {
    fn load(&self, binary_name: &str) -> Result<Vec<u8>, ClasspathError> {
        self.get(binary_name).map(|bytes| bytes.to_vec())
    }
}
