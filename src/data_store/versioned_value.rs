use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Type-erased payload stored in a variable cell and in transaction logs.
pub(crate) type Value = Arc<dyn Any + Send + Sync>;

/// Represents a committed value together with the version it was installed at.
///
/// Every install on a cell bumps its version, so commit-time validation can
/// compare versions instead of values. A value that goes from `A` to `B` and
/// back to `A` is still seen as changed.
#[derive(Clone)]
pub(crate) struct VersionedValue {
    /// The committed data, shared by reference between the cell and the logs that observed it.
    data: Value,
    /// Number of commits that have installed a value in the owning cell.
    version: u64,
}

impl VersionedValue {
    pub(crate) fn new(data: Value, version: u64) -> Self {
        Self { data, version }
    }

    /// Returns the type-erased data.
    pub(crate) fn data(&self) -> &Value {
        &self.data
    }

    /// Returns the version of the value.
    ///
    /// A freshly created variable starts at version `0`.
    pub(crate) fn version(&self) -> u64 {
        self.version
    }

    /// Clones the payload out as a `T`, or `None` if the payload has another type.
    pub(crate) fn downcast<T: Clone + 'static>(&self) -> Option<T> {
        self.data.downcast_ref::<T>().cloned()
    }

    /// Produces the successor of this value carrying `data`.
    pub(crate) fn next(&self, data: Value) -> Self {
        Self {
            data,
            version: self.version.wrapping_add(1),
        }
    }
}

impl fmt::Debug for VersionedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionedValue")
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}
