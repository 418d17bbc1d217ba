//! Capability flags declared by an adapter
//!
//! The set is read once when a facade is built and decides, per operation,
//! whether the facade delegates to the backend or composes a fallback.

use std::fmt;

/// A high-level operation a backend may implement natively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `delete_recursive` removes a whole subtree in one call
    DeleteRecursive,
    /// `mkdir_recursive` creates missing ancestors itself
    MkdirRecursive,
    /// Deleting a missing path is not an error
    DeleteIgnoreMissing,
    /// `rename` is an atomic in-place move rather than an internal copy
    NativeMove,
    /// `open_read` / `open_write` are available
    NativeStream,
    /// `read_file` / `write_file` are available
    NativeBuffer,
}

impl Capability {
    pub const ALL: [Self; 6] = [
        Self::DeleteRecursive,
        Self::MkdirRecursive,
        Self::DeleteIgnoreMissing,
        Self::NativeMove,
        Self::NativeStream,
        Self::NativeBuffer,
    ];

    const fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Immutable set of capabilities
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    bits: u8,
}

impl Capabilities {
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    /// Every capability, as a fully native backend would declare
    pub const fn all() -> Self {
        let mut caps = Self::empty();
        let mut i = 0;
        while i < Capability::ALL.len() {
            caps = caps.with(Capability::ALL[i]);
            i += 1;
        }
        caps
    }

    /// Copy of this set with `capability` added
    #[must_use]
    pub const fn with(self, capability: Capability) -> Self {
        Self {
            bits: self.bits | capability.bit(),
        }
    }

    /// Copy of this set with `capability` removed
    #[must_use]
    pub const fn without(self, capability: Capability) -> Self {
        Self {
            bits: self.bits & !capability.bit(),
        }
    }

    pub const fn contains(self, capability: Capability) -> bool {
        self.bits & capability.bit() != 0
    }

    pub fn iter(self) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
