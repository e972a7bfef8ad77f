//! Newtype indices into the op arena.
//!
//! Ops live in a per-function arena and refer to each other through stable
//! [`OpIdx`] values; erasing an op leaves a tombstone so indices never shift.

/// Types that wrap an index into an arena.
pub trait IndexRef: Copy + Eq {
    fn index(&self) -> usize;
    fn new(input: usize) -> Self;
}

macro_rules! impl_index {
    ($(#[$meta:meta])* $struct_name: ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
        pub struct $struct_name(u32);

        impl $crate::idx::IndexRef for $struct_name {
            fn index(&self) -> usize {
                self.0 as usize
            }

            fn new(input: usize) -> Self {
                Self(input as u32)
            }
        }

        impl From<usize> for $struct_name {
            fn from(input: usize) -> Self {
                <$struct_name as $crate::idx::IndexRef>::new(input)
            }
        }

        impl std::fmt::Display for $struct_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

impl_index!(
    /// Index of an op in a function's arena.
    OpIdx
);

impl_index!(
    /// Index of a function in a module.
    FuncIdx
);

/// A typed value: result `result` of the op at `op`. Almost every op has a
/// single result; FIFOs and dual-port memories have several.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Value {
    pub op: OpIdx,
    pub result: u8,
}

impl Value {
    pub fn new(op: OpIdx, result: u8) -> Self {
        Value { op, result }
    }
}

impl From<OpIdx> for Value {
    fn from(op: OpIdx) -> Self {
        Value { op, result: 0 }
    }
}
