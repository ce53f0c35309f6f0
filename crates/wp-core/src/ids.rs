//! Strongly typed, zero-cost identifier wrappers.
//!
//! Two families live here.  `FacilityId`, `VertexId` and `EdgeId` are the
//! identifiers assigned by the data import and are only ever compared and
//! hashed.  `NodeIdx` and `ArcId` are dense positions inside a built
//! `RoadGraph` and are used directly as `Vec` indices via `.index()`.

use std::fmt;

/// Generate a typed ID wrapper around a primitive integer.
macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident($inner:ty);) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        $vis struct $name(pub $inner);

        impl $name {
            /// Sentinel meaning "no valid ID", equal to `MAX`.
            pub const INVALID: $name = $name(<$inner>::MAX);

            /// Cast to `usize` for direct use as a `Vec` index.
            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl TryFrom<usize> for $name {
            type Error = std::num::TryFromIntError;
            fn try_from(n: usize) -> Result<$name, Self::Error> {
                <$inner>::try_from(n).map($name)
            }
        }
    };
}

typed_id! {
    /// Identifier of a facility (water point) as assigned by the import.
    pub struct FacilityId(u32);
}

typed_id! {
    /// Identifier of a road-graph vertex as referenced by road segments.
    pub struct VertexId(u32);
}

typed_id! {
    /// Identifier of a road segment as assigned by the import.
    pub struct EdgeId(u32);
}

typed_id! {
    /// Dense index of a vertex inside a built `RoadGraph`.
    pub struct NodeIdx(u32);
}

typed_id! {
    /// Dense index of a directed arc inside a built `RoadGraph`.
    pub struct ArcId(u32);
}
