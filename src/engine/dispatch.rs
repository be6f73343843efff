//! Dispatch registry: operation × element type → entry point
//!
//! The Rust call itself is selected statically through [`super::NativeOps`];
//! this table names the native symbol each crossing resolves to and the
//! buffer type it writes, and provides the match macros that turn a runtime
//! [`ElementType`] or [`PointSet`](crate::types::PointSet) variant into a
//! typed call.

use crate::types::ElementType;
use crate::Result;
use std::fmt;

/// Native operation families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `build_index`
    BuildIndex,
    /// `save_index`
    SaveIndex,
    /// `load_index`
    LoadIndex,
    /// `find_nearest_neighbors`
    FindNearestNeighbors,
    /// `find_nearest_neighbors_index`
    FindNearestNeighborsIndex,
    /// `radius_search`
    RadiusSearch,
    /// `compute_cluster_centers`
    ComputeClusterCenters,
    /// `free_index`
    FreeIndex,
}

impl Operation {
    /// Every operation family
    pub const ALL: [Operation; 8] = [
        Operation::BuildIndex,
        Operation::SaveIndex,
        Operation::LoadIndex,
        Operation::FindNearestNeighbors,
        Operation::FindNearestNeighborsIndex,
        Operation::RadiusSearch,
        Operation::ComputeClusterCenters,
        Operation::FreeIndex,
    ];

    /// Family name used in entry-point symbols
    pub fn name(self) -> &'static str {
        match self {
            Operation::BuildIndex => "build_index",
            Operation::SaveIndex => "save_index",
            Operation::LoadIndex => "load_index",
            Operation::FindNearestNeighbors => "find_nearest_neighbors",
            Operation::FindNearestNeighborsIndex => "find_nearest_neighbors_index",
            Operation::RadiusSearch => "radius_search",
            Operation::ComputeClusterCenters => "compute_cluster_centers",
            Operation::FreeIndex => "free_index",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A resolved, type-specialized entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint {
    /// Operation family
    pub operation: Operation,
    /// Input element type
    pub element_type: ElementType,
    /// Native symbol name
    pub symbol: &'static str,
    /// Element type of the data buffer the call writes, if any
    pub output_type: Option<ElementType>,
}

macro_rules! typed_symbol {
    ($ty:expr, $base:literal) => {
        match $ty {
            ElementType::Float32 => concat!($base, "_float"),
            ElementType::Float64 => concat!($base, "_double"),
            ElementType::UInt8 => concat!($base, "_byte"),
            ElementType::Int32 => concat!($base, "_int"),
        }
    };
}

/// Entry point for `operation` on `element_type`
pub fn resolve(operation: Operation, element_type: ElementType) -> EntryPoint {
    let symbol = match operation {
        Operation::BuildIndex => typed_symbol!(element_type, "flann_build_index"),
        Operation::SaveIndex => typed_symbol!(element_type, "flann_save_index"),
        Operation::LoadIndex => typed_symbol!(element_type, "flann_load_index"),
        Operation::FindNearestNeighbors => {
            typed_symbol!(element_type, "flann_find_nearest_neighbors")
        }
        Operation::FindNearestNeighborsIndex => {
            typed_symbol!(element_type, "flann_find_nearest_neighbors_index")
        }
        Operation::RadiusSearch => typed_symbol!(element_type, "flann_radius_search"),
        Operation::ComputeClusterCenters => {
            typed_symbol!(element_type, "flann_compute_cluster_centers")
        }
        Operation::FreeIndex => typed_symbol!(element_type, "flann_free_index"),
    };

    let output_type = match operation {
        Operation::ComputeClusterCenters => Some(element_type.cluster_output()),
        Operation::FindNearestNeighbors
        | Operation::FindNearestNeighborsIndex
        | Operation::RadiusSearch => Some(ElementType::Float32),
        _ => None,
    };

    EntryPoint {
        operation,
        element_type,
        symbol,
        output_type,
    }
}

/// Entry point for `operation` on a named element type
pub fn resolve_named(operation: Operation, type_name: &str) -> Result<EntryPoint> {
    let element_type = ElementType::from_name(type_name)?;
    Ok(resolve(operation, element_type))
}

/// The full registry, operation-major
pub fn table() -> Vec<EntryPoint> {
    Operation::ALL
        .iter()
        .flat_map(|&op| ElementType::ALL.iter().map(move |&ty| resolve(op, ty)))
        .collect()
}

/// Run `$body` with `$t` bound as a type alias for the element type `$ty`
macro_rules! with_element_type {
    ($ty:expr, $t:ident => $body:expr) => {
        match $ty {
            $crate::types::ElementType::Float32 => {
                type $t = f32;
                $body
            }
            $crate::types::ElementType::Float64 => {
                type $t = f64;
                $body
            }
            $crate::types::ElementType::UInt8 => {
                type $t = u8;
                $body
            }
            $crate::types::ElementType::Int32 => {
                type $t = i32;
                $body
            }
        }
    };
}

/// Run `$body` with `$p` bound to the typed points inside a `PointSet`
macro_rules! with_points {
    ($set:expr, $p:ident => $body:expr) => {
        match $set {
            $crate::types::PointSet::Float32($p) => $body,
            $crate::types::PointSet::Float64($p) => $body,
            $crate::types::PointSet::UInt8($p) => $body,
            $crate::types::PointSet::Int32($p) => $body,
        }
    };
}

/// Run `$body` when two point sets share a variant, else fail with
/// `TypeMismatch` (expected = first set's type)
macro_rules! with_point_pair {
    ($a:expr, $b:expr, ($pa:ident, $pb:ident) => $body:expr) => {
        match ($a, $b) {
            ($crate::types::PointSet::Float32($pa), $crate::types::PointSet::Float32($pb)) => $body,
            ($crate::types::PointSet::Float64($pa), $crate::types::PointSet::Float64($pb)) => $body,
            ($crate::types::PointSet::UInt8($pa), $crate::types::PointSet::UInt8($pb)) => $body,
            ($crate::types::PointSet::Int32($pa), $crate::types::PointSet::Int32($pb)) => $body,
            (a, b) => Err($crate::Error::TypeMismatch {
                expected: a.element_type(),
                actual: b.element_type(),
            }),
        }
    };
}

pub(crate) use {with_element_type, with_point_pair, with_points};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_resolve_symbols() {
        let entry = resolve(Operation::BuildIndex, ElementType::Float32);
        assert_eq!(entry.symbol, "flann_build_index_float");
        assert_eq!(entry.output_type, None);

        let entry = resolve(Operation::FindNearestNeighborsIndex, ElementType::UInt8);
        assert_eq!(entry.symbol, "flann_find_nearest_neighbors_index_byte");

        let entry = resolve(Operation::FreeIndex, ElementType::Int32);
        assert_eq!(entry.symbol, "flann_free_index_int");
    }

    #[test]
    fn test_cluster_output_asymmetry() {
        let double = resolve(Operation::ComputeClusterCenters, ElementType::Float64);
        assert_eq!(double.symbol, "flann_compute_cluster_centers_double");
        assert_eq!(double.output_type, Some(ElementType::Float64));

        for ty in [ElementType::Float32, ElementType::UInt8, ElementType::Int32] {
            let entry = resolve(Operation::ComputeClusterCenters, ty);
            assert_eq!(entry.output_type, Some(ElementType::Float32));
        }
    }

    #[test]
    fn test_resolve_named_rejects_unsupported() {
        for op in Operation::ALL {
            assert!(matches!(
                resolve_named(op, "int8"),
                Err(Error::UnsupportedType(_))
            ));
        }
        let entry = resolve_named(Operation::LoadIndex, "double").unwrap();
        assert_eq!(entry.symbol, "flann_load_index_double");
    }

    #[test]
    fn test_table_is_complete() {
        let table = table();
        assert_eq!(table.len(), 32);
        let mut symbols: Vec<_> = table.iter().map(|e| e.symbol).collect();
        symbols.sort();
        symbols.dedup();
        assert_eq!(symbols.len(), 32);
    }

    #[test]
    fn test_with_element_type_binds_alias() {
        fn width(ty: ElementType) -> usize {
            with_element_type!(ty, T => std::mem::size_of::<T>())
        }
        assert_eq!(width(ElementType::Float64), 8);
        assert_eq!(width(ElementType::UInt8), 1);
    }
}
