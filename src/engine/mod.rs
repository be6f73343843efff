//! Native engine ABI
//!
//! Every engine entry point exists once per element type. [`NativeOps<T>`]
//! is that per-type family; an [`Engine`] provides it for all four supported
//! types plus the engine-wide calls. Signatures follow the C ABI closely:
//! output buffers are allocated by the caller, and search and clustering
//! report through their integer return value rather than a `Result`.

/// Operation x element type registry
pub mod dispatch;
/// Hierarchical k-means
pub mod kmeans;
/// Pure Rust engine
pub mod reference;

/// `libflann` bindings
#[cfg(feature = "native")]
pub mod ffi;

pub use reference::{BruteForceEngine, EngineStats};

use crate::params::IndexParams;
use crate::types::{Element, Points};
use crate::{Error, Result};
use std::os::raw::c_int;
use std::path::Path;
use std::sync::Arc;

/// Opaque engine index handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawIndex(usize);

impl RawIndex {
    /// Wrap an engine-issued value
    pub fn from_raw(value: usize) -> Self {
        RawIndex(value)
    }

    /// The engine-issued value
    pub fn as_raw(self) -> usize {
        self.0
    }
}

/// Engine-wide distance selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    /// Squared Euclidean
    Euclidean,
    /// Sum of absolute differences
    Manhattan,
    /// Sum of `|a - b|^order`
    Minkowski(i32),
}

impl Default for Distance {
    fn default() -> Self {
        Distance::Euclidean
    }
}

impl Distance {
    /// Engine code
    pub fn code(self) -> c_int {
        match self {
            Distance::Euclidean => 1,
            Distance::Manhattan => 2,
            Distance::Minkowski(_) => 3,
        }
    }

    /// Minkowski order, 0 for the other metrics
    pub fn order(self) -> c_int {
        match self {
            Distance::Minkowski(order) => order,
            _ => 0,
        }
    }

    /// Parse `euclidean`, `manhattan` or `minkowski` (with `order`)
    pub fn from_name(name: &str, order: i32) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "euclidean" | "l2" => Ok(Distance::Euclidean),
            "manhattan" | "l1" => Ok(Distance::Manhattan),
            "minkowski" if order > 0 => Ok(Distance::Minkowski(order)),
            "minkowski" => Err(Error::InvalidParameter(format!(
                "minkowski order must be positive, got {}",
                order
            ))),
            _ => Err(Error::InvalidParameter(format!("unknown distance type '{}'", name))),
        }
    }
}

/// Type-specialized entry points for element type `T`
pub trait NativeOps<T: Element> {
    /// Build an index over `dataset`. The engine may rewrite `params`
    /// (autotuning) and returns its speedup estimate over linear search.
    fn build_index(&self, dataset: Points<'_, T>, params: &mut IndexParams) -> Result<(RawIndex, f32)>;

    /// Write the index structure to `path`
    fn save_index(&self, index: RawIndex, path: &Path) -> Result<()>;

    /// Load an index file; `dataset` is the data it was built over
    fn load_index(&self, path: &Path, dataset: Points<'_, T>) -> Result<RawIndex>;

    /// One-shot search without a persisted handle. Returns a negative
    /// status on failure.
    fn find_nearest_neighbors(
        &self,
        dataset: Points<'_, T>,
        queries: Points<'_, T>,
        indices: &mut [i32],
        dists: &mut [f32],
        nn: usize,
        params: &mut IndexParams,
    ) -> i32;

    /// Search a built or loaded index. Returns a negative status on failure.
    fn find_nearest_neighbors_index(
        &self,
        index: RawIndex,
        queries: Points<'_, T>,
        indices: &mut [i32],
        dists: &mut [f32],
        nn: usize,
        params: &IndexParams,
    ) -> i32;

    /// Radius search for one point. Returns the number of neighbors written.
    fn radius_search(
        &self,
        index: RawIndex,
        query: &[T],
        indices: &mut [i32],
        dists: &mut [f32],
        max_nn: usize,
        radius: f32,
        params: &IndexParams,
    ) -> i32;

    /// Hierarchical k-means into `result` (`clusters × cols`). Returns the
    /// number of centres produced, non-positive on failure.
    fn compute_cluster_centers(
        &self,
        dataset: Points<'_, T>,
        clusters: usize,
        result: &mut [T::Center],
        params: &IndexParams,
    ) -> i32;

    /// Release the index; the handle is invalid afterwards
    fn free_index(&self, index: RawIndex, params: &IndexParams);
}

/// A complete engine: all four element types plus engine-wide calls
pub trait Engine:
    NativeOps<f32> + NativeOps<f64> + NativeOps<u8> + NativeOps<i32> + Send
{
    fn set_distance_type(&self, distance: Distance);

    fn log_verbosity(&self, level: c_int);

    /// Exact neighbors of every test point, skipping the first `skip`.
    /// `matches` is `testset.rows() × nn`.
    fn compute_ground_truth(
        &self,
        dataset: Points<'_, f32>,
        testset: Points<'_, f32>,
        matches: &mut [i32],
        nn: usize,
        skip: usize,
    );

    /// Find the smallest `checks` reaching `precision`; returns search seconds
    #[allow(clippy::too_many_arguments)]
    fn test_with_precision(
        &self,
        index: RawIndex,
        dataset: Points<'_, f32>,
        testset: Points<'_, f32>,
        matches: Points<'_, i32>,
        nn: usize,
        precision: f32,
        checks: &mut i32,
        skip: usize,
    ) -> f32;

    /// Measure precision at a fixed `checks`; returns search seconds
    #[allow(clippy::too_many_arguments)]
    fn test_with_checks(
        &self,
        index: RawIndex,
        dataset: Points<'_, f32>,
        testset: Points<'_, f32>,
        matches: Points<'_, i32>,
        nn: usize,
        checks: i32,
        precision: &mut f32,
        skip: usize,
    ) -> f32;
}

// Engines shared between sessions
impl<T: Element, E: NativeOps<T> + ?Sized> NativeOps<T> for Arc<E> {
    fn build_index(&self, dataset: Points<'_, T>, params: &mut IndexParams) -> Result<(RawIndex, f32)> {
        (**self).build_index(dataset, params)
    }

    fn save_index(&self, index: RawIndex, path: &Path) -> Result<()> {
        (**self).save_index(index, path)
    }

    fn load_index(&self, path: &Path, dataset: Points<'_, T>) -> Result<RawIndex> {
        (**self).load_index(path, dataset)
    }

    fn find_nearest_neighbors(
        &self,
        dataset: Points<'_, T>,
        queries: Points<'_, T>,
        indices: &mut [i32],
        dists: &mut [f32],
        nn: usize,
        params: &mut IndexParams,
    ) -> i32 {
        (**self).find_nearest_neighbors(dataset, queries, indices, dists, nn, params)
    }

    fn find_nearest_neighbors_index(
        &self,
        index: RawIndex,
        queries: Points<'_, T>,
        indices: &mut [i32],
        dists: &mut [f32],
        nn: usize,
        params: &IndexParams,
    ) -> i32 {
        (**self).find_nearest_neighbors_index(index, queries, indices, dists, nn, params)
    }

    fn radius_search(
        &self,
        index: RawIndex,
        query: &[T],
        indices: &mut [i32],
        dists: &mut [f32],
        max_nn: usize,
        radius: f32,
        params: &IndexParams,
    ) -> i32 {
        (**self).radius_search(index, query, indices, dists, max_nn, radius, params)
    }

    fn compute_cluster_centers(
        &self,
        dataset: Points<'_, T>,
        clusters: usize,
        result: &mut [T::Center],
        params: &IndexParams,
    ) -> i32 {
        (**self).compute_cluster_centers(dataset, clusters, result, params)
    }

    fn free_index(&self, index: RawIndex, params: &IndexParams) {
        (**self).free_index(index, params)
    }
}

impl<E: Engine + Sync> Engine for Arc<E> {
    fn set_distance_type(&self, distance: Distance) {
        (**self).set_distance_type(distance)
    }

    fn log_verbosity(&self, level: c_int) {
        (**self).log_verbosity(level)
    }

    fn compute_ground_truth(
        &self,
        dataset: Points<'_, f32>,
        testset: Points<'_, f32>,
        matches: &mut [i32],
        nn: usize,
        skip: usize,
    ) {
        (**self).compute_ground_truth(dataset, testset, matches, nn, skip)
    }

    fn test_with_precision(
        &self,
        index: RawIndex,
        dataset: Points<'_, f32>,
        testset: Points<'_, f32>,
        matches: Points<'_, i32>,
        nn: usize,
        precision: f32,
        checks: &mut i32,
        skip: usize,
    ) -> f32 {
        (**self).test_with_precision(index, dataset, testset, matches, nn, precision, checks, skip)
    }

    fn test_with_checks(
        &self,
        index: RawIndex,
        dataset: Points<'_, f32>,
        testset: Points<'_, f32>,
        matches: Points<'_, i32>,
        nn: usize,
        checks: i32,
        precision: &mut f32,
        skip: usize,
    ) -> f32 {
        (**self).test_with_checks(index, dataset, testset, matches, nn, checks, precision, skip)
    }
}
