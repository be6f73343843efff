//! Bindings to the system FLANN C library
//!
//! Enabled with the `native` feature; links against `libflann`. The
//! parameter record is passed by pointer exactly as laid out in
//! [`IndexParams`].

use super::dispatch::{resolve, Operation};
use super::{Distance, Engine, NativeOps, RawIndex};
use crate::params::IndexParams;
use crate::types::{Element, Points};
use crate::{Error, Result};
use std::ffi::CString;
use std::os::raw::{c_char, c_float, c_int, c_void};
use std::path::Path;

type FlannIndex = *mut c_void;

macro_rules! declare_typed {
    ($t:ty, $center:ty,
     $build:ident, $save:ident, $load:ident, $find:ident, $find_index:ident,
     $radius:ident, $cluster:ident, $free:ident) => {
        fn $build(
            dataset: *const $t,
            rows: c_int,
            cols: c_int,
            speedup: *mut c_float,
            params: *mut IndexParams,
        ) -> FlannIndex;
        fn $save(index: FlannIndex, filename: *const c_char) -> c_int;
        fn $load(filename: *const c_char, dataset: *const $t, rows: c_int, cols: c_int) -> FlannIndex;
        fn $find(
            dataset: *const $t,
            rows: c_int,
            cols: c_int,
            testset: *const $t,
            trows: c_int,
            indices: *mut c_int,
            dists: *mut c_float,
            nn: c_int,
            params: *mut IndexParams,
        ) -> c_int;
        fn $find_index(
            index: FlannIndex,
            testset: *const $t,
            trows: c_int,
            indices: *mut c_int,
            dists: *mut c_float,
            nn: c_int,
            params: *const IndexParams,
        ) -> c_int;
        fn $radius(
            index: FlannIndex,
            query: *const $t,
            indices: *mut c_int,
            dists: *mut c_float,
            max_nn: c_int,
            radius: c_float,
            params: *const IndexParams,
        ) -> c_int;
        fn $cluster(
            dataset: *const $t,
            rows: c_int,
            cols: c_int,
            clusters: c_int,
            result: *mut $center,
            params: *const IndexParams,
        ) -> c_int;
        fn $free(index: FlannIndex, params: *const IndexParams) -> c_int;
    };
}

#[link(name = "flann")]
extern "C" {
    declare_typed!(f32, f32,
        flann_build_index_float, flann_save_index_float, flann_load_index_float,
        flann_find_nearest_neighbors_float, flann_find_nearest_neighbors_index_float,
        flann_radius_search_float, flann_compute_cluster_centers_float, flann_free_index_float);
    declare_typed!(f64, f64,
        flann_build_index_double, flann_save_index_double, flann_load_index_double,
        flann_find_nearest_neighbors_double, flann_find_nearest_neighbors_index_double,
        flann_radius_search_double, flann_compute_cluster_centers_double, flann_free_index_double);
    declare_typed!(u8, f32,
        flann_build_index_byte, flann_save_index_byte, flann_load_index_byte,
        flann_find_nearest_neighbors_byte, flann_find_nearest_neighbors_index_byte,
        flann_radius_search_byte, flann_compute_cluster_centers_byte, flann_free_index_byte);
    declare_typed!(i32, f32,
        flann_build_index_int, flann_save_index_int, flann_load_index_int,
        flann_find_nearest_neighbors_int, flann_find_nearest_neighbors_index_int,
        flann_radius_search_int, flann_compute_cluster_centers_int, flann_free_index_int);

    fn flann_log_verbosity(level: c_int);
    fn flann_set_distance_type(distance_type: c_int, order: c_int);
    fn compute_ground_truth_float(
        dataset: *const c_float,
        dshape: *const c_int,
        testset: *const c_float,
        tshape: *const c_int,
        matches: *mut c_int,
        mshape: *const c_int,
        skip: c_int,
    );
    fn test_with_precision(
        index: FlannIndex,
        dataset: *const c_float,
        dshape: *const c_int,
        testset: *const c_float,
        tshape: *const c_int,
        matches: *const c_int,
        mshape: *const c_int,
        nn: c_int,
        precision: c_float,
        checks: *mut c_int,
        skip: c_int,
    ) -> c_float;
    fn test_with_checks(
        index: FlannIndex,
        dataset: *const c_float,
        dshape: *const c_int,
        testset: *const c_float,
        tshape: *const c_int,
        matches: *const c_int,
        mshape: *const c_int,
        nn: c_int,
        checks: c_int,
        precision: *mut c_float,
        skip: c_int,
    ) -> c_float;
}

fn to_c_int(value: usize, what: &str) -> Result<c_int> {
    c_int::try_from(value)
        .map_err(|_| Error::InvalidInput(format!("{} {} does not fit in a C int", what, value)))
}

/// Convert the sizes of one call; logs and returns `None` on the first that
/// does not fit
fn c_sizes<const N: usize>(operation: &str, sizes: [(&str, usize); N]) -> Option<[c_int; N]> {
    let mut out = [0; N];
    for (slot, (what, value)) in out.iter_mut().zip(sizes) {
        match to_c_int(value, what) {
            Ok(v) => *slot = v,
            Err(e) => {
                log::error!("{}: {}", operation, e);
                return None;
            }
        }
    }
    Some(out)
}

fn shape_of<T: Element>(operation: &str, points: &Points<'_, T>) -> Option<[c_int; 2]> {
    c_sizes(operation, [("rows", points.rows()), ("cols", points.cols())])
}

fn c_path(path: &Path) -> Result<CString> {
    CString::new(path.to_string_lossy().as_bytes())
        .map_err(|_| Error::InvalidInput(format!("path contains a NUL byte: {}", path.display())))
}

fn handle(index: RawIndex) -> FlannIndex {
    index.as_raw() as FlannIndex
}

/// The system `libflann`
#[derive(Debug, Default, Clone, Copy)]
pub struct FlannLibrary;

impl FlannLibrary {
    /// Handle to the linked library
    pub fn new() -> Self {
        FlannLibrary
    }
}

macro_rules! impl_native_ops {
    ($t:ty,
     $build:ident, $save:ident, $load:ident, $find:ident, $find_index:ident,
     $radius:ident, $cluster:ident, $free:ident) => {
        impl NativeOps<$t> for FlannLibrary {
            fn build_index(&self, dataset: Points<'_, $t>, params: &mut IndexParams) -> Result<(RawIndex, f32)> {
                let rows = to_c_int(dataset.rows(), "rows")?;
                let cols = to_c_int(dataset.cols(), "cols")?;
                let mut speedup: c_float = 0.0;
                // SAFETY: the dataset slice is rows x cols contiguous and outlives the call.
                let raw = unsafe {
                    $build(
                        dataset.as_slice().as_ptr(),
                        rows,
                        cols,
                        &mut speedup,
                        params,
                    )
                };
                if raw.is_null() {
                    return Err(Error::NativeFailure {
                        operation: resolve(Operation::BuildIndex, <$t as Element>::TYPE).symbol,
                        status: -1,
                    });
                }
                Ok((RawIndex::from_raw(raw as usize), speedup))
            }

            fn save_index(&self, index: RawIndex, path: &Path) -> Result<()> {
                let filename = c_path(path)?;
                // SAFETY: the handle came from this library and has not been freed.
                let status = unsafe { $save(handle(index), filename.as_ptr()) };
                if status < 0 {
                    return Err(Error::NativeFailure {
                        operation: resolve(Operation::SaveIndex, <$t as Element>::TYPE).symbol,
                        status,
                    });
                }
                Ok(())
            }

            fn load_index(&self, path: &Path, dataset: Points<'_, $t>) -> Result<RawIndex> {
                let filename = c_path(path)?;
                let rows = to_c_int(dataset.rows(), "rows")?;
                let cols = to_c_int(dataset.cols(), "cols")?;
                // SAFETY: filename is NUL terminated; dataset is contiguous.
                let raw = unsafe {
                    $load(
                        filename.as_ptr(),
                        dataset.as_slice().as_ptr(),
                        rows,
                        cols,
                    )
                };
                if raw.is_null() {
                    return Err(Error::NativeFailure {
                        operation: resolve(Operation::LoadIndex, <$t as Element>::TYPE).symbol,
                        status: -1,
                    });
                }
                Ok(RawIndex::from_raw(raw as usize))
            }

            fn find_nearest_neighbors(
                &self,
                dataset: Points<'_, $t>,
                queries: Points<'_, $t>,
                indices: &mut [i32],
                dists: &mut [f32],
                nn: usize,
                params: &mut IndexParams,
            ) -> i32 {
                if indices.len() < queries.rows() * nn || dists.len() < queries.rows() * nn {
                    return -1;
                }
                let operation = resolve(Operation::FindNearestNeighbors, <$t as Element>::TYPE).symbol;
                let sizes = [
                    ("rows", dataset.rows()),
                    ("cols", dataset.cols()),
                    ("query rows", queries.rows()),
                    ("nn", nn),
                ];
                let Some([rows, cols, trows, nn]) = c_sizes(operation, sizes) else {
                    return -1;
                };
                // SAFETY: output buffers hold queries x nn elements.
                unsafe {
                    $find(
                        dataset.as_slice().as_ptr(),
                        rows,
                        cols,
                        queries.as_slice().as_ptr(),
                        trows,
                        indices.as_mut_ptr(),
                        dists.as_mut_ptr(),
                        nn,
                        params,
                    )
                }
            }

            fn find_nearest_neighbors_index(
                &self,
                index: RawIndex,
                queries: Points<'_, $t>,
                indices: &mut [i32],
                dists: &mut [f32],
                nn: usize,
                params: &IndexParams,
            ) -> i32 {
                if indices.len() < queries.rows() * nn || dists.len() < queries.rows() * nn {
                    return -1;
                }
                let operation = resolve(Operation::FindNearestNeighborsIndex, <$t as Element>::TYPE).symbol;
                let Some([trows, nn]) = c_sizes(operation, [("query rows", queries.rows()), ("nn", nn)]) else {
                    return -1;
                };
                // SAFETY: output buffers hold queries x nn elements.
                unsafe {
                    $find_index(
                        handle(index),
                        queries.as_slice().as_ptr(),
                        trows,
                        indices.as_mut_ptr(),
                        dists.as_mut_ptr(),
                        nn,
                        params,
                    )
                }
            }

            fn radius_search(
                &self,
                index: RawIndex,
                query: &[$t],
                indices: &mut [i32],
                dists: &mut [f32],
                max_nn: usize,
                radius: f32,
                params: &IndexParams,
            ) -> i32 {
                let max_nn = max_nn.min(indices.len()).min(dists.len());
                let operation = resolve(Operation::RadiusSearch, <$t as Element>::TYPE).symbol;
                let Some([max_nn]) = c_sizes(operation, [("max_nn", max_nn)]) else {
                    return -1;
                };
                // SAFETY: at most max_nn results are written to each buffer.
                unsafe {
                    $radius(
                        handle(index),
                        query.as_ptr(),
                        indices.as_mut_ptr(),
                        dists.as_mut_ptr(),
                        max_nn,
                        radius,
                        params,
                    )
                }
            }

            fn compute_cluster_centers(
                &self,
                dataset: Points<'_, $t>,
                clusters: usize,
                result: &mut [<$t as Element>::Center],
                params: &IndexParams,
            ) -> i32 {
                if result.len() < clusters * dataset.cols() {
                    return -1;
                }
                let operation = resolve(Operation::ComputeClusterCenters, <$t as Element>::TYPE).symbol;
                let sizes = [("rows", dataset.rows()), ("cols", dataset.cols()), ("clusters", clusters)];
                let Some([rows, cols, clusters]) = c_sizes(operation, sizes) else {
                    return -1;
                };
                // SAFETY: result holds clusters x cols elements.
                unsafe {
                    $cluster(
                        dataset.as_slice().as_ptr(),
                        rows,
                        cols,
                        clusters,
                        result.as_mut_ptr(),
                        params,
                    )
                }
            }

            fn free_index(&self, index: RawIndex, params: &IndexParams) {
                // SAFETY: the session frees each handle exactly once.
                let status = unsafe { $free(handle(index), params) };
                if status < 0 {
                    log::error!(
                        "{} returned {}",
                        resolve(Operation::FreeIndex, <$t as Element>::TYPE).symbol,
                        status
                    );
                }
            }
        }
    };
}

impl_native_ops!(f32,
    flann_build_index_float, flann_save_index_float, flann_load_index_float,
    flann_find_nearest_neighbors_float, flann_find_nearest_neighbors_index_float,
    flann_radius_search_float, flann_compute_cluster_centers_float, flann_free_index_float);
impl_native_ops!(f64,
    flann_build_index_double, flann_save_index_double, flann_load_index_double,
    flann_find_nearest_neighbors_double, flann_find_nearest_neighbors_index_double,
    flann_radius_search_double, flann_compute_cluster_centers_double, flann_free_index_double);
impl_native_ops!(u8,
    flann_build_index_byte, flann_save_index_byte, flann_load_index_byte,
    flann_find_nearest_neighbors_byte, flann_find_nearest_neighbors_index_byte,
    flann_radius_search_byte, flann_compute_cluster_centers_byte, flann_free_index_byte);
impl_native_ops!(i32,
    flann_build_index_int, flann_save_index_int, flann_load_index_int,
    flann_find_nearest_neighbors_int, flann_find_nearest_neighbors_index_int,
    flann_radius_search_int, flann_compute_cluster_centers_int, flann_free_index_int);

impl Engine for FlannLibrary {
    fn set_distance_type(&self, distance: Distance) {
        // SAFETY: plain value arguments.
        unsafe { flann_set_distance_type(distance.code(), distance.order()) }
    }

    fn log_verbosity(&self, level: c_int) {
        // SAFETY: plain value argument.
        unsafe { flann_log_verbosity(level) }
    }

    fn compute_ground_truth(
        &self,
        dataset: Points<'_, f32>,
        testset: Points<'_, f32>,
        matches: &mut [i32],
        nn: usize,
        skip: usize,
    ) {
        if matches.len() < testset.rows() * nn {
            return;
        }
        let operation = "compute_ground_truth_float";
        let (Some(dshape), Some(tshape), Some([nn, skip])) = (
            shape_of(operation, &dataset),
            shape_of(operation, &testset),
            c_sizes(operation, [("nn", nn), ("skip", skip)]),
        ) else {
            return;
        };
        let mshape = [tshape[0], nn];
        // SAFETY: matches holds testset rows x nn elements.
        unsafe {
            compute_ground_truth_float(
                dataset.as_slice().as_ptr(),
                dshape.as_ptr(),
                testset.as_slice().as_ptr(),
                tshape.as_ptr(),
                matches.as_mut_ptr(),
                mshape.as_ptr(),
                skip,
            )
        }
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
        let operation = "test_with_precision";
        let (Some(dshape), Some(tshape), Some(mshape), Some([nn, skip])) = (
            shape_of(operation, &dataset),
            shape_of(operation, &testset),
            shape_of(operation, &matches),
            c_sizes(operation, [("nn", nn), ("skip", skip)]),
        ) else {
            return -1.0;
        };
        // SAFETY: every array is passed with its own shape.
        unsafe {
            test_with_precision(
                handle(index),
                dataset.as_slice().as_ptr(),
                dshape.as_ptr(),
                testset.as_slice().as_ptr(),
                tshape.as_ptr(),
                matches.as_slice().as_ptr(),
                mshape.as_ptr(),
                nn,
                precision,
                checks,
                skip,
            )
        }
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
        let operation = "test_with_checks";
        let (Some(dshape), Some(tshape), Some(mshape), Some([nn, skip])) = (
            shape_of(operation, &dataset),
            shape_of(operation, &testset),
            shape_of(operation, &matches),
            c_sizes(operation, [("nn", nn), ("skip", skip)]),
        ) else {
            return -1.0;
        };
        // SAFETY: every array is passed with its own shape.
        unsafe {
            test_with_checks(
                handle(index),
                dataset.as_slice().as_ptr(),
                dshape.as_ptr(),
                testset.as_slice().as_ptr(),
                tshape.as_ptr(),
                matches.as_slice().as_ptr(),
                mshape.as_ptr(),
                nn,
                checks,
                precision,
                skip,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes_beyond_c_int_are_rejected() {
        assert_eq!(to_c_int(7, "rows").unwrap(), 7);
        assert_eq!(to_c_int(c_int::MAX as usize, "rows").unwrap(), c_int::MAX);
        assert!(matches!(
            to_c_int(c_int::MAX as usize + 1, "rows"),
            Err(Error::InvalidInput(_))
        ));

        assert_eq!(c_sizes("op", [("rows", 3), ("nn", 2)]), Some([3, 2]));
        assert_eq!(c_sizes("op", [("rows", 3), ("nn", usize::MAX)]), None);
    }
}
