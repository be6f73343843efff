//! Pure Rust reference engine
//!
//! Implements the native ABI with exact search regardless of the requested
//! algorithm, hierarchical k-means clustering, and header-only index files.
//! Data handed to `build_index`/`load_index` is copied into the handle
//! table, widened to f64.

use super::dispatch::{resolve, Operation};
use super::kmeans;
use super::{Distance, Engine, NativeOps, RawIndex};
use crate::params::{Algorithm, CentersInit, IndexParams, LogLevel};
use crate::types::{Element, ElementType, Points};
use crate::{Error, Result};
use parking_lot::{Mutex, RwLock};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::os::raw::c_int;
use std::path::Path;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

const INDEX_MAGIC: [u8; 8] = *b"FLANNRS\0";
const INDEX_VERSION: u32 = 1;

/// Header written by `save_index`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IndexFileHeader {
    magic: [u8; 8],
    version: u32,
    element_type: ElementType,
    rows: u64,
    cols: u64,
    algorithm: i32,
}

#[derive(Debug)]
struct StoredIndex {
    element_type: ElementType,
    rows: usize,
    cols: usize,
    algorithm: c_int,
    data: Vec<f64>,
}

impl StoredIndex {
    fn from_points<T: Element>(points: Points<'_, T>, algorithm: c_int) -> Self {
        Self {
            element_type: T::TYPE,
            rows: points.rows(),
            cols: points.cols(),
            algorithm,
            data: widen(points.as_slice()),
        }
    }
}

/// Call counters, for tests and diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Successful builds
    pub builds: usize,
    /// Successful loads
    pub loads: usize,
    /// Successful frees
    pub frees: usize,
    /// Frees of an unknown handle or with the wrong element type
    pub invalid_frees: usize,
    /// k-NN and radius searches
    pub searches: usize,
    /// Clustering runs
    pub clusterings: usize,
    /// Handles currently allocated
    pub live_handles: usize,
}

/// Exact-search engine backing every algorithm code
pub struct BruteForceEngine {
    indexes: Mutex<HashMap<usize, Arc<StoredIndex>>>,
    next_id: AtomicUsize,
    distance: RwLock<Distance>,
    verbosity: AtomicI32,
    stats: Mutex<EngineStats>,
}

impl Default for BruteForceEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl BruteForceEngine {
    /// Engine with an empty handle table
    pub fn new() -> Self {
        Self {
            indexes: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
            distance: RwLock::new(Distance::default()),
            verbosity: AtomicI32::new(LogLevel::Warning.code()),
            stats: Mutex::new(EngineStats::default()),
        }
    }

    /// Snapshot of the call counters
    pub fn stats(&self) -> EngineStats {
        let mut stats = *self.stats.lock();
        stats.live_handles = self.indexes.lock().len();
        stats
    }

    /// Current distance selection
    pub fn distance(&self) -> Distance {
        *self.distance.read()
    }

    /// Verbosity code last passed to `log_verbosity`
    pub fn verbosity(&self) -> c_int {
        self.verbosity.load(Ordering::Relaxed)
    }

    fn install(&self, stored: StoredIndex) -> RawIndex {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.indexes.lock().insert(id, Arc::new(stored));
        RawIndex::from_raw(id)
    }

    fn lookup(&self, index: RawIndex, element_type: ElementType) -> Option<Arc<StoredIndex>> {
        let stored = self.indexes.lock().get(&index.as_raw()).cloned()?;
        if stored.element_type != element_type {
            log::error!(
                "Index {} holds {} data, called with {}",
                index.as_raw(),
                stored.element_type,
                element_type
            );
            return None;
        }
        Some(stored)
    }

    fn verbose(&self) -> bool {
        self.verbosity.load(Ordering::Relaxed) >= LogLevel::Info.code()
    }

    fn count(&self, update: impl FnOnce(&mut EngineStats)) {
        update(&mut *self.stats.lock());
    }

    /// Fraction of ground-truth neighbors found at `checks`, and search time
    #[allow(clippy::too_many_arguments)]
    fn precision_at(
        &self,
        stored: &StoredIndex,
        testset: Points<'_, f32>,
        matches: Points<'_, i32>,
        nn: usize,
        checks: i32,
        skip: usize,
    ) -> (f32, f32) {
        let width = (nn + skip).min(stored.rows);
        let mut indices = vec![-1i32; testset.rows() * width];
        let mut dists = vec![0.0f32; testset.rows() * width];
        let queries = widen(testset.as_slice());

        log::trace!("Testing precision with checks={}", checks);
        let started = Instant::now();
        search_knn(
            &stored.data,
            stored.cols,
            &queries,
            width,
            self.distance(),
            &mut indices,
            &mut dists,
        );
        let seconds = started.elapsed().as_secs_f32();
        self.count(|s| s.searches += 1);

        let mut correct = 0usize;
        for (row, found) in indices.chunks_exact(width.max(1)).enumerate() {
            let truth = &matches.row(row)[..nn];
            correct += found
                .iter()
                .skip(skip)
                .filter(|id| truth.contains(id))
                .count();
        }

        let total = (testset.rows() * nn).max(1);
        (correct as f32 / total as f32, seconds)
    }
}

fn widen<T: Element>(values: &[T]) -> Vec<f64> {
    values.iter().map(|v| v.to_f64()).collect()
}

#[inline]
fn distance_between(metric: Distance, a: &[f64], b: &[f64]) -> f64 {
    match metric {
        Distance::Euclidean => a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum(),
        Distance::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
        Distance::Minkowski(order) => a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y).abs().powi(order))
            .sum(),
    }
}

fn by_distance(a: &(f64, usize), b: &(f64, usize)) -> std::cmp::Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}

/// The `nn` closest rows of `data` to `query`, ascending
fn nearest(data: &[f64], cols: usize, query: &[f64], nn: usize, metric: Distance) -> Vec<(f64, usize)> {
    let mut candidates: Vec<(f64, usize)> = data
        .chunks_exact(cols)
        .enumerate()
        .map(|(id, point)| (distance_between(metric, point, query), id))
        .collect();

    if nn < candidates.len() {
        candidates.select_nth_unstable_by(nn, by_distance);
        candidates.truncate(nn);
    }
    candidates.sort_unstable_by(by_distance);
    candidates
}

fn fill_row(found: &[(f64, usize)], indices: &mut [i32], dists: &mut [f32]) {
    for (slot, (idx, dist)) in indices.iter_mut().zip(dists.iter_mut()).enumerate() {
        match found.get(slot) {
            Some(&(d, id)) => {
                *idx = id as i32;
                *dist = d as f32;
            }
            None => {
                *idx = -1;
                *dist = f32::INFINITY;
            }
        }
    }
}

/// Exact k-NN for every query row into `nn`-wide output rows
fn search_knn(
    data: &[f64],
    cols: usize,
    queries: &[f64],
    nn: usize,
    metric: Distance,
    indices: &mut [i32],
    dists: &mut [f32],
) {
    if nn == 0 || cols == 0 {
        return;
    }

    #[cfg(feature = "parallel")]
    {
        indices
            .par_chunks_mut(nn)
            .zip(dists.par_chunks_mut(nn))
            .zip(queries.par_chunks(cols))
            .for_each(|((idx_row, dist_row), query)| {
                fill_row(&nearest(data, cols, query, nn, metric), idx_row, dist_row);
            });
    }

    #[cfg(not(feature = "parallel"))]
    {
        for ((idx_row, dist_row), query) in indices
            .chunks_mut(nn)
            .zip(dists.chunks_mut(nn))
            .zip(queries.chunks(cols))
        {
            fill_row(&nearest(data, cols, query, nn, metric), idx_row, dist_row);
        }
    }
}

fn invalid_data(message: String) -> Error {
    Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, message))
}

fn rng_for(seed: i64) -> StdRng {
    if seed >= 0 {
        StdRng::seed_from_u64(seed as u64)
    } else {
        StdRng::from_entropy()
    }
}

impl<T: Element> NativeOps<T> for BruteForceEngine {
    fn build_index(&self, dataset: Points<'_, T>, params: &mut IndexParams) -> Result<(RawIndex, f32)> {
        let entry = resolve(Operation::BuildIndex, T::TYPE);
        if dataset.rows() == 0 || dataset.cols() == 0 {
            return Err(Error::NativeFailure {
                operation: entry.symbol,
                status: -1,
            });
        }

        if params.algorithm_kind() == Some(Algorithm::Autotuned) {
            params.algorithm = Algorithm::Linear.code();
        }

        let index = self.install(StoredIndex::from_points(dataset, params.algorithm));
        self.count(|s| s.builds += 1);

        if self.verbose() {
            log::info!(
                "Built index {} over {}x{} {} points",
                index.as_raw(),
                dataset.rows(),
                dataset.cols(),
                T::TYPE
            );
        }
        Ok((index, 1.0))
    }

    fn save_index(&self, index: RawIndex, path: &Path) -> Result<()> {
        let entry = resolve(Operation::SaveIndex, T::TYPE);
        let stored = self.lookup(index, T::TYPE).ok_or(Error::NativeFailure {
            operation: entry.symbol,
            status: -1,
        })?;

        let header = IndexFileHeader {
            magic: INDEX_MAGIC,
            version: INDEX_VERSION,
            element_type: stored.element_type,
            rows: stored.rows as u64,
            cols: stored.cols as u64,
            algorithm: stored.algorithm,
        };

        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, &header).map_err(|e| invalid_data(e.to_string()))?;
        writer.flush()?;
        Ok(())
    }

    fn load_index(&self, path: &Path, dataset: Points<'_, T>) -> Result<RawIndex> {
        let reader = BufReader::new(File::open(path)?);
        let header: IndexFileHeader =
            bincode::deserialize_from(reader).map_err(|e| invalid_data(e.to_string()))?;

        if header.magic != INDEX_MAGIC || header.version != INDEX_VERSION {
            return Err(invalid_data(format!("{} is not an index file", path.display())));
        }
        if header.element_type != T::TYPE {
            return Err(Error::TypeMismatch {
                expected: header.element_type,
                actual: T::TYPE,
            });
        }
        if header.rows != dataset.rows() as u64 || header.cols != dataset.cols() as u64 {
            return Err(Error::InvalidInput(format!(
                "index was built over {}x{} points, got {}x{}",
                header.rows,
                header.cols,
                dataset.rows(),
                dataset.cols()
            )));
        }

        let index = self.install(StoredIndex::from_points(dataset, header.algorithm));
        self.count(|s| s.loads += 1);
        Ok(index)
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
        if dataset.cols() != queries.cols()
            || nn > dataset.rows()
            || indices.len() < queries.rows() * nn
            || dists.len() < queries.rows() * nn
        {
            return -1;
        }
        if params.algorithm_kind() == Some(Algorithm::Autotuned) {
            params.algorithm = Algorithm::Linear.code();
        }

        let data = widen(dataset.as_slice());
        let queries = widen(queries.as_slice());
        search_knn(&data, dataset.cols(), &queries, nn, self.distance(), indices, dists);
        self.count(|s| s.searches += 1);
        0
    }

    fn find_nearest_neighbors_index(
        &self,
        index: RawIndex,
        queries: Points<'_, T>,
        indices: &mut [i32],
        dists: &mut [f32],
        nn: usize,
        _params: &IndexParams,
    ) -> i32 {
        let Some(stored) = self.lookup(index, T::TYPE) else {
            return -1;
        };
        if stored.cols != queries.cols()
            || nn > stored.rows
            || indices.len() < queries.rows() * nn
            || dists.len() < queries.rows() * nn
        {
            return -1;
        }

        let queries = widen(queries.as_slice());
        search_knn(&stored.data, stored.cols, &queries, nn, self.distance(), indices, dists);
        self.count(|s| s.searches += 1);
        0
    }

    fn radius_search(
        &self,
        index: RawIndex,
        query: &[T],
        indices: &mut [i32],
        dists: &mut [f32],
        max_nn: usize,
        radius: f32,
        _params: &IndexParams,
    ) -> i32 {
        let Some(stored) = self.lookup(index, T::TYPE) else {
            return -1;
        };
        if query.len() != stored.cols {
            return -1;
        }

        let query = widen(query);
        let radius = radius as f64;
        let metric = self.distance();
        let mut found: Vec<(f64, usize)> = stored
            .data
            .chunks_exact(stored.cols)
            .enumerate()
            .map(|(id, point)| (distance_between(metric, point, &query), id))
            .filter(|&(d, _)| d <= radius)
            .collect();
        found.sort_unstable_by(by_distance);

        let count = found.len().min(max_nn).min(indices.len()).min(dists.len());
        fill_row(&found[..count], &mut indices[..count], &mut dists[..count]);
        self.count(|s| s.searches += 1);
        count as i32
    }

    fn compute_cluster_centers(
        &self,
        dataset: Points<'_, T>,
        clusters: usize,
        result: &mut [T::Center],
        params: &IndexParams,
    ) -> i32 {
        let cols = dataset.cols();
        if clusters == 0 || dataset.rows() < clusters || result.len() < clusters * cols {
            return -1;
        }

        let data: Vec<Vec<f64>> = dataset.iter_rows().map(widen).collect();
        let max_iterations = usize::try_from(params.iterations).ok();
        let init = params.centers_init_kind().unwrap_or(CentersInit::Random);
        let mut rng = rng_for(params.random_seed as i64);

        let centers = kmeans::hierarchical(
            &data,
            clusters,
            params.branching.max(2) as usize,
            max_iterations,
            init,
            &mut rng,
        );

        for (out, center) in result.chunks_exact_mut(cols).zip(&centers) {
            for (o, &v) in out.iter_mut().zip(center) {
                *o = T::Center::from_f64(v);
            }
        }
        self.count(|s| s.clusterings += 1);

        if self.verbose() {
            log::info!("Computed {} of {} cluster centers", centers.len(), clusters);
        }
        centers.len() as i32
    }

    fn free_index(&self, index: RawIndex, _params: &IndexParams) {
        let id = index.as_raw();
        let held = {
            let mut indexes = self.indexes.lock();
            let held = indexes.get(&id).map(|stored| stored.element_type);
            if held == Some(T::TYPE) {
                indexes.remove(&id);
            }
            held
        };

        match held {
            Some(ty) if ty == T::TYPE => self.count(|s| s.frees += 1),
            Some(ty) => {
                log::error!("Refusing to free {} index {} as {}", ty, id, T::TYPE);
                self.count(|s| s.invalid_frees += 1);
            }
            None => {
                log::error!("Free of unknown index {}", id);
                self.count(|s| s.invalid_frees += 1);
            }
        }
    }
}

impl Engine for BruteForceEngine {
    fn set_distance_type(&self, distance: Distance) {
        log::debug!("Distance set to {:?}", distance);
        *self.distance.write() = distance;
    }

    fn log_verbosity(&self, level: c_int) {
        self.verbosity.store(level, Ordering::Relaxed);
    }

    fn compute_ground_truth(
        &self,
        dataset: Points<'_, f32>,
        testset: Points<'_, f32>,
        matches: &mut [i32],
        nn: usize,
        skip: usize,
    ) {
        if nn == 0 || dataset.cols() != testset.cols() {
            return;
        }
        let data = widen(dataset.as_slice());
        let metric = self.distance();

        for (query, row) in testset.iter_rows().zip(matches.chunks_mut(nn)) {
            let found = nearest(&data, dataset.cols(), &widen(query), nn + skip, metric);
            for (slot, out) in row.iter_mut().enumerate() {
                *out = found.get(slot + skip).map_or(-1, |&(_, id)| id as i32);
            }
        }
    }

    fn test_with_precision(
        &self,
        index: RawIndex,
        _dataset: Points<'_, f32>,
        testset: Points<'_, f32>,
        matches: Points<'_, i32>,
        nn: usize,
        precision: f32,
        checks: &mut i32,
        skip: usize,
    ) -> f32 {
        let Some(stored) = self.lookup(index, ElementType::Float32) else {
            return -1.0;
        };

        // Double until the target is met, then bisect back down
        let mut upper = 1i32;
        let (mut reached, mut seconds) = self.precision_at(&stored, testset, matches, nn, upper, skip);
        while reached < precision && (upper as usize) < stored.rows {
            upper = upper.saturating_mul(2);
            (reached, seconds) = self.precision_at(&stored, testset, matches, nn, upper, skip);
        }

        let mut lower = upper / 2;
        while upper - lower > 1 {
            let middle = lower + (upper - lower) / 2;
            let (p, t) = self.precision_at(&stored, testset, matches, nn, middle, skip);
            if p >= precision {
                upper = middle;
                seconds = t;
            } else {
                lower = middle;
            }
        }

        log::debug!("Precision {} reached with checks={}", precision, upper);
        *checks = upper;
        seconds
    }

    fn test_with_checks(
        &self,
        index: RawIndex,
        _dataset: Points<'_, f32>,
        testset: Points<'_, f32>,
        matches: Points<'_, i32>,
        nn: usize,
        checks: i32,
        precision: &mut f32,
        skip: usize,
    ) -> f32 {
        let Some(stored) = self.lookup(index, ElementType::Float32) else {
            return -1.0;
        };
        let (reached, seconds) = self.precision_at(&stored, testset, matches, nn, checks, skip);
        *precision = reached;
        seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    fn grid() -> Vec<f32> {
        (0..20).flat_map(|i| [i as f32, 0.0]).collect()
    }

    #[test]
    fn test_build_search_free() {
        let engine = BruteForceEngine::new();
        let data = grid();
        let points = Points::new(&data, 20, 2).unwrap();
        let mut params = IndexParams::default();

        let (index, speedup) = engine.build_index(points, &mut params).unwrap();
        assert_relative_eq!(speedup, 1.0);

        let query = [4.2f32, 0.0];
        let mut indices = [0i32; 3];
        let mut dists = [0f32; 3];
        let status = engine.find_nearest_neighbors_index(
            index,
            Points::from_row(&query),
            &mut indices,
            &mut dists,
            3,
            &params,
        );
        assert_eq!(status, 0);
        assert_eq!(indices, [4, 5, 3]);
        assert_relative_eq!(dists[0], 0.04, epsilon = 1e-5);

        NativeOps::<f32>::free_index(&engine, index, &params);
        let stats = engine.stats();
        assert_eq!((stats.builds, stats.frees, stats.live_handles), (1, 1, 0));
    }

    #[test]
    fn test_free_with_wrong_type_is_counted() {
        let engine = BruteForceEngine::new();
        let data = [1u8, 2, 3, 4];
        let mut params = IndexParams::default();
        let (index, _) = engine.build_index(Points::new(&data, 2, 2).unwrap(), &mut params).unwrap();

        NativeOps::<f32>::free_index(&engine, index, &params);
        NativeOps::<u8>::free_index(&engine, index, &params);
        NativeOps::<u8>::free_index(&engine, index, &params);

        let stats = engine.stats();
        assert_eq!(stats.frees, 1);
        assert_eq!(stats.invalid_frees, 2);
    }

    #[test]
    fn test_autotuned_rewrites_algorithm() {
        let engine = BruteForceEngine::new();
        let data = grid();
        let mut params = IndexParams::default();
        params.algorithm = Algorithm::Autotuned.code();
        engine.build_index(Points::new(&data, 20, 2).unwrap(), &mut params).unwrap();
        assert_eq!(params.algorithm_kind(), Some(Algorithm::Linear));
    }

    #[test]
    fn test_radius_search_respects_max() {
        let engine = BruteForceEngine::new();
        let data = grid();
        let mut params = IndexParams::default();
        let (index, _) = engine.build_index(Points::new(&data, 20, 2).unwrap(), &mut params).unwrap();

        let mut indices = vec![0i32; 20];
        let mut dists = vec![0f32; 20];
        let query = [10.0f32, 0.0];
        let count = engine.radius_search(index, &query, &mut indices, &mut dists, 20, 4.0, &params);
        assert_eq!(count, 5);
        assert_eq!(indices[0], 10);

        let count = engine.radius_search(index, &query, &mut indices, &mut dists, 2, 4.0, &params);
        assert_eq!(count, 2);
    }

    #[test]
    fn test_manhattan_distance() {
        let engine = BruteForceEngine::new();
        engine.set_distance_type(Distance::Manhattan);
        let data = [0.0f64, 0.0, 3.0, 4.0];
        let mut params = IndexParams::default();
        let mut indices = [0i32; 2];
        let mut dists = [0f32; 2];
        let status = engine.find_nearest_neighbors(
            Points::new(&data, 2, 2).unwrap(),
            Points::from_row(&data[..2]),
            &mut indices,
            &mut dists,
            2,
            &mut params,
        );
        assert_eq!(status, 0);
        assert_relative_eq!(dists[1], 7.0);
    }

    #[test]
    fn test_search_rejects_oversized_k() {
        let engine = BruteForceEngine::new();
        let data = [1i32, 2, 3, 4];
        let mut params = IndexParams::default();
        let mut indices = [0i32; 3];
        let mut dists = [0f32; 3];
        let status = engine.find_nearest_neighbors(
            Points::new(&data, 2, 2).unwrap(),
            Points::from_row(&data[..2]),
            &mut indices,
            &mut dists,
            3,
            &mut params,
        );
        assert!(status < 0);
    }

    #[test]
    fn test_save_load_validates_header() {
        let engine = BruteForceEngine::new();
        let dir = tempdir().unwrap();
        let path = dir.path().join("grid.idx");
        let data = grid();
        let points = Points::new(&data, 20, 2).unwrap();
        let mut params = IndexParams::default();

        let (index, _) = engine.build_index(points, &mut params).unwrap();
        NativeOps::<f32>::save_index(&engine, index, &path).unwrap();

        let loaded = engine.load_index(&path, points).unwrap();
        assert_ne!(loaded, index);

        let wide: Vec<f64> = data.iter().map(|&v| v as f64).collect();
        let err = engine.load_index(&path, Points::new(&wide, 20, 2).unwrap());
        assert!(matches!(err, Err(Error::TypeMismatch { .. })));

        let err = engine.load_index(&path, Points::new(&data[..20], 10, 2).unwrap());
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_cluster_centers_count() {
        let engine = BruteForceEngine::new();
        let mut rng = StdRng::seed_from_u64(11);
        let data: Vec<u8> = (0..200).map(|_| rng.gen()).collect();
        let points = Points::new(&data, 50, 4).unwrap();
        let mut params = IndexParams::default();
        params.branching = 3;
        params.random_seed = 17;

        let mut result = vec![0f32; 5 * 4];
        assert_eq!(engine.compute_cluster_centers(points, 5, &mut result, &params), 5);

        let mut result = vec![0f32; 60 * 4];
        assert_eq!(engine.compute_cluster_centers(points, 60, &mut result, &params), -1);
    }

    #[test]
    fn test_ground_truth_and_precision() {
        let engine = BruteForceEngine::new();
        let data = grid();
        let points = Points::new(&data, 20, 2).unwrap();
        let tests = [3.1f32, 0.0, 17.9, 0.0];
        let testset = Points::new(&tests, 2, 2).unwrap();

        let mut matches = vec![0i32; 4];
        engine.compute_ground_truth(points, testset, &mut matches, 2, 0);
        assert_eq!(matches, [3, 4, 18, 17]);

        let mut params = IndexParams::default();
        let (index, _) = engine.build_index(points, &mut params).unwrap();
        let truth = Points::new(&matches, 2, 2).unwrap();

        let mut precision = 0.0;
        engine.test_with_checks(index, points, testset, truth, 2, 32, &mut precision, 0);
        assert_relative_eq!(precision, 1.0);

        let mut checks = 0;
        engine.test_with_precision(index, points, testset, truth, 2, 0.9, &mut checks, 0);
        assert_eq!(checks, 1);
    }
}
