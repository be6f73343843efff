//! Nearest-neighbor and radius search
//!
//! All preconditions that can be read off shapes and element types are
//! checked before the engine is called.

use crate::engine::dispatch::{resolve, with_point_pair, Operation};
use crate::engine::{Engine, NativeOps};
use crate::index::Session;
use crate::params::ParamOverrides;
use crate::types::{Matrix, PointSet};
use crate::{Error, Result};

/// k-NN result
///
/// With `k = 1` the outputs are flat, one entry per query.
#[derive(Debug, Clone, PartialEq)]
pub enum Neighbors {
    /// One neighbor per query (`k = 1`)
    Single {
        /// Neighbor index per query
        indices: Vec<i32>,
        /// Distance per query
        distances: Vec<f32>,
    },
    /// `queries x k` results
    Multi {
        /// Neighbor indices, row per query
        indices: Matrix<i32>,
        /// Distances, row per query
        distances: Matrix<f32>,
    },
}

impl Neighbors {
    fn from_buffers(indices: Vec<i32>, distances: Vec<f32>, queries: usize, k: usize) -> Result<Self> {
        if k == 1 {
            return Ok(Neighbors::Single { indices, distances });
        }
        Ok(Neighbors::Multi {
            indices: Matrix::from_vec(indices, queries, k)?,
            distances: Matrix::from_vec(distances, queries, k)?,
        })
    }

    /// Number of queries
    pub fn len(&self) -> usize {
        match self {
            Neighbors::Single { indices, .. } => indices.len(),
            Neighbors::Multi { indices, .. } => indices.rows(),
        }
    }

    /// Whether there are no queries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Neighbors per query
    pub fn k(&self) -> usize {
        match self {
            Neighbors::Single { .. } => 1,
            Neighbors::Multi { indices, .. } => indices.cols(),
        }
    }

    /// `(queries, k)` for matrix results, `(queries,)` as `(queries, 1)` otherwise
    pub fn shape(&self) -> (usize, usize) {
        (self.len(), self.k())
    }

    /// Row-major indices
    pub fn indices(&self) -> &[i32] {
        match self {
            Neighbors::Single { indices, .. } => indices,
            Neighbors::Multi { indices, .. } => indices.as_slice(),
        }
    }

    /// Row-major distances
    pub fn distances(&self) -> &[f32] {
        match self {
            Neighbors::Single { distances, .. } => distances,
            Neighbors::Multi { distances, .. } => distances.as_slice(),
        }
    }

    /// Indices and distances for one query, `None` past the last query
    pub fn row(&self, query: usize) -> Option<(&[i32], &[f32])> {
        if query >= self.len() {
            return None;
        }
        let k = self.k();
        let range = query * k..(query + 1) * k;
        Some((&self.indices()[range.clone()], &self.distances()[range]))
    }
}

/// Radius search result, nearest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RadiusMatches {
    /// Indices of matching points
    pub indices: Vec<i32>,
    /// Distances of matching points
    pub distances: Vec<f32>,
}

impl RadiusMatches {
    /// Number of matches
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether nothing matched
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

fn check_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(Error::InvalidParameter("k must be at least 1".to_string()));
    }
    Ok(())
}

fn check_columns(reference: &PointSet<'_>, queries: &PointSet<'_>) -> Result<()> {
    if reference.cols() != queries.cols() {
        return Err(Error::InvalidInput(format!(
            "queries have {} columns, reference points have {}",
            queries.cols(),
            reference.cols()
        )));
    }
    Ok(())
}

fn check_cardinality(reference: &PointSet<'_>, k: usize) -> Result<()> {
    if k > reference.rows() {
        return Err(Error::InsufficientData {
            requested: k,
            available: reference.rows(),
        });
    }
    Ok(())
}

fn native_status(operation: Operation, reference: &PointSet<'_>, status: i32) -> Result<()> {
    if status < 0 {
        return Err(Error::NativeFailure {
            operation: resolve(operation, reference.element_type()).symbol,
            status,
        });
    }
    Ok(())
}

impl<'data, E: Engine> Session<'data, E> {
    /// k nearest neighbors of `queries` in `points`, without an index
    pub fn nn<'a, 'q>(
        &mut self,
        points: impl Into<PointSet<'a>>,
        queries: impl Into<PointSet<'q>>,
        k: usize,
        overrides: &ParamOverrides,
    ) -> Result<Neighbors> {
        let points = points.into();
        let queries = queries.into();
        check_k(k)?;
        points.ensure_nonempty("points")?;
        queries.ensure_nonempty("queries")?;
        if points.element_type() != queries.element_type() {
            return Err(Error::TypeMismatch {
                expected: points.element_type(),
                actual: queries.element_type(),
            });
        }
        check_columns(&points, &queries)?;
        check_cardinality(&points, k)?;

        self.update_params(overrides)?;

        let n = queries.rows();
        let mut indices = vec![0i32; n * k];
        let mut distances = vec![0f32; n * k];

        log::debug!(
            "{} with {} queries, k={}",
            resolve(Operation::FindNearestNeighbors, points.element_type()).symbol,
            n,
            k
        );
        let engine = &self.engine;
        let params = &mut self.params;
        let status = with_point_pair!(points, queries, (p, q) => {
            Ok(NativeOps::find_nearest_neighbors(engine, p, q, &mut indices, &mut distances, k, params))
        })?;
        native_status(Operation::FindNearestNeighbors, &points, status)?;

        Neighbors::from_buffers(indices, distances, n, k)
    }

    /// k nearest neighbors of `queries` in the active index
    pub fn nn_index<'q>(
        &mut self,
        queries: impl Into<PointSet<'q>>,
        k: usize,
        overrides: &ParamOverrides,
    ) -> Result<Neighbors> {
        let queries = queries.into();
        let active = self.active()?;
        let reference = active.points;
        if queries.element_type() != reference.element_type() {
            return Err(Error::TypeMismatch {
                expected: reference.element_type(),
                actual: queries.element_type(),
            });
        }
        check_k(k)?;
        queries.ensure_nonempty("queries")?;
        check_columns(&reference, &queries)?;
        check_cardinality(&reference, k)?;

        self.update_params(overrides)?;

        let n = queries.rows();
        let mut indices = vec![0i32; n * k];
        let mut distances = vec![0f32; n * k];

        log::debug!(
            "{} on index {} with {} queries, k={}",
            resolve(Operation::FindNearestNeighborsIndex, reference.element_type()).symbol,
            active.raw.as_raw(),
            n,
            k
        );
        let engine = &self.engine;
        let params = &self.params;
        let status = with_point_pair!(reference, queries, (_reference, q) => {
            Ok(NativeOps::find_nearest_neighbors_index(
                engine, active.raw, q, &mut indices, &mut distances, k, params,
            ))
        })?;
        native_status(Operation::FindNearestNeighborsIndex, &reference, status)?;

        Neighbors::from_buffers(indices, distances, n, k)
    }

    /// Points of the active index within `radius` of a single `query`.
    ///
    /// At most `max_candidates` matches are returned (all within radius
    /// when `None`).
    pub fn nn_radius<'q>(
        &mut self,
        query: impl Into<PointSet<'q>>,
        radius: f32,
        max_candidates: Option<usize>,
        overrides: &ParamOverrides,
    ) -> Result<RadiusMatches> {
        let query = query.into();
        let active = self.active()?;
        let reference = active.points;
        if query.element_type() != reference.element_type() {
            return Err(Error::TypeMismatch {
                expected: reference.element_type(),
                actual: query.element_type(),
            });
        }
        if query.rows() != 1 {
            return Err(Error::InvalidInput(format!(
                "radius search takes a single point, got {} rows",
                query.rows()
            )));
        }
        check_columns(&reference, &query)?;
        if radius.is_nan() || radius < 0.0 {
            return Err(Error::InvalidParameter(format!("radius must be non-negative, got {}", radius)));
        }

        self.update_params(overrides)?;

        let n = reference.rows();
        let max_nn = max_candidates.unwrap_or(n).min(n);
        let mut indices = vec![0i32; n];
        let mut distances = vec![0f32; n];

        log::debug!(
            "{} on index {}, radius={}, max_nn={}",
            resolve(Operation::RadiusSearch, reference.element_type()).symbol,
            active.raw.as_raw(),
            radius,
            max_nn
        );
        let engine = &self.engine;
        let params = &self.params;
        let count = with_point_pair!(reference, query, (_reference, q) => {
            Ok(NativeOps::radius_search(
                engine, active.raw, q.row(0), &mut indices, &mut distances, max_nn, radius, params,
            ))
        })?;
        native_status(Operation::RadiusSearch, &reference, count)?;

        let count = (count as usize).min(n);
        indices.truncate(count);
        distances.truncate(count);
        Ok(RadiusMatches { indices, distances })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Points;
    use approx::assert_relative_eq;

    fn line() -> Vec<f32> {
        (0..10).map(|i| i as f32).collect()
    }

    #[test]
    fn test_k1_results_are_flat() {
        let data = line();
        let queries = [2.2f32, 7.9];
        let mut session = Session::new();
        let result = session
            .nn(
                Points::new(&data, 10, 1).unwrap(),
                Points::new(&queries, 2, 1).unwrap(),
                1,
                &ParamOverrides::new(),
            )
            .unwrap();

        match &result {
            Neighbors::Single { indices, distances } => {
                assert_eq!(indices, &[2, 8]);
                assert_relative_eq!(distances[0], 0.04, epsilon = 1e-5);
            }
            other => panic!("expected flat result, got shape {:?}", other.shape()),
        }
    }

    #[test]
    fn test_row_past_last_query_is_none() {
        let data = line();
        let queries = [0.1f32, 4.2, 9.0];
        let mut session = Session::new();
        let result = session
            .nn(
                Points::new(&data, 10, 1).unwrap(),
                Points::new(&queries, 3, 1).unwrap(),
                2,
                &ParamOverrides::new(),
            )
            .unwrap();

        let (indices, _) = result.row(2).unwrap();
        assert_eq!(indices, &[9, 8]);
        assert!(result.row(3).is_none());
        assert!(result.row(usize::MAX).is_none());
    }

    #[test]
    fn test_nn_type_mismatch() {
        let data = line();
        let queries = [1u8];
        let mut session = Session::new();
        let err = session.nn(
            Points::new(&data, 10, 1).unwrap(),
            Points::new(&queries, 1, 1).unwrap(),
            1,
            &ParamOverrides::new(),
        );
        assert!(matches!(err, Err(Error::TypeMismatch { .. })));
    }

    #[test]
    fn test_nn_insufficient_data() {
        let data = line();
        let mut session = Session::new();
        let err = session.nn(
            Points::new(&data, 10, 1).unwrap(),
            Points::new(&data[..1], 1, 1).unwrap(),
            11,
            &ParamOverrides::new(),
        );
        assert!(matches!(err, Err(Error::InsufficientData { requested: 11, available: 10 })));
    }

    #[test]
    fn test_nn_rejects_zero_k_and_column_mismatch() {
        let data = line();
        let mut session = Session::new();
        let reference = Points::new(&data, 5, 2).unwrap();

        let err = session.nn(reference, reference, 0, &ParamOverrides::new());
        assert!(matches!(err, Err(Error::InvalidParameter(_))));

        let err = session.nn(reference, Points::new(&data[..3], 1, 3).unwrap(), 1, &ParamOverrides::new());
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_radius_truncates_to_count() {
        let data = line();
        let mut session = Session::new();
        session.build_index(Points::new(&data, 10, 1).unwrap(), &ParamOverrides::new()).unwrap();

        let query = [5.0f32];
        let all = session.nn_radius(Points::from_row(&query), 1.0, None, &ParamOverrides::new()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all.indices[0], 5);
        assert!(all.distances.windows(2).all(|w| w[0] <= w[1]));

        let capped = session.nn_radius(Points::from_row(&query), 1.0, Some(1), &ParamOverrides::new()).unwrap();
        assert_eq!(capped.indices, vec![5]);
    }

    #[test]
    fn test_radius_requires_single_point_of_index_type() {
        let data = line();
        let mut session = Session::new();
        session.build_index(Points::new(&data, 10, 1).unwrap(), &ParamOverrides::new()).unwrap();

        let err = session.nn_radius(Points::new(&data[..2], 2, 1).unwrap(), 1.0, None, &ParamOverrides::new());
        assert!(matches!(err, Err(Error::InvalidInput(_))));

        let wide = [5.0f64];
        let err = session.nn_radius(Points::from_row(&wide), 1.0, None, &ParamOverrides::new());
        assert!(matches!(err, Err(Error::TypeMismatch { .. })));
    }
}
