//! k-means and hierarchical k-means
//!
//! Centres come back as 64-bit floats for 64-bit float input and as 32-bit
//! floats for every other input type, unless an output type is requested.

use crate::engine::dispatch::{resolve, with_points, Operation};
use crate::engine::{Engine, NativeOps};
use crate::index::Session;
use crate::params::{Algorithm, ParamOverrides};
use crate::types::{Centers, Element, ElementType, Matrix, PointSet, Points};
use crate::{Error, Result};
use std::os::raw::c_int;

/// Number of centres a hierarchical k-means with `num_branches` splits of
/// `branch_size` produces, or `None` when `branch_size` is 0 or the count
/// overflows
pub fn cluster_count(branch_size: usize, num_branches: usize) -> Option<usize> {
    branch_size
        .checked_sub(1)?
        .checked_mul(num_branches)?
        .checked_add(1)
}

fn iterations_code(max_iterations: Option<usize>) -> Result<c_int> {
    match max_iterations {
        None => Ok(-1),
        Some(n) => c_int::try_from(n)
            .map_err(|_| Error::InvalidParameter(format!("max_iterations {} is out of range", n))),
    }
}

impl<'data, E: Engine> Session<'data, E> {
    /// Flat k-means into `num_clusters` centres
    pub fn kmeans<'p>(
        &mut self,
        points: impl Into<PointSet<'p>>,
        num_clusters: usize,
        max_iterations: Option<usize>,
        output: Option<ElementType>,
        overrides: &ParamOverrides,
    ) -> Result<Centers> {
        let points = points.into();
        if num_clusters == 0 {
            return Err(Error::InvalidParameter("num_clusters must be at least 1".to_string()));
        }
        points.ensure_nonempty("points")?;

        if num_clusters == 1 {
            let mean = with_points!(points, p => p.column_mean());
            let cols = mean.len();
            let centers = Centers::Float64(Matrix::from_vec(mean, 1, cols)?);
            let target = output.unwrap_or_else(|| points.element_type().cluster_output());
            return Ok(centers.cast(target));
        }

        self.hierarchical_kmeans(points, num_clusters, 1, max_iterations, output, overrides)
    }

    /// Hierarchical k-means producing `(branch_size - 1) * num_branches + 1`
    /// centres
    pub fn hierarchical_kmeans<'p>(
        &mut self,
        points: impl Into<PointSet<'p>>,
        branch_size: usize,
        num_branches: usize,
        max_iterations: Option<usize>,
        output: Option<ElementType>,
        overrides: &ParamOverrides,
    ) -> Result<Centers> {
        let points = points.into();
        points.ensure_nonempty("points")?;
        if branch_size < 2 {
            return Err(Error::InvalidParameter(format!(
                "branch_size must be at least 2, got {}",
                branch_size
            )));
        }
        if num_branches < 1 {
            return Err(Error::InvalidParameter("num_branches must be at least 1".to_string()));
        }
        let branching = c_int::try_from(branch_size)
            .map_err(|_| Error::InvalidParameter(format!("branch_size {} is out of range", branch_size)))?;
        let iterations = iterations_code(max_iterations)?;
        let clusters = cluster_count(branch_size, num_branches)
            .ok_or_else(|| Error::InvalidParameter("cluster count overflows".to_string()))?;

        self.update_params(overrides)?;
        self.with_random_seed(overrides);
        self.params.iterations = iterations;
        self.params.algorithm = Algorithm::KMeans.code();
        self.params.branching = branching;

        log::debug!(
            "{} over {}x{} into {} clusters",
            resolve(Operation::ComputeClusterCenters, points.element_type()).symbol,
            points.rows(),
            points.cols(),
            clusters
        );
        let centers = with_points!(points, p => self.compute_centers(p, clusters))?;

        Ok(match output {
            Some(target) => centers.cast(target),
            None => centers,
        })
    }

    fn compute_centers<T: Element>(&self, points: Points<'_, T>, clusters: usize) -> Result<Centers>
    where
        E: NativeOps<T>,
    {
        let cols = points.cols();
        let mut result = vec![T::Center::default(); clusters * cols];
        let produced =
            <E as NativeOps<T>>::compute_cluster_centers(&self.engine, points, clusters, &mut result, &self.params);
        if produced <= 0 {
            return Err(Error::ClusteringFailed(produced));
        }

        let mut matrix = Matrix::from_vec(result, clusters, cols)?;
        let produced = produced as usize;
        if produced < clusters {
            log::warn!("Engine produced {} of {} requested clusters", produced, clusters);
            matrix.truncate_rows(produced);
        }
        Ok(T::Center::wrap_centers(matrix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BruteForceEngine;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn scattered(n: usize, dim: usize) -> Vec<f32> {
        (0..n * dim).map(|i| ((i * 37 + 11) % 101) as f32).collect()
    }

    #[test]
    fn test_cluster_count() {
        assert_eq!(cluster_count(3, 2), Some(5));
        assert_eq!(cluster_count(10, 1), Some(10));
        assert_eq!(cluster_count(2, 7), Some(8));
        assert_eq!(cluster_count(1, 4), Some(1));
    }

    #[test]
    fn test_cluster_count_rejects_zero_and_overflow() {
        assert_eq!(cluster_count(0, 1), None);
        assert_eq!(cluster_count(3, usize::MAX), None);
        assert_eq!(cluster_count(usize::MAX, 1), None);
    }

    #[test]
    fn test_hierarchical_kmeans_rejects_overflowing_count() {
        let data = scattered(8, 2);
        let mut session = Session::with_seed(5);
        let result = session.hierarchical_kmeans(
            Points::new(&data, 8, 2).unwrap(),
            3,
            usize::MAX,
            Some(5),
            None,
            &ParamOverrides::new(),
        );
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_single_cluster_is_mean_without_engine() {
        let engine = Arc::new(BruteForceEngine::new());
        let data = [1u8, 2, 3, 10];
        let mut session = Session::with_engine(Arc::clone(&engine));
        let centers = session
            .kmeans(Points::new(&data, 2, 2).unwrap(), 1, None, None, &ParamOverrides::new())
            .unwrap();

        match centers {
            Centers::Float32(m) => {
                assert_eq!(m.shape(), (1, 2));
                assert_relative_eq!(m[(0, 0)], 2.0);
                assert_relative_eq!(m[(0, 1)], 6.0);
            }
            other => panic!("unexpected {}", other.element_type()),
        }
        assert_eq!(engine.stats().clusterings, 0);
    }

    #[test]
    fn test_double_input_keeps_width() {
        let data: Vec<f64> = scattered(30, 3).into_iter().map(f64::from).collect();
        let mut session = Session::with_seed(4);
        let centers = session
            .kmeans(Points::new(&data, 30, 3).unwrap(), 4, None, None, &ParamOverrides::new())
            .unwrap();
        assert_eq!(centers.element_type(), ElementType::Float64);
        assert_eq!(centers.shape(), (4, 3));
    }

    #[test]
    fn test_explicit_output_type() {
        let data = scattered(40, 2);
        let mut session = Session::with_seed(4);
        let centers = session
            .hierarchical_kmeans(
                Points::new(&data, 40, 2).unwrap(),
                3,
                2,
                Some(20),
                Some(ElementType::Int32),
                &ParamOverrides::new(),
            )
            .unwrap();
        assert_eq!(centers.element_type(), ElementType::Int32);
        assert_eq!(centers.shape(), (5, 2));
    }

    #[test]
    fn test_invalid_cluster_parameters() {
        let data = scattered(10, 2);
        let points = Points::new(&data, 10, 2).unwrap();
        let mut session = Session::new();
        let none = ParamOverrides::new();

        assert!(matches!(session.kmeans(points, 0, None, None, &none), Err(Error::InvalidParameter(_))));
        assert!(matches!(
            session.hierarchical_kmeans(points, 1, 2, None, None, &none),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            session.hierarchical_kmeans(points, 3, 0, None, None, &none),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_too_few_points_fails() {
        let data = scattered(3, 2);
        let mut session = Session::new();
        let err = session.kmeans(Points::new(&data, 3, 2).unwrap(), 5, None, None, &ParamOverrides::new());
        assert!(matches!(err, Err(Error::ClusteringFailed(_))));
    }

    #[test]
    fn test_forced_parameters() {
        let data = scattered(40, 2);
        let mut session = Session::with_seed(8);
        let overrides = ParamOverrides::new().set("branching", 9).set("centers_init", "kmeanspp");
        session
            .hierarchical_kmeans(Points::new(&data, 40, 2).unwrap(), 4, 2, Some(3), None, &overrides)
            .unwrap();

        let params = session.params();
        assert_eq!(params.branching, 4);
        assert_eq!(params.iterations, 3);
        assert_eq!(params.algorithm_kind(), Some(Algorithm::KMeans));
        assert_eq!(params.centers_init, 2);
    }

    #[test]
    fn test_seeded_sessions_agree() {
        let data = scattered(60, 3);
        let run = || {
            let mut session = Session::with_seed(21);
            session
                .kmeans(Points::new(&data, 60, 3).unwrap(), 6, None, None, &ParamOverrides::new())
                .unwrap()
        };
        assert_eq!(run(), run());
    }
}
