//! Ground truth and search precision tuning
//!
//! These calls work on 32-bit float data only.

use crate::engine::{Engine, RawIndex};
use crate::index::Session;
use crate::types::{ElementType, Matrix, PointSet, Points};
use crate::{Error, Result};

/// Exact `nn` neighbors in `dataset` of every row of `testset`, skipping
/// the first `skip` matches of each query
pub fn compute_ground_truth<E: Engine>(
    engine: &E,
    dataset: Points<'_, f32>,
    testset: Points<'_, f32>,
    nn: usize,
    skip: usize,
) -> Result<Matrix<i32>> {
    PointSet::from(dataset).ensure_nonempty("dataset")?;
    PointSet::from(testset).ensure_nonempty("testset")?;
    if nn == 0 {
        return Err(Error::InvalidParameter("nn must be at least 1".to_string()));
    }
    if dataset.cols() != testset.cols() {
        return Err(Error::InvalidInput(format!(
            "testset has {} columns, dataset has {}",
            testset.cols(),
            dataset.cols()
        )));
    }
    if nn + skip > dataset.rows() {
        return Err(Error::InsufficientData {
            requested: nn + skip,
            available: dataset.rows(),
        });
    }

    let mut matches = Matrix::zeros(testset.rows(), nn);
    log::debug!(
        "Computing ground truth for {} queries over {} points",
        testset.rows(),
        dataset.rows()
    );
    engine.compute_ground_truth(dataset, testset, matches.as_mut_slice(), nn, skip);
    Ok(matches)
}

fn check_test_shapes(
    dataset: &Points<'_, f32>,
    testset: &Points<'_, f32>,
    matches: &Points<'_, i32>,
    nn: usize,
) -> Result<()> {
    if nn == 0 {
        return Err(Error::InvalidParameter("nn must be at least 1".to_string()));
    }
    if dataset.cols() != testset.cols() {
        return Err(Error::InvalidInput(format!(
            "testset has {} columns, dataset has {}",
            testset.cols(),
            dataset.cols()
        )));
    }
    if testset.rows() != matches.rows() {
        return Err(Error::InvalidInput(format!(
            "{} test points but {} rows of matches",
            testset.rows(),
            matches.rows()
        )));
    }
    if nn > matches.cols() {
        return Err(Error::InvalidInput(format!(
            "nn={} exceeds the {} ground-truth matches per point",
            nn,
            matches.cols()
        )));
    }
    Ok(())
}

fn seconds_or_failure(operation: &'static str, seconds: f32) -> Result<f32> {
    if seconds < 0.0 {
        return Err(Error::NativeFailure { operation, status: -1 });
    }
    Ok(seconds)
}

impl<'data, E: Engine> Session<'data, E> {
    fn float_index(&self) -> Result<(RawIndex, Points<'data, f32>)> {
        let active = self.active()?;
        match active.points {
            PointSet::Float32(points) => Ok((active.raw, points)),
            other => Err(Error::TypeMismatch {
                expected: ElementType::Float32,
                actual: other.element_type(),
            }),
        }
    }

    /// Smallest `checks` at which the active index reaches `precision` on
    /// `testset`. Returns `(checks, search seconds)`.
    pub fn test_with_precision(
        &self,
        testset: Points<'_, f32>,
        matches: Points<'_, i32>,
        nn: usize,
        precision: f32,
        skip: usize,
    ) -> Result<(i32, f32)> {
        let (index, dataset) = self.float_index()?;
        check_test_shapes(&dataset, &testset, &matches, nn)?;

        let mut checks = 0;
        let seconds = self.engine.test_with_precision(
            index, dataset, testset, matches, nn, precision, &mut checks, skip,
        );
        Ok((checks, seconds_or_failure("test_with_precision", seconds)?))
    }

    /// Precision of the active index on `testset` at a fixed `checks`.
    /// Returns `(precision, search seconds)`.
    pub fn test_with_checks(
        &self,
        testset: Points<'_, f32>,
        matches: Points<'_, i32>,
        nn: usize,
        checks: i32,
        skip: usize,
    ) -> Result<(f32, f32)> {
        let (index, dataset) = self.float_index()?;
        check_test_shapes(&dataset, &testset, &matches, nn)?;

        let mut precision = 0.0;
        let seconds = self.engine.test_with_checks(
            index, dataset, testset, matches, nn, checks, &mut precision, skip,
        );
        Ok((precision, seconds_or_failure("test_with_checks", seconds)?))
    }
}
