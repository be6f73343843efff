//! Index handle ownership
//!
//! A [`Session`] owns at most one engine index at a time, together with the
//! parameter record and a private random generator. The handle and the
//! point set it was built from are stored as one value, so the handle, its
//! element type and the reference data are always replaced together.

use crate::engine::dispatch::{resolve, with_element_type, with_points, Operation};
use crate::engine::{BruteForceEngine, Distance, Engine, NativeOps, RawIndex};
use crate::params::{BuildReport, IndexParams, ParamOverrides};
use crate::types::{ElementType, PointSet};
use crate::{Error, Result};
use parking_lot::{Mutex, MutexGuard};
use rand::prelude::*;
use std::path::Path;
use std::sync::Arc;

/// Upper bound (exclusive) of seeds drawn by a session
const SEED_RANGE: i64 = 1 << 30;

/// The active engine handle and the points it indexes
#[derive(Debug, Clone, Copy)]
pub(crate) struct ActiveIndex<'data> {
    pub(crate) raw: RawIndex,
    pub(crate) points: PointSet<'data>,
}

/// Client session over an engine
///
/// `'data` is the lifetime of the point set the active index was built or
/// loaded over. The session never copies or frees that data.
pub struct Session<'data, E: Engine = BruteForceEngine> {
    pub(crate) engine: E,
    pub(crate) params: IndexParams,
    pub(crate) active: Option<ActiveIndex<'data>>,
    rng: StdRng,
}

impl<'data> Session<'data, BruteForceEngine> {
    /// Session over the reference engine, seeded from entropy
    pub fn new() -> Self {
        Self::with_engine(BruteForceEngine::new())
    }

    /// Session over the reference engine with a reproducible generator
    pub fn with_seed(seed: u64) -> Self {
        Self::with_engine_and_seed(BruteForceEngine::new(), seed)
    }
}

impl<'data> Default for Session<'data, BruteForceEngine> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'data, E: Engine> Session<'data, E> {
    /// Session over `engine`, seeded from entropy
    pub fn with_engine(engine: E) -> Self {
        Self::from_parts(engine, StdRng::from_entropy())
    }

    /// Session over `engine` with a reproducible generator
    pub fn with_engine_and_seed(engine: E, seed: u64) -> Self {
        Self::from_parts(engine, StdRng::seed_from_u64(seed))
    }

    fn from_parts(engine: E, rng: StdRng) -> Self {
        let params = IndexParams::default();
        engine.log_verbosity(params.log_level);
        Self {
            engine,
            params,
            active: None,
            rng,
        }
    }

    /// Builder-style [`Session::update_params`]
    pub fn configure(mut self, overrides: &ParamOverrides) -> Result<Self> {
        self.update_params(overrides)?;
        Ok(self)
    }

    /// Current parameter record
    pub fn params(&self) -> &IndexParams {
        &self.params
    }

    /// Merge overrides into the session record, forwarding a changed
    /// `log_level` to the engine.
    pub fn update_params(&mut self, overrides: &ParamOverrides) -> Result<()> {
        let mut next = self.params;
        next.update(overrides)?;
        let previous = std::mem::replace(&mut self.params, next);
        if self.params.log_level != previous.log_level {
            self.engine.log_verbosity(self.params.log_level);
        }
        Ok(())
    }

    /// The engine behind this session
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Whether an index is built or loaded
    pub fn has_index(&self) -> bool {
        self.active.is_some()
    }

    /// Element type of the active index
    pub fn index_type(&self) -> Option<ElementType> {
        self.active.as_ref().map(|a| a.points.element_type())
    }

    /// Shape of the points behind the active index
    pub fn index_shape(&self) -> Option<(usize, usize)> {
        self.active.as_ref().map(|a| a.points.shape())
    }

    /// Select the engine-wide distance
    pub fn set_distance_type(&mut self, distance: Distance) {
        self.engine.set_distance_type(distance);
    }

    /// Build an index over `points`, replacing any active index.
    ///
    /// Returns the parameter record as left by the engine plus its speedup
    /// estimate.
    pub fn build_index(
        &mut self,
        points: impl Into<PointSet<'data>>,
        overrides: &ParamOverrides,
    ) -> Result<BuildReport> {
        let points = points.into();
        points.ensure_nonempty("points")?;

        self.update_params(overrides)?;
        self.with_random_seed(overrides);
        self.release();

        let entry = resolve(Operation::BuildIndex, points.element_type());
        log::debug!("{} over {}x{}", entry.symbol, points.rows(), points.cols());

        let params = &mut self.params;
        let engine = &self.engine;
        let (raw, speedup) = with_points!(points, p => NativeOps::build_index(engine, p, params))?;

        self.install(raw, points);
        Ok(BuildReport {
            params: self.params,
            speedup,
        })
    }

    /// Load an index file over `points`, replacing any active index
    pub fn load_index(&mut self, path: impl AsRef<Path>, points: impl Into<PointSet<'data>>) -> Result<()> {
        let path = path.as_ref();
        let points = points.into();
        points.ensure_nonempty("points")?;

        self.release();

        let entry = resolve(Operation::LoadIndex, points.element_type());
        log::debug!("{} from {}", entry.symbol, path.display());

        let engine = &self.engine;
        let raw = with_points!(points, p => NativeOps::load_index(engine, path, p))?;

        self.install(raw, points);
        Ok(())
    }

    /// Write the active index to `path`; does nothing without one
    pub fn save_index(&self, path: impl AsRef<Path>) -> Result<()> {
        let Some(active) = self.active else {
            return Ok(());
        };
        let path = path.as_ref();
        let ty = active.points.element_type();
        log::debug!("{} to {}", resolve(Operation::SaveIndex, ty).symbol, path.display());

        with_element_type!(ty, T => NativeOps::<T>::save_index(&self.engine, active.raw, path))
    }

    /// Free the active index; does nothing without one
    pub fn delete_index(&mut self, overrides: &ParamOverrides) -> Result<()> {
        self.update_params(overrides)?;
        self.release();
        Ok(())
    }

    /// The active index, or [`Error::NoActiveIndex`]
    pub(crate) fn active(&self) -> Result<ActiveIndex<'data>> {
        self.active.ok_or(Error::NoActiveIndex)
    }

    /// Inject a session-drawn seed unless the call supplies one
    pub(crate) fn with_random_seed(&mut self, overrides: &ParamOverrides) {
        if !overrides.contains("random_seed") {
            let seed = self.rng.gen_range(0..SEED_RANGE);
            self.params.random_seed = seed as _;
        }
    }

    fn install(&mut self, raw: RawIndex, points: PointSet<'data>) {
        log::debug!(
            "Installed {} index {} ({}x{})",
            points.element_type(),
            raw.as_raw(),
            points.rows(),
            points.cols()
        );
        self.active = Some(ActiveIndex { raw, points });
    }

    /// Free the active handle through the entry point of its element type
    fn release(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        let ty = active.points.element_type();
        log::debug!("{} on index {}", resolve(Operation::FreeIndex, ty).symbol, active.raw.as_raw());

        with_element_type!(ty, T => NativeOps::<T>::free_index(&self.engine, active.raw, &self.params));
    }
}

impl<'data, E: Engine> Drop for Session<'data, E> {
    fn drop(&mut self) {
        self.release();
    }
}

/// A session shared across threads
///
/// Every operation takes the session lock, so build, load and delete are
/// serialized against each other and against queries.
pub struct SharedSession<'data, E: Engine = BruteForceEngine> {
    inner: Arc<Mutex<Session<'data, E>>>,
}

impl<'data, E: Engine> SharedSession<'data, E> {
    /// Share `session` behind a lock
    pub fn new(session: Session<'data, E>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Lock the session for a sequence of operations
    pub fn lock(&self) -> MutexGuard<'_, Session<'data, E>> {
        self.inner.lock()
    }

    /// Run `f` with the session locked
    pub fn with<R>(&self, f: impl FnOnce(&mut Session<'data, E>) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl<'data, E: Engine> Clone for SharedSession<'data, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<'data, E: Engine> From<Session<'data, E>> for SharedSession<'data, E> {
    fn from(session: Session<'data, E>) -> Self {
        Self::new(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Points;
    use tempfile::tempdir;

    #[test]
    fn test_build_replaces_and_frees() {
        let data = vec![0.5f32; 40];
        let mut session = Session::with_seed(1);
        session.build_index(Points::new(&data, 10, 4).unwrap(), &ParamOverrides::new()).unwrap();
        session.build_index(Points::new(&data, 10, 4).unwrap(), &ParamOverrides::new()).unwrap();

        let stats = session.engine().stats();
        assert_eq!(stats.builds, 2);
        assert_eq!(stats.frees, 1);
        assert_eq!(stats.live_handles, 1);
        assert_eq!(session.index_type(), Some(ElementType::Float32));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let data = [1i32, 2, 3, 4, 5, 6];
        let mut session = Session::new();
        session.build_index(Points::new(&data, 3, 2).unwrap(), &ParamOverrides::new()).unwrap();
        session.delete_index(&ParamOverrides::new()).unwrap();
        session.delete_index(&ParamOverrides::new()).unwrap();

        let stats = session.engine().stats();
        assert_eq!((stats.frees, stats.invalid_frees, stats.live_handles), (1, 0, 0));
        assert!(!session.has_index());
    }

    #[test]
    fn test_seed_injection_is_reproducible() {
        let data = [1.0f64, 2.0, 3.0, 4.0];
        let mut a = Session::with_seed(99);
        let mut b = Session::with_seed(99);
        let ra = a.build_index(Points::new(&data, 2, 2).unwrap(), &ParamOverrides::new()).unwrap();
        let rb = b.build_index(Points::new(&data, 2, 2).unwrap(), &ParamOverrides::new()).unwrap();
        assert_eq!(ra.params.random_seed, rb.params.random_seed);
        assert!((0..SEED_RANGE).contains(&(ra.params.random_seed as i64)));

        let fixed = ParamOverrides::new().set("random_seed", 5);
        let report = a.build_index(Points::new(&data, 2, 2).unwrap(), &fixed).unwrap();
        assert_eq!(report.params.random_seed, 5);
    }

    #[test]
    fn test_log_level_reaches_engine_after_failed_update() {
        use crate::params::LogLevel;

        let mut session = Session::with_seed(3);
        assert_eq!(session.engine().verbosity(), LogLevel::Warning.code());

        let bad = ParamOverrides::new()
            .set("log_level", LogLevel::Info)
            .set("checks", "many");
        assert!(matches!(session.update_params(&bad), Err(Error::InvalidParameter(_))));
        assert_eq!(session.params().log_level, LogLevel::Warning.code());
        assert_eq!(session.engine().verbosity(), LogLevel::Warning.code());

        let good = ParamOverrides::new().set("log_level", LogLevel::Info);
        session.update_params(&good).unwrap();
        assert_eq!(session.params().log_level, LogLevel::Info.code());
        assert_eq!(session.engine().verbosity(), LogLevel::Info.code());
    }

    #[test]
    fn test_save_without_index_is_noop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("none.idx");
        let session = Session::new();
        session.save_index(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_empty_points_rejected_before_release() {
        let data = [1u8, 2, 3, 4];
        let empty: [u8; 0] = [];
        let mut session = Session::new();
        session.build_index(Points::new(&data, 2, 2).unwrap(), &ParamOverrides::new()).unwrap();

        let err = session.build_index(Points::new(&empty, 0, 2).unwrap(), &ParamOverrides::new());
        assert!(matches!(err, Err(Error::InvalidInput(_))));
        assert!(session.has_index());
    }

    #[test]
    fn test_drop_frees_handle() {
        let engine = Arc::new(BruteForceEngine::new());
        let data = [1.0f32; 8];
        {
            let mut session = Session::with_engine(Arc::clone(&engine));
            session.build_index(Points::new(&data, 4, 2).unwrap(), &ParamOverrides::new()).unwrap();
            assert_eq!(engine.stats().live_handles, 1);
        }
        let stats = engine.stats();
        assert_eq!((stats.frees, stats.live_handles), (1, 0));
    }
}
