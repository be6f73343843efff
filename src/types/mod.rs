//! Element types and point-set containers
//!
//! Point sets cross into the engine as borrowed, row-major, contiguous
//! slices. The closed set of supported element types is 32-bit float,
//! 64-bit float, 8-bit unsigned and 32-bit signed integers.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::ops::Index;

/// Supported point element types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
    /// 8-bit unsigned integer
    UInt8,
    /// 32-bit signed integer
    Int32,
}

impl ElementType {
    /// All supported element types, in dispatch-table order
    pub const ALL: [ElementType; 4] = [
        ElementType::Float32,
        ElementType::Float64,
        ElementType::UInt8,
        ElementType::Int32,
    ];

    /// Size in bytes of one element
    pub fn size(&self) -> usize {
        match self {
            ElementType::Float32 | ElementType::Int32 => 4,
            ElementType::Float64 => 8,
            ElementType::UInt8 => 1,
        }
    }

    /// Suffix used by the native entry points (`flann_build_index_<suffix>`)
    pub fn native_suffix(&self) -> &'static str {
        match self {
            ElementType::Float32 => "float",
            ElementType::Float64 => "double",
            ElementType::UInt8 => "byte",
            ElementType::Int32 => "int",
        }
    }

    /// Parse a type name, failing with [`Error::UnsupportedType`] for
    /// anything outside the four supported types.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "float32" | "f32" | "float" => Ok(ElementType::Float32),
            "float64" | "f64" | "double" => Ok(ElementType::Float64),
            "uint8" | "u8" | "byte" => Ok(ElementType::UInt8),
            "int32" | "i32" | "int" => Ok(ElementType::Int32),
            _ => Err(Error::UnsupportedType(name.to_string())),
        }
    }

    /// Element type of clustering output for input of this type.
    ///
    /// Only 64-bit float input keeps its width; everything else clusters
    /// into 32-bit float.
    pub fn cluster_output(&self) -> ElementType {
        match self {
            ElementType::Float64 => ElementType::Float64,
            _ => ElementType::Float32,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::Float32 => "float32",
            ElementType::Float64 => "float64",
            ElementType::UInt8 => "uint8",
            ElementType::Int32 => "int32",
        };
        f.write_str(name)
    }
}

/// Trait implemented by the four supported element types
pub trait Element: Copy + Debug + Default + PartialEq + Send + Sync + 'static {
    /// Runtime tag of this element type
    const TYPE: ElementType;

    /// Element type the native clustering routine writes for this input
    type Center: Element;

    /// Widen to f64 for arithmetic
    fn to_f64(self) -> f64;

    /// Narrow from f64, rounding and saturating for integer types
    fn from_f64(value: f64) -> Self;

    /// Wrap a borrowed point set of this type into the closed variant
    fn wrap(points: Points<'_, Self>) -> PointSet<'_>;

    /// Wrap an owned matrix of this type into a cluster result
    fn wrap_centers(matrix: Matrix<Self>) -> Centers;
}

impl Element for f32 {
    const TYPE: ElementType = ElementType::Float32;
    type Center = f32;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn wrap(points: Points<'_, Self>) -> PointSet<'_> {
        PointSet::Float32(points)
    }

    fn wrap_centers(matrix: Matrix<Self>) -> Centers {
        Centers::Float32(matrix)
    }
}

impl Element for f64 {
    const TYPE: ElementType = ElementType::Float64;
    type Center = f64;

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }

    fn wrap(points: Points<'_, Self>) -> PointSet<'_> {
        PointSet::Float64(points)
    }

    fn wrap_centers(matrix: Matrix<Self>) -> Centers {
        Centers::Float64(matrix)
    }
}

impl Element for u8 {
    const TYPE: ElementType = ElementType::UInt8;
    type Center = f32;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value.round().clamp(0.0, u8::MAX as f64) as u8
    }

    fn wrap(points: Points<'_, Self>) -> PointSet<'_> {
        PointSet::UInt8(points)
    }

    fn wrap_centers(matrix: Matrix<Self>) -> Centers {
        Centers::UInt8(matrix)
    }
}

impl Element for i32 {
    const TYPE: ElementType = ElementType::Int32;
    type Center = f32;

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32
    }

    fn wrap(points: Points<'_, Self>) -> PointSet<'_> {
        PointSet::Int32(points)
    }

    fn wrap_centers(matrix: Matrix<Self>) -> Centers {
        Centers::Int32(matrix)
    }
}

/// Borrowed, row-major, contiguous point set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Points<'a, T> {
    data: &'a [T],
    rows: usize,
    cols: usize,
}

impl<'a, T: Element> Points<'a, T> {
    /// View `data` as a `rows × cols` matrix
    pub fn new(data: &'a [T], rows: usize, cols: usize) -> Result<Self> {
        let expected = rows.checked_mul(cols).ok_or_else(|| {
            Error::InvalidInput(format!("shape {}x{} overflows", rows, cols))
        })?;
        if data.len() != expected {
            return Err(Error::InvalidInput(format!(
                "buffer of {} elements cannot be viewed as {}x{}",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(Self { data, rows, cols })
    }

    /// View a one-dimensional slice as a single row
    pub fn from_row(data: &'a [T]) -> Self {
        Self {
            data,
            rows: 1,
            cols: data.len(),
        }
    }

    /// Number of points
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Feature dimension
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// The contiguous backing slice
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// One point
    pub fn row(&self, i: usize) -> &'a [T] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Iterate over points
    pub fn iter_rows(&self) -> impl Iterator<Item = &'a [T]> + 'a {
        let cols = self.cols.max(1);
        let data = self.data;
        data.chunks_exact(cols).take(self.rows)
    }

    /// Column means, computed in f64
    pub fn column_mean(&self) -> Vec<f64> {
        let mut sums = vec![0.0f64; self.cols];
        for row in self.iter_rows() {
            for (sum, &value) in sums.iter_mut().zip(row) {
                *sum += value.to_f64();
            }
        }
        let n = self.rows.max(1) as f64;
        sums.iter_mut().for_each(|s| *s /= n);
        sums
    }
}

/// Closed variant over the supported element types
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointSet<'a> {
    /// 32-bit float points
    Float32(Points<'a, f32>),
    /// 64-bit float points
    Float64(Points<'a, f64>),
    /// 8-bit unsigned points
    UInt8(Points<'a, u8>),
    /// 32-bit signed points
    Int32(Points<'a, i32>),
}

impl<'a> PointSet<'a> {
    /// Runtime element type tag
    pub fn element_type(&self) -> ElementType {
        match self {
            PointSet::Float32(_) => ElementType::Float32,
            PointSet::Float64(_) => ElementType::Float64,
            PointSet::UInt8(_) => ElementType::UInt8,
            PointSet::Int32(_) => ElementType::Int32,
        }
    }

    /// Number of points
    pub fn rows(&self) -> usize {
        match self {
            PointSet::Float32(p) => p.rows(),
            PointSet::Float64(p) => p.rows(),
            PointSet::UInt8(p) => p.rows(),
            PointSet::Int32(p) => p.rows(),
        }
    }

    /// Feature dimension
    pub fn cols(&self) -> usize {
        match self {
            PointSet::Float32(p) => p.cols(),
            PointSet::Float64(p) => p.cols(),
            PointSet::UInt8(p) => p.cols(),
            PointSet::Int32(p) => p.cols(),
        }
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    /// Fail with [`Error::InvalidInput`] unless the set holds at least one
    /// point of at least one dimension.
    pub(crate) fn ensure_nonempty(&self, what: &str) -> Result<()> {
        if self.rows() == 0 || self.cols() == 0 {
            return Err(Error::InvalidInput(format!(
                "{} must be non-empty, got shape {}x{}",
                what,
                self.rows(),
                self.cols()
            )));
        }
        Ok(())
    }
}

impl<'a, T: Element> From<Points<'a, T>> for PointSet<'a> {
    fn from(points: Points<'a, T>) -> Self {
        T::wrap(points)
    }
}

/// Owned, row-major matrix
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T> {
    data: Vec<T>,
    rows: usize,
    cols: usize,
}

impl<T: Element> Matrix<T> {
    /// Matrix of default-valued elements
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![T::default(); rows * cols],
            rows,
            cols,
        }
    }

    /// Take ownership of a row-major buffer
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidInput(format!(
                "buffer of {} elements cannot be viewed as {}x{}",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(Self { data, rows, cols })
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Row-major elements
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable row-major elements
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Take the row-major elements
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// One row
    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Borrow as a point set
    pub fn as_points(&self) -> Points<'_, T> {
        Points {
            data: &self.data,
            rows: self.rows,
            cols: self.cols,
        }
    }

    /// Keep only the first `rows` rows
    pub fn truncate_rows(&mut self, rows: usize) {
        if rows < self.rows {
            self.data.truncate(rows * self.cols);
            self.rows = rows;
        }
    }

    /// Element-wise conversion to another element type
    pub fn cast<U: Element>(&self) -> Matrix<U> {
        Matrix {
            data: self.data.iter().map(|&v| U::from_f64(v.to_f64())).collect(),
            rows: self.rows,
            cols: self.cols,
        }
    }
}

impl<T: Element> Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        &self.data[row * self.cols + col]
    }
}

/// Cluster centres, typed by the clustering output rule or an explicit request
#[derive(Debug, Clone, PartialEq)]
pub enum Centers {
    /// 32-bit float centres
    Float32(Matrix<f32>),
    /// 64-bit float centres
    Float64(Matrix<f64>),
    /// 8-bit unsigned centres
    UInt8(Matrix<u8>),
    /// 32-bit signed centres
    Int32(Matrix<i32>),
}

impl Centers {
    /// Element type of the centres
    pub fn element_type(&self) -> ElementType {
        match self {
            Centers::Float32(_) => ElementType::Float32,
            Centers::Float64(_) => ElementType::Float64,
            Centers::UInt8(_) => ElementType::UInt8,
            Centers::Int32(_) => ElementType::Int32,
        }
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Centers::Float32(m) => m.shape(),
            Centers::Float64(m) => m.shape(),
            Centers::UInt8(m) => m.shape(),
            Centers::Int32(m) => m.shape(),
        }
    }

    /// Number of centres
    pub fn rows(&self) -> usize {
        self.shape().0
    }

    /// Convert to the requested element type; a no-op when it already matches
    pub fn cast(self, target: ElementType) -> Centers {
        if self.element_type() == target {
            return self;
        }
        let wide = self.to_f64();
        match target {
            ElementType::Float32 => Centers::Float32(wide.cast()),
            ElementType::Float64 => Centers::Float64(wide),
            ElementType::UInt8 => Centers::UInt8(wide.cast()),
            ElementType::Int32 => Centers::Int32(wide.cast()),
        }
    }

    /// Widen to f64
    pub fn to_f64(&self) -> Matrix<f64> {
        match self {
            Centers::Float32(m) => m.cast(),
            Centers::Float64(m) => m.clone(),
            Centers::UInt8(m) => m.cast(),
            Centers::Int32(m) => m.cast(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_element_conversions() {
        assert_eq!(u8::from_f64(42.7), 43);
        assert_eq!(u8::from_f64(-10.0), 0);
        assert_eq!(u8::from_f64(300.0), 255);
        assert_eq!(i32::from_f64(-2.5), -3);
        assert_relative_eq!(f32::from_f64(3.25), 3.25);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(ElementType::from_name("float").unwrap(), ElementType::Float32);
        assert_eq!(ElementType::from_name("DOUBLE").unwrap(), ElementType::Float64);
        assert_eq!(ElementType::from_name("u8").unwrap(), ElementType::UInt8);
        assert!(matches!(
            ElementType::from_name("float16"),
            Err(Error::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_cluster_output_rule() {
        assert_eq!(ElementType::Float64.cluster_output(), ElementType::Float64);
        assert_eq!(ElementType::Float32.cluster_output(), ElementType::Float32);
        assert_eq!(ElementType::UInt8.cluster_output(), ElementType::Float32);
        assert_eq!(ElementType::Int32.cluster_output(), ElementType::Float32);
    }

    #[test]
    fn test_points_shape_validation() {
        let data = [1.0f32; 12];
        let points = Points::new(&data, 3, 4).unwrap();
        assert_eq!(points.row(2).len(), 4);
        assert_eq!(points.iter_rows().count(), 3);
        assert!(matches!(Points::new(&data, 5, 4), Err(Error::InvalidInput(_))));

        let single = Points::from_row(&data[..4]);
        assert_eq!((single.rows(), single.cols()), (1, 4));
    }

    #[test]
    fn test_point_set_tags() {
        let data = [1u8, 2, 3, 4];
        let set: PointSet = Points::new(&data, 2, 2).unwrap().into();
        assert_eq!(set.element_type(), ElementType::UInt8);
        assert_eq!(set.shape(), (2, 2));

        let empty: [i32; 0] = [];
        let set: PointSet = Points::new(&empty, 0, 3).unwrap().into();
        assert!(set.ensure_nonempty("points").is_err());
    }

    #[test]
    fn test_column_mean() {
        let data = [1.0f64, 10.0, 3.0, 20.0];
        let mean = Points::new(&data, 2, 2).unwrap().column_mean();
        assert_relative_eq!(mean[0], 2.0);
        assert_relative_eq!(mean[1], 15.0);
    }

    #[test]
    fn test_centers_cast() {
        let m = Matrix::from_vec(vec![1.4f32, 250.6], 1, 2).unwrap();
        let centers = Centers::Float32(m).cast(ElementType::UInt8);
        match centers {
            Centers::UInt8(m) => assert_eq!(m.as_slice(), &[1, 251]),
            other => panic!("unexpected {:?}", other.element_type()),
        }
    }

    #[test]
    fn test_matrix_truncate() {
        let mut m = Matrix::<i32>::zeros(4, 3);
        m.truncate_rows(2);
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m.as_slice().len(), 6);
    }
}
