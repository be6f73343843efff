//! Vector file formats
//!
//! Every record is a little-endian `u32` dimension followed by that many
//! elements: `.fvecs` (f32), `.dvecs` (f64), `.bvecs` (u8), `.ivecs` (i32).

use crate::types::{Centers, Element, ElementType, Matrix, PointSet};
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

/// Vector file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorFormat {
    /// 32-bit floats
    Fvecs,
    /// 64-bit floats
    Dvecs,
    /// Bytes
    Bvecs,
    /// 32-bit signed integers
    Ivecs,
}

impl VectorFormat {
    /// Detect format from file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();

        match ext.as_str() {
            "fvecs" => Some(VectorFormat::Fvecs),
            "dvecs" => Some(VectorFormat::Dvecs),
            "bvecs" => Some(VectorFormat::Bvecs),
            "ivecs" => Some(VectorFormat::Ivecs),
            _ => None,
        }
    }

    /// Element type stored in this format
    pub fn element_type(self) -> ElementType {
        match self {
            VectorFormat::Fvecs => ElementType::Float32,
            VectorFormat::Dvecs => ElementType::Float64,
            VectorFormat::Bvecs => ElementType::UInt8,
            VectorFormat::Ivecs => ElementType::Int32,
        }
    }

    /// Format that stores `ty`
    pub fn for_element_type(ty: ElementType) -> Self {
        match ty {
            ElementType::Float32 => VectorFormat::Fvecs,
            ElementType::Float64 => VectorFormat::Dvecs,
            ElementType::UInt8 => VectorFormat::Bvecs,
            ElementType::Int32 => VectorFormat::Ivecs,
        }
    }

    /// File extension, without the dot
    pub fn extension(self) -> &'static str {
        match self {
            VectorFormat::Fvecs => "fvecs",
            VectorFormat::Dvecs => "dvecs",
            VectorFormat::Bvecs => "bvecs",
            VectorFormat::Ivecs => "ivecs",
        }
    }
}

/// Element encoding within a vecs record
pub trait VecsElement: Element {
    /// Read one little-endian element
    fn read_from<R: Read>(reader: &mut R) -> std::io::Result<Self>;
    /// Write one little-endian element
    fn write_to<W: Write>(self, writer: &mut W) -> std::io::Result<()>;
}

impl VecsElement for f32 {
    fn read_from<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        reader.read_f32::<LittleEndian>()
    }

    fn write_to<W: Write>(self, writer: &mut W) -> std::io::Result<()> {
        writer.write_f32::<LittleEndian>(self)
    }
}

impl VecsElement for f64 {
    fn read_from<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        reader.read_f64::<LittleEndian>()
    }

    fn write_to<W: Write>(self, writer: &mut W) -> std::io::Result<()> {
        writer.write_f64::<LittleEndian>(self)
    }
}

impl VecsElement for u8 {
    fn read_from<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        reader.read_u8()
    }

    fn write_to<W: Write>(self, writer: &mut W) -> std::io::Result<()> {
        writer.write_u8(self)
    }
}

impl VecsElement for i32 {
    fn read_from<R: Read>(reader: &mut R) -> std::io::Result<Self> {
        reader.read_i32::<LittleEndian>()
    }

    fn write_to<W: Write>(self, writer: &mut W) -> std::io::Result<()> {
        writer.write_i32::<LittleEndian>(self)
    }
}

/// Read every record of a vecs file into a matrix
pub fn read_vecs<T: VecsElement, P: AsRef<Path>>(path: P) -> Result<Matrix<T>> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let mut data = Vec::new();
    let mut dimension = None;
    let mut rows = 0;
    let mut offset = 0u64;

    loop {
        let dim = match reader.read_u32::<LittleEndian>() {
            Ok(d) => d as usize,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        offset += 4;

        // A record may not run past the end of the file
        let record_bytes = (dim as u64) * std::mem::size_of::<T>() as u64;
        if record_bytes > file_len.saturating_sub(offset) {
            return Err(Error::InvalidInput(format!(
                "record {} declares {} elements but only {} bytes remain",
                rows,
                dim,
                file_len.saturating_sub(offset)
            )));
        }
        offset += record_bytes;

        match dimension {
            Some(expected) if expected != dim => {
                return Err(Error::InvalidInput(format!(
                    "Inconsistent dimensions: {} vs {}",
                    dim, expected
                )));
            }
            None => dimension = Some(dim),
            _ => {}
        }

        data.reserve(dim);
        for _ in 0..dim {
            data.push(T::read_from(&mut reader)?);
        }
        rows += 1;
    }

    Matrix::from_vec(data, rows, dimension.unwrap_or(0))
}

/// Write a matrix as one record per row
pub fn write_vecs<T: VecsElement, P: AsRef<Path>>(path: P, matrix: &Matrix<T>) -> Result<()> {
    let dimension = u32::try_from(matrix.cols())
        .map_err(|_| Error::InvalidInput(format!("dimension {} too large", matrix.cols())))?;
    let mut writer = BufWriter::new(File::create(path)?);

    for row in 0..matrix.rows() {
        writer.write_u32::<LittleEndian>(dimension)?;
        for &value in matrix.row(row) {
            value.write_to(&mut writer)?;
        }
    }

    writer.flush()?;
    Ok(())
}

/// A matrix loaded from disk, tagged by element type
#[derive(Debug, Clone, PartialEq)]
pub enum Dataset {
    /// `.fvecs` data
    Float32(Matrix<f32>),
    /// `.dvecs` data
    Float64(Matrix<f64>),
    /// `.bvecs` data
    UInt8(Matrix<u8>),
    /// `.ivecs` data
    Int32(Matrix<i32>),
}

impl Dataset {
    /// Read a file, choosing the element type from its extension
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let format = VectorFormat::from_path(path).ok_or_else(|| {
            Error::InvalidInput(format!(
                "cannot infer vector format of {} (expected .fvecs, .dvecs, .bvecs or .ivecs)",
                path.display()
            ))
        })?;

        log::debug!("Reading {} as {:?}", path.display(), format);
        Ok(match format {
            VectorFormat::Fvecs => Dataset::Float32(read_vecs(path)?),
            VectorFormat::Dvecs => Dataset::Float64(read_vecs(path)?),
            VectorFormat::Bvecs => Dataset::UInt8(read_vecs(path)?),
            VectorFormat::Ivecs => Dataset::Int32(read_vecs(path)?),
        })
    }

    /// Write in the format matching the element type
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        match self {
            Dataset::Float32(m) => write_vecs(path, m),
            Dataset::Float64(m) => write_vecs(path, m),
            Dataset::UInt8(m) => write_vecs(path, m),
            Dataset::Int32(m) => write_vecs(path, m),
        }
    }

    /// Element type of the data
    pub fn element_type(&self) -> ElementType {
        self.points().element_type()
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        self.points().shape()
    }

    /// Borrow as a point set
    pub fn points(&self) -> PointSet<'_> {
        match self {
            Dataset::Float32(m) => m.as_points().into(),
            Dataset::Float64(m) => m.as_points().into(),
            Dataset::UInt8(m) => m.as_points().into(),
            Dataset::Int32(m) => m.as_points().into(),
        }
    }

    /// Only the first `rows` rows
    pub fn head(mut self, rows: usize) -> Self {
        match &mut self {
            Dataset::Float32(m) => m.truncate_rows(rows),
            Dataset::Float64(m) => m.truncate_rows(rows),
            Dataset::UInt8(m) => m.truncate_rows(rows),
            Dataset::Int32(m) => m.truncate_rows(rows),
        }
        self
    }

    /// Per-column (min, max, mean), computed in f64
    pub fn column_stats(&self) -> Vec<(f64, f64, f64)> {
        fn stats<T: Element>(m: &Matrix<T>) -> Vec<(f64, f64, f64)> {
            let mut out = vec![(f64::INFINITY, f64::NEG_INFINITY, 0.0); m.cols()];
            for row in 0..m.rows() {
                for (col, &value) in m.row(row).iter().enumerate() {
                    let v = value.to_f64();
                    let entry = &mut out[col];
                    entry.0 = entry.0.min(v);
                    entry.1 = entry.1.max(v);
                    entry.2 += v;
                }
            }
            let n = m.rows().max(1) as f64;
            out.iter_mut().for_each(|e| e.2 /= n);
            out
        }

        match self {
            Dataset::Float32(m) => stats(m),
            Dataset::Float64(m) => stats(m),
            Dataset::UInt8(m) => stats(m),
            Dataset::Int32(m) => stats(m),
        }
    }
}

impl From<Centers> for Dataset {
    fn from(centers: Centers) -> Self {
        match centers {
            Centers::Float32(m) => Dataset::Float32(m),
            Centers::Float64(m) => Dataset::Float64(m),
            Centers::UInt8(m) => Dataset::UInt8(m),
            Centers::Int32(m) => Dataset::Int32(m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_format_detection() {
        assert_eq!(VectorFormat::from_path("base.fvecs"), Some(VectorFormat::Fvecs));
        assert_eq!(VectorFormat::from_path("base.DVECS"), Some(VectorFormat::Dvecs));
        assert_eq!(VectorFormat::from_path("base.bin"), None);
        assert_eq!(VectorFormat::for_element_type(ElementType::UInt8).extension(), "bvecs");
    }

    #[test]
    fn test_read_back_written_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bvecs");
        let matrix = Matrix::from_vec(vec![1u8, 2, 3, 4, 5, 6], 2, 3).unwrap();
        write_vecs(&path, &matrix).unwrap();

        // 2 records of (4-byte dimension + 3 bytes)
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 14);

        let dataset = Dataset::read(&path).unwrap();
        assert_eq!(dataset, Dataset::UInt8(matrix));
    }

    #[test]
    fn test_inconsistent_dimensions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.ivecs");
        let mut file = File::create(&path).unwrap();
        file.write_u32::<LittleEndian>(1).unwrap();
        file.write_i32::<LittleEndian>(7).unwrap();
        file.write_u32::<LittleEndian>(2).unwrap();
        file.write_i32::<LittleEndian>(7).unwrap();
        file.write_i32::<LittleEndian>(8).unwrap();
        drop(file);

        assert!(matches!(Dataset::read(&path), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_truncated_record_is_rejected_before_allocating() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("corrupt.fvecs");
        let mut file = File::create(&path).unwrap();
        file.write_u32::<LittleEndian>(u32::MAX).unwrap();
        file.write_f32::<LittleEndian>(1.0).unwrap();
        drop(file);

        let err = read_vecs::<f32, _>(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(ref msg) if msg.contains("remain")));
    }

    #[test]
    fn test_column_stats_and_head() {
        let matrix = Matrix::from_vec(vec![1.0f32, -2.0, 3.0, 4.0], 2, 2).unwrap();
        let dataset = Dataset::Float32(matrix);
        let stats = dataset.column_stats();
        assert_eq!(stats[0], (1.0, 3.0, 2.0));
        assert_eq!(stats[1], (-2.0, 4.0, 1.0));
        assert_eq!(dataset.head(1).shape(), (1, 2));
    }
}
