use crate::error::SfmIoError;

/// A scalar type that can be read from a little-endian byte blob.
pub trait BlobElement: Copy {
    /// Size of one element in bytes.
    const SIZE: usize;

    /// Read one element from exactly [`Self::SIZE`] bytes.
    fn from_le_slice(bytes: &[u8]) -> Self;
}

macro_rules! impl_blob_element {
    ($t:ty) => {
        impl BlobElement for $t {
            const SIZE: usize = std::mem::size_of::<$t>();

            #[inline]
            fn from_le_slice(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(bytes);
                <$t>::from_le_bytes(buf)
            }
        }
    };
}

impl_blob_element!(u8);
impl_blob_element!(u32);
impl_blob_element!(f32);
impl_blob_element!(f64);

/// A row-major matrix decoded from a blob.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobArray<T> {
    /// Number of rows.
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
    /// Row-major elements, `rows * cols` long.
    pub data: Vec<T>,
}

impl<T: BlobElement> BlobArray<T> {
    /// Borrow one row.
    pub fn row(&self, index: usize) -> Option<&[T]> {
        if index >= self.rows {
            return None;
        }
        Some(&self.data[index * self.cols..(index + 1) * self.cols])
    }

    /// Iterate over the rows.
    pub fn row_iter(&self) -> impl Iterator<Item = &[T]> {
        // chunks_exact panics on zero, and an empty matrix has no rows anyway
        self.data.chunks_exact(self.cols.max(1))
    }
}

fn to_dim(value: i64, name: &str) -> Result<usize, SfmIoError> {
    usize::try_from(value).map_err(|_| SfmIoError::Decode(format!("negative {name} count {value}")))
}

/// Decode a blob using the `(rows, cols)` shape stored next to it.
///
/// # Arguments
///
/// * `blob` - The raw bytes. `None` is treated as an empty blob.
/// * `rows` - The declared number of rows.
/// * `cols` - The declared number of columns.
///
/// # Returns
///
/// The decoded matrix, or [`SfmIoError::Decode`] when the byte length is not a multiple
/// of the row size or does not equal `rows * cols * size_of::<T>()`.
pub fn decode_blob<T: BlobElement>(
    blob: Option<&[u8]>,
    rows: i64,
    cols: i64,
) -> Result<BlobArray<T>, SfmIoError> {
    let blob = blob.unwrap_or_default();
    let rows = to_dim(rows, "row")?;
    let cols = to_dim(cols, "column")?;

    let row_bytes = cols
        .checked_mul(T::SIZE)
        .ok_or_else(|| SfmIoError::Decode(format!("column count {cols} overflows")))?;

    if row_bytes == 0 {
        if !blob.is_empty() || rows != 0 {
            return Err(SfmIoError::Decode(format!(
                "blob of {} bytes declares {rows} rows of zero columns",
                blob.len()
            )));
        }
        return Ok(BlobArray {
            rows: 0,
            cols,
            data: Vec::new(),
        });
    }

    if blob.len() % row_bytes != 0 {
        return Err(SfmIoError::Decode(format!(
            "blob length {} is not a multiple of {cols} columns x {} bytes",
            blob.len(),
            T::SIZE
        )));
    }

    let expected = rows
        .checked_mul(row_bytes)
        .ok_or_else(|| SfmIoError::Decode(format!("row count {rows} overflows")))?;
    if blob.len() != expected {
        return Err(SfmIoError::Decode(format!(
            "blob length {} does not match the declared shape {rows}x{cols} ({expected} bytes)",
            blob.len()
        )));
    }

    let data = blob.chunks_exact(T::SIZE).map(T::from_le_slice).collect();

    Ok(BlobArray { rows, cols, data })
}

/// Decode a blob that carries no shape, such as the camera parameters.
pub fn decode_flat_blob<T: BlobElement>(blob: Option<&[u8]>) -> Result<Vec<T>, SfmIoError> {
    let blob = blob.unwrap_or_default();
    if blob.len() % T::SIZE != 0 {
        return Err(SfmIoError::Decode(format!(
            "blob length {} is not a multiple of {} bytes",
            blob.len(),
            T::SIZE
        )));
    }
    Ok(blob.chunks_exact(T::SIZE).map(T::from_le_slice).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_blob(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_decode_f32_matrix() -> Result<(), SfmIoError> {
        let bytes = f32_blob(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let array = decode_blob::<f32>(Some(&bytes), 3, 2)?;
        assert_eq!(array.rows, 3);
        assert_eq!(array.cols, 2);
        assert_eq!(array.row(1), Some(&[3.0f32, 4.0][..]));
        assert_eq!(array.row(3), None);
        assert_eq!(array.row_iter().count(), 3);
        Ok(())
    }

    #[test]
    fn test_decode_u32_and_u8() -> Result<(), SfmIoError> {
        let bytes = [1u32, 2, 3, 4]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect::<Vec<_>>();
        let array = decode_blob::<u32>(Some(&bytes), 2, 2)?;
        assert_eq!(array.data, vec![1, 2, 3, 4]);

        let array = decode_blob::<u8>(Some(&[7, 8, 9, 10, 11, 12]), 2, 3)?;
        assert_eq!(array.row(1), Some(&[10u8, 11, 12][..]));
        Ok(())
    }

    #[test]
    fn test_decode_not_divisible() {
        // 7 bytes cannot hold whole f32 rows of two columns
        let res = decode_blob::<f32>(Some(&[0u8; 7]), 1, 2);
        assert!(matches!(res, Err(SfmIoError::Decode(_))));

        // 12 bytes are one and a half rows of 2 x f32
        let res = decode_blob::<f32>(Some(&[0u8; 12]), 1, 2);
        assert!(matches!(res, Err(SfmIoError::Decode(_))));
    }

    #[test]
    fn test_decode_row_count_mismatch() {
        let bytes = f32_blob(&[1.0, 2.0, 3.0, 4.0]);
        let res = decode_blob::<f32>(Some(&bytes), 3, 2);
        assert!(matches!(res, Err(SfmIoError::Decode(_))));
        let res = decode_blob::<f32>(Some(&bytes), -1, 2);
        assert!(matches!(res, Err(SfmIoError::Decode(_))));
    }

    #[test]
    fn test_decode_empty() -> Result<(), SfmIoError> {
        let array = decode_blob::<u32>(None, 0, 2)?;
        assert_eq!(array.rows, 0);
        assert!(array.data.is_empty());
        assert_eq!(array.row_iter().count(), 0);

        let array = decode_blob::<u32>(Some(&[]), 0, 0)?;
        assert_eq!(array.rows, 0);

        assert!(decode_blob::<u32>(Some(&[1, 2, 3, 4]), 1, 0).is_err());
        Ok(())
    }

    #[test]
    fn test_decode_flat_f64() -> Result<(), SfmIoError> {
        let bytes = [100.0f64, 320.0, 240.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect::<Vec<_>>();
        assert_eq!(decode_flat_blob::<f64>(Some(&bytes))?, vec![100.0, 320.0, 240.0]);
        assert!(decode_flat_blob::<f64>(Some(&bytes[..5])).is_err());
        Ok(())
    }
}
