//! Conversion between engine row-major order and host tensor order.
//!
//! The engine linearizes N-dimensional data in row-major order: the last
//! axis varies fastest. Host tensors may instead be column-major (first axis
//! fastest). Conversion is a permutation: every source linear index is
//! decoded to a multi-index and re-encoded with the destination strides.
//! Rank 2 takes a direct transpose; ranks 0 and 1 are the identity.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Memory order of host tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HostOrder {
    /// Last axis varies fastest, same as the engine.
    RowMajor,
    /// First axis varies fastest.
    #[default]
    ColumnMajor,
}

/// Strides (in elements) of a row-major array with the given extents.
pub fn row_major_strides(extents: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; extents.len()];
    for d in (0..extents.len().saturating_sub(1)).rev() {
        strides[d] = strides[d + 1] * extents[d + 1];
    }
    strides
}

/// Strides (in elements) of a column-major array with the given extents.
pub fn column_major_strides(extents: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; extents.len()];
    for d in 1..extents.len() {
        strides[d] = strides[d - 1] * extents[d - 1];
    }
    strides
}

/// Converts flat buffers between engine order and one host order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutConverter {
    order: HostOrder,
}

impl LayoutConverter {
    /// Converter for host buffers in `order`.
    pub fn new(order: HostOrder) -> Self {
        Self { order }
    }

    /// The host order converted to and from.
    pub fn order(&self) -> HostOrder {
        self.order
    }

    /// Reorder a row-major engine buffer into host order.
    pub fn to_host_order<T: Copy>(&self, row_major: &[T], extents: &[usize]) -> Result<Vec<T>> {
        check_len(row_major, extents)?;
        Ok(match self.order {
            HostOrder::RowMajor => row_major.to_vec(),
            HostOrder::ColumnMajor => match extents {
                [] | [_] => row_major.to_vec(),
                [rows, cols] => transpose(row_major, *rows, *cols),
                _ => permute(
                    row_major,
                    extents,
                    &row_major_strides(extents),
                    &column_major_strides(extents),
                ),
            },
        })
    }

    /// Reorder a host-order buffer into engine row-major order.
    pub fn to_engine_order<T: Copy>(&self, host: &[T], extents: &[usize]) -> Result<Vec<T>> {
        check_len(host, extents)?;
        Ok(match self.order {
            HostOrder::RowMajor => host.to_vec(),
            HostOrder::ColumnMajor => match extents {
                [] | [_] => host.to_vec(),
                // a column-major (rows x cols) buffer is a row-major (cols x rows) one
                [rows, cols] => transpose(host, *cols, *rows),
                _ => permute(
                    host,
                    extents,
                    &column_major_strides(extents),
                    &row_major_strides(extents),
                ),
            },
        })
    }
}

fn check_len<T>(data: &[T], extents: &[usize]) -> Result<()> {
    let expected: usize = extents.iter().product();
    if data.len() != expected {
        return Err(Error::BufferLength {
            expected,
            found: data.len(),
        });
    }
    Ok(())
}

/// Row-major `rows x cols` into row-major `cols x rows`.
fn transpose<T: Copy>(src: &[T], rows: usize, cols: usize) -> Vec<T> {
    let mut out = Vec::with_capacity(src.len());
    for c in 0..cols {
        for r in 0..rows {
            out.push(src[r * cols + c]);
        }
    }
    out
}

/// General rank-N permutation. Walks the source in linear order, keeping the
/// multi-index as an odometer over the source strides' fastest axis first.
fn permute<T: Copy>(
    src: &[T],
    extents: &[usize],
    src_strides: &[usize],
    dst_strides: &[usize],
) -> Vec<T> {
    let n = src.len();
    if n == 0 {
        return Vec::new();
    }
    let rank = extents.len();
    // axes sorted by ascending source stride: the odometer's digit order
    let mut axes: Vec<usize> = (0..rank).collect();
    axes.sort_by_key(|&d| src_strides[d]);

    let mut out = vec![src[0]; n];
    let mut index = vec![0usize; rank];
    for &value in src {
        let dst: usize = index
            .iter()
            .zip(dst_strides)
            .map(|(i, s)| i * s)
            .sum();
        out[dst] = value;
        for &d in &axes {
            index[d] += 1;
            if index[d] < extents[d] {
                break;
            }
            index[d] = 0;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strides() {
        assert_eq!(row_major_strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert_eq!(column_major_strides(&[2, 3, 4]), vec![1, 2, 6]);
        assert!(row_major_strides(&[]).is_empty());
        assert_eq!(row_major_strides(&[5]), vec![1]);
    }

    #[test]
    fn matrix_to_column_major() {
        let conv = LayoutConverter::new(HostOrder::ColumnMajor);
        // [[1, 2, 3], [11, 22, 33]]
        let rm = [1.0, 2.0, 3.0, 11.0, 22.0, 33.0];
        let cm = conv.to_host_order(&rm, &[2, 3]).unwrap();
        assert_eq!(cm, vec![1.0, 11.0, 2.0, 22.0, 3.0, 33.0]);
        assert_eq!(conv.to_engine_order(&cm, &[2, 3]).unwrap(), rm.to_vec());
    }

    #[test]
    fn rank3_to_column_major() {
        let conv = LayoutConverter::new(HostOrder::ColumnMajor);
        let extents = [2, 3, 2];
        let rm: Vec<u32> = (0..12).collect();
        let cm = conv.to_host_order(&rm, &extents).unwrap();
        let rs = row_major_strides(&extents);
        let cs = column_major_strides(&extents);
        for i in 0..2 {
            for j in 0..3 {
                for k in 0..2 {
                    let r = i * rs[0] + j * rs[1] + k * rs[2];
                    let c = i * cs[0] + j * cs[1] + k * cs[2];
                    assert_eq!(cm[c], rm[r]);
                }
            }
        }
        assert_eq!(conv.to_engine_order(&cm, &extents).unwrap(), rm);
    }

    #[test]
    fn general_path_agrees_with_transpose() {
        let rm: Vec<u32> = (0..15).collect();
        let fast = transpose(&rm, 3, 5);
        let extents = [3, 5];
        let general = permute(
            &rm,
            &extents,
            &row_major_strides(&extents),
            &column_major_strides(&extents),
        );
        assert_eq!(fast, general);
    }

    #[test]
    fn low_rank_and_row_major_are_identity() {
        let col = LayoutConverter::new(HostOrder::ColumnMajor);
        assert_eq!(col.to_host_order(&[7], &[]).unwrap(), vec![7]);
        assert_eq!(col.to_host_order(&[1, 2, 3], &[3]).unwrap(), vec![1, 2, 3]);
        let row = LayoutConverter::new(HostOrder::RowMajor);
        assert_eq!(row.to_host_order(&[1, 2, 3, 4], &[2, 2]).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn empty_extents_convert_to_empty() {
        let conv = LayoutConverter::new(HostOrder::ColumnMajor);
        let out: Vec<f64> = conv.to_host_order(&[], &[3, 0, 2]).unwrap();
        assert!(out.is_empty());
        let out: Vec<f64> = conv.to_engine_order(&[], &[0, 4]).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let conv = LayoutConverter::default();
        let err = conv.to_host_order(&[1.0, 2.0], &[3]).unwrap_err();
        assert!(matches!(err, Error::BufferLength { expected: 3, found: 2 }));
    }
}
