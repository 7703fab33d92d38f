//! Array subsets and strided selections.
//!
//! An [`ArraySubset`] is a plain hyper-rectangle within an array, described by a start and shape.
//!
//! A [`Selection`] is the strided request of a read or write: per dimension, a start index, a count of
//! elements, a `step` between selected array elements, and a `buffer_stride` between the corresponding
//! buffer elements. Steps and buffer strides are in elements and may be zero or negative.
//!
//! Buffers passed alongside a selection start at the lowest addressed element. With negative buffer strides
//! the first selected element is therefore not at the start of the buffer, see [`Selection::buffer_origin`].

use derive_more::Display;
use itertools::izip;
use thiserror::Error;

/// An array subset.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Display, Default)]
#[display("start {start:?} shape {shape:?}")]
pub struct ArraySubset {
    start: Vec<u64>,
    shape: Vec<u64>,
}

impl ArraySubset {
    /// Create a new array subset with `shape` starting at the origin.
    #[must_use]
    pub fn new_with_shape(shape: Vec<u64>) -> Self {
        Self {
            start: vec![0; shape.len()],
            shape,
        }
    }

    /// Create a new array subset.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the length of `start` and `shape` do not match.
    pub fn new_with_start_shape(
        start: Vec<u64>,
        shape: Vec<u64>,
    ) -> Result<Self, IncompatibleDimensionalityError> {
        if start.len() == shape.len() {
            Ok(Self { start, shape })
        } else {
            Err(IncompatibleDimensionalityError::new(
                start.len(),
                shape.len(),
            ))
        }
    }

    /// Return the start of the array subset.
    #[must_use]
    pub fn start(&self) -> &[u64] {
        &self.start
    }

    /// Return the shape of the array subset.
    #[must_use]
    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    /// Return the dimensionality of the array subset.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.start.len()
    }

    /// Return the end (exclusive) of the array subset.
    #[must_use]
    pub fn end_exc(&self) -> Vec<u64> {
        std::iter::zip(&self.start, &self.shape)
            .map(|(start, size)| start + size)
            .collect()
    }

    /// Return the number of elements of the array subset.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.shape.iter().product()
    }

    /// Returns true if the array subset is within the bounds of `array_shape`.
    #[must_use]
    pub fn inbounds(&self, array_shape: &[u64]) -> bool {
        self.dimensionality() == array_shape.len()
            && izip!(self.start(), self.shape(), array_shape)
                .all(|(start, size, shape)| start + size <= *shape)
    }
}

/// An incompatible dimensionality error.
#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
#[error("incompatible dimensionality {0}, expected {1}")]
pub struct IncompatibleDimensionalityError(usize, usize);

impl IncompatibleDimensionalityError {
    /// Create a new incompatible dimensionality error.
    #[must_use]
    pub const fn new(got: usize, expected: usize) -> Self {
        Self(got, expected)
    }
}

/// A selection error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    /// The selection dimensionality does not match.
    #[error(transparent)]
    IncompatibleDimensionality(#[from] IncompatibleDimensionalityError),
    /// A selected index is outside of the array.
    #[error("selection {0} is out of bounds of array shape {1:?}")]
    OutOfBounds(Selection, Vec<u64>),
    /// The buffer does not hold every selected element.
    #[error("buffer holds {0} elements, selection needs {1}")]
    BufferTooSmall(usize, usize),
}

/// A strided selection of array elements and the layout of their buffer.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Display, Default)]
#[display("start {start:?} count {count:?} step {step:?} buffer stride {buffer_stride:?}")]
pub struct Selection {
    start: Vec<u64>,
    count: Vec<usize>,
    step: Vec<i64>,
    buffer_stride: Vec<isize>,
}

impl Selection {
    /// Create a new selection.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if `count`, `step` or `buffer_stride` do not match the
    /// length of `start`.
    pub fn new(
        start: Vec<u64>,
        count: Vec<usize>,
        step: Vec<i64>,
        buffer_stride: Vec<isize>,
    ) -> Result<Self, IncompatibleDimensionalityError> {
        for len in [count.len(), step.len(), buffer_stride.len()] {
            if len != start.len() {
                return Err(IncompatibleDimensionalityError::new(len, start.len()));
            }
        }
        Ok(Self {
            start,
            count,
            step,
            buffer_stride,
        })
    }

    /// Create a new selection with unit steps into a densely packed row-major buffer.
    ///
    /// # Errors
    /// Returns [`IncompatibleDimensionalityError`] if the length of `start` and `count` do not match.
    pub fn new_contiguous(
        start: Vec<u64>,
        count: Vec<usize>,
    ) -> Result<Self, IncompatibleDimensionalityError> {
        if start.len() != count.len() {
            return Err(IncompatibleDimensionalityError::new(
                count.len(),
                start.len(),
            ));
        }
        let buffer_stride = packed_strides(&count);
        Ok(Self {
            step: vec![1; start.len()],
            start,
            count,
            buffer_stride,
        })
    }

    /// Create a contiguous selection of an array subset.
    #[must_use]
    pub fn from_subset(subset: &ArraySubset) -> Self {
        let count: Vec<usize> = subset
            .shape()
            .iter()
            .map(|&size| usize::try_from(size).unwrap_or(usize::MAX))
            .collect();
        Self {
            start: subset.start().to_vec(),
            step: vec![1; count.len()],
            buffer_stride: packed_strides(&count),
            count,
        }
    }

    /// The start index per dimension.
    #[must_use]
    pub fn start(&self) -> &[u64] {
        &self.start
    }

    /// The number of selected elements per dimension.
    #[must_use]
    pub fn count(&self) -> &[usize] {
        &self.count
    }

    /// The step between selected array elements per dimension.
    #[must_use]
    pub fn step(&self) -> &[i64] {
        &self.step
    }

    /// The stride between buffer elements per dimension.
    #[must_use]
    pub fn buffer_stride(&self) -> &[isize] {
        &self.buffer_stride
    }

    /// Return the dimensionality of the selection.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.start.len()
    }

    /// Return the number of selected elements.
    #[must_use]
    pub fn num_elements(&self) -> usize {
        self.count.iter().product()
    }

    /// Returns true if the buffer is densely packed in row-major order of the selection.
    ///
    /// Dimensions with a count of one do not constrain the layout.
    #[must_use]
    pub fn is_packed(&self) -> bool {
        let mut expected: isize = 1;
        for (&count, &stride) in std::iter::zip(&self.count, &self.buffer_stride).rev() {
            if count != 1 {
                if stride != expected {
                    return false;
                }
                expected = expected.saturating_mul(isize::try_from(count).unwrap_or(isize::MAX));
            }
        }
        true
    }

    /// Returns true if every dimension with more than one selected element has a unit step.
    #[must_use]
    pub fn has_unit_steps(&self) -> bool {
        std::iter::zip(&self.count, &self.step).all(|(&count, &step)| count == 1 || step == 1)
    }

    /// Return the smallest and largest selected index of dimension `axis`.
    ///
    /// Returns [`None`] if nothing is selected or an index is negative.
    #[must_use]
    pub fn index_range(&self, axis: usize) -> Option<(u64, u64)> {
        let count = *self.count.get(axis)?;
        if count == 0 {
            return None;
        }
        let first = i128::from(self.start[axis]);
        let last = first + (i128::try_from(count).ok()? - 1) * i128::from(self.step[axis]);
        let (min, max) = (first.min(last), first.max(last));
        Some((u64::try_from(min).ok()?, u64::try_from(max).ok()?))
    }

    /// Return the buffer element offset of the first selected element.
    ///
    /// This is non-zero when a buffer stride is negative.
    #[must_use]
    pub fn buffer_origin(&self) -> usize {
        std::iter::zip(&self.count, &self.buffer_stride)
            .filter(|(_, &stride)| stride < 0)
            .map(|(&count, &stride)| count.saturating_sub(1) * stride.unsigned_abs())
            .sum()
    }

    /// Return the buffer element index of the selected element at `position` within the selection.
    #[must_use]
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub fn buffer_index(&self, position: &[usize]) -> usize {
        std::iter::zip(position, &self.buffer_stride).fold(
            self.buffer_origin() as isize,
            |offset, (&i, &stride)| offset + i as isize * stride,
        ) as usize
    }

    /// Return the array index of dimension `axis` of the selected element at position `i` along it.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn array_index(&self, axis: usize, i: usize) -> u64 {
        self.start[axis].wrapping_add_signed((i as i64).wrapping_mul(self.step[axis]))
    }

    /// Return the number of buffer elements spanned by the selection.
    #[must_use]
    pub fn buffer_len(&self) -> usize {
        if self.num_elements() == 0 {
            return 0;
        }
        std::iter::zip(&self.count, &self.buffer_stride)
            .map(|(&count, &stride)| (count - 1) * stride.unsigned_abs())
            .sum::<usize>()
            + 1
    }

    /// Validate the selection against an array of `shape` and a buffer of `buffer_len` elements.
    ///
    /// Dimensions flagged in `growable` may be addressed beyond their current size.
    ///
    /// # Errors
    /// Returns a [`SelectionError`] if the dimensionality does not match, a selected index is outside of the
    /// array or the buffer is too small.
    pub fn validate(
        &self,
        shape: &[u64],
        growable: &[bool],
        buffer_len: usize,
    ) -> Result<(), SelectionError> {
        if shape.len() != self.dimensionality() {
            return Err(IncompatibleDimensionalityError::new(
                self.dimensionality(),
                shape.len(),
            )
            .into());
        }
        if self.num_elements() == 0 {
            return Ok(());
        }
        for (axis, &size) in shape.iter().enumerate() {
            let inbounds = self
                .index_range(axis)
                .is_some_and(|(_, max)| max < size || growable.get(axis).copied().unwrap_or(false));
            if !inbounds {
                return Err(SelectionError::OutOfBounds(self.clone(), shape.to_vec()));
            }
        }
        let needed = self.buffer_len();
        if buffer_len < needed {
            return Err(SelectionError::BufferTooSmall(buffer_len, needed));
        }
        Ok(())
    }

    /// Returns true if every selected index lies within `subset`.
    #[must_use]
    pub fn is_within(&self, subset: &ArraySubset) -> bool {
        subset.dimensionality() == self.dimensionality()
            && (0..self.dimensionality()).all(|axis| {
                self.index_range(axis).is_some_and(|(min, max)| {
                    min >= subset.start()[axis]
                        && max < subset.start()[axis] + subset.shape()[axis]
                })
            })
    }

    /// Return the selection with its start expressed relative to `origin`.
    ///
    /// # Panics
    /// Panics if the dimensionality of `origin` does not match or `origin` exceeds the start.
    #[must_use]
    pub fn rebased(&self, origin: &[u64]) -> Self {
        assert_eq!(origin.len(), self.dimensionality());
        Self {
            start: std::iter::zip(&self.start, origin)
                .map(|(start, origin)| start - origin)
                .collect(),
            ..self.clone()
        }
    }
}

/// Return the row-major strides of a densely packed buffer of `count`.
fn packed_strides(count: &[usize]) -> Vec<isize> {
    let mut strides = vec![1isize; count.len()];
    let mut stride: isize = 1;
    for (out, &count) in std::iter::zip(strides.iter_mut(), count).rev() {
        *out = stride;
        stride = stride.saturating_mul(isize::try_from(count).unwrap_or(isize::MAX));
    }
    strides
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_subset() {
        assert!(ArraySubset::new_with_start_shape(vec![0, 0], vec![10, 10]).is_ok());
        assert!(ArraySubset::new_with_start_shape(vec![0, 0], vec![10]).is_err());
        let subset = ArraySubset::new_with_start_shape(vec![1, 1], vec![2, 3]).unwrap();
        assert_eq!(subset.end_exc(), vec![3, 4]);
        assert_eq!(subset.num_elements(), 6);
        assert!(subset.inbounds(&[3, 4]));
        assert!(!subset.inbounds(&[3, 3]));
        assert_eq!(subset.to_string(), "start [1, 1] shape [2, 3]");
    }

    #[test]
    fn selection_contiguous() {
        let selection = Selection::new_contiguous(vec![1, 1], vec![2, 3]).unwrap();
        assert_eq!(selection.buffer_stride(), &[3, 1]);
        assert!(selection.is_packed());
        assert!(selection.has_unit_steps());
        assert_eq!(selection.buffer_len(), 6);
        assert_eq!(selection.buffer_origin(), 0);
        assert!(selection.validate(&[3, 4], &[false, false], 6).is_ok());
        assert_eq!(
            selection.validate(&[3, 3], &[false, false], 6),
            Err(SelectionError::OutOfBounds(selection.clone(), vec![3, 3]))
        );
        assert_eq!(
            selection.validate(&[3, 4], &[false, false], 5),
            Err(SelectionError::BufferTooSmall(5, 6))
        );
    }

    #[test]
    fn selection_negative_step_and_stride() {
        let selection = Selection::new(vec![5], vec![3], vec![-2], vec![-1]).unwrap();
        assert_eq!(selection.index_range(0), Some((1, 5)));
        assert_eq!(selection.buffer_origin(), 2);
        assert_eq!(selection.buffer_len(), 3);
        assert_eq!(selection.buffer_index(&[0]), 2);
        assert_eq!(selection.buffer_index(&[2]), 0);
        assert_eq!(selection.array_index(0, 2), 1);
        assert!(!selection.is_packed());
        assert!(!selection.has_unit_steps());
        assert!(selection.validate(&[6], &[false], 3).is_ok());

        let selection = Selection::new(vec![1], vec![3], vec![-1], vec![1]).unwrap();
        assert_eq!(selection.index_range(0), None);
        assert!(selection.validate(&[6], &[false], 3).is_err());
    }

    #[test]
    fn selection_growable() {
        let selection = Selection::new_contiguous(vec![4], vec![2]).unwrap();
        assert!(selection.validate(&[4], &[false], 2).is_err());
        assert!(selection.validate(&[4], &[true], 2).is_ok());
    }

    #[test]
    fn selection_within_subset() {
        let subset = ArraySubset::new_with_start_shape(vec![2, 2], vec![4, 4]).unwrap();
        let inside = Selection::new(vec![5, 2], vec![2, 2], vec![-1, 3], vec![2, 1]).unwrap();
        assert!(inside.is_within(&subset));
        assert_eq!(inside.rebased(subset.start()).start(), &[3, 0]);
        let outside = Selection::new_contiguous(vec![1, 2], vec![2, 2]).unwrap();
        assert!(!outside.is_within(&subset));
    }

    #[test]
    fn selection_dimensionality() {
        assert_eq!(
            Selection::new(vec![0, 0], vec![1], vec![1, 1], vec![1, 1]),
            Err(IncompatibleDimensionalityError::new(1, 2))
        );
        let scalar = Selection::new_contiguous(vec![], vec![]).unwrap();
        assert_eq!(scalar.num_elements(), 1);
        assert_eq!(scalar.buffer_len(), 1);
        assert!(scalar.validate(&[], &[], 1).is_ok());
    }
}
