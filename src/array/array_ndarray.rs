use crate::{array_subset::ArraySubset, data_type::Element};

use super::{Array, ArrayError};

fn iter_u64_to_usize<'a, I: Iterator<Item = &'a u64>>(iter: I) -> Vec<usize> {
    iter.map(|v| usize::try_from(*v).unwrap_or(usize::MAX))
        .collect::<Vec<_>>()
}

impl Array {
    /// Read the elements in `array_subset` into an [`ndarray::ArrayD`].
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the subset is invalid, the values cannot be converted to `T` or the
    /// engine fails.
    pub fn read_ndarray<T: Element>(
        &self,
        array_subset: &ArraySubset,
    ) -> Result<ndarray::ArrayD<T>, ArrayError> {
        let elements = self.read_elements::<T>(array_subset)?;
        let shape = iter_u64_to_usize(array_subset.shape().iter());
        Ok(ndarray::ArrayD::from_shape_vec(shape, elements)?)
    }

    /// Write `array` into the region of the same shape starting at `start`.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the region is invalid, the values cannot be converted, the container is
    /// read only or the engine fails.
    pub fn write_ndarray<T: Element>(
        &self,
        start: &[u64],
        array: ndarray::ArrayViewD<'_, T>,
    ) -> Result<(), ArrayError> {
        let shape = array.shape().iter().map(|&size| size as u64).collect();
        let array_subset = ArraySubset::new_with_start_shape(start.to_vec(), shape)?;
        match array.as_slice() {
            Some(elements) => self.write_elements(&array_subset, elements),
            None => self.write_elements(&array_subset, &array.iter().copied().collect::<Vec<_>>()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        array::ArrayCreateOptions,
        data_type::NumericType,
        engine::MemoryEngine,
        group::{ArrayDimension, Group},
    };

    #[test]
    fn ndarray_round_trip() {
        let root = Group::create_root(Box::new(MemoryEngine::new()));
        let array = root
            .create_md_array(
                "a",
                &[
                    ArrayDimension::Named { name: "y", size: 3 },
                    ArrayDimension::Named { name: "x", size: 2 },
                ],
                &NumericType::Float32.into(),
                &ArrayCreateOptions::default(),
            )
            .unwrap();
        let values = ndarray::array![[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]].into_dyn();
        array.write_ndarray(&[0, 0], values.t()).unwrap();
        let read = array
            .read_ndarray::<f32>(&ArraySubset::new_with_shape(vec![3, 2]))
            .unwrap();
        assert_eq!(read, values.t());
    }
}
