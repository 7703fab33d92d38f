use crate::{
    array_subset::{ArraySubset, Selection},
    config::global_config,
    data_type::Record,
    engine::MemoryEngine,
    group::{ArrayDimension, Group},
};

use super::{Array, ArrayBuffer, ArrayBufferMut, ArrayCreateOptions, ArrayError};

/// An in-memory copy of a region of an array.
#[derive(Debug)]
pub(super) struct ReadAheadCache {
    subset: ArraySubset,
    mirror: Box<Array>,
}

impl ReadAheadCache {
    /// Return `selection` relative to the cached region, [`None`] if it is not entirely within it.
    pub(super) fn rebase(&self, selection: &Selection) -> Option<Selection> {
        selection
            .is_within(&self.subset)
            .then(|| selection.rebased(self.subset.start()))
    }

    pub(super) const fn mirror(&self) -> &Array {
        &self.mirror
    }
}

impl Array {
    /// Advise that the region of `count` elements from `start` will be read soon.
    ///
    /// The region is copied into memory and reads entirely within it are served from the copy, until the next
    /// call of this method or the next write to the array. Returns false, and caches nothing, if the region is
    /// empty or larger than the [read ahead](crate::config::Config#read-ahead-max-bytes) limit.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if the region is invalid or cannot be read.
    pub fn advise_read(&self, start: &[u64], count: &[u64]) -> Result<bool, ArrayError> {
        let subset = ArraySubset::new_with_start_shape(start.to_vec(), count.to_vec())?;
        let data_type = self.require_data_type()?.clone();
        let _lock = self.shared.lock();
        self.read_ahead.lock().take();

        let selection = Selection::from_subset(&subset);
        let (shape, _) = self.shape_and_growable()?;
        selection.validate(&shape, &[], selection.buffer_len())?;
        let num_elements = selection.num_elements();
        if num_elements == 0 {
            return Ok(false);
        }
        let string_size = std::mem::size_of::<Option<String>>();
        let element_size = match (data_type.fixed_size(), data_type.as_record_type()) {
            (Some(size), _) => size,
            (None, Some(record_type)) => {
                record_type.size() + record_type.string_count() * string_size
            }
            (None, None) => string_size,
        };
        let max_bytes = global_config().read_ahead_max_bytes();
        if num_elements
            .checked_mul(element_size)
            .map_or(true, |bytes| bytes > max_bytes)
        {
            tracing::debug!(
                "read ahead of {subset} in {} exceeds {max_bytes} bytes, ignored",
                self.name
            );
            return Ok(false);
        }

        let dimension_names: Vec<String> = (0..subset.dimensionality())
            .map(|i| format!("dim{i}"))
            .collect();
        let dimensions: Vec<ArrayDimension> = dimension_names
            .iter()
            .zip(subset.shape())
            .map(|(name, &size)| ArrayDimension::Named { name, size })
            .collect();
        let mirror = Group::create_root(Box::new(MemoryEngine::new())).create_md_array(
            &self.name,
            &dimensions,
            &data_type,
            &ArrayCreateOptions::default(),
        )?;
        let region = Selection::new_contiguous(vec![0; subset.dimensionality()], selection.count().to_vec())?;
        if let Some(size) = data_type.fixed_size() {
            let mut bytes = vec![0; num_elements * size];
            self.read(&selection, &data_type, ArrayBufferMut::Bytes(&mut bytes))?;
            mirror.write(&region, &data_type, ArrayBuffer::Bytes(&bytes))?;
        } else if let Some(record_type) = data_type.as_record_type() {
            let mut records = vec![Record::new(record_type); num_elements];
            self.read(&selection, &data_type, ArrayBufferMut::Records(&mut records))?;
            mirror.write(&region, &data_type, ArrayBuffer::Records(&records))?;
        } else {
            let mut strings = vec![None; num_elements];
            self.read(&selection, &data_type, ArrayBufferMut::Strings(&mut strings))?;
            mirror.write(&region, &data_type, ArrayBuffer::Strings(&strings))?;
        }

        tracing::debug!("cached {subset} of {}", self.name);
        *self.read_ahead.lock() = Some(ReadAheadCache {
            subset,
            mirror: Box::new(mirror),
        });
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::NumericType;

    #[test]
    fn read_ahead_rebase() {
        let root = Group::create_root(Box::new(MemoryEngine::new()));
        let array = root
            .create_md_array(
                "a",
                &[ArrayDimension::Named { name: "x", size: 10 }],
                &NumericType::UInt16.into(),
                &ArrayCreateOptions::default(),
            )
            .unwrap();
        let values: Vec<u16> = (0..10).collect();
        array
            .write_elements(&ArraySubset::new_with_shape(vec![10]), &values)
            .unwrap();

        assert!(!array.advise_read(&[3], &[0]).unwrap());
        assert!(array.advise_read(&[2], &[6]).unwrap());
        let cache = array.read_ahead.lock();
        let cache = cache.as_ref().unwrap();
        let inside = Selection::new(vec![7], vec![3], vec![-2], vec![1]).unwrap();
        assert_eq!(cache.rebase(&inside).unwrap().start(), &[5]);
        let outside = Selection::new(vec![7], vec![2], vec![1], vec![1]).unwrap();
        assert!(cache.rebase(&outside).is_none());
    }

    #[test]
    fn read_ahead_limit() {
        let root = Group::create_root(Box::new(MemoryEngine::new()));
        let array = root
            .create_md_array(
                "big",
                &[ArrayDimension::Named { name: "x", size: 4 }],
                &NumericType::Float64.into(),
                &ArrayCreateOptions::default(),
            )
            .unwrap();
        assert!(array.advise_read(&[0], &[4]).unwrap());
        assert!(array.advise_read(&[0], &[5]).is_err());
        assert!(array.read_ahead.lock().is_none());
    }
}
