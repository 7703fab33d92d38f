use crate::{
    array_subset::Selection,
    attribute::text_until_nul,
    data_type::{copy_value, ExtendedType, Record},
    engine::{LogEngineError, NativeType},
};

use super::{Array, ArrayBuffer, ArrayBufferMut, ArrayError};

/// Call `f` with every position within `count`, in row-major order.
///
/// A zero-dimensional `count` has a single empty position.
pub(crate) fn for_each_position<E>(
    count: &[usize],
    mut f: impl FnMut(&[usize]) -> Result<(), E>,
) -> Result<(), E> {
    if count.contains(&0) {
        return Ok(());
    }
    let mut position = vec![0; count.len()];
    loop {
        f(&position)?;
        let mut axis = count.len();
        loop {
            if axis == 0 {
                return Ok(());
            }
            axis -= 1;
            position[axis] += 1;
            if position[axis] < count[axis] {
                break;
            }
            position[axis] = 0;
        }
    }
}

/// The arguments of a mapped transfer, [`None`] if the selection cannot be expressed as one.
///
/// Every dimension with more than one selected element needs a positive step and a non-negative buffer
/// stride.
fn mapped_arguments(
    selection: &Selection,
    element_size: usize,
    imap_in_elements: bool,
) -> Option<(Vec<usize>, Vec<usize>)> {
    let unit = if imap_in_elements { 1 } else { element_size };
    let mut stride = Vec::with_capacity(selection.dimensionality());
    let mut imap = Vec::with_capacity(selection.dimensionality());
    for ((&count, &step), &buffer_stride) in selection
        .count()
        .iter()
        .zip(selection.step())
        .zip(selection.buffer_stride())
    {
        if count == 1 {
            stride.push(1);
            imap.push(0);
        } else {
            stride.push(usize::try_from(step).ok().filter(|&step| step > 0)?);
            imap.push(usize::try_from(buffer_stride).ok()? * unit);
        }
    }
    Some((stride, imap))
}

impl Array {
    fn array_index(selection: &Selection, position: &[usize], index: &mut [u64]) {
        for (axis, (&i, index)) in position.iter().zip(index.iter_mut()).enumerate() {
            *index = selection.array_index(axis, i);
        }
    }

    /// Read the elements of `selection` into `buffer`, converting them to `buffer_type`.
    ///
    /// `buffer` holds the selected elements at the offsets given by the buffer strides of `selection`,
    /// starting from its lowest addressed element. Elements between them are left untouched.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - the selection does not match the array dimensionality or is out of bounds,
    ///  - the buffer does not match `buffer_type` or is too small,
    ///  - the values cannot be converted to `buffer_type`, or
    ///  - the engine fails.
    pub fn read(
        &self,
        selection: &Selection,
        buffer_type: &ExtendedType,
        mut buffer: ArrayBufferMut<'_>,
    ) -> Result<(), ArrayError> {
        let buffer_len = buffer.len_elements(buffer_type)?;
        let _lock = self.shared.lock();
        let (shape, _) = self.shape_and_growable()?;
        selection.validate(&shape, &[], buffer_len)?;
        if selection.num_elements() == 0 {
            return Ok(());
        }
        let data_type = self.require_data_type()?;

        if let Some(cache) = self.read_ahead.lock().as_ref() {
            if let Some(rebased) = cache.rebase(selection) {
                tracing::trace!("read of {} served by read ahead cache", self.name);
                return cache.mirror().read(&rebased, buffer_type, buffer);
            }
        }

        self.shared.set_define_mode(false)?;
        if let Some(len) = self.fixed_text_length {
            self.read_fixed_text(selection, len, buffer_type, &mut buffer)
        } else if data_type.fixed_size().is_some()
            && selection.has_unit_steps()
            && selection.is_packed()
        {
            self.read_contiguous(selection, data_type, buffer_type, &mut buffer)
        } else if !self.read_mapped(selection, data_type, buffer_type, &mut buffer)? {
            self.read_generic(selection, data_type, buffer_type, &mut buffer)
        } else {
            Ok(())
        }
    }

    fn read_fixed_text(
        &self,
        selection: &Selection,
        len: usize,
        buffer_type: &ExtendedType,
        buffer: &mut ArrayBufferMut<'_>,
    ) -> Result<(), ArrayError> {
        let mut text = vec![0; len];
        for i in 0..selection.count()[0] {
            let start = [selection.array_index(0, i), 0];
            self.shared
                .with_engine(|engine| engine.get_vara(self.gid, self.varid, &start, &[1, len], &mut text))
                .log_engine_error("get_vara")?;
            buffer.store_string(
                buffer_type,
                selection.buffer_index(&[i]),
                Some(text_until_nul(&text)),
            )?;
        }
        Ok(())
    }

    fn read_contiguous(
        &self,
        selection: &Selection,
        data_type: &ExtendedType,
        buffer_type: &ExtendedType,
        buffer: &mut ArrayBufferMut<'_>,
    ) -> Result<(), ArrayError> {
        let num_elements = selection.num_elements();
        let native_size = self.native.native_size();
        let get_vara = |out: &mut [u8]| {
            self.shared
                .with_engine(|engine| {
                    engine.get_vara(self.gid, self.varid, selection.start(), selection.count(), out)
                })
                .log_engine_error("get_vara")
        };
        let mut scratch = vec![0; self.native.scratch_size()];

        if let ArrayBufferMut::Bytes(bytes) = buffer {
            let buffer_size = buffer_type.fixed_size().unwrap_or_default();
            if self.is_perfect_match() && buffer_type == data_type {
                return Ok(get_vara(&mut bytes[..num_elements * native_size])?);
            }
            if buffer_size >= native_size {
                // Converted elements never overtake the native elements not yet converted.
                get_vara(&mut bytes[..num_elements * native_size])?;
                for i in (0..num_elements).rev() {
                    scratch[..native_size]
                        .copy_from_slice(&bytes[i * native_size..(i + 1) * native_size]);
                    self.native.to_logical(&mut scratch);
                    copy_value(
                        &scratch,
                        data_type,
                        &mut bytes[i * buffer_size..(i + 1) * buffer_size],
                        buffer_type,
                    )?;
                }
                return Ok(());
            }
        }

        let mut values = vec![0; num_elements * native_size];
        get_vara(&mut values)?;
        for (i, value) in values.chunks_exact(native_size).enumerate() {
            scratch[..native_size].copy_from_slice(value);
            self.native.to_logical(&mut scratch);
            buffer.store(buffer_type, i, &scratch, data_type)?;
        }
        Ok(())
    }

    /// Read with a single mapped call. Returns false if the read needs another strategy.
    fn read_mapped(
        &self,
        selection: &Selection,
        data_type: &ExtendedType,
        buffer_type: &ExtendedType,
        buffer: &mut ArrayBufferMut<'_>,
    ) -> Result<bool, ArrayError> {
        let ArrayBufferMut::Bytes(bytes) = buffer else {
            return Ok(false);
        };
        if !self.is_perfect_match() || buffer_type != data_type {
            return Ok(false);
        }
        let Some(element_size) = data_type.fixed_size() else {
            return Ok(false);
        };
        let Some((stride, imap)) =
            mapped_arguments(selection, element_size, self.shared.imap_in_elements())
        else {
            return Ok(false);
        };
        self.shared
            .with_engine(|engine| {
                engine.get_varm(
                    self.gid,
                    self.varid,
                    selection.start(),
                    selection.count(),
                    &stride,
                    &imap,
                    bytes,
                )
            })
            .log_engine_error("get_varm")?;
        Ok(true)
    }

    fn read_generic(
        &self,
        selection: &Selection,
        data_type: &ExtendedType,
        buffer_type: &ExtendedType,
        buffer: &mut ArrayBufferMut<'_>,
    ) -> Result<(), ArrayError> {
        let native_size = self.native.native_size();
        let mut scratch = vec![0; self.native.scratch_size()];
        let mut index = vec![0; selection.dimensionality()];
        for_each_position(selection.count(), |position| -> Result<(), ArrayError> {
            Self::array_index(selection, position, &mut index);
            let dst = selection.buffer_index(position);
            match self.native_type() {
                NativeType::User(_) if data_type.as_record_type().is_some() => {
                    let record = self
                        .shared
                        .with_engine(|engine| engine.get_var1_record(self.gid, self.varid, &index))
                        .log_engine_error("get_var1_record")?;
                    buffer.store_record(buffer_type, dst, &record, data_type)?;
                }
                NativeType::String => {
                    let value = self
                        .shared
                        .with_engine(|engine| engine.get_var1_string(self.gid, self.varid, &index))
                        .log_engine_error("get_var1_string")?;
                    buffer.store_string(buffer_type, dst, value)?;
                }
                NativeType::Char => {
                    let mut value = [0];
                    self.shared
                        .with_engine(|engine| engine.get_var1(self.gid, self.varid, &index, &mut value))
                        .log_engine_error("get_var1")?;
                    buffer.store_string(buffer_type, dst, Some(text_until_nul(&value)))?;
                }
                _ => {
                    self.shared
                        .with_engine(|engine| {
                            engine.get_var1(self.gid, self.varid, &index, &mut scratch[..native_size])
                        })
                        .log_engine_error("get_var1")?;
                    self.native.to_logical(&mut scratch);
                    buffer.store(buffer_type, dst, &scratch, data_type)?;
                }
            }
            Ok(())
        })
    }

    /// Write the elements of `selection` from `buffer`, converting them from `buffer_type`.
    ///
    /// Unlimited dimensions grow to hold the selection. The read ahead cache of the array is dropped.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] if
    ///  - the container is read only,
    ///  - the selection does not match the array dimensionality or is out of bounds,
    ///  - the buffer does not match `buffer_type` or is too small,
    ///  - the values cannot be converted from `buffer_type`, or
    ///  - the engine fails.
    pub fn write(
        &self,
        selection: &Selection,
        buffer_type: &ExtendedType,
        buffer: ArrayBuffer<'_>,
    ) -> Result<(), ArrayError> {
        self.require_writable()?;
        let buffer_len = buffer.len_elements(buffer_type)?;
        let _lock = self.shared.lock();
        self.read_ahead.lock().take();
        let (shape, growable) = self.shape_and_growable()?;
        selection.validate(&shape, &growable, buffer_len)?;
        if selection.num_elements() == 0 {
            return Ok(());
        }
        let data_type = self.require_data_type()?;

        self.shared.set_define_mode(false)?;
        if let Some(len) = self.fixed_text_length {
            self.write_fixed_text(selection, len, buffer_type, buffer)
        } else if data_type.fixed_size().is_some()
            && selection.has_unit_steps()
            && selection.is_packed()
        {
            self.write_contiguous(selection, data_type, buffer_type, buffer)
        } else if !self.write_mapped(selection, data_type, buffer_type, buffer)? {
            self.write_generic(selection, data_type, buffer_type, buffer)
        } else {
            Ok(())
        }
    }

    fn write_fixed_text(
        &self,
        selection: &Selection,
        len: usize,
        buffer_type: &ExtendedType,
        buffer: ArrayBuffer<'_>,
    ) -> Result<(), ArrayError> {
        let mut text = vec![0; len];
        for i in 0..selection.count()[0] {
            let value = buffer
                .load_string(buffer_type, selection.buffer_index(&[i]))?
                .unwrap_or_default();
            let value = value.as_bytes();
            let copied = value.len().min(len);
            text[..copied].copy_from_slice(&value[..copied]);
            text[copied..].fill(0);
            let start = [selection.array_index(0, i), 0];
            self.shared
                .with_engine(|engine| engine.put_vara(self.gid, self.varid, &start, &[1, len], &text))
                .log_engine_error("put_vara")?;
        }
        Ok(())
    }

    fn write_contiguous(
        &self,
        selection: &Selection,
        data_type: &ExtendedType,
        buffer_type: &ExtendedType,
        buffer: ArrayBuffer<'_>,
    ) -> Result<(), ArrayError> {
        let num_elements = selection.num_elements();
        let native_size = self.native.native_size();
        let put_vara = |data: &[u8]| {
            self.shared
                .with_engine(|engine| {
                    engine.put_vara(self.gid, self.varid, selection.start(), selection.count(), data)
                })
                .log_engine_error("put_vara")
        };

        if let ArrayBuffer::Bytes(bytes) = buffer {
            if self.is_perfect_match() && buffer_type == data_type {
                return Ok(put_vara(&bytes[..num_elements * native_size])?);
            }
        }
        let mut values = vec![0; num_elements * native_size];
        let mut scratch = vec![0; self.native.scratch_size()];
        for (i, value) in values.chunks_exact_mut(native_size).enumerate() {
            buffer.load(buffer_type, i, &mut scratch, data_type)?;
            self.native.to_native(&mut scratch);
            value.copy_from_slice(&scratch[..native_size]);
        }
        Ok(put_vara(&values)?)
    }

    /// Write with a single mapped call. Returns false if the write needs another strategy.
    fn write_mapped(
        &self,
        selection: &Selection,
        data_type: &ExtendedType,
        buffer_type: &ExtendedType,
        buffer: ArrayBuffer<'_>,
    ) -> Result<bool, ArrayError> {
        let ArrayBuffer::Bytes(bytes) = buffer else {
            return Ok(false);
        };
        if !self.is_perfect_match() || buffer_type != data_type {
            return Ok(false);
        }
        let Some(element_size) = data_type.fixed_size() else {
            return Ok(false);
        };
        let Some((stride, imap)) =
            mapped_arguments(selection, element_size, self.shared.imap_in_elements())
        else {
            return Ok(false);
        };
        self.shared
            .with_engine(|engine| {
                engine.put_varm(
                    self.gid,
                    self.varid,
                    selection.start(),
                    selection.count(),
                    &stride,
                    &imap,
                    bytes,
                )
            })
            .log_engine_error("put_varm")?;
        Ok(true)
    }

    fn write_generic(
        &self,
        selection: &Selection,
        data_type: &ExtendedType,
        buffer_type: &ExtendedType,
        buffer: ArrayBuffer<'_>,
    ) -> Result<(), ArrayError> {
        let native_size = self.native.native_size();
        let mut scratch = vec![0; self.native.scratch_size()];
        let mut index = vec![0; selection.dimensionality()];
        for_each_position(selection.count(), |position| -> Result<(), ArrayError> {
            Self::array_index(selection, position, &mut index);
            let src = selection.buffer_index(position);
            match (self.native_type(), data_type.as_record_type()) {
                (NativeType::User(_), Some(record_type)) => {
                    let mut record = Record::new(record_type);
                    buffer.load_record(buffer_type, src, &mut record, data_type)?;
                    self.shared
                        .with_engine(|engine| {
                            engine.put_var1_record(self.gid, self.varid, &index, &record)
                        })
                        .log_engine_error("put_var1_record")?;
                }
                (NativeType::String, _) => {
                    let value = buffer.load_string(buffer_type, src)?;
                    self.shared
                        .with_engine(|engine| {
                            engine.put_var1_string(self.gid, self.varid, &index, value.as_deref())
                        })
                        .log_engine_error("put_var1_string")?;
                }
                (NativeType::Char, _) => {
                    let value = buffer.load_string(buffer_type, src)?;
                    let byte = value.and_then(|value| value.bytes().next()).unwrap_or(0);
                    self.shared
                        .with_engine(|engine| engine.put_var1(self.gid, self.varid, &index, &[byte]))
                        .log_engine_error("put_var1")?;
                }
                _ => {
                    buffer.load(buffer_type, src, &mut scratch, data_type)?;
                    self.native.to_native(&mut scratch);
                    self.shared
                        .with_engine(|engine| {
                            engine.put_var1(self.gid, self.varid, &index, &scratch[..native_size])
                        })
                        .log_engine_error("put_var1")?;
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        array::ArrayCreateOptions,
        array_subset::ArraySubset,
        data_type::NumericType,
        engine::MemoryEngine,
        group::{ArrayDimension, Group},
    };

    fn array_2x3(root: &Group) -> Array {
        let array = root
            .create_md_array(
                "a",
                &[
                    ArrayDimension::Named { name: "y", size: 2 },
                    ArrayDimension::Named { name: "x", size: 3 },
                ],
                &NumericType::Int32.into(),
                &ArrayCreateOptions::default(),
            )
            .unwrap();
        array
            .write_elements::<i32>(&ArraySubset::new_with_shape(vec![2, 3]), &[1, 2, 3, 4, 5, 6])
            .unwrap();
        array
    }

    #[test]
    fn positions_row_major() {
        let mut positions = Vec::new();
        for_each_position(&[2, 2], |position| -> Result<(), ()> {
            positions.push(position.to_vec());
            Ok(())
        })
        .unwrap();
        assert_eq!(positions, vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]);

        let mut calls = 0;
        for_each_position(&[], |_| -> Result<(), ()> {
            calls += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(calls, 1);
        for_each_position(&[3, 0], |_| -> Result<(), ()> { unreachable!() }).unwrap();
    }

    #[test]
    fn mapped_arguments_units() {
        let selection = Selection::new(vec![0, 0], vec![2, 3], vec![1, 2], vec![1, 2]).unwrap();
        assert_eq!(
            mapped_arguments(&selection, 4, true),
            Some((vec![1, 2], vec![1, 2]))
        );
        assert_eq!(
            mapped_arguments(&selection, 4, false),
            Some((vec![1, 2], vec![4, 8]))
        );
        let negative = Selection::new(vec![1], vec![2], vec![-1], vec![1]).unwrap();
        assert_eq!(mapped_arguments(&negative, 4, true), None);
        let single = Selection::new(vec![1], vec![1], vec![-1], vec![-3]).unwrap();
        assert_eq!(mapped_arguments(&single, 4, true), Some((vec![1], vec![0])));
    }

    #[test]
    fn read_transposed() {
        let root = Group::create_root(Box::new(MemoryEngine::new()));
        let array = array_2x3(&root);
        let selection = Selection::new(vec![0, 0], vec![2, 3], vec![1, 1], vec![1, 2]).unwrap();
        let mut values = [0i32; 6];
        array
            .read(
                &selection,
                &NumericType::Int32.into(),
                ArrayBufferMut::Bytes(bytemuck::cast_slice_mut(&mut values)),
            )
            .unwrap();
        assert_eq!(values, [1, 4, 2, 5, 3, 6]);
    }

    #[test]
    fn read_converted_in_place() {
        let root = Group::create_root(Box::new(MemoryEngine::new()));
        let array = array_2x3(&root);
        let subset = ArraySubset::new_with_shape(vec![2, 3]);
        assert_eq!(
            array.read_elements::<f64>(&subset).unwrap(),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
        );
        assert_eq!(array.read_elements::<u8>(&subset).unwrap(), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(
            array.read_strings(&subset).unwrap()[5].as_deref(),
            Some("6")
        );
    }

    #[test]
    fn write_reversed() {
        let root = Group::create_root(Box::new(MemoryEngine::new()));
        let array = array_2x3(&root);
        let selection = Selection::new(vec![1, 2], vec![1, 3], vec![1, -1], vec![1, 1]).unwrap();
        let values = [7.0f32, 8.0, 9.0];
        array
            .write(
                &selection,
                &NumericType::Float32.into(),
                ArrayBuffer::Bytes(bytemuck::cast_slice(&values)),
            )
            .unwrap();
        assert_eq!(
            array
                .read_elements::<i32>(&ArraySubset::new_with_shape(vec![2, 3]))
                .unwrap(),
            vec![1, 2, 3, 9, 8, 7]
        );
    }

    #[test]
    fn read_out_of_bounds() {
        let root = Group::create_root(Box::new(MemoryEngine::new()));
        let array = array_2x3(&root);
        let selection = Selection::new(vec![0, 2], vec![1, 2], vec![1, 1], vec![1, 1]).unwrap();
        let mut values = [0i32; 2];
        assert!(matches!(
            array.read(
                &selection,
                &NumericType::Int32.into(),
                ArrayBufferMut::Bytes(bytemuck::cast_slice_mut(&mut values)),
            ),
            Err(ArrayError::SelectionError(_))
        ));
    }
}
