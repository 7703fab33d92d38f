use thiserror::Error;

use crate::{
    array_subset::{IncompatibleDimensionalityError, SelectionError},
    attribute::AttributeError,
    data_type::DataTypeError,
    engine::{EngineError, NativeType},
};

use super::IncompatibleBufferError;

/// An array creation error.
#[derive(Debug, Error)]
pub enum ArrayCreateError {
    /// An engine error.
    #[error(transparent)]
    EngineError(#[from] EngineError),
    /// The data type cannot be registered.
    #[error(transparent)]
    DataTypeError(#[from] DataTypeError),
    /// The container is read only.
    #[error("array {0} cannot be created in a read only container")]
    ReadOnly(String),
    /// Virtual groups cannot hold new arrays.
    #[error("array {0} cannot be created in a virtual group")]
    VirtualGroup(String),
    /// The number of block sizes does not match the array dimensionality.
    #[error("got {0} block sizes, expected {1}")]
    InvalidBlockSize(usize, usize),
    /// A block size is zero.
    #[error("block sizes must be non-zero, got {0:?}")]
    ZeroBlockSize(Vec<u64>),
}

/// Array errors.
#[derive(Debug, Error)]
pub enum ArrayError {
    /// An engine error.
    #[error(transparent)]
    EngineError(#[from] EngineError),
    /// A data type or conversion error.
    #[error(transparent)]
    DataTypeError(#[from] DataTypeError),
    /// An invalid selection.
    #[error(transparent)]
    SelectionError(#[from] SelectionError),
    /// Incompatible dimensionality.
    #[error(transparent)]
    IncompatibleDimensionalityError(#[from] IncompatibleDimensionalityError),
    /// The buffer does not match the buffer data type.
    #[error(transparent)]
    IncompatibleBuffer(#[from] IncompatibleBufferError),
    /// An attribute error.
    #[error(transparent)]
    AttributeError(#[from] AttributeError),
    /// The container is read only.
    #[error("array {0} cannot be modified in a read only container")]
    ReadOnly(String),
    /// The array type has no logical equivalent.
    #[error("array {0} has unsupported native type {1}")]
    UnsupportedType(String, NativeType),
    /// The no data value does not match the array data type.
    #[error("no data value of {0} bytes does not match the array data type {1}")]
    InvalidNoData(usize, String),
    /// A dimension that is not unlimited cannot change size.
    #[error("dimension {0} has fixed size {1} and cannot be resized to {2}")]
    FixedDimension(String, u64, u64),
    /// An unlimited dimension cannot shrink.
    #[error("unlimited dimension {0} of size {1} cannot shrink to {2}")]
    ShrinkDimension(String, u64, u64),
    /// The in-memory copy of a read ahead region could not be created.
    #[error(transparent)]
    ReadAheadError(#[from] ArrayCreateError),
    /// The elements do not match the requested ndarray shape.
    #[cfg(feature = "ndarray")]
    #[error(transparent)]
    NdarrayShapeError(#[from] ndarray::ShapeError),
}
