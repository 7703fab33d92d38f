use crate::{config::global_config, data_type::NativeTypeOverride};

/// A compression method.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Compression {
    /// Deflate (zlib) compression.
    Deflate,
}

/// Options for creating an [`Array`](super::Array).
#[derive(Clone, Debug, Default)]
pub struct ArrayCreateOptions {
    native_type: Option<NativeTypeOverride>,
    block_size: Option<Vec<u64>>,
    compression: Option<Compression>,
    compression_level: Option<u32>,
    checksum: bool,
}

impl ArrayCreateOptions {
    /// Request a specific native type.
    ///
    /// [`NativeTypeOverride::Char`] applies to one-dimensional strings with a maximum length, which are
    /// stored as fixed-width characters by default. [`NativeTypeOverride::Byte`] applies to
    /// [`NumericType::Int16`](crate::data_type::NumericType::Int16) arrays, and
    /// [`NativeTypeOverride::Int64`] and [`NativeTypeOverride::UInt64`] to
    /// [`NumericType::Float64`](crate::data_type::NumericType::Float64) arrays.
    #[must_use]
    pub fn with_native_type(mut self, native_type: NativeTypeOverride) -> Self {
        self.native_type = Some(native_type);
        self
    }

    /// Store the array in blocks (chunks) of `block_size`, one size per dimension.
    #[must_use]
    pub fn with_block_size(mut self, block_size: Vec<u64>) -> Self {
        self.block_size = Some(block_size);
        self
    }

    /// Compress the array.
    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Set the compression level, `1..=9` for [`Compression::Deflate`].
    ///
    /// Other levels fall back to the [deflate level](crate::config::Config#deflate-level) configuration.
    #[must_use]
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = Some(level);
        self
    }

    /// Store a checksum of each block.
    #[must_use]
    pub fn with_checksum(mut self, checksum: bool) -> Self {
        self.checksum = checksum;
        self
    }

    /// The requested native type.
    #[must_use]
    pub const fn native_type(&self) -> Option<NativeTypeOverride> {
        self.native_type
    }

    /// The requested block size.
    #[must_use]
    pub fn block_size(&self) -> Option<&[u64]> {
        self.block_size.as_deref()
    }

    /// The requested compression.
    #[must_use]
    pub const fn compression(&self) -> Option<Compression> {
        self.compression
    }

    /// The requested checksum.
    #[must_use]
    pub const fn checksum(&self) -> bool {
        self.checksum
    }

    /// Return the effective deflate level.
    pub(crate) fn deflate_level(&self) -> u32 {
        match self.compression_level {
            Some(level) if (1..=9).contains(&level) => level,
            Some(level) => {
                let fallback = global_config().deflate_level();
                tracing::warn!("invalid deflate level {level}, using {fallback}");
                fallback
            }
            None => global_config().deflate_level(),
        }
    }
}
