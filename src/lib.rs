//! A rust library for strided, typed access to the multidimensional arrays of a netCDF-style hierarchical
//! container.
//!
//! A container is a tree of [`Group`](group::Group)s holding [`Dimension`](dimension::Dimension)s,
//! [`Array`](array::Array)s and [`Attribute`](attribute::Attribute)s. Storage is delegated to an
//! [`Engine`](engine::Engine); [`MemoryEngine`](engine::MemoryEngine) is a complete in-memory engine.
//!
//! ## Getting Started
//! - [`group::Group::create_root`] and [`group::Group::open_root`] are the entry points.
//! - [`array::Array::read`] and [`array::Array::write`] transfer values described by an
//!   [`array_subset::Selection`], converting them to and from any [`data_type::ExtendedType`].
//! - Conventions are interpreted along the way: `_FillValue`, `scale_factor`, `add_offset`, `units`,
//!   `_Unsigned`, coordinate variables and CF grid mappings.
//!
//! ## Example
//! ```rust
//! use ncmdarray::{
//!     array::ArrayCreateOptions,
//!     array_subset::ArraySubset,
//!     data_type::NumericType,
//!     engine::MemoryEngine,
//!     group::{ArrayDimension, Group},
//! };
//!
//! let root = Group::create_root(Box::new(MemoryEngine::new()));
//! let array = root.create_md_array(
//!     "temperature",
//!     &[
//!         ArrayDimension::Named { name: "y", size: 2 },
//!         ArrayDimension::Named { name: "x", size: 3 },
//!     ],
//!     &NumericType::Float32.into(),
//!     &ArrayCreateOptions::default(),
//! )?;
//! array.write_elements::<f32>(
//!     &ArraySubset::new_with_shape(vec![2, 3]),
//!     &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
//! )?;
//! let row = array.read_elements::<f64>(&ArraySubset::new_with_start_shape(vec![1, 0], vec![1, 3])?)?;
//! assert_eq!(row, vec![4.0, 5.0, 6.0]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Crate Features
//! #### Default
//!  - `ndarray`: [`ndarray`] utility functions for [`Array`](crate::array::Array).
//!
//! ## Licence
//! `ncmdarray` is licensed under either of
//!  - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license <http://opensource.org/licenses/MIT>, at your option.

#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
// #![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod array;
pub mod array_subset;
pub mod attribute;
pub mod config;
pub mod data_type;
pub mod dimension;
pub mod engine;
pub mod group;
pub mod shared;
pub mod spatial_ref;
