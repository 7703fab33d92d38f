/// Options for listing the arrays of a [`Group`](crate::group::Group).
///
/// By default, zero-dimensional arrays, coordinate variables, bounds variables, indexing variables and
/// time variables are hidden.
#[derive(Clone, Debug, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ArrayNamesOptions {
    show_all: bool,
    show_zero_dim: bool,
    show_coordinates: bool,
    show_bounds: bool,
    show_indexing: bool,
    show_time: bool,
    group_by_same_dimension: bool,
}

impl ArrayNamesOptions {
    /// List every array, regardless of the other options.
    #[must_use]
    pub fn with_show_all(mut self, show_all: bool) -> Self {
        self.show_all = show_all;
        self
    }

    /// List zero-dimensional arrays.
    #[must_use]
    pub fn with_show_zero_dim(mut self, show_zero_dim: bool) -> Self {
        self.show_zero_dim = show_zero_dim;
        self
    }

    /// List arrays named in the `coordinates` attribute of another array.
    #[must_use]
    pub fn with_show_coordinates(mut self, show_coordinates: bool) -> Self {
        self.show_coordinates = show_coordinates;
        self
    }

    /// List arrays named in the `bounds` attribute of another array.
    #[must_use]
    pub fn with_show_bounds(mut self, show_bounds: bool) -> Self {
        self.show_bounds = show_bounds;
        self
    }

    /// List one-dimensional arrays named after their dimension.
    #[must_use]
    pub fn with_show_indexing(mut self, show_indexing: bool) -> Self {
        self.show_indexing = show_indexing;
        self
    }

    /// List arrays with a `time` standard name.
    #[must_use]
    pub fn with_show_time(mut self, show_time: bool) -> Self {
        self.show_time = show_time;
        self
    }

    /// Omit one-dimensional arrays, which are listed by the virtual groups of their dimension instead.
    ///
    /// See [`GroupNamesOptions::with_group_by_same_dimension`](super::GroupNamesOptions::with_group_by_same_dimension).
    #[must_use]
    pub fn with_group_by_same_dimension(mut self, group_by_same_dimension: bool) -> Self {
        self.group_by_same_dimension = group_by_same_dimension;
        self
    }

    /// Returns true if every array is listed.
    #[must_use]
    pub const fn show_all(&self) -> bool {
        self.show_all
    }

    /// Returns true if zero-dimensional arrays are listed.
    #[must_use]
    pub const fn show_zero_dim(&self) -> bool {
        self.show_all || self.show_zero_dim
    }

    /// Returns true if coordinate variables are listed.
    #[must_use]
    pub const fn show_coordinates(&self) -> bool {
        self.show_all || self.show_coordinates
    }

    /// Returns true if bounds variables are listed.
    #[must_use]
    pub const fn show_bounds(&self) -> bool {
        self.show_all || self.show_bounds
    }

    /// Returns true if indexing variables are listed.
    #[must_use]
    pub const fn show_indexing(&self) -> bool {
        self.show_all || self.show_indexing
    }

    /// Returns true if time variables are listed.
    #[must_use]
    pub const fn show_time(&self) -> bool {
        self.show_all || self.show_time
    }

    /// Returns true if one-dimensional arrays are omitted.
    #[must_use]
    pub const fn group_by_same_dimension(&self) -> bool {
        self.group_by_same_dimension
    }
}
