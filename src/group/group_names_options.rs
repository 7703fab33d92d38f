/// Options for listing and opening the subgroups of a [`Group`](crate::group::Group).
#[derive(Clone, Debug, Default)]
pub struct GroupNamesOptions {
    group_by_same_dimension: bool,
}

impl GroupNamesOptions {
    /// Expose a virtual group per dimension of the one-dimensional arrays of a group without subgroups.
    ///
    /// Each virtual group lists the one-dimensional arrays over its dimension.
    #[must_use]
    pub fn with_group_by_same_dimension(mut self, group_by_same_dimension: bool) -> Self {
        self.group_by_same_dimension = group_by_same_dimension;
        self
    }

    /// Returns true if virtual groups are exposed.
    #[must_use]
    pub const fn group_by_same_dimension(&self) -> bool {
        self.group_by_same_dimension
    }
}
