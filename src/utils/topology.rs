//! Topology utilities for column and input spaces.
//!
//! Columns and input bits live in multi-dimensional grids addressed by a flat
//! index. These helpers convert between flat indices and coordinates, map
//! columns onto the input grid and enumerate hypercube neighbourhoods.

use crate::types::UInt;

/// Specifies how boundaries are handled in topological computations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrappingMode {
    /// No wrapping - boundaries are hard limits.
    #[default]
    NoWrap,
    /// Wrap around - space is toroidal.
    Wrap,
}

impl From<bool> for WrappingMode {
    fn from(wrap: bool) -> Self {
        if wrap {
            Self::Wrap
        } else {
            Self::NoWrap
        }
    }
}

/// Utilities for computing topological relationships.
pub struct Topology;

impl Topology {
    /// Converts a flat index to multi-dimensional coordinates.
    ///
    /// ```rust
    /// use neocortex::utils::Topology;
    ///
    /// let coords = Topology::index_to_coordinates(5, &[3, 3]);
    /// assert_eq!(coords, vec![1, 2]);
    /// ```
    #[must_use]
    pub fn index_to_coordinates(index: usize, dimensions: &[UInt]) -> Vec<UInt> {
        let mut coords = vec![0; dimensions.len()];
        let mut idx = index;

        for i in (0..dimensions.len()).rev() {
            let dim_size = dimensions[i] as usize;
            coords[i] = (idx % dim_size) as UInt;
            idx /= dim_size;
        }

        coords
    }

    /// Converts multi-dimensional coordinates to a flat index.
    #[must_use]
    pub fn coordinates_to_index(coordinates: &[UInt], dimensions: &[UInt]) -> usize {
        let mut index = 0;
        let mut multiplier = 1;

        for i in (0..dimensions.len()).rev() {
            index += coordinates[i] as usize * multiplier;
            multiplier *= dimensions[i] as usize;
        }

        index
    }

    /// Computes the hypercube neighbourhood of radius `radius` around
    /// `center_index`.
    ///
    /// A window wider than a dimension covers that dimension exactly once, so
    /// the result never repeats an index even in wrap-around mode. Indices are
    /// returned in ascending order.
    #[must_use]
    pub fn neighborhood(
        center_index: usize,
        dimensions: &[UInt],
        radius: UInt,
        wrap: WrappingMode,
        include_center: bool,
    ) -> Vec<usize> {
        let center = Self::index_to_coordinates(center_index, dimensions);

        let axes: Vec<Vec<UInt>> = dimensions
            .iter()
            .zip(&center)
            .map(|(&size, &c)| Self::axis_window(c, size, radius, wrap))
            .collect();

        if axes.iter().any(Vec::is_empty) {
            return Vec::new();
        }

        let mut result = Vec::with_capacity(axes.iter().map(Vec::len).product());
        let mut cursor = vec![0usize; axes.len()];
        let mut coords: Vec<UInt> = axes.iter().map(|axis| axis[0]).collect();

        loop {
            let idx = Self::coordinates_to_index(&coords, dimensions);
            if include_center || idx != center_index {
                result.push(idx);
            }

            // Odometer over the per-axis windows.
            let mut dim = axes.len();
            loop {
                if dim == 0 {
                    result.sort_unstable();
                    return result;
                }
                dim -= 1;
                cursor[dim] += 1;
                if cursor[dim] < axes[dim].len() {
                    coords[dim] = axes[dim][cursor[dim]];
                    break;
                }
                cursor[dim] = 0;
                coords[dim] = axes[dim][0];
            }
        }
    }

    fn axis_window(center: UInt, size: UInt, radius: UInt, wrap: WrappingMode) -> Vec<UInt> {
        let size_i = i64::from(size);
        let radius_i = i64::from(radius);
        if 2 * radius_i + 1 >= size_i {
            return (0..size).collect();
        }

        let center_i = i64::from(center);
        (center_i - radius_i..=center_i + radius_i)
            .filter_map(|coord| match wrap {
                WrappingMode::NoWrap => (0..size_i).contains(&coord).then_some(coord as UInt),
                WrappingMode::Wrap => Some(coord.rem_euclid(size_i) as UInt),
            })
            .collect()
    }

    /// Maps a column index onto the input grid, spreading columns uniformly.
    #[must_use]
    pub fn map_column_to_input(
        column_index: usize,
        column_dimensions: &[UInt],
        input_dimensions: &[UInt],
    ) -> usize {
        let column_coords = Self::index_to_coordinates(column_index, column_dimensions);

        let input_coords: Vec<UInt> = input_dimensions
            .iter()
            .enumerate()
            .map(|(dim, &input_dim)| {
                let col_coord = column_coords.get(dim).map_or(0.0, |&c| f64::from(c));
                let col_dim = column_dimensions.get(dim).map_or(1.0, |&d| f64::from(d));
                let input_coord = ((col_coord + 0.5) * f64::from(input_dim) / col_dim) as UInt;
                input_coord.min(input_dim - 1)
            })
            .collect();

        Self::coordinates_to_index(&input_coords, input_dimensions)
    }

    /// Returns the input indices a column may connect to: the neighbourhood of
    /// radius `potential_radius` around the column's mapped input centre.
    #[must_use]
    pub fn map_potential_pool(
        column_index: usize,
        column_dimensions: &[UInt],
        input_dimensions: &[UInt],
        potential_radius: UInt,
        wrap: WrappingMode,
    ) -> Vec<usize> {
        let center = Self::map_column_to_input(column_index, column_dimensions, input_dimensions);
        Self::neighborhood(center, input_dimensions, potential_radius, wrap, true)
    }

    /// Total number of elements in a dimensional space.
    #[must_use]
    pub fn num_elements(dimensions: &[UInt]) -> usize {
        dimensions.iter().map(|&d| d as usize).product()
    }
}

/// Neighbourhoods of every column for one inhibition radius, excluding the
/// column itself. Rebuilt whenever the radius changes.
#[derive(Debug, Clone, Default)]
pub struct Neighborhood {
    radius: UInt,
    neighbors: Vec<Vec<usize>>,
}

impl Neighborhood {
    /// Computes the neighbourhood of every element of `dimensions`.
    #[must_use]
    pub fn compute_all(dimensions: &[UInt], radius: UInt, wrap: WrappingMode) -> Self {
        let neighbors = (0..Topology::num_elements(dimensions))
            .map(|i| Topology::neighborhood(i, dimensions, radius, wrap, false))
            .collect();
        Self { radius, neighbors }
    }

    /// Radius the cache was computed for.
    #[must_use]
    pub fn radius(&self) -> UInt {
        self.radius
    }

    /// Neighbours of `index`, or an empty slice if the cache is empty.
    #[must_use]
    pub fn get(&self, index: usize) -> &[usize] {
        self.neighbors.get(index).map_or(&[], Vec::as_slice)
    }

    /// Returns whether the cache has been populated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_to_coordinates() {
        assert_eq!(Topology::index_to_coordinates(5, &[10]), vec![5]);
        assert_eq!(Topology::index_to_coordinates(4, &[3, 3]), vec![1, 1]);
        assert_eq!(Topology::index_to_coordinates(13, &[2, 3, 4]), vec![1, 0, 1]);
    }

    #[test]
    fn test_coordinates_round_trip() {
        for i in 0..60 {
            let coords = Topology::index_to_coordinates(i, &[3, 4, 5]);
            assert_eq!(Topology::coordinates_to_index(&coords, &[3, 4, 5]), i);
        }
    }

    #[test]
    fn test_neighborhood_1d() {
        let neighbors = Topology::neighborhood(5, &[10], 2, WrappingMode::NoWrap, true);
        assert_eq!(neighbors, vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_neighborhood_1d_boundary() {
        let clipped = Topology::neighborhood(0, &[10], 2, WrappingMode::NoWrap, true);
        assert_eq!(clipped, vec![0, 1, 2]);

        let wrapped = Topology::neighborhood(0, &[10], 2, WrappingMode::Wrap, true);
        assert_eq!(wrapped, vec![0, 1, 2, 8, 9]);
    }

    #[test]
    fn test_wide_wrapped_window_has_no_duplicates() {
        let wrapped = Topology::neighborhood(3, &[6], 10, WrappingMode::Wrap, true);
        assert_eq!(wrapped, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_neighborhood_2d() {
        let neighbors = Topology::neighborhood(4, &[3, 3], 1, WrappingMode::NoWrap, true);
        assert_eq!(neighbors.len(), 9);

        let no_center = Topology::neighborhood(4, &[3, 3], 1, WrappingMode::NoWrap, false);
        assert_eq!(no_center.len(), 8);
        assert!(!no_center.contains(&4));
    }

    #[test]
    fn test_map_column_to_input() {
        assert_eq!(Topology::map_column_to_input(0, &[10], &[10]), 0);
        assert_eq!(Topology::map_column_to_input(0, &[5], &[10]), 1);
        assert_eq!(Topology::map_column_to_input(4, &[5], &[10]), 9);
    }

    #[test]
    fn test_potential_pool_covers_whole_input_for_large_radius() {
        let pool = Topology::map_potential_pool(3, &[8], &[20], 20, WrappingMode::Wrap);
        assert_eq!(pool, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_neighborhood_cache() {
        let cache = Neighborhood::compute_all(&[5, 5], 1, WrappingMode::NoWrap);
        assert_eq!(cache.radius(), 1);
        assert_eq!(cache.get(12).len(), 8);
        assert_eq!(cache.get(0).len(), 3);
        assert!(cache.get(99).is_empty());
    }
}
