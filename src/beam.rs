use ndarray::Array2;

use crate::grid::FieldGrid;

/// The rectangular obstacle the flow passes around.
///
/// Fixed for the lifetime of a run; only ever used to mask grid cells
/// and draw the overlay rectangle. `start_x`, `height` and `length`
/// are in mesh units, `spacing` converts physical coordinates back to
/// mesh units before the containment test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamRegion {
    pub start_x: f64,
    pub height: f64,
    pub length: f64,
    pub spacing: f64,
}

impl BeamRegion {
    /// Inclusive containment test in mesh-normalized coordinates.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let xm = x / self.spacing;
        let ym = y / self.spacing;
        xm >= self.start_x && xm <= self.start_x + self.length && ym >= 0.0 && ym <= self.height
    }

    /// Boolean mask of grid cells inside the beam.
    pub fn mask(&self, grid: &FieldGrid) -> Array2<bool> {
        let mut inside = Array2::from_elem((grid.ny(), grid.nx()), false);
        for (j, &y) in grid.y_axis.iter().enumerate() {
            for (i, &x) in grid.x_axis.iter().enumerate() {
                inside[[j, i]] = self.contains(x, y);
            }
        }
        inside
    }

    /// Blank beam cells to the NaN hole marker, for scalar displays
    /// that should show the obstacle as empty.
    pub fn blank(&self, grid: &mut FieldGrid) {
        self.overwrite(grid, f64::NAN);
    }

    /// Zero beam cells, for vector-field routines (streamline tracing)
    /// that cannot tolerate holes. Not interchangeable with `blank`.
    pub fn zero(&self, grid: &mut FieldGrid) {
        self.overwrite(grid, 0.0);
    }

    fn overwrite(&self, grid: &mut FieldGrid, value: f64) {
        let inside = self.mask(grid);
        for ((j, i), &masked) in inside.indexed_iter() {
            if masked {
                grid.values[[j, i]] = value;
            }
        }
    }

    /// Physical rectangle corners for the overlay drawing:
    /// `((x0, y0), (x1, y1))`.
    pub fn outline(&self) -> ((f64, f64), (f64, f64)) {
        (
            (self.start_x * self.spacing, 0.0),
            ((self.start_x + self.length) * self.spacing, self.height * self.spacing),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::ScalarSamples;
    use crate::grid::{FieldGrid, Fill};

    fn beam() -> BeamRegion {
        BeamRegion { start_x: 10.0, height: 8.0, length: 8.0, spacing: 1.0 }
    }

    fn grid_20x30() -> FieldGrid {
        let mut rows = Vec::new();
        for y in 0..20 {
            for x in 0..30 {
                rows.push((x as f64, y as f64, 1.0));
            }
        }
        let samples = ScalarSamples {
            x: rows.iter().map(|r| r.0).collect(),
            y: rows.iter().map(|r| r.1).collect(),
            value: rows.iter().map(|r| r.2).collect(),
        };
        FieldGrid::from_indexed(&samples, Fill::Zero).unwrap()
    }

    #[test]
    fn test_mask_bounds_are_inclusive() {
        let grid = grid_20x30();
        let mask = beam().mask(&grid);
        // 10 <= x <= 18 and 0 <= y <= 8, both ends included.
        assert!(mask[[0, 10]]);
        assert!(mask[[0, 18]]);
        assert!(mask[[8, 14]]);
        assert!(!mask[[0, 9]]);
        assert!(!mask[[0, 19]]);
        assert!(!mask[[9, 14]]);
    }

    #[test]
    fn test_mask_respects_spacing() {
        let region = BeamRegion { spacing: 0.5, ..beam() };
        // Physical x = 5.0 is mesh x = 10, the beam front face.
        assert!(region.contains(5.0, 0.0));
        assert!(!region.contains(4.9, 0.0));
        assert!(region.contains(9.0, 4.0));
        assert!(!region.contains(9.1, 4.0));
    }

    #[test]
    fn test_blank_writes_holes_and_is_idempotent() {
        let mut grid = grid_20x30();
        beam().blank(&mut grid);
        assert!(grid.values[[4, 12]].is_nan());
        assert_eq!(grid.values[[4, 25]], 1.0);

        let snapshot = grid.values.clone();
        beam().blank(&mut grid);
        for (a, b) in snapshot.iter().zip(grid.values.iter()) {
            assert!(a == b || (a.is_nan() && b.is_nan()));
        }
    }

    #[test]
    fn test_zero_writes_zeros_not_holes() {
        let mut grid = grid_20x30();
        beam().zero(&mut grid);
        assert_eq!(grid.values[[4, 12]], 0.0);
        assert_eq!(grid.values[[4, 25]], 1.0);
        // Idempotent as well.
        beam().zero(&mut grid);
        assert_eq!(grid.values[[4, 12]], 0.0);
    }

    #[test]
    fn test_outline_corners() {
        let ((x0, y0), (x1, y1)) = beam().outline();
        assert_eq!((x0, y0), (10.0, 0.0));
        assert_eq!((x1, y1), (18.0, 8.0));
    }
}
