use crate::grid::{linspace, FieldGrid};

/// A single iso-line piece in data coordinates.
pub type Segment = ((f64, f64), (f64, f64));

/// Evenly spaced contour levels across `[lo, hi]`, endpoints included.
pub fn levels_between(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    linspace(lo, hi, n)
}

/// Levels symmetric about zero, `[-max_abs, +max_abs]`, for signed
/// fields like vorticity.
pub fn symmetric_levels(max_abs: f64, n: usize) -> Vec<f64> {
    linspace(-max_abs, max_abs, n)
}

/// Extract iso-line segments for one level with marching squares.
///
/// Cells with a hole (NaN) corner are skipped, which is what leaves
/// the blanked beam region free of contour lines.
pub fn segments(grid: &FieldGrid, level: f64) -> Vec<Segment> {
    let mut out = Vec::new();
    if grid.nx() < 2 || grid.ny() < 2 {
        return out;
    }

    for j in 0..grid.ny() - 1 {
        for i in 0..grid.nx() - 1 {
            let v00 = grid.values[[j, i]];
            let v10 = grid.values[[j, i + 1]];
            let v01 = grid.values[[j + 1, i]];
            let v11 = grid.values[[j + 1, i + 1]];
            if !v00.is_finite() || !v10.is_finite() || !v01.is_finite() || !v11.is_finite() {
                continue;
            }

            let case = (v00 >= level) as u8
                | (((v10 >= level) as u8) << 1)
                | (((v01 >= level) as u8) << 2)
                | (((v11 >= level) as u8) << 3);
            if case == 0 || case == 15 {
                continue;
            }

            let x0 = grid.x_axis[i];
            let x1 = grid.x_axis[i + 1];
            let y0 = grid.y_axis[j];
            let y1 = grid.y_axis[j + 1];
            let lerp = |va: f64, vb: f64| -> f64 {
                if (vb - va).abs() < f64::EPSILON {
                    0.5
                } else {
                    (level - va) / (vb - va)
                }
            };

            // Crossing points on the four cell edges.
            let bottom = (x0 + lerp(v00, v10) * (x1 - x0), y0);
            let top = (x0 + lerp(v01, v11) * (x1 - x0), y1);
            let left = (x0, y0 + lerp(v00, v01) * (y1 - y0));
            let right = (x1, y0 + lerp(v10, v11) * (y1 - y0));

            match case {
                1 | 14 => out.push((bottom, left)),
                2 | 13 => out.push((bottom, right)),
                3 | 12 => out.push((left, right)),
                4 | 11 => out.push((left, top)),
                5 => {
                    out.push((bottom, left));
                    out.push((top, right));
                }
                6 | 9 => out.push((bottom, top)),
                7 | 8 => out.push((right, top)),
                10 => {
                    out.push((bottom, right));
                    out.push((left, top));
                }
                _ => {}
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::ScalarSamples;
    use crate::grid::Fill;

    fn grid_from(rows: &[(f64, f64, f64)]) -> FieldGrid {
        let samples = ScalarSamples {
            x: rows.iter().map(|r| r.0).collect(),
            y: rows.iter().map(|r| r.1).collect(),
            value: rows.iter().map(|r| r.2).collect(),
        };
        FieldGrid::from_matching(&samples, Fill::Sentinel).unwrap()
    }

    #[test]
    fn test_levels_span_endpoints() {
        let levels = levels_between(-1.0, 3.0, 5);
        assert_eq!(levels, vec![-1.0, 0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_symmetric_levels() {
        let levels = symmetric_levels(2.0, 5);
        assert_eq!(levels, vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
        assert_eq!(levels[2], 0.0);
    }

    #[test]
    fn test_horizontal_crossing() {
        // Value rises with y: 0 on the bottom row, 1 on the top. The
        // 0.5 contour is a horizontal line at y = 0.5.
        let grid = grid_from(&[
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 0.0),
            (0.0, 1.0, 1.0),
            (1.0, 1.0, 1.0),
        ]);
        let segs = segments(&grid, 0.5);
        assert_eq!(segs.len(), 1);
        let ((ax, ay), (bx, by)) = segs[0];
        assert!((ay - 0.5).abs() < 1e-12 && (by - 0.5).abs() < 1e-12);
        assert!((ax - bx).abs() > 0.9, "segment should span the cell");
    }

    #[test]
    fn test_level_outside_range_gives_nothing() {
        let grid = grid_from(&[
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 0.0),
            (0.0, 1.0, 1.0),
            (1.0, 1.0, 1.0),
        ]);
        assert!(segments(&grid, 5.0).is_empty());
    }

    #[test]
    fn test_hole_corner_skips_cell() {
        let mut grid = grid_from(&[
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 0.0),
            (0.0, 1.0, 1.0),
            (1.0, 1.0, 1.0),
        ]);
        grid.values[[0, 0]] = f64::NAN;
        assert!(segments(&grid, 0.5).is_empty());
    }
}
