use anyhow::{anyhow, Result};
use ndarray::Array2;
use std::collections::{HashMap, HashSet};

use crate::delaunay::Triangulation;
use crate::field::ScalarSamples;

/// Largest grid index accepted by exact-index placement. Catches a
/// scattered-coordinate file being fed to the indexed reconstructor.
const MAX_INDEX: f64 = 4096.0;

/// Coordinates are keyed after rounding at this resolution so that
/// solver output printed with limited precision still matches.
const KEY_SCALE: f64 = 1e6;

/// Missing-data convention for cells no sample reaches.
///
/// The three conventions are distinct policies chosen by the caller to
/// match how the upstream solver laid out its output; they are never
/// inferred from the data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fill {
    /// Silent gap fill with zero (indexed solver dumps).
    Zero,
    /// NaN hole marker, skipped by scalar rendering.
    Sentinel,
    /// Fixed value for interpolation queries outside the convex hull.
    Value(f64),
}

impl Fill {
    pub fn missing_value(self) -> f64 {
        match self {
            Fill::Zero => 0.0,
            Fill::Sentinel => f64::NAN,
            Fill::Value(v) => v,
        }
    }
}

/// Dense rectangular field: `values[[row, col]]` sampled at
/// `(x_axis[col], y_axis[row])`. Both axes increase monotonically and
/// `values.dim() == (y_axis.len(), x_axis.len())`.
#[derive(Debug, Clone)]
pub struct FieldGrid {
    pub x_axis: Vec<f64>,
    pub y_axis: Vec<f64>,
    pub values: Array2<f64>,
}

impl FieldGrid {
    /// Place samples whose coordinates are mesh cell indices.
    ///
    /// The grid spans `(max(y)+1, max(x)+1)`; duplicate coordinates
    /// are last-write-wins, and never-visited cells keep the fill
    /// value. Pass `Fill::Zero` to reproduce the solver's dense dump
    /// convention where absent cells genuinely mean zero.
    pub fn from_indexed(samples: &ScalarSamples, fill: Fill) -> Result<FieldGrid> {
        if samples.is_empty() {
            return Err(anyhow!("cannot build a grid from an empty sample set"));
        }
        let mut nx = 0usize;
        let mut ny = 0usize;
        for (&x, &y) in samples.x.iter().zip(&samples.y) {
            let (i, j) = index_pair(x, y)?;
            nx = nx.max(i + 1);
            ny = ny.max(j + 1);
        }

        let mut values = Array2::from_elem((ny, nx), fill.missing_value());
        for ((&x, &y), &v) in samples.x.iter().zip(&samples.y).zip(&samples.value) {
            let (i, j) = index_pair(x, y)?;
            values[[j, i]] = v;
        }

        Ok(FieldGrid {
            x_axis: (0..nx).map(|i| i as f64).collect(),
            y_axis: (0..ny).map(|j| j as f64).collect(),
            values,
        })
    }

    /// Interpolate arbitrarily placed samples onto an `nx` x `ny`
    /// mesh spanning the sampled bounding box.
    ///
    /// Uses linear barycentric interpolation over the Delaunay
    /// triangulation; mesh points outside the convex hull of the
    /// samples take the fill value instead of an extrapolated
    /// estimate. Degenerate input (fewer than three distinct points,
    /// or all collinear) is an error the caller guards on.
    pub fn from_scattered(
        samples: &ScalarSamples,
        nx: usize,
        ny: usize,
        fill: Fill,
    ) -> Result<FieldGrid> {
        if nx == 0 || ny == 0 {
            return Err(anyhow!("target mesh must have at least one point per axis"));
        }
        if samples.len() < 3 {
            return Err(anyhow!(
                "interpolation needs at least three samples, got {}",
                samples.len()
            ));
        }

        // Deduplicate by rounded coordinate before triangulating;
        // repeated points carry no extra information.
        let mut seen: HashSet<(i64, i64)> = HashSet::new();
        let mut points = Vec::with_capacity(samples.len());
        let mut point_values = Vec::with_capacity(samples.len());
        for ((&x, &y), &v) in samples.x.iter().zip(&samples.y).zip(&samples.value) {
            if seen.insert((key(x), key(y))) {
                points.push((x, y));
                point_values.push(v);
            }
        }

        let (min_x, max_x) = bounds(&samples.x);
        let (min_y, max_y) = bounds(&samples.y);
        let triangulation = Triangulation::build(points, point_values)
            .ok_or_else(|| anyhow!("sample set is degenerate, interpolation has no hull"))?;

        let x_axis = linspace(min_x, max_x, nx);
        let y_axis = linspace(min_y, max_y, ny);
        let mut values = Array2::from_elem((ny, nx), fill.missing_value());
        for (j, &y) in y_axis.iter().enumerate() {
            for (i, &x) in x_axis.iter().enumerate() {
                if let Some(v) = triangulation.interpolate(x, y) {
                    values[[j, i]] = v;
                }
            }
        }

        Ok(FieldGrid { x_axis, y_axis, values })
    }

    /// Place samples onto the lattice of their own distinct coordinate
    /// values, matching each axis pair to the first sample that hits
    /// it exactly.
    ///
    /// Axis pairs no sample covers keep the fill value; the production
    /// path passes `Fill::Sentinel` so absent cells stay holes rather
    /// than zeros. Matching goes through a map keyed by rounded
    /// coordinates, one pass over the samples.
    pub fn from_matching(samples: &ScalarSamples, fill: Fill) -> Result<FieldGrid> {
        if samples.is_empty() {
            return Err(anyhow!("cannot build a grid from an empty sample set"));
        }

        let x_axis = distinct_sorted(&samples.x);
        let y_axis = distinct_sorted(&samples.y);

        let mut by_coord: HashMap<(i64, i64), f64> = HashMap::with_capacity(samples.len());
        for ((&x, &y), &v) in samples.x.iter().zip(&samples.y).zip(&samples.value) {
            // First matching sample wins.
            by_coord.entry((key(x), key(y))).or_insert(v);
        }

        let mut values = Array2::from_elem((y_axis.len(), x_axis.len()), fill.missing_value());
        for (j, &y) in y_axis.iter().enumerate() {
            for (i, &x) in x_axis.iter().enumerate() {
                if let Some(&v) = by_coord.get(&(key(x), key(y))) {
                    values[[j, i]] = v;
                }
            }
        }

        Ok(FieldGrid { x_axis, y_axis, values })
    }

    pub fn nx(&self) -> usize {
        self.x_axis.len()
    }

    pub fn ny(&self) -> usize {
        self.y_axis.len()
    }

    /// Smallest and largest finite value, ignoring sentinel holes.
    pub fn finite_range(&self) -> Option<(f64, f64)> {
        let mut range: Option<(f64, f64)> = None;
        for &v in self.values.iter() {
            if v.is_finite() {
                range = Some(match range {
                    Some((lo, hi)) => (lo.min(v), hi.max(v)),
                    None => (v, v),
                });
            }
        }
        range
    }

    /// Largest finite |value|, for symmetric (diverging) level ranges.
    pub fn max_abs(&self) -> f64 {
        self.values
            .iter()
            .filter(|v| v.is_finite())
            .fold(0.0_f64, |acc, &v| acc.max(v.abs()))
    }

    /// Bilinear sample at `(x, y)` assuming evenly spaced axes.
    ///
    /// Points outside the axis span read as 0. Intended for the
    /// gap-free grids fed to the streamline tracer.
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let (nx, ny) = (self.nx(), self.ny());
        if nx < 2 || ny < 2 {
            return 0.0;
        }
        let x0 = self.x_axis[0];
        let y0 = self.y_axis[0];
        let dx = (self.x_axis[nx - 1] - x0) / (nx - 1) as f64;
        let dy = (self.y_axis[ny - 1] - y0) / (ny - 1) as f64;
        if dx <= 0.0 || dy <= 0.0 {
            return 0.0;
        }

        let fx = (x - x0) / dx;
        let fy = (y - y0) / dy;
        if fx < 0.0 || fy < 0.0 || fx > (nx - 1) as f64 || fy > (ny - 1) as f64 {
            return 0.0;
        }

        let i = (fx.floor() as usize).min(nx - 2);
        let j = (fy.floor() as usize).min(ny - 2);
        let tx = fx - i as f64;
        let ty = fy - j as f64;

        let v00 = self.values[[j, i]];
        let v10 = self.values[[j, i + 1]];
        let v01 = self.values[[j + 1, i]];
        let v11 = self.values[[j + 1, i + 1]];
        let bottom = v00 + tx * (v10 - v00);
        let top = v01 + tx * (v11 - v01);
        bottom + ty * (top - bottom)
    }
}

fn index_pair(x: f64, y: f64) -> Result<(usize, usize)> {
    for &c in &[x, y] {
        if c < 0.0 || c > MAX_INDEX || c.fract().abs() > 1e-9 {
            return Err(anyhow!(
                "coordinate {} is not a small non-negative mesh index",
                c
            ));
        }
    }
    Ok((x.round() as usize, y.round() as usize))
}

fn key(v: f64) -> i64 {
    (v * KEY_SCALE).round() as i64
}

fn bounds(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

/// `n` evenly spaced points from `a` to `b` inclusive.
pub fn linspace(a: f64, b: f64, n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![a];
    }
    let step = (b - a) / (n - 1) as f64;
    (0..n).map(|i| a + step * i as f64).collect()
}

fn distinct_sorted(values: &[f64]) -> Vec<f64> {
    let mut keyed: Vec<(i64, f64)> = values.iter().map(|&v| (key(v), v)).collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.dedup_by_key(|pair| pair.0);
    keyed.into_iter().map(|(_, v)| v).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(rows: &[(f64, f64, f64)]) -> ScalarSamples {
        ScalarSamples {
            x: rows.iter().map(|r| r.0).collect(),
            y: rows.iter().map(|r| r.1).collect(),
            value: rows.iter().map(|r| r.2).collect(),
        }
    }

    #[test]
    fn test_indexed_placement_scenario() {
        // Three samples leave (1, 1) unvisited; it stays at the zero
        // fill, not at a hole marker.
        let samples = scalar(&[(0.0, 0.0, 1.0), (1.0, 0.0, 2.0), (0.0, 1.0, 3.0)]);
        let grid = FieldGrid::from_indexed(&samples, Fill::Zero).unwrap();
        assert_eq!(grid.values.dim(), (2, 2));
        assert_eq!(grid.values[[0, 0]], 1.0);
        assert_eq!(grid.values[[0, 1]], 2.0);
        assert_eq!(grid.values[[1, 0]], 3.0);
        assert_eq!(grid.values[[1, 1]], 0.0);
    }

    #[test]
    fn test_load_then_index_scenario() {
        // End to end: a 3-line solver dump becomes the 2x2 grid with
        // the unvisited cell silently zero.
        let path = std::env::temp_dir()
            .join(format!("beamviz-grid-scenario-{}.dat", std::process::id()));
        std::fs::write(&path, "0 0 1.0\n1 0 2.0\n0 1 3.0\n").unwrap();
        let samples = crate::field::load_scalar(&path, '#').unwrap();
        let grid = FieldGrid::from_indexed(&samples, Fill::Zero).unwrap();
        assert_eq!(grid.values[[0, 0]], 1.0);
        assert_eq!(grid.values[[0, 1]], 2.0);
        assert_eq!(grid.values[[1, 0]], 3.0);
        assert_eq!(grid.values[[1, 1]], 0.0);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_indexed_placement_last_write_wins() {
        let samples = scalar(&[(0.0, 0.0, 1.0), (0.0, 0.0, 9.0)]);
        let grid = FieldGrid::from_indexed(&samples, Fill::Zero).unwrap();
        assert_eq!(grid.values[[0, 0]], 9.0);
    }

    #[test]
    fn test_indexed_placement_rejects_float_coordinates() {
        let samples = scalar(&[(0.5, 0.0, 1.0)]);
        assert!(FieldGrid::from_indexed(&samples, Fill::Zero).is_err());
        let samples = scalar(&[(-1.0, 0.0, 1.0)]);
        assert!(FieldGrid::from_indexed(&samples, Fill::Zero).is_err());
    }

    #[test]
    fn test_matching_placement_keeps_sentinel_holes() {
        // Same three samples as the indexed scenario: here the missing
        // axis pair is a NaN hole, not a zero.
        let samples = scalar(&[(0.0, 0.0, 1.0), (1.0, 0.0, 2.0), (0.0, 1.0, 3.0)]);
        let grid = FieldGrid::from_matching(&samples, Fill::Sentinel).unwrap();
        assert_eq!(grid.values.dim(), (2, 2));
        assert_eq!(grid.values[[0, 0]], 1.0);
        assert_eq!(grid.values[[0, 1]], 2.0);
        assert_eq!(grid.values[[1, 0]], 3.0);
        assert!(grid.values[[1, 1]].is_nan());
    }

    #[test]
    fn test_matching_placement_first_sample_wins() {
        let samples = scalar(&[(2.0, 3.0, 5.0), (2.0, 3.0, -1.0)]);
        let grid = FieldGrid::from_matching(&samples, Fill::Sentinel).unwrap();
        assert_eq!(grid.values[[0, 0]], 5.0);
    }

    #[test]
    fn test_scattered_reproduces_interior_samples() {
        let samples = scalar(&[
            (0.0, 0.0, 1.0),
            (4.0, 0.0, 2.0),
            (0.0, 2.0, 3.0),
            (4.0, 2.0, 4.0),
            (2.0, 1.0, 10.0),
        ]);
        let grid = FieldGrid::from_scattered(&samples, 5, 3, Fill::Value(0.0)).unwrap();
        // (2.0, 1.0) is a mesh point and an interior sample.
        assert!((grid.values[[1, 2]] - 10.0).abs() < 1e-9);
        assert_eq!(grid.values.dim(), (3, 5));
        assert_eq!(grid.x_axis, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_scattered_fills_outside_hull() {
        // A diamond leaves the mesh corners outside the convex hull.
        let samples = scalar(&[
            (2.0, 0.0, 1.0),
            (0.0, 2.0, 1.0),
            (4.0, 2.0, 1.0),
            (2.0, 4.0, 1.0),
        ]);
        let grid = FieldGrid::from_scattered(&samples, 5, 5, Fill::Value(-7.0)).unwrap();
        assert_eq!(grid.values[[0, 0]], -7.0);
        assert_eq!(grid.values[[4, 4]], -7.0);
        // Hull centre interpolates normally.
        assert!((grid.values[[2, 2]] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_scattered_degenerate_input_is_error() {
        let samples = scalar(&[(0.0, 0.0, 1.0), (1.0, 1.0, 2.0), (2.0, 2.0, 3.0)]);
        assert!(FieldGrid::from_scattered(&samples, 4, 4, Fill::Zero).is_err());
        let two = scalar(&[(0.0, 0.0, 1.0), (1.0, 0.0, 2.0)]);
        assert!(FieldGrid::from_scattered(&two, 4, 4, Fill::Zero).is_err());
    }

    #[test]
    fn test_linspace_endpoints() {
        let axis = linspace(0.0, 159.0, 160);
        assert_eq!(axis.len(), 160);
        assert_eq!(axis[0], 0.0);
        assert_eq!(axis[159], 159.0);
        assert!((axis[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_bilinear_sample() {
        let samples = scalar(&[
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 1.0),
            (0.0, 1.0, 2.0),
            (1.0, 1.0, 3.0),
        ]);
        let grid = FieldGrid::from_matching(&samples, Fill::Sentinel).unwrap();
        assert!((grid.sample(0.5, 0.0) - 0.5).abs() < 1e-12);
        assert!((grid.sample(0.5, 0.5) - 1.5).abs() < 1e-12);
        assert_eq!(grid.sample(-0.1, 0.0), 0.0);
        assert_eq!(grid.sample(0.0, 1.1), 0.0);
    }

    #[test]
    fn test_finite_range_skips_holes() {
        let samples = scalar(&[(0.0, 0.0, -2.0), (1.0, 0.0, 5.0), (0.0, 1.0, 1.0)]);
        let grid = FieldGrid::from_matching(&samples, Fill::Sentinel).unwrap();
        assert_eq!(grid.finite_range(), Some((-2.0, 5.0)));
        assert_eq!(grid.max_abs(), 5.0);
    }
}
