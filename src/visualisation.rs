use colorgrad::Gradient;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::{Path, PathBuf};

use crate::beam::BeamRegion;
use crate::config::format_reynolds;
use crate::contour::{levels_between, segments, symmetric_levels};
use crate::field::VelocitySamples;
use crate::grid::FieldGrid;
use crate::streamline::{seed_points, Tracer};

type PlotResult = Result<(), Box<dyn std::error::Error>>;
type Chart2<'a, 'b> = ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>;
type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Pixel width reserved on the right of each panel for the colorbar.
const BAR_WIDTH: u32 = 90;

/// One fully loaded Reynolds case, ready for the comparison figure.
pub struct ComparisonCase {
    pub reynolds: f64,
    pub streamfunction: FieldGrid,
    pub vorticity: FieldGrid,
    pub magnitude: FieldGrid,
}

pub struct FlowVisualiser {
    output_dir: PathBuf,
    width: u32,
    height: u32,
    /// Physical domain extent `(x, y)`; every 2D chart uses these axis
    /// limits so the beam overlay lines up across figures.
    extent: (f64, f64),
    beam: BeamRegion,
    sequential: Box<dyn Gradient + Send + Sync>,
    magnitude_map: Box<dyn Gradient + Send + Sync>,
    diverging: Box<dyn Gradient + Send + Sync>,
}

impl FlowVisualiser {
    pub fn new(
        output_dir: &Path,
        width: u32,
        height: u32,
        extent: (f64, f64),
        beam: BeamRegion,
    ) -> anyhow::Result<FlowVisualiser> {
        std::fs::create_dir_all(output_dir)?;

        // Diverging palette for signed fields, navy through white to
        // dark red.
        let diverging = colorgrad::GradientBuilder::new()
            .html_colors(&[
                "#000080", "#4169E1", "#87CEEB", "#FFFFFF", "#FFA07A", "#FF4500", "#8B0000",
            ])
            .build::<colorgrad::LinearGradient>()
            .map_err(|e| anyhow::anyhow!("failed to build diverging palette: {}", e))?;

        Ok(FlowVisualiser {
            output_dir: output_dir.to_path_buf(),
            width,
            height,
            extent,
            beam,
            sequential: Box::new(colorgrad::preset::viridis()),
            magnitude_map: Box::new(colorgrad::preset::plasma()),
            diverging: Box::new(diverging),
        })
    }

    fn output_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    /// Streamfunction contour figure: translucent filled bands with
    /// labelled-style line contours over them.
    pub fn plot_streamfunction(&self, grid: &FieldGrid, reynolds: f64) -> PlotResult {
        let (lo, hi) = grid
            .finite_range()
            .ok_or("streamfunction grid has no finite values")?;
        // Busier flow at higher Reynolds gets more levels.
        let (line_levels, bands) = if reynolds >= 5.0 { (15, 25) } else { (12, 20) };

        let filename = self.output_path(&format!("streamlines_Re{}.png", format_reynolds(reynolds)));
        let root = BitMapBackend::new(&filename, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE)?;
        let (panel, bar) = root.split_horizontally((self.width - BAR_WIDTH) as i32);

        let title = format!("Streamlines (Re = {})", format_reynolds(reynolds));
        let mut chart = self.chart_2d(&panel, &title)?;
        self.draw_filled_bands(&mut chart, grid, &*self.sequential, lo, hi, bands, 0.6)?;
        self.draw_contour_lines(&mut chart, grid, &levels_between(lo, hi, line_levels), BLUE.stroke_width(1))?;
        self.draw_beam(&mut chart)?;
        self.draw_colorbar(&bar, &*self.sequential, lo, hi)?;

        root.present()?;
        println!("Saved: {}", filename.display());
        Ok(())
    }

    /// 3D surface of the streamfunction, height-coloured.
    pub fn plot_surface(&self, grid: &FieldGrid, reynolds: f64) -> PlotResult {
        let (lo, hi) = grid
            .finite_range()
            .ok_or("streamfunction grid has no finite values")?;
        let (nx, ny) = (grid.nx(), grid.ny());
        if nx < 2 || ny < 2 {
            return Err("surface needs at least a 2x2 grid".into());
        }

        let filename =
            self.output_path(&format!("streamfunction_3d_Re{}.png", format_reynolds(reynolds)));
        let root = BitMapBackend::new(&filename, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let title = format!("Streamfunction surface (Re = {})", format_reynolds(reynolds));
        let z_pad = (hi - lo).max(1e-12) * 0.05;
        let mut chart = ChartBuilder::on(&root)
            .caption(&title, ("sans-serif", 30))
            .margin(10)
            .build_cartesian_3d(
                grid.x_axis[0]..grid.x_axis[nx - 1],
                (lo - z_pad)..(hi + z_pad),
                grid.y_axis[0]..grid.y_axis[ny - 1],
            )?;
        chart.with_projection(|mut pb| {
            pb.yaw = 0.9;
            pb.pitch = 0.35;
            pb.scale = 0.8;
            pb.into_matrix()
        });
        chart
            .configure_axes()
            .light_grid_style(BLACK.mix(0.15))
            .max_light_lines(3)
            .draw()?;

        let span = (hi - lo).max(1e-12);
        let gradient = &*self.sequential;
        chart.draw_series(
            SurfaceSeries::xoz(
                (0..nx).map(|i| i as f64),
                (0..ny).map(|j| j as f64),
                |x, z| grid.values[[z as usize, x as usize]],
            )
            .style_func(&|&v| {
                let t = if v.is_finite() { (v - lo) / span } else { 0.0 };
                colour(gradient, t).mix(0.9).filled()
            }),
        )?;

        root.present()?;
        println!("Saved: {}", filename.display());
        Ok(())
    }

    /// Vorticity figure: diverging bands symmetric about zero with
    /// thin black line contours.
    pub fn plot_vorticity(&self, grid: &FieldGrid, reynolds: f64) -> PlotResult {
        let v_max = grid.max_abs();
        if v_max == 0.0 {
            return Err("vorticity grid has no finite values".into());
        }
        let (bands, line_levels) = if reynolds >= 5.0 { (60, 15) } else { (50, 10) };

        let filename = self.output_path(&format!("vorticity_Re{}.png", format_reynolds(reynolds)));
        let root = BitMapBackend::new(&filename, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE)?;
        let (panel, bar) = root.split_horizontally((self.width - BAR_WIDTH) as i32);

        let title = format!("Vorticity (Re = {})", format_reynolds(reynolds));
        let mut chart = self.chart_2d(&panel, &title)?;
        self.draw_filled_bands(&mut chart, grid, &*self.diverging, -v_max, v_max, bands, 1.0)?;
        self.draw_contour_lines(
            &mut chart,
            grid,
            &symmetric_levels(v_max, line_levels),
            BLACK.mix(0.7).stroke_width(1),
        )?;
        self.draw_beam(&mut chart)?;
        self.draw_colorbar(&bar, &*self.diverging, -v_max, v_max)?;

        root.present()?;
        println!("Saved: {}", filename.display());
        Ok(())
    }

    /// Velocity figure: magnitude bands with arrows on the left,
    /// traced streamlines coloured by speed on the right.
    ///
    /// `magnitude` must arrive with beam cells blanked; `vx`/`vy` with
    /// beam cells zeroed so the tracer parks inside the obstacle.
    pub fn plot_velocity(
        &self,
        magnitude: &FieldGrid,
        vx: &FieldGrid,
        vy: &FieldGrid,
        samples: &VelocitySamples,
        quiver_skip: usize,
        reynolds: f64,
    ) -> PlotResult {
        let (lo, hi) = magnitude
            .finite_range()
            .ok_or("velocity magnitude grid has no finite values")?;
        let bands = if reynolds >= 5.0 { 60 } else { 50 };

        let filename =
            self.output_path(&format!("velocity_field_Re{}.png", format_reynolds(reynolds)));
        let root = BitMapBackend::new(&filename, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE)?;
        let (left, right) = root.split_horizontally((self.width / 2) as i32);

        // Left panel: magnitude + quiver.
        {
            let (panel, bar) = left.split_horizontally((self.width / 2 - BAR_WIDTH) as i32);
            let title = format!("Velocity magnitude (Re = {})", format_reynolds(reynolds));
            let mut chart = self.chart_2d(&panel, &title)?;
            self.draw_filled_bands(&mut chart, magnitude, &*self.magnitude_map, lo, hi, bands, 1.0)?;
            self.draw_quiver(&mut chart, samples, quiver_skip)?;
            self.draw_beam(&mut chart)?;
            self.draw_colorbar(&bar, &*self.magnitude_map, lo, hi)?;
        }

        // Right panel: streamlines.
        {
            let (panel, bar) = right.split_horizontally((self.width / 2 - BAR_WIDTH) as i32);
            let title = format!("Flow streamlines (Re = {})", format_reynolds(reynolds));
            let mut chart = self.chart_2d(&panel, &title)?;
            let density = if reynolds >= 5.0 {
                2.0
            } else if reynolds >= 2.0 {
                1.8
            } else {
                1.5
            };
            let max_speed = self.draw_streamlines(&mut chart, vx, vy, density)?;
            self.draw_beam(&mut chart)?;
            self.draw_colorbar(&bar, &*self.sequential, 0.0, max_speed)?;
        }

        root.present()?;
        println!("Saved: {}", filename.display());
        Ok(())
    }

    /// Side-by-side panel grid over every completely loaded case.
    pub fn plot_comparison(&self, cases: &[ComparisonCase]) -> PlotResult {
        if cases.len() < 2 {
            return Err("comparison needs at least two complete cases".into());
        }

        let tags: Vec<String> = cases.iter().map(|c| format_reynolds(c.reynolds)).collect();
        let filename = self.output_path(&format!("reynolds_comparison_{}.png", tags.join("_")));
        let rows = cases.len();
        let root =
            BitMapBackend::new(&filename, (self.width, 320 * rows as u32)).into_drawing_area();
        root.fill(&WHITE)?;
        let panels = root.split_evenly((rows, 3));

        for (row, case) in cases.iter().enumerate() {
            let re = case.reynolds;
            let (psi_lines, psi_bands) = if re >= 5.0 { (20, 30) } else { (15, 30) };
            let bands = if re >= 5.0 { 40 } else { 30 };

            if let Some((lo, hi)) = case.streamfunction.finite_range() {
                let title = format!("Streamlines, Re = {}", format_reynolds(re));
                let mut chart = self.chart_2d(&panels[row * 3], &title)?;
                self.draw_filled_bands(
                    &mut chart,
                    &case.streamfunction,
                    &*self.sequential,
                    lo,
                    hi,
                    psi_bands,
                    0.6,
                )?;
                self.draw_contour_lines(
                    &mut chart,
                    &case.streamfunction,
                    &levels_between(lo, hi, psi_lines),
                    BLUE.stroke_width(1),
                )?;
                self.draw_beam(&mut chart)?;
            }

            let v_max = case.vorticity.max_abs();
            if v_max > 0.0 {
                let title = format!("Vorticity, Re = {}", format_reynolds(re));
                let mut chart = self.chart_2d(&panels[row * 3 + 1], &title)?;
                self.draw_filled_bands(
                    &mut chart,
                    &case.vorticity,
                    &*self.diverging,
                    -v_max,
                    v_max,
                    bands,
                    1.0,
                )?;
                self.draw_beam(&mut chart)?;
            }

            if let Some((lo, hi)) = case.magnitude.finite_range() {
                let title = format!("Velocity magnitude, Re = {}", format_reynolds(re));
                let mut chart = self.chart_2d(&panels[row * 3 + 2], &title)?;
                self.draw_filled_bands(
                    &mut chart,
                    &case.magnitude,
                    &*self.magnitude_map,
                    lo,
                    hi,
                    bands,
                    1.0,
                )?;
                self.draw_beam(&mut chart)?;
            }
        }

        root.present()?;
        println!("Saved: {}", filename.display());
        Ok(())
    }

    fn chart_2d<'a, 'b>(&self, area: &'a Area<'b>, title: &str) -> Result<Chart2<'a, 'b>, Box<dyn std::error::Error>> {
        let mut chart = ChartBuilder::on(area)
            .caption(title, ("sans-serif", 24))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(40)
            .build_cartesian_2d(0.0..self.extent.0, 0.0..self.extent.1)?;
        chart
            .configure_mesh()
            .x_desc("x")
            .y_desc("y")
            .light_line_style(BLACK.mix(0.08))
            .draw()?;
        Ok(chart)
    }

    /// Fill each grid cell with its band colour, contourf-style. Cells
    /// with a hole corner are left unpainted.
    fn draw_filled_bands(
        &self,
        chart: &mut Chart2,
        grid: &FieldGrid,
        gradient: &dyn Gradient,
        lo: f64,
        hi: f64,
        bands: usize,
        alpha: f64,
    ) -> PlotResult {
        let bands = bands.max(1);
        for j in 0..grid.ny().saturating_sub(1) {
            for i in 0..grid.nx() - 1 {
                let corners = [
                    grid.values[[j, i]],
                    grid.values[[j, i + 1]],
                    grid.values[[j + 1, i]],
                    grid.values[[j + 1, i + 1]],
                ];
                if corners.iter().any(|v| !v.is_finite()) {
                    continue;
                }
                let v = corners.iter().sum::<f64>() / 4.0;
                let t = unit(v, lo, hi);
                let band = ((t * bands as f64).floor() as usize).min(bands - 1);
                let shade = colour(gradient, (band as f64 + 0.5) / bands as f64);
                chart.draw_series(std::iter::once(Rectangle::new(
                    [
                        (grid.x_axis[i], grid.y_axis[j]),
                        (grid.x_axis[i + 1], grid.y_axis[j + 1]),
                    ],
                    shade.mix(alpha).filled(),
                )))?;
            }
        }
        Ok(())
    }

    fn draw_contour_lines(
        &self,
        chart: &mut Chart2,
        grid: &FieldGrid,
        levels: &[f64],
        style: ShapeStyle,
    ) -> PlotResult {
        for &level in levels {
            for (a, b) in segments(grid, level) {
                chart.draw_series(std::iter::once(PathElement::new(vec![a, b], style)))?;
            }
        }
        Ok(())
    }

    /// Subsampled velocity arrows, white over the magnitude bands.
    fn draw_quiver(
        &self,
        chart: &mut Chart2,
        samples: &VelocitySamples,
        skip: usize,
    ) -> PlotResult {
        let max_mag = samples.magnitude.iter().fold(0.0_f64, |acc, &m| acc.max(m.abs()));
        if max_mag == 0.0 {
            return Ok(());
        }
        // The fastest arrow spans about two and a half mesh cells.
        let scale = 2.5 * self.beam.spacing / max_mag;
        let stride = (skip * skip).max(1);
        let style = WHITE.mix(0.7);

        for k in (0..samples.len()).step_by(stride) {
            let (x, y) = (samples.x[k], samples.y[k]);
            let dx = samples.vx[k] * scale;
            let dy = samples.vy[k] * scale;
            let len = (dx * dx + dy * dy).sqrt();
            if len < 1e-12 {
                continue;
            }
            let (ex, ey) = (x + dx, y + dy);
            chart.draw_series(std::iter::once(PathElement::new(
                vec![(x, y), (ex, ey)],
                style.stroke_width(1),
            )))?;

            let (ux, uy) = (dx / len, dy / len);
            let head_len = len * 0.35;
            let head_w = head_len * 0.5;
            let (px, py) = (-uy, ux);
            chart.draw_series(std::iter::once(Polygon::new(
                vec![
                    (ex, ey),
                    (ex - ux * head_len + px * head_w, ey - uy * head_len + py * head_w),
                    (ex - ux * head_len - px * head_w, ey - uy * head_len - py * head_w),
                ],
                style.filled(),
            )))?;
        }
        Ok(())
    }

    /// Trace and draw streamlines coloured by local speed; returns the
    /// top speed used to normalize the colours.
    fn draw_streamlines(
        &self,
        chart: &mut Chart2,
        vx: &FieldGrid,
        vy: &FieldGrid,
        density: f64,
    ) -> Result<f64, Box<dyn std::error::Error>> {
        let tracer = Tracer::new(vx, vy);
        let max_speed = tracer.max_speed();
        if max_speed <= 0.0 {
            return Ok(0.0);
        }

        let nx = vx.nx();
        let dx = if nx > 1 {
            (vx.x_axis[nx - 1] - vx.x_axis[0]) / (nx - 1) as f64
        } else {
            1.0
        };
        let step = 0.2 * dx / max_speed;

        for seed in seed_points(vx, density) {
            let line = tracer.trace(seed, step, 2000);
            for pair in line.windows(2) {
                let mid_x = (pair[0].0 + pair[1].0) / 2.0;
                let mid_y = (pair[0].1 + pair[1].1) / 2.0;
                let t = tracer.speed(mid_x, mid_y) / max_speed;
                let shade = colour(&*self.sequential, t);
                chart.draw_series(std::iter::once(PathElement::new(
                    vec![pair[0], pair[1]],
                    shade.stroke_width(1),
                )))?;
            }
        }
        Ok(max_speed)
    }

    /// Grey obstacle rectangle with a black border and label.
    fn draw_beam(&self, chart: &mut Chart2) -> PlotResult {
        let ((x0, y0), (x1, y1)) = self.beam.outline();
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x0, y0), (x1, y1)],
            RGBColor(128, 128, 128).mix(0.8).filled(),
        )))?;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x0, y0), (x1, y1)],
            BLACK.stroke_width(2),
        )))?;
        chart.draw_series(std::iter::once(Text::new(
            "BEAM",
            ((x0 + x1) / 2.0 - 2.0 * self.beam.spacing, (y0 + y1) / 2.0),
            ("sans-serif", 14).into_font().color(&WHITE),
        )))?;
        Ok(())
    }

    /// Manual vertical colorbar with five tick labels.
    fn draw_colorbar(
        &self,
        area: &Area,
        gradient: &dyn Gradient,
        lo: f64,
        hi: f64,
    ) -> PlotResult {
        let (_, h) = area.dim_in_pixel();
        let top = 40i32;
        let bottom = h as i32 - 40;
        if bottom <= top {
            return Ok(());
        }
        let x0 = 8i32;
        let x1 = x0 + 18;

        for py in top..bottom {
            let t = 1.0 - (py - top) as f64 / (bottom - top) as f64;
            area.draw(&Rectangle::new([(x0, py), (x1, py + 1)], colour(gradient, t).filled()))?;
        }
        area.draw(&Rectangle::new([(x0, top), (x1, bottom)], BLACK.stroke_width(1)))?;

        let font = ("sans-serif", 13).into_font();
        for k in 0..=4 {
            let f = k as f64 / 4.0;
            let value = lo + f * (hi - lo);
            let py = bottom - (f * (bottom - top) as f64) as i32;
            area.draw(&Text::new(format!("{:.2}", value), (x1 + 4, py - 6), font.clone()))?;
        }
        Ok(())
    }
}

fn colour(gradient: &dyn Gradient, t: f64) -> RGBColor {
    let rgba = gradient.at(t.clamp(0.0, 1.0) as f32).to_rgba8();
    RGBColor(rgba[0], rgba[1], rgba[2])
}

fn unit(v: f64, lo: f64, hi: f64) -> f64 {
    if hi > lo {
        ((v - lo) / (hi - lo)).clamp(0.0, 1.0)
    } else {
        0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_normalization() {
        assert_eq!(unit(0.0, 0.0, 2.0), 0.0);
        assert_eq!(unit(1.0, 0.0, 2.0), 0.5);
        assert_eq!(unit(2.0, 0.0, 2.0), 1.0);
        assert_eq!(unit(5.0, 0.0, 2.0), 1.0);
        // Flat field: park in the middle of the palette.
        assert_eq!(unit(3.0, 3.0, 3.0), 0.5);
    }

    #[test]
    fn test_colour_endpoints_differ() {
        let gradient = colorgrad::preset::viridis();
        let low = colour(&gradient, 0.0);
        let high = colour(&gradient, 1.0);
        assert_ne!((low.0, low.1, low.2), (high.0, high.1, high.2));
    }
}
