use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::beam::BeamRegion;

/// Solver domain parameters. These must match the upstream solver
/// exactly or the rendered fields misalign with the beam overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    #[serde(default = "default_mesh_columns")]
    pub mesh_columns: usize,
    #[serde(default = "default_mesh_rows")]
    pub mesh_rows: usize,
    #[serde(default = "default_mesh_spacing")]
    pub mesh_spacing: f64,
}

fn default_mesh_columns() -> usize {
    160
}

fn default_mesh_rows() -> usize {
    30
}

fn default_mesh_spacing() -> f64 {
    1.0
}

impl DomainConfig {
    fn validate(&self) -> Result<()> {
        if self.mesh_columns < 2 || self.mesh_rows < 2 {
            return Err(anyhow!(
                "mesh must be at least 2x2 (columns={}, rows={})",
                self.mesh_columns,
                self.mesh_rows
            ));
        }
        if self.mesh_spacing <= 0.0 {
            return Err(anyhow!("mesh_spacing must be positive, got {}", self.mesh_spacing));
        }
        Ok(())
    }
}

/// Beam obstacle geometry, in mesh units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeamConfig {
    #[serde(default = "default_beam_start")]
    pub start: f64,
    #[serde(default = "default_beam_height")]
    pub height: f64,
    #[serde(default = "default_beam_length")]
    pub length: f64,
}

fn default_beam_start() -> f64 {
    10.0
}

fn default_beam_height() -> f64 {
    8.0
}

fn default_beam_length() -> f64 {
    8.0
}

impl BeamConfig {
    fn validate(&self, mesh_columns: usize, mesh_rows: usize) -> Result<()> {
        if self.start < 0.0 || self.height < 0.0 || self.length < 0.0 {
            return Err(anyhow!(
                "beam geometry must be non-negative (start={}, height={}, length={})",
                self.start,
                self.height,
                self.length
            ));
        }
        if self.start + self.length > mesh_columns as f64 {
            return Err(anyhow!(
                "beam extends past the mesh ({} + {} > {} columns)",
                self.start,
                self.length,
                mesh_columns
            ));
        }
        if self.height > mesh_rows as f64 {
            return Err(anyhow!(
                "beam is taller than the mesh ({} > {} rows)",
                self.height,
                mesh_rows
            ));
        }
        Ok(())
    }
}

/// Input/output directory roles. Both are resolved relative to the
/// working directory; the output directory is created on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IoConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_comment_marker")]
    pub comment_marker: char,
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_output_dir() -> String {
    "plots".to_string()
}

fn default_comment_marker() -> char {
    '#'
}

/// Presentation knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualisationConfig {
    #[serde(default = "default_image_width")]
    pub image_width: u32,
    #[serde(default = "default_image_height")]
    pub image_height: u32,
    /// Value written to mesh points outside the sampled convex hull.
    #[serde(default)]
    pub hull_fill: f64,
    /// Every `skip^2`-th sample gets a velocity arrow.
    #[serde(default = "default_quiver_skip")]
    pub quiver_skip: usize,
}

fn default_image_width() -> u32 {
    1400
}

fn default_image_height() -> u32 {
    600
}

fn default_quiver_skip() -> usize {
    3
}

impl VisualisationConfig {
    fn validate(&self) -> Result<()> {
        // Each half-panel needs room for its chart and colorbar.
        if self.image_width < 400 || self.image_height < 200 {
            return Err(anyhow!(
                "image dimensions too small (width={}, height={}, minimum 400x200)",
                self.image_width,
                self.image_height
            ));
        }
        if self.quiver_skip == 0 {
            return Err(anyhow!("quiver_skip must be at least 1"));
        }
        Ok(())
    }
}

/// Complete run configuration.
///
/// `reynolds` is declared ahead of the section tables so the TOML
/// serializer can emit it; a plain value cannot follow a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Reynolds numbers to look for; each selects one set of data
    /// files and names the output images.
    #[serde(default = "default_reynolds")]
    pub reynolds: Vec<f64>,
    #[serde(default = "default_domain")]
    pub domain: DomainConfig,
    #[serde(default = "default_beam")]
    pub beam: BeamConfig,
    #[serde(default = "default_io")]
    pub io: IoConfig,
    #[serde(default = "default_visualisation")]
    pub visualisation: VisualisationConfig,
}

fn default_domain() -> DomainConfig {
    DomainConfig {
        mesh_columns: default_mesh_columns(),
        mesh_rows: default_mesh_rows(),
        mesh_spacing: default_mesh_spacing(),
    }
}

fn default_beam() -> BeamConfig {
    BeamConfig {
        start: default_beam_start(),
        height: default_beam_height(),
        length: default_beam_length(),
    }
}

fn default_io() -> IoConfig {
    IoConfig {
        data_dir: default_data_dir(),
        output_dir: default_output_dir(),
        comment_marker: default_comment_marker(),
    }
}

fn default_visualisation() -> VisualisationConfig {
    VisualisationConfig {
        image_width: default_image_width(),
        image_height: default_image_height(),
        hull_fill: 0.0,
        quiver_skip: default_quiver_skip(),
    }
}

fn default_reynolds() -> Vec<f64> {
    vec![0.5, 1.0, 2.0, 5.0]
}

impl Default for Config {
    fn default() -> Self {
        Config {
            domain: default_domain(),
            beam: default_beam(),
            io: default_io(),
            visualisation: default_visualisation(),
            reynolds: default_reynolds(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse TOML config: {}", e))?;

        config.validate()?;

        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    /// Scripts mostly run with the stock solver geometry, so a missing
    /// file is the normal case, not an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Config::default())
        }
    }

    /// Validate all configuration parameters.
    pub fn validate(&self) -> Result<()> {
        self.domain.validate()?;
        self.beam.validate(self.domain.mesh_columns, self.domain.mesh_rows)?;
        self.visualisation.validate()?;

        if self.reynolds.is_empty() {
            return Err(anyhow!("At least one Reynolds number must be listed"));
        }
        for &re in &self.reynolds {
            if !re.is_finite() || re <= 0.0 {
                return Err(anyhow!("Reynolds numbers must be positive, got {}", re));
            }
        }
        Ok(())
    }

    pub fn beam_region(&self) -> BeamRegion {
        BeamRegion {
            start_x: self.beam.start,
            height: self.beam.height,
            length: self.beam.length,
            spacing: self.domain.mesh_spacing,
        }
    }

    /// Print configuration summary.
    pub fn print_summary(&self) {
        println!("=== Flow visualisation configuration ===");
        println!(
            "Mesh: {}x{} (spacing {})",
            self.domain.mesh_columns, self.domain.mesh_rows, self.domain.mesh_spacing
        );
        println!(
            "Beam: start={}, length={}, height={}",
            self.beam.start, self.beam.length, self.beam.height
        );
        println!("Data directory:   {}", self.io.data_dir);
        println!("Output directory: {}", self.io.output_dir);
        let cases: Vec<String> = self.reynolds.iter().map(|re| format!("{:.1}", re)).collect();
        println!("Reynolds cases: [{}]", cases.join(", "));
        println!("========================================");
    }
}

/// Reynolds numbers are embedded in file names to one decimal place.
pub fn format_reynolds(re: f64) -> String {
    format!("{:.1}", re)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let cfg = Config::default();
        assert_eq!(cfg.domain.mesh_columns, 160);
        assert_eq!(cfg.domain.mesh_rows, 30);
        assert_eq!(cfg.domain.mesh_spacing, 1.0);
        assert_eq!(cfg.beam.start, 10.0);
        assert_eq!(cfg.beam.height, 8.0);
        assert_eq!(cfg.beam.length, 8.0);
        assert_eq!(cfg.io.data_dir, "data");
        assert_eq!(cfg.io.output_dir, "plots");
        assert_eq!(cfg.io.comment_marker, '#');
        assert_eq!(cfg.reynolds, vec![0.5, 1.0, 2.0, 5.0]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml = "reynolds = [1.0]\n\n[domain]\nmesh_columns = 70\nmesh_rows = 20\n";
        let cfg: Config = toml::from_str(toml).unwrap();
        assert_eq!(cfg.domain.mesh_columns, 70);
        assert_eq!(cfg.domain.mesh_rows, 20);
        assert_eq!(cfg.domain.mesh_spacing, 1.0); // default
        assert_eq!(cfg.beam.start, 10.0); // default
        assert_eq!(cfg.reynolds, vec![1.0]);
    }

    #[test]
    fn test_toml_round_trip() {
        let mut cfg = Config::default();
        cfg.reynolds = vec![0.5, 3.0];
        cfg.beam.length = 12.0;
        let text = toml::to_string(&cfg).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.reynolds, vec![0.5, 3.0]);
        assert_eq!(back.beam.length, 12.0);
        assert_eq!(back.domain.mesh_columns, cfg.domain.mesh_columns);
        assert_eq!(back.io.comment_marker, '#');
    }

    #[test]
    fn test_beam_outside_mesh_rejected() {
        let mut cfg = Config::default();
        cfg.beam.start = 155.0;
        assert!(cfg.validate().is_err());
        cfg.beam.start = 10.0;
        cfg.beam.height = 31.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_empty_reynolds_rejected() {
        let mut cfg = Config::default();
        cfg.reynolds.clear();
        assert!(cfg.validate().is_err());
        cfg.reynolds = vec![-1.0];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_spacing_rejected() {
        let mut cfg = Config::default();
        cfg.domain.mesh_spacing = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let path = std::env::temp_dir().join("beamviz-no-such-config.toml");
        let cfg = Config::load_or_default(&path).unwrap();
        assert_eq!(cfg.domain.mesh_columns, 160);
    }

    #[test]
    fn test_beam_region_carries_spacing() {
        let mut cfg = Config::default();
        cfg.domain.mesh_spacing = 0.5;
        let region = cfg.beam_region();
        assert_eq!(region.start_x, 10.0);
        assert_eq!(region.spacing, 0.5);
    }

    #[test]
    fn test_format_reynolds_one_decimal() {
        assert_eq!(format_reynolds(5.0), "5.0");
        assert_eq!(format_reynolds(0.5), "0.5");
        assert_eq!(format_reynolds(2.25), "2.2");
    }
}
