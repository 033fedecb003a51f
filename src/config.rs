//! Run configuration
//!
//! A run starts from one of the built-in presets. A TOML file may select another preset and
//! override any key; the command line overrides both.

use crate::{plot, Axis, Error, Result, Units};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A field to plot with its color scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub log: bool,
}

impl FieldSpec {
    pub fn new(name: &str, min: f64, max: f64, log: bool) -> Self {
        Self {
            name: name.to_string(),
            min,
            max,
            log,
        }
    }
    pub fn validate(&self) -> Result<()> {
        let ordered = self.min.is_finite() && self.max.is_finite() && self.min < self.max;
        if !ordered || (self.log && self.min <= 0.) {
            return Err(Error::Limits {
                field: self.name.clone(),
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// Color scales of the radiation-hydrodynamics fields
pub const RHD_FIELDS: [(&str, f64, f64, bool); 5] = [
    ("Pressure", 1e-7, 1e-5, true),
    ("density", 1e-4, 1., true),
    ("Pres_IR", 1e3, 1e6, true),
    ("HII", 1e-7, 1e-5, true),
    ("temp_IR", -100., 100., false),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// All five fields, every 50th output
    #[default]
    Full,
    /// Pressure and density, every output
    Hydro,
}

impl Preset {
    pub fn fields(self) -> Vec<FieldSpec> {
        let n = match self {
            Preset::Full => RHD_FIELDS.len(),
            Preset::Hydro => 2,
        };
        RHD_FIELDS[..n]
            .iter()
            .map(|&(name, min, max, log)| FieldSpec::new(name, min, max, log))
            .collect()
    }
    pub fn stride(self) -> usize {
        match self {
            Preset::Full => 50,
            Preset::Hydro => 1,
        }
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "full" => Ok(Preset::Full),
            "hydro" => Ok(Preset::Hydro),
            other => Err(format!("unknown preset `{other}` (full, hydro)")),
        }
    }
}

/// Complete run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the `output_*` directories
    pub root: PathBuf,
    /// Directory receiving the images
    pub out_dir: PathBuf,
    /// Process every `stride`-th output
    pub stride: usize,
    pub axis: Axis,
    /// Slice position along the axis, as a fraction of the box
    pub center: f64,
    /// Buffer resolution in pixels per side
    pub resolution: usize,
    /// Image size in pixels per side, colorbar excluded
    pub image_size: u32,
    pub colormap: String,
    pub units: Units,
    pub dump_buffers: bool,
    /// CSV listing of the saved plots
    pub manifest: Option<PathBuf>,
    pub fields: Vec<FieldSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self::preset(Preset::default())
    }
}

impl Config {
    pub fn preset(preset: Preset) -> Self {
        Self {
            root: PathBuf::from(".."),
            out_dir: PathBuf::from("."),
            stride: preset.stride(),
            axis: Axis::Z,
            center: 0.5,
            resolution: 800,
            image_size: 800,
            colormap: "inferno".into(),
            units: Units::Cgs,
            dump_buffers: false,
            manifest: None,
            fields: preset.fields(),
        }
    }
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.stride == 0 {
            return Err(Error::Config("stride must be at least 1".into()));
        }
        if self.resolution == 0 || self.image_size == 0 {
            return Err(Error::Config(format!(
                "resolution ({}) and image size ({}) must be positive",
                self.resolution, self.image_size
            )));
        }
        // cells own their lower face only, so no cell holds the plane at 1
        if !(0. ..1.).contains(&self.center) {
            return Err(Error::Config(format!(
                "center must lie within [0, 1), got {}",
                self.center
            )));
        }
        if self.fields.is_empty() {
            return Err(Error::Config("at least one field must be listed".into()));
        }
        plot::validate_colormap(&self.colormap)?;
        self.fields.iter().try_for_each(FieldSpec::validate)
    }
}

/// Keys of a configuration file, all optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub preset: Option<Preset>,
    pub root: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub stride: Option<usize>,
    pub axis: Option<Axis>,
    pub center: Option<f64>,
    pub resolution: Option<usize>,
    pub image_size: Option<u32>,
    pub colormap: Option<String>,
    pub units: Option<Units>,
    pub dump_buffers: Option<bool>,
    pub manifest: Option<PathBuf>,
    pub fields: Option<Vec<FieldSpec>>,
}

impl ConfigFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref()).map_err(|source| Error::Open {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }
    /// Applies the keys on top of `preset`, or on top of the preset the file names
    pub fn resolve(self, preset: Option<Preset>) -> Result<Config> {
        let mut config = Config::preset(preset.or(self.preset).unwrap_or_default());
        macro_rules! set {
            ($($key:ident),*) => {
                $(if let Some(value) = self.$key {
                    config.$key = value;
                })*
            };
        }
        set!(root, out_dir, stride, axis, center, resolution, image_size, colormap, units, dump_buffers, fields);
        if self.manifest.is_some() {
            config.manifest = self.manifest;
        }
        config.validate()?;
        Ok(config)
    }
}
