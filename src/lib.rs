mod fortran;
pub use fortran::FortranReader;
mod info;
pub use info::Info;
mod descriptor;
pub use descriptor::VariableList;
mod ramses;
pub use ramses::{Dataset, LeafCells, Units};
mod render;
pub use render::{Axis, FixedResolutionBuffer};
mod plot;
pub use plot::{Plot, PlotBuffer, PlotKind};
pub mod config;
pub use config::{Config, FieldSpec, Preset};
pub mod driver;
pub use driver::{OutputDir, PlotOps, RamsesVisualizer, Visualizer};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to read {path}")]
    Open {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read variable")]
    Read(#[from] std::io::Error),
    #[error("invalid Fortran record: {0}")]
    Record(String),
    #[error("malformed RAMSES file {path}: {reason}")]
    Format {
        path: std::path::PathBuf,
        reason: String,
    },
    #[error("missing `{0}` in info file")]
    MissingInfoKey(&'static str),
    #[error("failed to parse `{key}` value {value:?}")]
    InfoValue { key: String, value: String },
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("invalid color limits for `{field}`: ({min}, {max})")]
    Limits { field: String, min: f64, max: f64 },
    #[error("`{0}` is not an output directory name")]
    OutputName(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to parse configuration")]
    Toml(#[from] toml::de::Error),
    #[error("failed to draw plot: {0}")]
    Draw(String),
    #[error("failed to write csv data")]
    CSV(#[from] csv::Error),
    #[error("failed to serialize plot buffer")]
    Bincode(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
