//! Batch plotting of every selected output
//!
//! The driver walks `output_*` directories and, for each field of the configuration, saves a
//! slice and a projection. It is written against the [Visualizer] trait; [RamsesVisualizer] is
//! the implementation reading RAMSES snapshots. The first error ends the run.

use crate::{Axis, Config, Dataset, Error, FieldSpec, FixedResolutionBuffer, Plot, PlotKind, Result, Units};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const OUTPUT_PREFIX: &str = "output_";

/// A snapshot directory, `output_NNNNN`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDir {
    pub name: String,
    /// Numeric suffix, when there is one
    pub index: Option<u32>,
}

impl OutputDir {
    /// Returns `None` unless `name` starts with `output_`
    pub fn parse(name: &str) -> Option<Self> {
        let suffix = name.strip_prefix(OUTPUT_PREFIX)?;
        Some(Self {
            name: name.to_string(),
            index: suffix.parse().ok(),
        })
    }
    /// The name without its `output_` prefix
    pub fn suffix(&self) -> Result<&str> {
        self.name
            .get(OUTPUT_PREFIX.len()..)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::OutputName(self.name.clone()))
    }
    /// `<root>/output_NNNNN/info_NNNNN.txt`
    pub fn info_path<P: AsRef<Path>>(&self, root: P) -> Result<PathBuf> {
        Ok(root
            .as_ref()
            .join(&self.name)
            .join(format!("info_{}.txt", self.suffix()?)))
    }
}

/// Keeps the names matching `output_*`, ordered by index then name
pub fn select_outputs<I, S>(names: I) -> Vec<OutputDir>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut outputs: Vec<OutputDir> = names
        .into_iter()
        .filter_map(|name| OutputDir::parse(name.as_ref()))
        .collect();
    outputs.sort_by(|a, b| {
        (a.index.is_none(), a.index, &a.name).cmp(&(b.index.is_none(), b.index, &b.name))
    });
    outputs
}

/// Lists the output directories within `root`
pub fn enumerate_outputs<P: AsRef<Path>>(root: P) -> Result<Vec<OutputDir>> {
    let entries = std::fs::read_dir(root.as_ref()).map_err(|source| Error::Open {
        path: root.as_ref().to_path_buf(),
        source,
    })?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        // follows symlinks to snapshots kept on other file systems
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(select_outputs(names))
}

/// Keeps every `stride`-th item, starting with the first
pub fn subsample<T>(items: Vec<T>, stride: usize) -> Vec<T> {
    let stride = stride.max(1);
    items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| (i % stride == 0).then_some(item))
        .collect()
}

/// Operations on a plot before it is written
pub trait PlotOps {
    fn set_zlim(&mut self, field: &str, min: f64, max: f64) -> Result<()>;
    fn set_log(&mut self, field: &str, log: bool) -> Result<()>;
    /// Writes the plot, returning where it went
    fn save(&mut self) -> Result<PathBuf>;
}

/// Dataset loading and plot creation
pub trait Visualizer {
    type Dataset;
    type Plot: PlotOps;

    fn load(&mut self, path: &Path) -> Result<Self::Dataset>;
    fn slice_plot(&mut self, dataset: &Self::Dataset, axis: Axis, field: &str) -> Result<Self::Plot>;
    fn projection_plot(
        &mut self,
        dataset: &Self::Dataset,
        axis: Axis,
        field: &str,
    ) -> Result<Self::Plot>;
}

impl PlotOps for Plot {
    fn set_zlim(&mut self, field: &str, min: f64, max: f64) -> Result<()> {
        Plot::set_zlim(self, field, min, max)
    }
    fn set_log(&mut self, field: &str, log: bool) -> Result<()> {
        Plot::set_log(self, field, log)
    }
    fn save(&mut self) -> Result<PathBuf> {
        Plot::save(self)
    }
}

/// Plots RAMSES snapshots
pub struct RamsesVisualizer {
    center: f64,
    resolution: usize,
    image_size: u32,
    colormap: String,
    units: Units,
    out_dir: PathBuf,
    dump: bool,
}

impl RamsesVisualizer {
    pub fn new(config: &Config) -> Self {
        Self {
            center: config.center,
            resolution: config.resolution,
            image_size: config.image_size,
            colormap: config.colormap.clone(),
            units: config.units,
            out_dir: config.out_dir.clone(),
            dump: config.dump_buffers,
        }
    }
    fn plot(&self, dataset: &Dataset, field: &str, kind: PlotKind, frb: FixedResolutionBuffer) -> Plot {
        Plot::new(dataset.name(), field, kind, frb)
            .with_colormap(&self.colormap)
            .with_out_dir(&self.out_dir)
            .with_size(self.image_size, self.image_size)
            .with_dump(self.dump)
    }
}

impl Visualizer for RamsesVisualizer {
    type Dataset = Dataset;
    type Plot = Plot;

    fn load(&mut self, path: &Path) -> Result<Dataset> {
        Dataset::load(path, self.units)
    }
    fn slice_plot(&mut self, dataset: &Dataset, axis: Axis, field: &str) -> Result<Plot> {
        let var = dataset.field(field)?;
        let frb = FixedResolutionBuffer::slice(
            dataset.leaf_cells()?,
            var,
            axis,
            self.center,
            (self.resolution, self.resolution),
            dataset.info().boxlen,
        );
        Ok(self.plot(dataset, field, PlotKind::Slice, frb))
    }
    fn projection_plot(&mut self, dataset: &Dataset, axis: Axis, field: &str) -> Result<Plot> {
        let var = dataset.field(field)?;
        let frb = FixedResolutionBuffer::projection(
            dataset.leaf_cells()?,
            var,
            axis,
            (self.resolution, self.resolution),
            dataset.info().boxlen,
            dataset.units().length(dataset.info()),
        );
        Ok(self.plot(dataset, field, PlotKind::Projection, frb))
    }
}

/// One row of the plot manifest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedPlot {
    pub output: String,
    pub field: String,
    pub kind: PlotKind,
    pub axis: Axis,
    pub min: f64,
    pub max: f64,
    pub log: bool,
    pub path: PathBuf,
}

/// Creates, configures and saves one plot of `field`
pub fn render<V: Visualizer>(
    visualizer: &mut V,
    dataset: &V::Dataset,
    kind: PlotKind,
    axis: Axis,
    field: &FieldSpec,
) -> Result<PathBuf> {
    let mut plot = match kind {
        PlotKind::Slice => visualizer.slice_plot(dataset, axis, &field.name)?,
        PlotKind::Projection => visualizer.projection_plot(dataset, axis, &field.name)?,
    };
    plot.set_zlim(&field.name, field.min, field.max)?;
    plot.set_log(&field.name, field.log)?;
    plot.save()
}

/// Saves the slice then the projection of `field`
pub fn render_field<V: Visualizer>(
    visualizer: &mut V,
    dataset: &V::Dataset,
    output: &OutputDir,
    axis: Axis,
    field: &FieldSpec,
) -> Result<Vec<SavedPlot>> {
    [PlotKind::Slice, PlotKind::Projection]
        .into_iter()
        .map(|kind| {
            let path = render(visualizer, dataset, kind, axis, field)?;
            debug!("{} {} {kind}: {}", output.name, field.name, path.display());
            Ok(SavedPlot {
                output: output.name.clone(),
                field: field.name.clone(),
                kind,
                axis,
                min: field.min,
                max: field.max,
                log: field.log,
                path,
            })
        })
        .collect()
}

/// Plots every selected output of `config.root`
pub fn run<V: Visualizer>(visualizer: &mut V, config: &Config) -> Result<Vec<SavedPlot>> {
    let outputs = enumerate_outputs(&config.root)?;
    let n_outputs = outputs.len();
    let outputs = subsample(outputs, config.stride);
    info!(
        "{} of {} outputs in {} selected, {} fields each",
        outputs.len(),
        n_outputs,
        config.root.display(),
        config.fields.len()
    );

    let mut manifest = config
        .manifest
        .as_ref()
        .map(csv::Writer::from_path)
        .transpose()?;
    #[cfg(feature = "progress")]
    let mut progress = linya::Progress::new();
    #[cfg(feature = "progress")]
    let bar = progress.bar(outputs.len() * config.fields.len(), "Plotting");

    let mut saved = Vec::with_capacity(outputs.len() * config.fields.len() * 2);
    for output in &outputs {
        let path = output.info_path(&config.root)?;
        info!("loading {}", path.display());
        let dataset = visualizer.load(&path)?;
        for field in &config.fields {
            let plots = render_field(visualizer, &dataset, output, config.axis, field)?;
            if let Some(writer) = manifest.as_mut() {
                for plot in &plots {
                    writer.serialize(plot)?;
                }
                writer.flush()?;
            }
            saved.extend(plots);
            #[cfg(feature = "progress")]
            progress.inc_and_draw(&bar, 1);
        }
    }
    info!("{} plots saved", saved.len());
    Ok(saved)
}
