use super::{Error, FixedResolutionBuffer, Result};
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Width of the colorbar panel in pixels
const COLORBAR_WIDTH: u32 = 150;
/// Color of pixels without a finite (or, in log scale, positive) value
const BACKGROUND: RGBColor = RGBColor(230, 230, 230);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlotKind {
    Slice,
    Projection,
}

impl fmt::Display for PlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlotKind::Slice => f.write_str("Slice"),
            PlotKind::Projection => f.write_str("Projection"),
        }
    }
}

/// The data behind a plot, as written next to the image by buffer dumps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotBuffer {
    pub dataset: String,
    pub field: String,
    pub kind: PlotKind,
    pub zlim: Option<(f64, f64)>,
    pub log: bool,
    pub frb: FixedResolutionBuffer,
}

impl PlotBuffer {
    /// Loads a buffer dump
    pub fn from_bin<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(|source| Error::Open {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Ok(bincode::deserialize_from(file)?)
    }
}

fn gradient(name: &str) -> Result<Box<dyn colorgrad::Gradient>> {
    Ok(match name {
        "inferno" => Box::new(colorgrad::preset::inferno()),
        "viridis" => Box::new(colorgrad::preset::viridis()),
        "magma" => Box::new(colorgrad::preset::magma()),
        "plasma" => Box::new(colorgrad::preset::plasma()),
        "cividis" => Box::new(colorgrad::preset::cividis()),
        "turbo" => Box::new(colorgrad::preset::turbo()),
        "rd_yl_bu" => Box::new(colorgrad::preset::rd_yl_bu()),
        other => return Err(Error::Config(format!("unknown colormap `{other}`"))),
    })
}

/// Checks that `colormap` names a known color gradient
pub fn validate_colormap(colormap: &str) -> Result<()> {
    gradient(colormap).map(|_| ())
}

fn draw_err<E: std::error::Error + Send + Sync>(e: DrawingAreaErrorKind<E>) -> Error {
    Error::Draw(e.to_string())
}

/// A slice or projection image of one field
pub struct Plot {
    buffer: PlotBuffer,
    colormap: String,
    out_dir: PathBuf,
    size: (u32, u32),
    dump: bool,
}

impl Plot {
    pub fn new(dataset: &str, field: &str, kind: PlotKind, frb: FixedResolutionBuffer) -> Self {
        Self {
            buffer: PlotBuffer {
                dataset: dataset.to_string(),
                field: field.to_string(),
                kind,
                zlim: None,
                log: true,
                frb,
            },
            colormap: "inferno".into(),
            out_dir: PathBuf::from("."),
            size: (800, 800),
            dump: false,
        }
    }
    pub fn with_colormap(mut self, colormap: &str) -> Self {
        self.colormap = colormap.to_string();
        self
    }
    pub fn with_out_dir<P: AsRef<Path>>(mut self, out_dir: P) -> Self {
        self.out_dir = out_dir.as_ref().to_path_buf();
        self
    }
    /// Size of the image area in pixels; the colorbar is added on the right
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }
    /// Also write the raw buffer next to the image
    pub fn with_dump(mut self, dump: bool) -> Self {
        self.dump = dump;
        self
    }
    pub fn buffer(&self) -> &PlotBuffer {
        &self.buffer
    }
    fn check_field(&self, field: &str) -> Result<()> {
        if field == self.buffer.field {
            Ok(())
        } else {
            Err(Error::UnknownField(field.to_string()))
        }
    }
    /// Sets the color scale bounds of `field`
    pub fn set_zlim(&mut self, field: &str, min: f64, max: f64) -> Result<()> {
        self.check_field(field)?;
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(Error::Limits {
                field: field.to_string(),
                min,
                max,
            });
        }
        self.buffer.zlim = Some((min, max));
        Ok(())
    }
    /// Switches the color scale of `field` between logarithmic and linear
    pub fn set_log(&mut self, field: &str, log: bool) -> Result<()> {
        self.check_field(field)?;
        self.buffer.log = log;
        Ok(())
    }
    /// Image file name, `<dataset>_<kind>_<axis>_<field>.png`
    pub fn filename(&self) -> String {
        let b = &self.buffer;
        format!("{}_{}_{}_{}.png", b.dataset, b.kind, b.frb.axis, b.field)
    }
    /// Color scale bounds: the limits when set, the data range otherwise
    pub fn limits(&self) -> Result<(f64, f64)> {
        let b = &self.buffer;
        let (min, max) = match b.zlim {
            Some(zlim) => zlim,
            None if b.log => b
                .frb
                .data
                .iter()
                .filter(|x| x.is_finite() && **x > 0.)
                .fold(None, |acc: Option<(f64, f64)>, &x| {
                    acc.map(|(lo, hi)| (lo.min(x), hi.max(x))).or(Some((x, x)))
                })
                .unwrap_or((1., 10.)),
            None => b.frb.range().unwrap_or((0., 1.)),
        };
        let (min, max) = if min < max { (min, max) } else { (min, min + min.abs().max(1.)) };
        if b.log && min <= 0. {
            return Err(Error::Limits {
                field: b.field.clone(),
                min,
                max,
            });
        }
        Ok((min, max))
    }
    /// Maps a value to `[0, 1]` on the color scale, `None` for values that have no color
    fn normalize(&self, value: f64, (min, max): (f64, f64)) -> Option<f64> {
        if !value.is_finite() {
            return None;
        }
        let t = if self.buffer.log {
            if value <= 0. {
                return None;
            }
            (value.log10() - min.log10()) / (max.log10() - min.log10())
        } else {
            (value - min) / (max - min)
        };
        Some(t.clamp(0., 1.))
    }
    /// Renders the plot to `<out_dir>/<filename>` and returns the image path
    pub fn save(&self) -> Result<PathBuf> {
        let limits = self.limits()?;
        std::fs::create_dir_all(&self.out_dir)?;
        let path = self.out_dir.join(self.filename());
        self.draw(&path, limits)?;
        debug!("saved {}", path.display());

        if self.dump {
            self.write_buffer(path.with_extension("bin"))?;
        }
        Ok(path)
    }
    /// Draws the image and its colorbar into the PNG file at `path`
    fn draw(&self, path: &Path, limits: (f64, f64)) -> Result<()> {
        let cmap = gradient(&self.colormap)?;
        let b = &self.buffer;
        let (u, v) = b.frb.axis.image_axes();
        let names = ["x", "y", "z"];
        let color = |t: f64| {
            let rgba = cmap.at(t as f32).to_rgba8();
            RGBColor(rgba[0], rgba[1], rgba[2])
        };

        let (width, height) = self.size;
        let root = BitMapBackend::new(path, (width + COLORBAR_WIDTH, height)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;
        let (image_area, bar_area) = root.split_horizontally(width);

        let [x0, x1, y0, y1] = b.frb.extent;
        let mut chart = ChartBuilder::on(&image_area)
            .caption(
                format!("{} {} {} ({})", b.dataset, b.kind, b.field, b.frb.axis),
                ("sans-serif", 24),
            )
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x0..x1, y0..y1)
            .map_err(draw_err)?;
        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc(format!("{} (code length)", names[u]))
            .y_desc(format!("{} (code length)", names[v]))
            .draw()
            .map_err(draw_err)?;

        let pixels = chart.plotting_area().strip_coord_spec();
        let (pw, ph) = pixels.dim_in_pixel();
        let (nu, nv) = (b.frb.width(), b.frb.height());
        for py in 0..ph {
            let j = ((ph - 1 - py) as usize * nv) / ph as usize;
            for px in 0..pw {
                let i = (px as usize * nu) / pw as usize;
                let c = self
                    .normalize(b.frb.data[(i, j)], limits)
                    .map(color)
                    .unwrap_or(BACKGROUND);
                pixels.draw_pixel((px as i32, py as i32), &c).map_err(draw_err)?;
            }
        }

        let (lo, hi) = if b.log {
            (limits.0.log10(), limits.1.log10())
        } else {
            limits
        };
        let scale = if b.log { "log10 " } else { "" };
        let mut bar = ChartBuilder::on(&bar_area)
            .margin_top(44)
            .margin_bottom(50)
            .margin_right(10)
            .y_label_area_size(90)
            .build_cartesian_2d(0f64..1f64, lo..hi)
            .map_err(draw_err)?;
        bar.configure_mesh()
            .disable_mesh()
            .disable_x_axis()
            .y_desc(format!("{scale}{}", b.field))
            .y_label_formatter(&|y: &f64| format!("{y:.3}"))
            .draw()
            .map_err(draw_err)?;
        let steps = 256;
        bar.draw_series((0..steps).map(|k| {
            let t0 = k as f64 / steps as f64;
            let t1 = (k + 1) as f64 / steps as f64;
            Rectangle::new(
                [(0., lo + t0 * (hi - lo)), (1., lo + t1 * (hi - lo))],
                color(t0).filled(),
            )
        }))
        .map_err(draw_err)?;

        root.present().map_err(draw_err)?;
        Ok(())
    }
    /// Writes the bincode-serialized [PlotBuffer]
    pub fn write_buffer<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref()).map_err(|source| Error::Open {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        bincode::serialize_into(file, &self.buffer)?;
        Ok(())
    }
}
