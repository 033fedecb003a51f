use super::LeafCells;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Line of sight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    #[default]
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
    /// Box dimensions mapped to the horizontal and the vertical image axes
    pub fn image_axes(self) -> (usize, usize) {
        match self {
            Axis::X => (1, 2),
            Axis::Y => (2, 0),
            Axis::Z => (0, 1),
        }
    }
    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Axis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "x" | "0" => Ok(Axis::X),
            "y" | "1" => Ok(Axis::Y),
            "z" | "2" => Ok(Axis::Z),
            other => Err(format!("`{other}` is not one of x, y, z")),
        }
    }
}

/// Field values sampled on a regular pixel grid covering one face of the box
///
/// `data[(i, j)]` is the pixel in column `i` (horizontal image axis) and row `j` (vertical image
/// axis, upward). Pixels no leaf cell covers hold `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedResolutionBuffer {
    pub axis: Axis,
    /// Horizontal then vertical extent, in code length
    pub extent: [f64; 4],
    pub data: DMatrix<f64>,
}

/// Pixel indices whose centers fall within `[lo, hi)` of the unit interval
fn pixel_span(lo: f64, hi: f64, n: usize) -> std::ops::Range<usize> {
    let n_f = n as f64;
    let start = (lo * n_f - 0.5).ceil().max(0.) as usize;
    let end = ((hi * n_f - 0.5).ceil().max(0.) as usize).min(n);
    start.min(end)..end
}

/// Cells cut by the plane at `center` along `axis`, the plane belonging to `[c - h, c + h)`
fn crossing(cells: &LeafCells, axis: Axis, center: f64) -> impl Iterator<Item = usize> + '_ {
    let w = axis.index();
    (0..cells.len()).filter(move |&cell| {
        let c = cells.center(cell)[w];
        let h = cells.half_width(cell, w);
        c - h <= center && center < c + h
    })
}

impl FixedResolutionBuffer {
    fn empty(axis: Axis, width: usize, height: usize, boxlen: f64) -> Self {
        Self {
            axis,
            extent: [0., boxlen, 0., boxlen],
            data: DMatrix::from_element(width, height, f64::NAN),
        }
    }
    /// Visits the pixels covered by the footprint of each of `selection`
    fn deposit<I, F>(&mut self, cells: &LeafCells, selection: I, mut visit: F)
    where
        I: IntoIterator<Item = usize>,
        F: FnMut(usize, &mut f64),
    {
        let (u, v) = self.axis.image_axes();
        let (width, height) = self.data.shape();
        for cell in selection {
            let center = cells.center(cell);
            let (hu, hv) = (cells.half_width(cell, u), cells.half_width(cell, v));
            for i in pixel_span(center[u] - hu, center[u] + hu, width) {
                for j in pixel_span(center[v] - hv, center[v] + hv, height) {
                    visit(cell, &mut self.data[(i, j)]);
                }
            }
        }
    }
    /// Samples the variable `var` on the plane at `center` (a fraction of the box) along `axis`
    pub fn slice(
        cells: &LeafCells,
        var: usize,
        axis: Axis,
        center: f64,
        (width, height): (usize, usize),
        boxlen: f64,
    ) -> Self {
        let mut frb = Self::empty(axis, width, height, boxlen);
        let values = cells.values(var);
        frb.deposit(cells, crossing(cells, axis, center), |cell, pixel| {
            *pixel = values[cell];
        });
        frb
    }
    /// Integrates the variable `var` along `axis`
    ///
    /// Path lengths are measured in `length_unit` per code length.
    pub fn projection(
        cells: &LeafCells,
        var: usize,
        axis: Axis,
        (width, height): (usize, usize),
        boxlen: f64,
        length_unit: f64,
    ) -> Self {
        let mut frb = Self::empty(axis, width, height, boxlen);
        let w = axis.index();
        let values = cells.values(var);
        frb.deposit(cells, 0..cells.len(), |cell, pixel| {
            let path = 2. * cells.half_width(cell, w) * boxlen * length_unit;
            let column = values[cell] * path;
            *pixel = if pixel.is_nan() { column } else { *pixel + column };
        });
        frb
    }
    pub fn width(&self) -> usize {
        self.data.nrows()
    }
    pub fn height(&self) -> usize {
        self.data.ncols()
    }
    /// Finite minimum and maximum, `None` when nothing was deposited
    pub fn range(&self) -> Option<(f64, f64)> {
        self.data
            .iter()
            .filter(|x| x.is_finite())
            .fold(None, |acc, &x| match acc {
                None => Some((x, x)),
                Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// One coarse oct with its lower-left-front cell refined
    fn cells() -> LeafCells {
        let mut cells = LeafCells::new(3, [1, 1, 1], 1);
        for ind in 1..8usize {
            let c = [ind & 1, (ind >> 1) & 1, (ind >> 2) & 1].map(|b| 0.25 + 0.5 * b as f64);
            cells.push(c, 1, &[ind as f64]);
        }
        for ind in 0..8usize {
            let c = [ind & 1, (ind >> 1) & 1, (ind >> 2) & 1].map(|b| 0.125 + 0.25 * b as f64);
            cells.push(c, 2, &[10. + ind as f64]);
        }
        cells
    }

    #[test]
    fn pixel_spans() {
        assert_eq!(pixel_span(0., 0.5, 4), 0..2);
        assert_eq!(pixel_span(0.5, 1., 4), 2..4);
        assert_eq!(pixel_span(0.1, 0.2, 4), 0..1);
        assert_eq!(pixel_span(0.15, 0.2, 4), 1..1);
        assert_eq!(pixel_span(-1., 2., 4), 0..4);
    }

    #[test]
    fn slice_picks_the_containing_cell() {
        let frb = FixedResolutionBuffer::slice(&cells(), 0, Axis::Z, 0.1, (4, 4), 1.);
        // refined corner: level-2 cells with iz = 0
        assert_eq!(frb.data[(0, 0)], 10.);
        assert_eq!(frb.data[(1, 0)], 11.);
        assert_eq!(frb.data[(0, 1)], 12.);
        assert_eq!(frb.data[(1, 1)], 13.);
        // coarse cells with iz = 0
        assert_eq!(frb.data[(3, 0)], 1.);
        assert_eq!(frb.data[(0, 3)], 2.);
        assert_eq!(frb.data[(3, 3)], 3.);
        assert!(frb.data.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn slice_plane_on_a_face_belongs_to_the_upper_cell() {
        let frb = FixedResolutionBuffer::slice(&cells(), 0, Axis::Z, 0.5, (2, 2), 1.);
        assert_eq!(frb.data[(0, 0)], 4.);
        assert_eq!(frb.data[(1, 1)], 7.);
    }

    #[test]
    fn slice_only_rasterises_cells_cut_by_the_plane() {
        let cells = cells();
        // the upper coarse layer
        assert_eq!(crossing(&cells, Axis::Z, 0.5).collect::<Vec<_>>(), [3, 4, 5, 6]);
        // three lower coarse cells and the upper refined layer
        assert_eq!(crossing(&cells, Axis::Z, 0.3).count(), 3 + 4);
        assert_eq!(crossing(&cells, Axis::X, 0.1).count(), 3 + 4);
        assert_eq!(crossing(&cells, Axis::Z, 1.).count(), 0);
    }

    #[test]
    fn projection_of_uniform_field_is_box_depth() {
        let mut uniform = LeafCells::new(3, [1, 1, 1], 1);
        let src = cells();
        for cell in 0..src.len() {
            uniform.push(src.center(cell), src.level(cell), &[2.]);
        }
        let frb = FixedResolutionBuffer::projection(&uniform, 0, Axis::Z, (8, 8), 3., 10.);
        frb.data
            .iter()
            .for_each(|&x| assert_relative_eq!(x, 2. * 3. * 10., epsilon = 1e-9));
        assert_eq!(frb.extent, [0., 3., 0., 3.]);
    }

    #[test]
    fn projection_along_x_uses_y_and_z() {
        let frb = FixedResolutionBuffer::projection(&cells(), 0, Axis::X, (2, 2), 1., 1.);
        // pixel center (y, z) = (.25, .25) sits on the upper faces of the refined cells 16 and 17,
        // each .25 deep, followed by coarse cell 1 (.5 deep)
        assert_relative_eq!(frb.data[(0, 0)], (16. + 17.) * 0.25 + 1. * 0.5);
        assert_relative_eq!(frb.data[(1, 1)], (6. + 7.) * 0.5);
    }

    #[test]
    fn range_skips_empty_pixels() {
        let mut frb = FixedResolutionBuffer::empty(Axis::Z, 2, 2, 1.);
        assert_eq!(frb.range(), None);
        frb.data[(0, 1)] = -3.;
        frb.data[(1, 1)] = 5.;
        assert_eq!(frb.range(), Some((-3., 5.)));
    }

    #[test]
    fn axis_parsing() {
        assert_eq!("Z".parse::<Axis>(), Ok(Axis::Z));
        assert_eq!("x".parse::<Axis>(), Ok(Axis::X));
        assert!("w".parse::<Axis>().is_err());
    }
}
