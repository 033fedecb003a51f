use super::{Error, FortranReader, Info, Result, VariableList};
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::io::Read;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use tracing::debug;

const MAX_COUNT: usize = i32::MAX as usize;
/// Cell levels are stored as `u8`
const MAX_LEVEL: usize = u8::MAX as usize;
const MAX_VARIABLES: usize = u16::MAX as usize;

/// Physical units of the loaded values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Density in g/cm^3, velocity in cm/s, pressure in dyn/cm^2, length in cm
    #[default]
    Cgs,
    /// Raw code units
    Code,
}

impl Units {
    /// Conversion factor from code units for the variable `name`
    pub fn factor(self, info: &Info, name: &str) -> f64 {
        if self == Units::Code {
            return 1.;
        }
        let name = name.to_lowercase();
        if name == "density" {
            info.unit_d
        } else if name.contains("velocity") {
            info.unit_v()
        } else if name == "pressure" {
            info.unit_p()
        } else {
            1.
        }
    }
    /// Length of one code length unit
    pub fn length(self, info: &Info) -> f64 {
        match self {
            Units::Cgs => info.unit_l,
            Units::Code => 1.,
        }
    }
}

/// Cells of a snapshot that are not refined any further
///
/// Cell centers are normalised to the unit box.
#[derive(Debug, Clone, Default)]
pub struct LeafCells {
    ndim: usize,
    nx: [usize; 3],
    centers: Vec<[f64; 3]>,
    levels: Vec<u8>,
    values: Vec<Vec<f64>>,
}

impl LeafCells {
    pub fn new(ndim: usize, nx: [usize; 3], nvar: usize) -> Self {
        Self {
            ndim,
            nx,
            values: vec![Vec::new(); nvar],
            ..Default::default()
        }
    }
    /// Adds a cell; `values` holds one entry per variable
    pub fn push(&mut self, center: [f64; 3], level: u8, values: &[f64]) {
        self.centers.push(center);
        self.levels.push(level);
        self.values
            .iter_mut()
            .zip(values)
            .for_each(|(column, &v)| column.push(v));
    }
    pub fn len(&self) -> usize {
        self.centers.len()
    }
    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }
    pub fn center(&self, cell: usize) -> [f64; 3] {
        self.centers[cell]
    }
    pub fn level(&self, cell: usize) -> u8 {
        self.levels[cell]
    }
    /// Half of the cell width along `dim`, in unit box length
    ///
    /// Dimensions beyond `ndim` span the whole box.
    pub fn half_width(&self, cell: usize, dim: usize) -> f64 {
        if dim >= self.ndim {
            0.5
        } else {
            0.5f64.powi(self.levels[cell] as i32 + 1) / self.nx[dim] as f64
        }
    }
    /// Values of the variable at index `var`, one per cell
    pub fn values(&self, var: usize) -> &[f64] {
        &self.values[var]
    }
    /// Number of leaf cells per refinement level
    pub fn level_counts(&self) -> Vec<(u8, usize)> {
        let mut counts: Vec<(u8, usize)> = Vec::new();
        for &level in &self.levels {
            match counts.iter_mut().find(|(l, _)| *l == level) {
                Some((_, n)) => *n += 1,
                None => counts.push((level, 1)),
            }
        }
        counts.sort_unstable();
        counts
    }
}

/// The part of the AMR file header needed to walk the octs
struct AmrHeader {
    ncpu: usize,
    ndim: usize,
    nx: [usize; 3],
    nlevelmax: usize,
    nboundary: usize,
    numbl: Vec<i32>,
    numbb: Vec<i32>,
}

/// Converts the header integer `name`, rejecting values outside `range`
fn header_value(
    value: i32,
    name: &str,
    range: RangeInclusive<usize>,
    path: &Path,
) -> Result<usize> {
    usize::try_from(value)
        .ok()
        .filter(|v| range.contains(v))
        .ok_or_else(|| Error::Format {
            path: path.to_path_buf(),
            reason: format!(
                "{name} = {value} is outside {}..={}",
                range.start(),
                range.end()
            ),
        })
}

/// Number of entries of a per level and per domain table
fn table_len(ndomains: usize, nlevelmax: usize, path: &Path) -> Result<usize> {
    ndomains
        .checked_mul(nlevelmax)
        .ok_or_else(|| Error::Format {
            path: path.to_path_buf(),
            reason: format!("{ndomains} domains on {nlevelmax} levels"),
        })
}

impl AmrHeader {
    fn read<R: Read>(amr: &mut FortranReader<R>, path: &Path) -> Result<Self> {
        let format = |reason: String| Error::Format {
            path: path.to_path_buf(),
            reason,
        };
        let ncpu = header_value(amr.read_i32()?, "ncpu", 1..=MAX_COUNT, path)?;
        let ndim = header_value(amr.read_i32()?, "ndim", 1..=3, path)?;
        let nx = match amr.read_i32s()?.as_slice() {
            &[nx, ny, nz] => [
                header_value(nx, "nx", 1..=MAX_COUNT, path)?,
                header_value(ny, "ny", 1..=MAX_COUNT, path)?,
                header_value(nz, "nz", 1..=MAX_COUNT, path)?,
            ],
            other => return Err(format(format!("invalid coarse grid {other:?}"))),
        };
        let nlevelmax = header_value(amr.read_i32()?, "nlevelmax", 1..=MAX_LEVEL, path)?;
        // ngridmax
        amr.skip(1)?;
        let nboundary = header_value(amr.read_i32()?, "nboundary", 0..=MAX_COUNT, path)?;
        // ngrid_current, boxlen, then the time stepping and cosmology records
        amr.skip(1 + 1 + 11)?;
        // headl, taill
        amr.skip(2)?;
        let numbl = amr.read_i32s()?;
        let expected = table_len(ncpu, nlevelmax, path)?;
        if numbl.len() != expected {
            return Err(format(format!(
                "numbl holds {} entries, expected {expected}",
                numbl.len()
            )));
        }
        // numbtot
        amr.skip(1)?;
        let numbb = if nboundary > 0 {
            amr.skip(2)?;
            amr.read_i32s()?
        } else {
            Vec::new()
        };
        let expected = table_len(nboundary, nlevelmax, path)?;
        if numbb.len() != expected {
            return Err(format(format!(
                "numbb holds {} entries, expected {expected}",
                numbb.len()
            )));
        }
        // headf, tailf, numbf, used_mem, used_mem_tot
        amr.skip(1)?;
        let ordering = amr.read_string()?;
        amr.skip(if ordering.starts_with("bisection") { 5 } else { 1 })?;
        // coarse son, flag1, cpu_map
        amr.skip(3)?;
        Ok(Self {
            ncpu,
            ndim,
            nx,
            nlevelmax,
            nboundary,
            numbl,
            numbb,
        })
    }
    fn ncache(&self, ilevel: usize, ibound: usize) -> usize {
        let n = if ibound < self.ncpu {
            self.numbl[ilevel * self.ncpu + ibound]
        } else {
            self.numbb[ilevel * self.nboundary + ibound - self.ncpu]
        };
        n.max(0) as usize
    }
}

struct HydroHeader {
    ncpu: usize,
    nvar: usize,
    ndim: usize,
    nlevelmax: usize,
    nboundary: usize,
}

impl HydroHeader {
    fn read<R: Read>(hydro: &mut FortranReader<R>, path: &Path) -> Result<Self> {
        let ncpu = header_value(hydro.read_i32()?, "ncpu", 1..=MAX_COUNT, path)?;
        let nvar = header_value(hydro.read_i32()?, "nvar", 1..=MAX_VARIABLES, path)?;
        let ndim = header_value(hydro.read_i32()?, "ndim", 1..=3, path)?;
        let nlevelmax = header_value(hydro.read_i32()?, "nlevelmax", 1..=MAX_LEVEL, path)?;
        let nboundary = header_value(hydro.read_i32()?, "nboundary", 0..=MAX_COUNT, path)?;
        // gamma
        hydro.skip(1)?;
        Ok(Self {
            ncpu,
            nvar,
            ndim,
            nlevelmax,
            nboundary,
        })
    }
}

/// A RAMSES snapshot
///
/// Loading a dataset only reads its headers; leaf cells are read on first use.
pub struct Dataset {
    info_path: PathBuf,
    name: String,
    suffix: String,
    info: Info,
    variables: VariableList,
    units: Units,
    cells: OnceCell<LeafCells>,
}

impl Dataset {
    /// Loads the snapshot described by `info_XXXXX.txt`
    pub fn load<P: AsRef<Path>>(info_path: P, units: Units) -> Result<Self> {
        let info_path = info_path.as_ref().to_path_buf();
        let name = info_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let suffix = name
            .strip_prefix("info_")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Format {
                path: info_path.clone(),
                reason: "info file name is not info_<output>.txt".into(),
            })?
            .to_string();
        let info = Info::from_file(&info_path)?;
        let mut dataset = Self {
            info_path,
            name,
            suffix,
            info,
            variables: VariableList::new(Vec::<String>::new()),
            units,
            cells: OnceCell::new(),
        };
        let descriptor = dataset.directory().join("hydro_file_descriptor.txt");
        dataset.variables = if descriptor.exists() {
            VariableList::from_file(descriptor)?
        } else {
            let path = dataset.hydro_path(1);
            let header = HydroHeader::read(&mut FortranReader::open(&path)?, &path)?;
            VariableList::default_hydro(header.nvar)
        };
        debug!(
            "loaded {} ({} cpus, {} variables)",
            dataset.info_path.display(),
            dataset.info.ncpu,
            dataset.variables.len()
        );
        Ok(dataset)
    }
    /// Info file stem, e.g. `info_00051`
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn info(&self) -> &Info {
        &self.info
    }
    pub fn variables(&self) -> &VariableList {
        &self.variables
    }
    pub fn units(&self) -> Units {
        self.units
    }
    /// Index of `field` among the hydro variables
    pub fn field(&self, field: &str) -> Result<usize> {
        self.variables
            .index_of(field)
            .ok_or_else(|| Error::UnknownField(field.to_string()))
    }
    fn directory(&self) -> PathBuf {
        self.info_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
    fn amr_path(&self, icpu: usize) -> PathBuf {
        self.directory()
            .join(format!("amr_{}.out{:05}", self.suffix, icpu))
    }
    fn hydro_path(&self, icpu: usize) -> PathBuf {
        self.directory()
            .join(format!("hydro_{}.out{:05}", self.suffix, icpu))
    }
    /// Returns the leaf cells of every domain, reading them on the first call
    pub fn leaf_cells(&self) -> Result<&LeafCells> {
        if let Some(cells) = self.cells.get() {
            return Ok(cells);
        }
        let mut cells: Option<LeafCells> = None;
        for icpu in 1..=self.info.ncpu {
            self.read_domain(icpu, &mut cells)?;
        }
        let mut cells = cells.unwrap_or_else(|| {
            LeafCells::new(self.info.ndim, [1; 3], self.variables.len())
        });
        for (column, name) in cells.values.iter_mut().zip(self.variables.names()) {
            let factor = self.units.factor(&self.info, name);
            if factor != 1. {
                column.iter_mut().for_each(|v| *v *= factor);
            }
        }
        debug!("{}: {} leaf cells", self.name, cells.len());
        Ok(self.cells.get_or_init(|| cells))
    }
    /// Appends the leaf cells owned by CPU `icpu`
    fn read_domain(&self, icpu: usize, cells: &mut Option<LeafCells>) -> Result<()> {
        let amr_path = self.amr_path(icpu);
        let hydro_path = self.hydro_path(icpu);
        let mut amr = FortranReader::open(&amr_path)?;
        let mut hydro = FortranReader::open(&hydro_path)?;
        let header = AmrHeader::read(&mut amr, &amr_path)?;
        let hheader = HydroHeader::read(&mut hydro, &hydro_path)?;
        let format = |path: &Path, reason: String| Error::Format {
            path: path.to_path_buf(),
            reason,
        };
        if header.ncpu != self.info.ncpu || header.ndim != self.info.ndim {
            return Err(format(
                &amr_path,
                format!(
                    "{} cpus in {} dimensions, info file says {} in {}",
                    header.ncpu, header.ndim, self.info.ncpu, self.info.ndim
                ),
            ));
        }
        if (hheader.ncpu, hheader.ndim, hheader.nlevelmax, hheader.nboundary)
            != (header.ncpu, header.ndim, header.nlevelmax, header.nboundary)
        {
            return Err(format(&hydro_path, "header does not match the AMR file".into()));
        }
        if hheader.nvar != self.variables.len() {
            return Err(format(
                &hydro_path,
                format!(
                    "{} variables but the descriptor lists {}",
                    hheader.nvar,
                    self.variables.len()
                ),
            ));
        }

        let ndim = header.ndim;
        let twotondim = 1usize << ndim;
        let nvar = hheader.nvar;
        let cells = cells.get_or_insert_with(|| LeafCells::new(ndim, header.nx, nvar));
        let mut values = vec![0f64; nvar];

        for ilevel in 0..header.nlevelmax {
            let dx = 0.5f64.powi(ilevel as i32 + 1);
            for ibound in 0..header.ncpu + header.nboundary {
                let ncache = header.ncache(ilevel, ibound);
                let level = hydro.read_i32()?;
                let hcache = hydro.read_i32()?;
                if level as usize != ilevel + 1 || hcache.max(0) as usize != ncache {
                    return Err(format(
                        &hydro_path,
                        format!(
                            "level {level} with {hcache} grids where level {} with {ncache} grids was expected",
                            ilevel + 1
                        ),
                    ));
                }
                if ncache == 0 {
                    continue;
                }
                // ind_grid, next, prev
                amr.skip(3)?;
                let xg = (0..ndim)
                    .map(|_| amr.read_f64s())
                    .collect::<Result<Vec<_>>>()?;
                // father, nbor
                amr.skip(1 + 2 * ndim)?;
                let son = (0..twotondim)
                    .map(|_| amr.read_i32s())
                    .collect::<Result<Vec<_>>>()?;
                // cpu_map, flag1
                amr.skip(2 * twotondim)?;
                let data = (0..twotondim * nvar)
                    .map(|_| hydro.read_reals(ncache))
                    .collect::<Result<Vec<_>>>()?;
                if xg.iter().any(|x| x.len() != ncache) || son.iter().any(|s| s.len() != ncache)
                {
                    return Err(format(
                        &amr_path,
                        format!("level {} records do not hold {ncache} grids", ilevel + 1),
                    ));
                }
                if ibound + 1 != icpu {
                    continue;
                }
                for (ind, son) in son.iter().enumerate() {
                    for igrid in (0..ncache).filter(|&igrid| son[igrid] == 0) {
                        let mut center = [0.5; 3];
                        for (dim, c) in center.iter_mut().enumerate().take(ndim) {
                            let offset = ((ind >> dim) & 1) as f64 - 0.5;
                            *c = (xg[dim][igrid] + offset * dx) / header.nx[dim] as f64;
                        }
                        for (ivar, v) in values.iter_mut().enumerate() {
                            *v = data[ind * nvar + ivar][igrid];
                        }
                        cells.push(center, (ilevel + 1) as u8, &values);
                    }
                }
            }
        }
        Ok(())
    }
}
