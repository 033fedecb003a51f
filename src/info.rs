use super::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

/// Snapshot header read from `info_XXXXX.txt`
#[derive(Debug, Clone, PartialEq)]
pub struct Info {
    pub ncpu: usize,
    pub ndim: usize,
    pub levelmin: usize,
    pub levelmax: usize,
    pub ngridmax: usize,
    pub nstep_coarse: usize,
    /// Box size in code length units
    pub boxlen: f64,
    pub time: f64,
    pub aexp: f64,
    pub h0: f64,
    pub omega_m: f64,
    pub omega_l: f64,
    pub omega_k: f64,
    pub omega_b: f64,
    /// Code length unit in cm
    pub unit_l: f64,
    /// Code density unit in g/cm^3
    pub unit_d: f64,
    /// Code time unit in s
    pub unit_t: f64,
    pub ordering: String,
}

impl Info {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|source| Error::Open {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }
    /// Parses the `key = value` header
    ///
    /// Parsing stops at the `ordering type` line; the domain key table that follows is not used.
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries: HashMap<String, String> = HashMap::new();
        let mut ordering = String::new();
        for line in text.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("ordering type") {
                ordering = rest.trim_start_matches(|c: char| c == '=' || c.is_whitespace()).to_string();
                break;
            }
            if let Some((key, value)) = line.split_once('=') {
                entries.insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        let float = |key: &'static str| -> Result<Option<f64>> {
            entries
                .get(key)
                .map(|value| {
                    value.replace(['d', 'D'], "e").parse::<f64>().map_err(|_| Error::InfoValue {
                        key: key.to_string(),
                        value: value.clone(),
                    })
                })
                .transpose()
        };
        let integer = |key: &'static str| -> Result<Option<usize>> {
            entries
                .get(key)
                .map(|value| {
                    value.parse::<usize>().map_err(|_| Error::InfoValue {
                        key: key.to_string(),
                        value: value.clone(),
                    })
                })
                .transpose()
        };
        let required = |key: &'static str| float(key)?.ok_or(Error::MissingInfoKey(key));

        let levelmax = integer("levelmax")?.ok_or(Error::MissingInfoKey("levelmax"))?;
        Ok(Self {
            ncpu: integer("ncpu")?.ok_or(Error::MissingInfoKey("ncpu"))?,
            ndim: integer("ndim")?.ok_or(Error::MissingInfoKey("ndim"))?,
            levelmin: integer("levelmin")?.unwrap_or(1),
            levelmax,
            ngridmax: integer("ngridmax")?.unwrap_or_default(),
            nstep_coarse: integer("nstep_coarse")?.unwrap_or_default(),
            boxlen: required("boxlen")?,
            time: float("time")?.unwrap_or_default(),
            aexp: float("aexp")?.unwrap_or(1.),
            h0: float("H0")?.unwrap_or_default(),
            omega_m: float("omega_m")?.unwrap_or_default(),
            omega_l: float("omega_l")?.unwrap_or_default(),
            omega_k: float("omega_k")?.unwrap_or_default(),
            omega_b: float("omega_b")?.unwrap_or_default(),
            unit_l: required("unit_l")?,
            unit_d: required("unit_d")?,
            unit_t: required("unit_t")?,
            ordering,
        })
    }
    /// Code velocity unit in cm/s
    pub fn unit_v(&self) -> f64 {
        self.unit_l / self.unit_t
    }
    /// Code pressure unit in dyn/cm^2
    pub fn unit_p(&self) -> f64 {
        self.unit_d * self.unit_v().powi(2)
    }
}
