//! Synthetic RAMSES outputs
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// One oct
pub struct Grid {
    /// 1-based refinement level
    pub level: usize,
    /// CPU owning the oct
    pub owner: usize,
    pub xg: [f64; 3],
    pub son: [i32; 8],
    /// `values[ivar][ind]`
    pub values: Vec<[f64; 8]>,
}

pub struct Snapshot {
    pub ncpu: usize,
    pub nlevelmax: usize,
    pub nvar: usize,
    pub boxlen: f64,
    pub unit_l: f64,
    pub unit_d: f64,
    pub unit_t: f64,
    pub grids: Vec<Grid>,
    pub descriptor: Option<Vec<String>>,
}

/// The coarse oct with its first cell refined once
///
/// Variable `ivar` holds `100 * ivar + ind` on the coarse oct and `100 * ivar + 10 + ind` on the
/// refined one. The refined oct belongs to the last CPU.
pub fn two_level(ncpu: usize, nvar: usize) -> Snapshot {
    let values = |offset: f64| {
        (0..nvar)
            .map(|ivar| {
                let mut v = [0f64; 8];
                v.iter_mut()
                    .enumerate()
                    .for_each(|(ind, v)| *v = 100. * ivar as f64 + offset + ind as f64);
                v
            })
            .collect::<Vec<_>>()
    };
    let mut son = [0; 8];
    son[0] = 2;
    Snapshot {
        ncpu,
        nlevelmax: 2,
        nvar,
        boxlen: 1.,
        unit_l: 1.,
        unit_d: 1.,
        unit_t: 1.,
        grids: vec![
            Grid {
                level: 1,
                owner: 1,
                xg: [0.5; 3],
                son,
                values: values(0.),
            },
            Grid {
                level: 2,
                owner: ncpu,
                xg: [0.25; 3],
                son: [0; 8],
                values: values(10.),
            },
        ],
        descriptor: None,
    }
}

struct Records(Vec<u8>);

impl Records {
    fn record(&mut self, payload: &[u8]) -> &mut Self {
        let len = (payload.len() as i32).to_le_bytes();
        self.0.extend_from_slice(&len);
        self.0.extend_from_slice(payload);
        self.0.extend_from_slice(&len);
        self
    }
    fn ints(&mut self, values: &[i32]) -> &mut Self {
        let payload: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.record(&payload)
    }
    fn reals(&mut self, values: &[f64]) -> &mut Self {
        let payload: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.record(&payload)
    }
}

impl Snapshot {
    fn count(&self, level: usize, owner: usize) -> usize {
        self.grids
            .iter()
            .filter(|g| g.level == level && g.owner == owner)
            .count()
    }
    fn amr(&self, iout: usize) -> Vec<u8> {
        let (ncpu, nlev) = (self.ncpu as i32, self.nlevelmax as i32);
        let mut r = Records(Vec::new());
        r.ints(&[ncpu])
            .ints(&[3])
            .ints(&[1, 1, 1])
            .ints(&[nlev])
            .ints(&[1000])
            .ints(&[0])
            .ints(&[self.grids.len() as i32])
            .reals(&[self.boxlen])
            .ints(&[1, iout as i32, 1])
            .reals(&[0.])
            .reals(&[1.])
            .reals(&[0.])
            .reals(&vec![0.; self.nlevelmax])
            .reals(&vec![0.; self.nlevelmax])
            .ints(&[0, 0])
            .reals(&[0.; 3])
            .reals(&[0.; 7])
            .reals(&[0.; 5])
            .reals(&[0.])
            .ints(&vec![0; self.ncpu * self.nlevelmax])
            .ints(&vec![0; self.ncpu * self.nlevelmax]);
        let numbl: Vec<i32> = (1..=self.nlevelmax)
            .flat_map(|level| (1..=self.ncpu).map(move |owner| (level, owner)))
            .map(|(level, owner)| self.count(level, owner) as i32)
            .collect();
        r.ints(&numbl)
            .ints(&vec![0; 10 * self.nlevelmax])
            .ints(&[0; 5])
            .record(format!("{:<128}", "hilbert").as_bytes())
            .reals(&vec![0.; self.ncpu + 1])
            .ints(&[1])
            .ints(&[0])
            .ints(&[1]);
        for level in 1..=self.nlevelmax {
            for owner in 1..=self.ncpu {
                let grids: Vec<&Grid> = self
                    .grids
                    .iter()
                    .filter(|g| g.level == level && g.owner == owner)
                    .collect();
                if grids.is_empty() {
                    continue;
                }
                let n = grids.len();
                r.ints(&(1..=n as i32).collect::<Vec<_>>())
                    .ints(&vec![0; n])
                    .ints(&vec![0; n]);
                for dim in 0..3 {
                    r.reals(&grids.iter().map(|g| g.xg[dim]).collect::<Vec<_>>());
                }
                r.ints(&vec![0; n]);
                for _ in 0..6 {
                    r.ints(&vec![0; n]);
                }
                for ind in 0..8 {
                    r.ints(&grids.iter().map(|g| g.son[ind]).collect::<Vec<_>>());
                }
                for _ in 0..8 {
                    r.ints(&vec![owner as i32; n]);
                }
                for _ in 0..8 {
                    r.ints(&vec![0; n]);
                }
            }
        }
        r.0
    }
    fn hydro(&self) -> Vec<u8> {
        let mut r = Records(Vec::new());
        r.ints(&[self.ncpu as i32])
            .ints(&[self.nvar as i32])
            .ints(&[3])
            .ints(&[self.nlevelmax as i32])
            .ints(&[0])
            .reals(&[1.4]);
        for level in 1..=self.nlevelmax {
            for owner in 1..=self.ncpu {
                let grids: Vec<&Grid> = self
                    .grids
                    .iter()
                    .filter(|g| g.level == level && g.owner == owner)
                    .collect();
                r.ints(&[level as i32]).ints(&[grids.len() as i32]);
                if grids.is_empty() {
                    continue;
                }
                for ind in 0..8 {
                    for ivar in 0..self.nvar {
                        r.reals(&grids.iter().map(|g| g.values[ivar][ind]).collect::<Vec<_>>());
                    }
                }
            }
        }
        r.0
    }
    fn info(&self) -> String {
        format!(
            "ncpu        = {:>10}
ndim        =          3
levelmin    =          1
levelmax    = {:>10}
ngridmax    =       1000
nstep_coarse=         10

boxlen      =  {:E}
time        =  0.100000000000000E+00
aexp        =  0.100000000000000E+01
H0          =  0.100000000000000E+01
omega_m     =  0.100000000000000E+01
omega_l     =  0.000000000000000E+00
omega_k     =  0.000000000000000E+00
omega_b     =  0.000000000000000E+00
unit_l      =  {:E}
unit_d      =  {:E}
unit_t      =  {:E}

ordering type=hilbert
   DOMAIN   ind_min                 ind_max
",
            self.ncpu, self.nlevelmax, self.boxlen, self.unit_l, self.unit_d, self.unit_t
        )
    }
    /// Writes `<root>/output_<iout>` and returns the path of its info file
    pub fn write<P: AsRef<Path>>(&self, root: P, iout: usize) -> PathBuf {
        let suffix = format!("{iout:05}");
        let dir = root.as_ref().join(format!("output_{suffix}"));
        fs::create_dir_all(&dir).unwrap();
        let info = dir.join(format!("info_{suffix}.txt"));
        fs::write(&info, self.info()).unwrap();
        for icpu in 1..=self.ncpu {
            fs::write(dir.join(format!("amr_{suffix}.out{icpu:05}")), self.amr(iout)).unwrap();
            fs::write(dir.join(format!("hydro_{suffix}.out{icpu:05}")), self.hydro()).unwrap();
        }
        if let Some(names) = &self.descriptor {
            let mut text = String::from("# version:  1\n# ivar, variable_name, variable_type\n");
            for (i, name) in names.iter().enumerate() {
                text.push_str(&format!("{:>3}, {name}, d\n", i + 1));
            }
            fs::write(dir.join("hydro_file_descriptor.txt"), text).unwrap();
        }
        info
    }
}
