use super::{Error, Result};
use std::path::Path;

/// Names of the hydro variables, in file order
#[derive(Debug, Clone, PartialEq)]
pub struct VariableList {
    names: Vec<String>,
}

/// Legacy field names and their file descriptor counterparts
const ALIASES: [(&str, &str); 9] = [
    ("density", "density"),
    ("x-velocity", "velocity_x"),
    ("y-velocity", "velocity_y"),
    ("z-velocity", "velocity_z"),
    ("pressure", "pressure"),
    ("metallicity", "metallicity"),
    ("hii", "xhii"),
    ("heii", "xheii"),
    ("heiii", "xheiii"),
];

fn canonical(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    ALIASES
        .iter()
        .find(|(legacy, _)| *legacy == lower)
        .map(|(_, current)| current.to_string())
        .unwrap_or(lower)
}

impl VariableList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
    /// Variable list used when an output carries no file descriptor
    pub fn default_hydro(nvar: usize) -> Self {
        let known = ["density", "velocity_x", "velocity_y", "velocity_z", "pressure"];
        Self::new((0..nvar).map(|i| {
            known
                .get(i)
                .map(|name| name.to_string())
                .unwrap_or_else(|| format!("var{}", i + 1))
        }))
    }
    /// Reads `hydro_file_descriptor.txt`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|source| Error::Open {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|reason| Error::Format {
            path: path.as_ref().to_path_buf(),
            reason,
        })
    }
    /// Parses either the versioned (`ivar, name, type`) or the legacy (`variable #  i: name`) format
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let mut names = Vec::new();
        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') || line.starts_with("nvar") {
                continue;
            }
            let name = if let Some(rest) = line.strip_prefix("variable #") {
                rest.split_once(':').map(|(_, name)| name.trim())
            } else {
                line.split(',').nth(1).map(str::trim)
            };
            match name {
                Some(name) if !name.is_empty() => names.push(name.to_string()),
                _ => return Err(format!("unexpected descriptor line {line:?}")),
            }
        }
        if names.is_empty() {
            return Err("no variable listed".into());
        }
        Ok(Self { names })
    }
    pub fn len(&self) -> usize {
        self.names.len()
    }
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
    pub fn names(&self) -> &[String] {
        &self.names
    }
    /// Index of a field, matched case-insensitively and through legacy aliases
    pub fn index_of(&self, field: &str) -> Option<usize> {
        let wanted = canonical(field);
        self.names.iter().position(|name| canonical(name) == wanted)
    }
}
