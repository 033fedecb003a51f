use super::{Error, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Sequential reader for Fortran unformatted files
///
/// Every record is framed by a leading and a trailing little-endian `i32` holding the payload
/// length in bytes (gfortran `-frecord-marker=4`).
pub struct FortranReader<R> {
    inner: R,
    records: usize,
}

impl FortranReader<BufReader<File>> {
    /// Opens a Fortran unformatted file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(|source| Error::Open {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> FortranReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, records: 0 }
    }
    /// Number of records consumed so far
    pub fn position(&self) -> usize {
        self.records
    }
    fn marker(&mut self) -> Result<usize> {
        let mut buf = [0u8; 4];
        self.inner.read_exact(&mut buf)?;
        let len = i32::from_le_bytes(buf);
        usize::try_from(len)
            .map_err(|_| Error::Record(format!("negative record length {len} at record #{}", self.records)))
    }
    /// Reads the payload of the next record
    pub fn read_record(&mut self) -> Result<Vec<u8>> {
        let head = self.marker()?;
        let mut payload = vec![0u8; head];
        self.inner.read_exact(&mut payload)?;
        let tail = self.marker()?;
        if head != tail {
            return Err(Error::Record(format!(
                "record #{} opens with {head} bytes but closes with {tail}",
                self.records
            )));
        }
        self.records += 1;
        Ok(payload)
    }
    /// Skips `n` records
    pub fn skip(&mut self, n: usize) -> Result<()> {
        for _ in 0..n {
            self.read_record()?;
        }
        Ok(())
    }
    pub fn read_i32s(&mut self) -> Result<Vec<i32>> {
        let payload = self.read_record()?;
        if payload.len() % 4 != 0 {
            return Err(Error::Record(format!(
                "{} bytes is not a whole number of integers",
                payload.len()
            )));
        }
        Ok(payload
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }
    /// Reads a record holding a single integer
    pub fn read_i32(&mut self) -> Result<i32> {
        match self.read_i32s()?.as_slice() {
            [value] => Ok(*value),
            values => Err(Error::Record(format!(
                "expected 1 integer, found {}",
                values.len()
            ))),
        }
    }
    pub fn read_f64s(&mut self) -> Result<Vec<f64>> {
        let payload = self.read_record()?;
        if payload.len() % 8 != 0 {
            return Err(Error::Record(format!(
                "{} bytes is not a whole number of doubles",
                payload.len()
            )));
        }
        Ok(payload
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect())
    }
    /// Reads `n` reals stored either in single or in double precision
    pub fn read_reals(&mut self, n: usize) -> Result<Vec<f64>> {
        let payload = self.read_record()?;
        if payload.len() == 8 * n {
            Ok(payload
                .chunks_exact(8)
                .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                .collect())
        } else if payload.len() == 4 * n {
            Ok(payload
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                .collect())
        } else {
            Err(Error::Record(format!(
                "{} bytes do not hold {n} reals",
                payload.len()
            )))
        }
    }
    /// Reads a character record, trailing blanks removed
    pub fn read_string(&mut self) -> Result<String> {
        let payload = self.read_record()?;
        Ok(String::from_utf8_lossy(&payload)
            .trim_end_matches(|c: char| c == ' ' || c == '\0')
            .trim_start()
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn record(payload: &[u8]) -> Vec<u8> {
        let len = (payload.len() as i32).to_le_bytes();
        let mut bytes = len.to_vec();
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(&len);
        bytes
    }

    #[test]
    fn reads_typed_records() {
        let mut bytes = record(&7i32.to_le_bytes());
        bytes.extend(record(
            &[1.5f64, -2.0]
                .iter()
                .flat_map(|x| x.to_le_bytes())
                .collect::<Vec<_>>(),
        ));
        bytes.extend(record(b"hilbert   "));
        let mut reader = FortranReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_i32().unwrap(), 7);
        assert_eq!(reader.read_f64s().unwrap(), vec![1.5, -2.0]);
        assert_eq!(reader.read_string().unwrap(), "hilbert");
        assert_eq!(reader.position(), 3);
    }

    #[test]
    fn single_precision_reals_are_widened() {
        let payload: Vec<u8> = [0.25f32, 4.0, 8.0]
            .iter()
            .flat_map(|x| x.to_le_bytes())
            .collect();
        let mut reader = FortranReader::new(Cursor::new(record(&payload)));
        assert_eq!(reader.read_reals(3).unwrap(), vec![0.25, 4.0, 8.0]);
    }

    #[test]
    fn real_count_must_match_payload() {
        let payload: Vec<u8> = [1f64, 2f64].iter().flat_map(|x| x.to_le_bytes()).collect();
        let mut reader = FortranReader::new(Cursor::new(record(&payload)));
        assert!(matches!(reader.read_reals(3), Err(Error::Record(_))));
    }

    #[test]
    fn mismatched_markers_are_rejected() {
        let mut bytes = record(&3i32.to_le_bytes());
        let n = bytes.len();
        bytes[n - 4..].copy_from_slice(&8i32.to_le_bytes());
        let mut reader = FortranReader::new(Cursor::new(bytes));
        assert!(matches!(reader.read_i32(), Err(Error::Record(_))));
    }

    #[test]
    fn truncated_file_is_an_io_error() {
        let bytes = record(&[0u8; 16]);
        let mut reader = FortranReader::new(Cursor::new(bytes[..10].to_vec()));
        assert!(matches!(reader.read_record(), Err(Error::Read(_))));
    }
}
