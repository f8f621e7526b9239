//! Reading and writing the distributed matrix and vector distribution files
//!
//! Matrix file:
//!
//! ```text
//! m n nz p
//! start_0
//! ...
//! start_p
//! row col value      (nz lines, 1-based, grouped by processor)
//! ```
//!
//! Vector distribution file:
//!
//! ```text
//! n p
//! index processor [value]    (n lines, 1-based, increasing index)
//! ```
//!
//! Lines starting with `%` and blank lines are ignored.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{try_with_capacity, Error, Result};
use crate::matrix::Triplet;

/// Whitespace-separated records of a text file, with line numbers
struct Records<'a> {
    path: &'a Path,
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    last_line: usize,
}

impl<'a> Records<'a> {
    fn new(path: &'a Path, text: &'a str) -> Self {
        Self {
            path,
            lines: text.lines().enumerate(),
            last_line: 0,
        }
    }

    fn next_record(&mut self) -> Option<(usize, Vec<&'a str>)> {
        for (i, line) in self.lines.by_ref() {
            self.last_line = i + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('%') {
                continue;
            }
            return Some((i + 1, line.split_whitespace().collect()));
        }
        None
    }

    fn expect_record(&mut self, what: &str) -> Result<(usize, Vec<&'a str>)> {
        let line = self.last_line + 1;
        self.next_record()
            .ok_or_else(|| self.error(line, format!("unexpected end of file, expected {}", what)))
    }

    fn error(&self, line: usize, message: String) -> Error {
        Error::Parse {
            path: self.path.to_path_buf(),
            line,
            message,
        }
    }

    fn field<T: FromStr>(&self, line: usize, tokens: &[&str], i: usize, what: &str) -> Result<T> {
        let token = tokens
            .get(i)
            .ok_or_else(|| self.error(line, format!("missing {}", what)))?;
        token
            .parse()
            .map_err(|_| self.error(line, format!("invalid {} '{}'", what, token)))
    }

    fn arity(&self, line: usize, tokens: &[&str], allowed: &[usize]) -> Result<()> {
        if allowed.contains(&tokens.len()) {
            Ok(())
        } else {
            Err(self.error(
                line,
                format!("expected {:?} fields, found {}", allowed, tokens.len()),
            ))
        }
    }

    /// A 1-based index in `1..=max`, returned 0-based
    fn one_based(&self, line: usize, tokens: &[&str], i: usize, max: usize, what: &str) -> Result<usize> {
        let value: usize = self.field(line, tokens, i, what)?;
        if value == 0 || value > max {
            return Err(self.error(line, format!("{} {} outside 1..={}", what, value, max)));
        }
        Ok(value - 1)
    }

    fn expect_end(&mut self) -> Result<()> {
        match self.next_record() {
            None => Ok(()),
            Some((line, _)) => Err(self.error(line, "unexpected trailing data".into())),
        }
    }
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// A sparse matrix whose nonzeros are grouped by owning processor
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixFile {
    pub rows: usize,
    pub cols: usize,
    pub nprocs: usize,
    /// Processor `q` owns `triplets[starts[q]..starts[q + 1]]`
    pub starts: Vec<usize>,
    /// 0-based nonzeros
    pub triplets: Vec<Triplet<f64>>,
}

impl MatrixFile {
    /// Groups `owned[q]` as the nonzeros of processor `q`
    pub fn from_parts(n: usize, owned: Vec<Vec<Triplet<f64>>>) -> Self {
        let mut starts = vec![0];
        let mut triplets = Vec::new();
        for part in owned {
            triplets.extend(part);
            starts.push(triplets.len());
        }
        Self {
            rows: n,
            cols: n,
            nprocs: starts.len() - 1,
            starts,
            triplets,
        }
    }

    /// Nonzeros of processor `q`
    pub fn part(&self, q: usize) -> &[Triplet<f64>] {
        &self.triplets[self.starts[q]..self.starts[q + 1]]
    }

    /// Read and validate a matrix file
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::parse(path, &read_text(path)?)
    }

    /// Parse the contents of a matrix file; `path` is used in error messages
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        let mut records = Records::new(path, text);

        let (line, header) = records.expect_record("header 'm n nz p'")?;
        records.arity(line, &header, &[4])?;
        let rows: usize = records.field(line, &header, 0, "row count")?;
        let cols: usize = records.field(line, &header, 1, "column count")?;
        let nz: usize = records.field(line, &header, 2, "nonzero count")?;
        let nprocs: usize = records.field(line, &header, 3, "processor count")?;
        if nprocs == 0 {
            return Err(records.error(line, "processor count must be positive".into()));
        }

        let mut starts = try_with_capacity("processor starts", nprocs + 1)?;
        while starts.len() <= nprocs {
            let (line, tokens) = records.expect_record("processor start offset")?;
            for i in 0..tokens.len() {
                let start: usize = records.field(line, &tokens, i, "start offset")?;
                let previous = starts.last().copied();
                if (previous.is_none() && start != 0) || previous.map_or(false, |p| start < p) {
                    return Err(records.error(
                        line,
                        "start offsets must begin at 0 and be non-decreasing".into(),
                    ));
                }
                if starts.len() > nprocs {
                    return Err(records.error(line, "too many start offsets".into()));
                }
                starts.push(start);
            }
        }
        if starts[nprocs] != nz {
            return Err(records.error(
                records.last_line,
                format!("last start offset {} does not match nz = {}", starts[nprocs], nz),
            ));
        }

        let mut triplets = try_with_capacity("matrix nonzeros", nz)?;
        for _ in 0..nz {
            let (line, tokens) = records.expect_record("nonzero 'row col value'")?;
            records.arity(line, &tokens, &[3])?;
            let row = records.one_based(line, &tokens, 0, rows, "row")?;
            let col = records.one_based(line, &tokens, 1, cols, "column")?;
            let value: f64 = records.field(line, &tokens, 2, "value")?;
            triplets.push(Triplet::new(row, col, value));
        }
        records.expect_end()?;

        Ok(Self {
            rows,
            cols,
            nprocs,
            starts,
            triplets,
        })
    }

    /// Render in the file format
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// Write to `path`
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        write_text(path.as_ref(), &self.to_text())
    }
}

/// Assignment of every global vector index to a processor, optionally with
/// the vector's values
#[derive(Debug, Clone, PartialEq)]
pub struct VectorFile {
    pub n: usize,
    pub nprocs: usize,
    /// 0-based owner of every global index
    pub owners: Vec<usize>,
    pub values: Option<Vec<f64>>,
}

impl VectorFile {
    /// Read and validate a vector distribution file
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::parse(path, &read_text(path)?)
    }

    /// Parse the contents of a vector distribution file
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        let mut records = Records::new(path, text);

        let (line, header) = records.expect_record("header 'n p'")?;
        records.arity(line, &header, &[2])?;
        let n: usize = records.field(line, &header, 0, "length")?;
        let nprocs: usize = records.field(line, &header, 1, "processor count")?;
        if nprocs == 0 {
            return Err(records.error(line, "processor count must be positive".into()));
        }

        let mut owners = try_with_capacity("vector owners", n)?;
        let mut values: Option<Vec<f64>> = None;
        for k in 0..n {
            let (line, tokens) = records.expect_record("'index processor [value]'")?;
            records.arity(line, &tokens, &[2, 3])?;
            let index = records.one_based(line, &tokens, 0, n, "index")?;
            if index != k {
                return Err(records.error(
                    line,
                    format!("index {} out of order, expected {}", index + 1, k + 1),
                ));
            }
            owners.push(records.one_based(line, &tokens, 1, nprocs, "processor")?);

            let embedded = tokens.len() == 3;
            if k == 0 && embedded {
                values = Some(try_with_capacity("vector values", n)?);
            }
            match values.as_mut() {
                Some(values) if embedded => values.push(records.field(line, &tokens, 2, "value")?),
                None if !embedded => {}
                _ => {
                    return Err(records.error(
                        line,
                        "values must be given on every line or on none".into(),
                    ))
                }
            }
        }
        records.expect_end()?;

        Ok(Self {
            n,
            nprocs,
            owners,
            values,
        })
    }

    /// Render in the file format
    pub fn to_text(&self) -> String {
        self.to_string()
    }

    /// Write to `path`
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        write_text(path.as_ref(), &self.to_text())
    }
}

impl fmt::Display for MatrixFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {} {} {}",
            self.rows,
            self.cols,
            self.triplets.len(),
            self.nprocs
        )?;
        for start in &self.starts {
            writeln!(f, "{}", start)?;
        }
        for t in &self.triplets {
            writeln!(f, "{} {} {:e}", t.row + 1, t.col + 1, t.value)?;
        }
        Ok(())
    }
}

impl fmt::Display for VectorFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", self.n, self.nprocs)?;
        for (g, &q) in self.owners.iter().enumerate() {
            match &self.values {
                Some(values) => writeln!(f, "{} {} {:e}", g + 1, q + 1, values[g])?,
                None => writeln!(f, "{} {}", g + 1, q + 1)?,
            }
        }
        Ok(())
    }
}

/// `PREFIX.mtx`, `PREFIX.v` and `PREFIX.u`, the files of one generated problem
pub fn problem_paths(prefix: &Path) -> (PathBuf, PathBuf, PathBuf) {
    let with = |ext: &str| {
        let mut name = prefix.as_os_str().to_os_string();
        name.push(".");
        name.push(ext);
        PathBuf::from(name)
    };
    (with("mtx"), with("v"), with("u"))
}
