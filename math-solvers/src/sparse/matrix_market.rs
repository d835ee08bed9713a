//! MatrixMarket coordinate format
//!
//! Used to dump assembled blocks for offline comparison and to load stored
//! reference matrices in tests. Values are written with the shortest
//! representation that parses back to the same `f64`, so a write/read cycle
//! is exact.

use super::CsrMatrix;
use std::io::{BufRead, Write};
use thiserror::Error;

/// Errors raised while reading or writing MatrixMarket data
#[derive(Debug, Error)]
pub enum MatrixMarketError {
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed content
    #[error("line {line}: {message}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// What went wrong
        message: String,
    },
}

/// Write `matrix` as `%%MatrixMarket matrix coordinate real general`
///
/// Indices are 1-based; entries are emitted row by row in column order.
pub fn write_matrix_market<W: Write>(
    matrix: &CsrMatrix,
    mut writer: W,
) -> Result<(), MatrixMarketError> {
    writeln!(writer, "%%MatrixMarket matrix coordinate real general")?;
    writeln!(
        writer,
        "{} {} {}",
        matrix.num_rows,
        matrix.num_cols,
        matrix.nnz()
    )?;
    for i in 0..matrix.num_rows {
        for (j, v) in matrix.row_entries(i) {
            writeln!(writer, "{} {} {:e}", i + 1, j + 1, v)?;
        }
    }
    Ok(())
}

/// Read a coordinate-format real matrix
///
/// `symmetric` headers are expanded to both triangles. Duplicates are summed.
pub fn read_matrix_market<R: BufRead>(reader: R) -> Result<CsrMatrix, MatrixMarketError> {
    let mut symmetric = false;
    let mut size: Option<(usize, usize, usize)> = None;
    let mut triplets = Vec::new();

    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let lineno = n + 1;
        let trimmed = line.trim();
        if trimmed.starts_with("%%MatrixMarket") {
            let header = trimmed.to_ascii_lowercase();
            if !header.contains("coordinate") || !header.contains("real") {
                return Err(parse_error(lineno, "only coordinate real matrices are supported"));
            }
            symmetric = header.contains("symmetric");
            continue;
        }
        if trimmed.is_empty() || trimmed.starts_with('%') {
            continue;
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        match size {
            None => {
                if fields.len() != 3 {
                    return Err(parse_error(lineno, "expected 'rows cols nnz'"));
                }
                size = Some((
                    parse_field(fields[0], lineno)?,
                    parse_field(fields[1], lineno)?,
                    parse_field(fields[2], lineno)?,
                ));
                triplets.reserve(size.map_or(0, |s| s.2));
            }
            Some((rows, cols, _)) => {
                if fields.len() != 3 {
                    return Err(parse_error(lineno, "expected 'row col value'"));
                }
                let i: usize = parse_field(fields[0], lineno)?;
                let j: usize = parse_field(fields[1], lineno)?;
                let v: f64 = parse_field(fields[2], lineno)?;
                if i == 0 || j == 0 || i > rows || j > cols {
                    return Err(parse_error(lineno, "index out of range"));
                }
                triplets.push((i - 1, j - 1, v));
                if symmetric && i != j {
                    triplets.push((j - 1, i - 1, v));
                }
            }
        }
    }

    let (rows, cols, nnz) = size.ok_or_else(|| parse_error(0, "missing size line"))?;
    let expected = if symmetric { None } else { Some(nnz) };
    if let Some(nnz) = expected {
        if nnz != triplets.len() {
            return Err(parse_error(
                0,
                &format!("header announces {nnz} entries, found {}", triplets.len()),
            ));
        }
    }
    Ok(CsrMatrix::from_triplets(rows, cols, triplets))
}

fn parse_field<T: std::str::FromStr>(field: &str, line: usize) -> Result<T, MatrixMarketError> {
    field
        .parse()
        .map_err(|_| parse_error(line, &format!("cannot parse '{field}'")))
}

fn parse_error(line: usize, message: &str) -> MatrixMarketError {
    MatrixMarketError::Parse {
        line,
        message: message.to_string(),
    }
}
