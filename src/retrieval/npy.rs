//! Minimal NumPy `.npy` codec for the embedding matrix.
//!
//! Reads versions 1.0 through 3.0 holding a C-ordered 2-D array of
//! little-endian `f4` (or `f8`, narrowed to `f32`). Writes version 1.0 `<f4`.

use std::io::{Read, Write};

use ndarray::Array2;

const MAGIC: &[u8; 6] = b"\x93NUMPY";
const HEADER_ALIGN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dtype {
    F32,
    F64,
}

impl Dtype {
    fn width(self) -> usize {
        match self {
            Dtype::F32 => 4,
            Dtype::F64 => 8,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Header {
    dtype: Dtype,
    rows: usize,
    cols: usize,
}

pub fn read_matrix<R: Read>(mut reader: R) -> Result<Array2<f32>, String> {
    let mut preamble = [0u8; 8];
    reader
        .read_exact(&mut preamble)
        .map_err(|e| format!("truncated preamble: {}", e))?;
    if &preamble[..6] != MAGIC {
        return Err("not an .npy file (bad magic)".to_string());
    }

    let header_len = match preamble[6] {
        1 => {
            let mut len = [0u8; 2];
            reader
                .read_exact(&mut len)
                .map_err(|e| format!("truncated header length: {}", e))?;
            u16::from_le_bytes(len) as usize
        }
        2 | 3 => {
            let mut len = [0u8; 4];
            reader
                .read_exact(&mut len)
                .map_err(|e| format!("truncated header length: {}", e))?;
            u32::from_le_bytes(len) as usize
        }
        major => return Err(format!("unsupported .npy version {}.{}", major, preamble[7])),
    };

    let header_bytes = read_up_to(&mut reader, header_len)?;
    if header_bytes.len() != header_len {
        return Err("truncated header".to_string());
    }
    let header_text = String::from_utf8(header_bytes)
        .map_err(|_| "header is not valid text".to_string())?;
    let header = parse_header(&header_text)?;

    let count = header
        .rows
        .checked_mul(header.cols)
        .ok_or_else(|| "shape overflows".to_string())?;
    let byte_count = count
        .checked_mul(header.dtype.width())
        .ok_or_else(|| "shape overflows".to_string())?;
    // The buffer grows with what the file holds, not with what the header claims.
    let data = read_up_to(&mut reader, byte_count)?;
    if data.len() != byte_count {
        return Err(format!("expected {} values of data", count));
    }

    let values: Vec<f32> = match header.dtype {
        Dtype::F32 => data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        Dtype::F64 => data
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]) as f32)
            .collect(),
    };

    Array2::from_shape_vec((header.rows, header.cols), values).map_err(|e| e.to_string())
}

fn read_up_to<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>, String> {
    let limit = u64::try_from(len).map_err(|_| "length overflows".to_string())?;
    let mut buffer = Vec::new();
    reader
        .by_ref()
        .take(limit)
        .read_to_end(&mut buffer)
        .map_err(|e| e.to_string())?;
    Ok(buffer)
}

pub fn write_matrix<W: Write>(mut writer: W, matrix: &Array2<f32>) -> std::io::Result<()> {
    let dict = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}, {}), }}",
        matrix.nrows(),
        matrix.ncols()
    );
    // magic(6) + version(2) + length(2) + dict + padding + '\n'
    let unpadded = MAGIC.len() + 2 + 2 + dict.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    let header_len = dict.len() + padding + 1;
    let header_len = u16::try_from(header_len).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "npy header too long")
    })?;

    writer.write_all(MAGIC)?;
    writer.write_all(&[1, 0])?;
    writer.write_all(&header_len.to_le_bytes())?;
    writer.write_all(dict.as_bytes())?;
    writer.write_all(&vec![b' '; padding])?;
    writer.write_all(b"\n")?;

    for value in matrix.iter() {
        writer.write_all(&value.to_le_bytes())?;
    }
    writer.flush()
}

fn parse_header(text: &str) -> Result<Header, String> {
    let descr = dict_value(text, "descr")
        .ok_or_else(|| "header has no 'descr'".to_string())?;
    let dtype = match descr.trim_matches(|c| c == '\'' || c == '"') {
        "<f4" => Dtype::F32,
        "<f8" => Dtype::F64,
        other => return Err(format!("unsupported dtype {} (expected <f4 or <f8)", other)),
    };

    let fortran = dict_value(text, "fortran_order")
        .ok_or_else(|| "header has no 'fortran_order'".to_string())?;
    if fortran != "False" {
        return Err("fortran-ordered arrays are not supported".to_string());
    }

    let shape = dict_value(text, "shape").ok_or_else(|| "header has no 'shape'".to_string())?;
    let dims: Vec<usize> = shape
        .trim_start_matches('(')
        .trim_end_matches(')')
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<usize>().map_err(|_| format!("bad shape {}", shape)))
        .collect::<Result<_, _>>()?;
    match dims.as_slice() {
        [rows, cols] => Ok(Header {
            dtype,
            rows: *rows,
            cols: *cols,
        }),
        _ => Err(format!("expected a 2-D array, got shape {}", shape)),
    }
}

/// Extracts the raw value text for `key` from the Python dict literal.
fn dict_value<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let start = text
        .find(&format!("'{}'", key))
        .or_else(|| text.find(&format!("\"{}\"", key)))?;
    let rest = &text[start + key.len() + 2..];
    let rest = rest.trim_start().strip_prefix(':')?.trim_start();
    let end = if rest.starts_with('(') {
        rest.find(')')? + 1
    } else {
        rest.find(',').or_else(|| rest.find('}'))?
    };
    Some(rest[..end].trim())
}
