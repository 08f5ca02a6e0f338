//! Line-oriented CSV record source (C3): validates the mandatory header once
//! at open time, then yields one validated 7-field record per line. A
//! malformed record is counted and skipped; it never stops the reader.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub const EXPECTED_HEADER: &str = "date,time,area,residence,age,gender,population";

#[derive(Debug, thiserror::Error)]
pub enum CsvError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("header line `{found}` does not match the required `{EXPECTED_HEADER}`")]
    BadHeader { found: String },

    #[error("line {line}: expected 6 commas, found {found}")]
    WrongFieldCount { line: usize, found: usize },

    #[error("line {line}: field `{field}` is not a valid base-10 integer: `{value}`")]
    BadInteger {
        line: usize,
        field: &'static str,
        value: String,
    },
}

pub type CsvResult<T> = Result<T, CsvError>;

/// A validated 7-field population record. `residence`, `age`, and `gender`
/// are carried through as sentinel `-1` in the supported flavor and are not
/// used as keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub date: u32,
    pub time: u16,
    pub area: u32,
    pub residence: i32,
    pub age: i32,
    pub gender: i32,
    pub population: i32,
}

pub enum NextItem {
    Record(Record),
    End,
}

pub struct CsvReader {
    lines: std::io::Lines<BufReader<File>>,
    line_number: usize,
}

impl CsvReader {
    /// Opens `path` and validates the mandatory header line. A mismatched
    /// or missing header is fatal.
    pub fn open(path: impl AsRef<Path>) -> CsvResult<Self> {
        let file = File::open(path)?;
        let mut lines = BufReader::new(file).lines();
        let header = lines
            .next()
            .transpose()?
            .ok_or_else(|| CsvError::BadHeader {
                found: String::new(),
            })?;
        if header.trim_end_matches(['\r', '\n']) != EXPECTED_HEADER {
            return Err(CsvError::BadHeader { found: header });
        }
        Ok(Self {
            lines,
            line_number: 1,
        })
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Returns the next record, `NextItem::End` at EOF, or a recoverable
    /// `CsvError` for one malformed line -- the caller is expected to call
    /// `next` again to keep reading.
    pub fn next(&mut self) -> CsvResult<NextItem> {
        let Some(line) = self.lines.next().transpose()? else {
            return Ok(NextItem::End);
        };
        self.line_number += 1;
        let line = line.trim_end_matches(['\r', '\n']);
        parse_record(line, self.line_number).map(NextItem::Record)
    }
}

fn parse_record(line: &str, line_number: usize) -> CsvResult<Record> {
    let comma_count = line.bytes().filter(|&b| b == b',').count();
    if comma_count != 6 {
        return Err(CsvError::WrongFieldCount {
            line: line_number,
            found: comma_count,
        });
    }

    let mut fields = line.splitn(7, ',');
    let date = parse_field(&mut fields, "date", line_number)?;
    let time = parse_field(&mut fields, "time", line_number)?;
    let area = parse_field(&mut fields, "area", line_number)?;
    let residence = parse_field(&mut fields, "residence", line_number)?;
    let age = parse_field(&mut fields, "age", line_number)?;
    let gender = parse_field(&mut fields, "gender", line_number)?;
    let population = parse_field(&mut fields, "population", line_number)?;

    Ok(Record {
        date,
        time,
        area,
        residence,
        age,
        gender,
        population,
    })
}

fn parse_field<T: std::str::FromStr>(
    fields: &mut std::str::SplitN<'_, char>,
    name: &'static str,
    line_number: usize,
) -> CsvResult<T> {
    let raw = fields.next().unwrap_or_default();
    raw.trim().parse().map_err(|_| CsvError::BadInteger {
        line: line_number,
        field: name,
        value: raw.to_string(),
    })
}
