use csv::{Reader, ReaderBuilder, StringRecord, Terminator, Trim};
use serde::Serialize;
use std::{fmt, io, io::Read};
use super::error::UploadError;

const LATITUDE_COLUMN: usize = 0;
const LONGITUDE_COLUMN: usize = 1;

// a (latitude, longitude) pair, serialised the way Firestore expects a LatLng
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

// whole numbers keep their fraction, e.g. (37.0, 127.0)
impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?}, {:?})", self.latitude, self.longitude)
    }
}

// rows have no header and may carry extra columns after the coordinates.
// only \n ends a row so a trailing \r is trimmed with the field and line numbers stay exact
fn location_reader<R: Read>(reader: R) -> Reader<R> {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .terminator(Terminator::Any(b'\n'))
        .from_reader(reader)
}

// streams points out of a csv source; an empty line is a row without coordinates
pub struct LocationRows<R> {
    reader: Reader<BlankLineDetector<R>>,
    record: StringRecord,
}

impl<R: Read> LocationRows<R> {
    pub fn new(reader: R) -> LocationRows<R> {
        LocationRows {
            reader: location_reader(BlankLineDetector::new(reader)),
            record: StringRecord::new(),
        }
    }

    pub fn next_point(&mut self) -> Result<Option<GeoPoint>, UploadError> {
        let found = self.reader.read_record(&mut self.record)?;

        // the csv reader skips empty lines, so check whether it has just stepped over one
        if let Some(line) = self.reader.get_ref().blank_line {
            if self.reader.position().line() > line {
                return Err(UploadError::MissingField {
                    line: line,
                    expected: LONGITUDE_COLUMN + 1,
                    found: 0,
                });
            }
        }

        if !found {
            return Ok(None);
        }
        parse_point(&self.record).map(Some)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FieldState {
    Start,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

// passes bytes through and remembers the first empty line outside a quoted field
struct BlankLineDetector<R> {
    inner: R,
    line: u64,
    at_line_start: bool,
    field: FieldState,
    blank_line: Option<u64>,
}

impl<R> BlankLineDetector<R> {
    fn new(inner: R) -> BlankLineDetector<R> {
        BlankLineDetector {
            inner: inner,
            line: 1,
            at_line_start: true,
            field: FieldState::Start,
            blank_line: None,
        }
    }

    fn scan(&mut self, byte: u8) {
        if self.field == FieldState::QuoteInQuoted {
            if byte == b'"' {
                self.field = FieldState::Quoted;
                return;
            }
            self.field = FieldState::Unquoted;
        }

        if self.field == FieldState::Quoted {
            match byte {
                b'"' => self.field = FieldState::QuoteInQuoted,
                b'\n' => self.line += 1,
                _ => {}
            }
            return;
        }

        match byte {
            b'\n' => {
                if self.at_line_start && self.blank_line.is_none() {
                    self.blank_line = Some(self.line);
                }
                self.line += 1;
                self.at_line_start = true;
                self.field = FieldState::Start;
            }
            // a lone \r does not make a line non-empty
            b'\r' => {}
            b'"' if self.field == FieldState::Start => {
                self.field = FieldState::Quoted;
                self.at_line_start = false;
            }
            b',' => {
                self.field = FieldState::Start;
                self.at_line_start = false;
            }
            _ => {
                self.field = FieldState::Unquoted;
                self.at_line_start = false;
            }
        }
    }
}

impl<R: Read> Read for BlankLineDetector<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = self.inner.read(buf)?;
        for &byte in &buf[..count] {
            self.scan(byte);
        }
        Ok(count)
    }
}

// column 0 is latitude, column 1 is longitude, anything after is ignored
pub fn parse_point(record: &StringRecord) -> Result<GeoPoint, UploadError> {
    let line = record.position().map(|p| p.line()).unwrap_or_default();

    if record.len() <= LONGITUDE_COLUMN {
        return Err(UploadError::MissingField {
            line: line,
            expected: LONGITUDE_COLUMN + 1,
            found: record.len(),
        });
    }

    Ok(GeoPoint {
        latitude: parse_coordinate(record, LATITUDE_COLUMN, "latitude", line)?,
        longitude: parse_coordinate(record, LONGITUDE_COLUMN, "longitude", line)?,
    })
}

// JSON has no representation for NaN or infinity, so those count as malformed
fn parse_coordinate(record: &StringRecord, index: usize, column: &'static str, line: u64) -> Result<f64, UploadError> {
    let text = record.get(index).unwrap_or_default();

    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(UploadError::InvalidNumber {
            line: line,
            column: column,
            value: text.to_owned(),
        }),
    }
}
