//! Streaming reader for origin-destination tables
//!
//! LODES OD files are distributed as `*.csv.gz` and run to tens of millions
//! of rows for a large state. [`FlowSource`] decodes them in a single forward
//! pass and never buffers more than the current row.

use super::discard::RowError;
use super::identifier::IdentifierNormalizer;
use super::record::FlowRecord;
use crate::config::ColumnMapping;
use crate::error::{FlowError, Result};
use csv::StringRecord;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Open a file, transparently decompressing it when it carries the gzip magic
pub(crate) fn open_decoded(path: &Path) -> io::Result<Box<dyn Read + Send>> {
    let file = File::open(path)?;
    let mut buffered = BufReader::new(file);
    let is_gzip = buffered.fill_buf()?.starts_with(&GZIP_MAGIC);

    if is_gzip {
        debug!("Reading {} as gzip", path.display());
        Ok(Box::new(MultiGzDecoder::new(buffered)))
    } else {
        Ok(Box::new(buffered))
    }
}

/// Positions of the mapped columns within the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnIndices {
    pub home: usize,
    pub work: usize,
    pub measure: usize,
}

impl ColumnIndices {
    pub fn resolve(
        headers: &StringRecord,
        mapping: &ColumnMapping,
        path: Option<&Path>,
    ) -> Result<Self> {
        let find = |column: &str| -> Result<usize> {
            headers
                .iter()
                .position(|h| h.trim() == column)
                .ok_or_else(|| {
                    let available: Vec<String> = headers.iter().map(str::to_string).collect();
                    FlowError::missing_column(column, &available, path)
                })
        };

        Ok(Self {
            home: find(&mapping.home)?,
            work: find(&mapping.work)?,
            measure: find(&mapping.measure)?,
        })
    }
}

/// Outcome of reading one data row
#[derive(Debug)]
pub enum SourceRow {
    Record(FlowRecord),
    Discarded(RowError),
}

/// Single-pass iterator over the rows of a flow table
///
/// Yields `Err` only for fatal conditions (I/O or decompression failure),
/// after which the iterator is exhausted. Malformed rows come through as
/// [`SourceRow::Discarded`].
pub struct FlowSource<R: Read> {
    reader: csv::Reader<R>,
    headers: StringRecord,
    indices: ColumnIndices,
    mapping: ColumnMapping,
    normalizer: IdentifierNormalizer,
    path: Option<PathBuf>,
    row: u64,
    done: bool,
}

impl FlowSource<Box<dyn Read + Send>> {
    /// Open a (possibly gzip-compressed) CSV file
    pub fn open(
        path: impl AsRef<Path>,
        mapping: &ColumnMapping,
        normalizer: IdentifierNormalizer,
    ) -> Result<Self> {
        let path = path.as_ref();
        let input = open_decoded(path).map_err(|e| {
            FlowError::source_unreadable(Some(path), "cannot open flow table").with_source(e)
        })?;
        Self::from_reader(input, mapping, normalizer, Some(path.to_path_buf()))
    }
}

impl<R: Read> FlowSource<R> {
    /// Wrap an already-decoded CSV stream
    ///
    /// The header is read immediately so a missing column fails before any
    /// data row is consumed.
    pub fn from_reader(
        input: R,
        mapping: &ColumnMapping,
        normalizer: IdentifierNormalizer,
        path: Option<PathBuf>,
    ) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(input);

        let headers = reader.headers().cloned().map_err(|e| {
            FlowError::source_unreadable(path.as_deref(), "cannot read header").with_source(e)
        })?;
        let indices = ColumnIndices::resolve(&headers, mapping, path.as_deref())?;
        debug!(
            "Resolved columns home={} work={} measure={} in {} header fields",
            indices.home,
            indices.work,
            indices.measure,
            headers.len()
        );

        Ok(Self {
            reader,
            headers,
            indices,
            mapping: mapping.clone(),
            normalizer,
            path,
            row: 0,
            done: false,
        })
    }

    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Data rows consumed so far (header excluded)
    pub fn rows_read(&self) -> u64 {
        self.row
    }

    fn parse_row(&self, fields: StringRecord) -> std::result::Result<FlowRecord, RowError> {
        let row = self.row;
        let field = |index: usize, column: &str| {
            fields
                .get(index)
                .map(str::to_string)
                .ok_or_else(|| RowError::MissingField {
                    row,
                    column: column.to_string(),
                })
        };

        let home_raw = field(self.indices.home, &self.mapping.home)?;
        let work_raw = field(self.indices.work, &self.mapping.work)?;
        let measure_raw = field(self.indices.measure, &self.mapping.measure)?;

        let home = self
            .normalizer
            .parse(&home_raw)
            .map_err(|source| RowError::Identifier {
                row,
                column: self.mapping.home.clone(),
                source,
            })?;
        let work = self
            .normalizer
            .parse(&work_raw)
            .map_err(|source| RowError::Identifier {
                row,
                column: self.mapping.work.clone(),
                source,
            })?;
        let measure = parse_measure(&measure_raw).ok_or_else(|| RowError::InvalidMeasure {
            row,
            column: self.mapping.measure.clone(),
            value: measure_raw.clone(),
        })?;

        Ok(FlowRecord::new(row, home, work, measure, fields))
    }
}

impl<R: Read> Iterator for FlowSource<R> {
    type Item = Result<SourceRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut fields = StringRecord::new();
        match self.reader.read_record(&mut fields) {
            Ok(false) => {
                self.done = true;
                None
            }
            Ok(true) => {
                self.row += 1;
                Some(Ok(match self.parse_row(fields) {
                    Ok(record) => SourceRow::Record(record),
                    Err(err) => SourceRow::Discarded(err),
                }))
            }
            Err(err) if err.is_io_error() => {
                self.done = true;
                Some(Err(FlowError::source_unreadable(
                    self.path.as_deref(),
                    "read or decompression failed",
                )
                .at_row(self.row + 1)
                .with_source(err)))
            }
            Err(err) => {
                self.row += 1;
                Some(Ok(SourceRow::Discarded(RowError::MalformedCsv {
                    row: self.row,
                    message: err.to_string(),
                })))
            }
        }
    }
}

/// Parse a job count: a non-negative integer, or an integer-valued float
pub fn parse_measure(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<u64>() {
        return Some(value);
    }

    let value: f64 = trimmed.parse().ok()?;
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value < u64::MAX as f64 {
        Some(value as u64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::discard::DiscardKind;
    use crate::flow::identifier::LocationId;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    const OD_HEADER: &str =
        "w_geocode,h_geocode,S000,SA01,SA02,SA03,SE01,SE02,SE03,SI01,SI02,SI03,createdate";

    fn od_source(body: &str) -> FlowSource<Cursor<Vec<u8>>> {
        let data = format!("{}\n{}", OD_HEADER, body);
        FlowSource::from_reader(
            Cursor::new(data.into_bytes()),
            &ColumnMapping::default(),
            IdentifierNormalizer::default(),
            None,
        )
        .unwrap()
    }

    fn collect(source: FlowSource<Cursor<Vec<u8>>>) -> (Vec<FlowRecord>, Vec<RowError>) {
        let mut records = Vec::new();
        let mut discards = Vec::new();
        for item in source {
            match item.unwrap() {
                SourceRow::Record(r) => records.push(r),
                SourceRow::Discarded(e) => discards.push(e),
            }
        }
        (records, discards)
    }

    #[test]
    fn test_reads_lodes_od_rows() {
        let source = od_source(
            "480219501001000,480219501002000,3,1,1,1,0,2,1,0,1,2,20230101\n\
             480219501001001,480219501002000,1,0,1,0,0,0,1,0,0,1,20230101\n",
        );
        let (records, discards) = collect(source);

        assert!(discards.is_empty());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].row, 1);
        assert_eq!(records[0].home, LocationId::new(480219501002000));
        assert_eq!(records[0].work, LocationId::new(480219501001000));
        assert_eq!(records[0].measure, 3);
        assert_eq!(records[0].fields().len(), 13);
        assert_eq!(&records[0].fields()[12], "20230101");
    }

    #[test]
    fn test_malformed_rows_are_discarded_not_fatal() {
        let source = od_source(
            "100,200,3,0,0,0,0,0,0,0,0,0,20230101\n\
             abc,200,3,0,0,0,0,0,0,0,0,0,20230101\n\
             100,200.5,3,0,0,0,0,0,0,0,0,0,20230101\n\
             100,200,-4,0,0,0,0,0,0,0,0,0,20230101\n\
             100,200,many,0,0,0,0,0,0,0,0,0,20230101\n\
             100,200\n\
             300,400,2.0,0,0,0,0,0,0,0,0,0,20230101\n",
        );
        let (records, discards) = collect(source);

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].measure, 2);
        assert_eq!(records[1].row, 7);

        let kinds: Vec<DiscardKind> = discards.iter().map(RowError::kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiscardKind::UnparseableIdentifier,
                DiscardKind::IdentifierPrecision,
                DiscardKind::InvalidMeasure,
                DiscardKind::InvalidMeasure,
                DiscardKind::MissingField,
            ]
        );
        assert_eq!(discards[0].row(), 2);
    }

    #[test]
    fn test_invalid_utf8_row_is_discarded_and_reading_continues() {
        let mut data = b"w_geocode,h_geocode,S000\n100,200,3\n300,1".to_vec();
        data.push(0xff);
        data.extend_from_slice(b"0,5\n200,300,7\n");
        let source = FlowSource::from_reader(
            Cursor::new(data),
            &ColumnMapping::default(),
            IdentifierNormalizer::default(),
            None,
        )
        .unwrap();
        let (records, discards) = collect(source);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].row, 1);
        assert_eq!(records[1].row, 3);
        assert_eq!(records[1].measure, 7);

        assert_eq!(discards.len(), 1);
        assert_eq!(discards[0].kind(), DiscardKind::MalformedCsv);
        assert_eq!(discards[0].row(), 2);
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let mapping = ColumnMapping {
            measure: "S999".to_string(),
            ..ColumnMapping::default()
        };
        let result = FlowSource::from_reader(
            Cursor::new(format!("{}\n", OD_HEADER).into_bytes()),
            &mapping,
            IdentifierNormalizer::default(),
            None,
        );
        let err = result.err().unwrap();
        assert_eq!(err.code(), crate::error::ErrorCode::SOURCE_MISSING_COLUMN);
        assert!(err.to_string().contains("S999"));
    }

    #[test]
    fn test_header_only_source_is_empty() {
        let (records, discards) = collect(od_source(""));
        assert!(records.is_empty());
        assert!(discards.is_empty());
    }

    #[test]
    fn test_open_gzip_and_plain_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let body = format!("{}\n100,200,4,0,0,0,0,0,0,0,0,0,20230101\n", OD_HEADER);

        let gz_path = dir.path().join("tx_od_main_JT00_2021.csv.gz");
        let mut encoder = GzEncoder::new(File::create(&gz_path).unwrap(), Compression::default());
        encoder.write_all(body.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let plain_path = dir.path().join("od.csv");
        std::fs::write(&plain_path, &body).unwrap();

        for path in [&gz_path, &plain_path] {
            let source = FlowSource::open(
                path,
                &ColumnMapping::default(),
                IdentifierNormalizer::default(),
            )
            .unwrap();
            let rows: Vec<_> = source.map(|r| r.unwrap()).collect();
            assert_eq!(rows.len(), 1);
            assert!(matches!(&rows[0], SourceRow::Record(r) if r.measure == 4));
        }
    }

    #[test]
    fn test_corrupt_gzip_is_unreadable() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.csv.gz");
        // Valid gzip header followed by a deflate block of reserved type
        let bytes = [
            0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0xff, 0xff, 0xff, 0xff,
        ];
        std::fs::write(&path, bytes).unwrap();

        let err = FlowSource::open(
            &path,
            &ColumnMapping::default(),
            IdentifierNormalizer::default(),
        )
        .err()
        .unwrap();
        assert_eq!(err.code(), crate::error::ErrorCode::SOURCE_UNREADABLE);
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let err = FlowSource::open(
            "/nonexistent/od.csv.gz",
            &ColumnMapping::default(),
            IdentifierNormalizer::default(),
        )
        .err()
        .unwrap();
        assert_eq!(err.code(), crate::error::ErrorCode::SOURCE_UNREADABLE);
    }

    #[test]
    fn test_parse_measure() {
        assert_eq!(parse_measure("12"), Some(12));
        assert_eq!(parse_measure(" 3.0 "), Some(3));
        assert_eq!(parse_measure("-1"), None);
        assert_eq!(parse_measure("1.5"), None);
        assert_eq!(parse_measure(""), None);
    }
}
