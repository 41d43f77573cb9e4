//! Common test utilities and fixtures
#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Header of a LODES OD main/aux file
pub const OD_HEADER: &str =
    "w_geocode,h_geocode,S000,SA01,SA02,SA03,SE01,SE02,SE03,SI01,SI02,SI03,createdate";

/// Membership `{100, 200}`; rows `(home, work, measure)`
pub const SCENARIO_BLOCKS: [u64; 2] = [100, 200];
pub const SCENARIO_ROWS: [(u64, u64, u64); 3] = [(100, 300, 5), (300, 200, 7), (100, 200, 3)];

/// Temporary directory holding flow tables and block lists
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Gzip-compressed OD table; `(home, work, measure)` rows
    pub fn write_od_gz(&self, name: &str, rows: &[(u64, u64, u64)]) -> PathBuf {
        let body: String = rows.iter().map(|row| od_line(*row)).collect();
        self.write_gz(name, &format!("{}\n{}", OD_HEADER, body))
    }

    /// Gzip-compressed file with arbitrary content
    pub fn write_gz(&self, name: &str, content: &str) -> PathBuf {
        let path = self.join(name);
        let mut encoder = GzEncoder::new(
            File::create(&path).expect("create gzip fixture"),
            Compression::default(),
        );
        encoder
            .write_all(content.as_bytes())
            .expect("write gzip fixture");
        encoder.finish().expect("finish gzip fixture");
        path
    }

    pub fn write_text(&self, name: &str, content: &str) -> PathBuf {
        let path = self.join(name);
        std::fs::write(&path, content).expect("write fixture");
        path
    }

    /// Block list with a GEOID header
    pub fn write_blocks(&self, name: &str, ids: &[u64]) -> PathBuf {
        let body: String = ids.iter().map(|id| format!("{}\n", id)).collect();
        self.write_text(name, &format!("GEOID\n{}", body))
    }
}

/// One OD data line with plausible auxiliary columns
pub fn od_line((home, work, measure): (u64, u64, u64)) -> String {
    format!(
        "{},{},{},{},0,0,{},0,0,0,{},0,20230101\n",
        work, home, measure, measure, measure, measure
    )
}
