#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tempfile::{TempDir, tempdir};
use trip_loader::config::IngestConfig;
use trip_loader::store;

pub const HEADER: &str = "VendorID,tpep_pickup_datetime,tpep_dropoff_datetime,passenger_count,trip_distance,store_and_fwd_flag,PULocationID,DOLocationID,fare_amount,tip_amount";

/// Scratch directory holding a destination database and a quarantine file.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory with an initialized destination table.
    pub fn new() -> Self {
        let workspace = Self {
            temp_dir: tempdir().expect("temp dir"),
        };
        let conn = workspace.connect();
        store::ensure_destination(&conn, "trip_records").expect("create destination");
        workspace
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn database(&self) -> PathBuf {
        self.path().join("trips.db")
    }

    pub fn duplicates(&self) -> PathBuf {
        self.path().join("duplicates.csv")
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Configuration pointing at this workspace with timestamps read as UTC+2.
    pub fn config(&self) -> IngestConfig {
        let mut config = IngestConfig::default();
        config.destination.database = self.database();
        config.quarantine.path = self.duplicates();
        config.timestamps.source_zone = "+02:00".to_string();
        config
    }

    pub fn connect(&self) -> Connection {
        Connection::open(self.database()).expect("open database")
    }

    pub fn row_count(&self) -> i64 {
        store::row_count(&self.connect(), "trip_records").expect("count rows")
    }

    /// Seeds the destination with `count` placeholder rows.
    pub fn seed(&self, count: usize) {
        let conn = self.connect();
        for idx in 0..count {
            conn.execute(
                "INSERT INTO trip_records (tpep_pickup_datetime, tpep_dropoff_datetime, passenger_count, trip_distance, store_and_fwd_flag, PULocationID, DOLocationID, fare_amount, tip_amount) VALUES ('2020-01-01 00:00:00', '2020-01-01 00:10:00', ?1, 1.0, 'No', 1, 2, 5.0, 0.0)",
                [idx as i64],
            )
            .expect("seed row");
        }
    }

    pub fn duplicates_contents(&self) -> String {
        std::fs::read_to_string(self.duplicates()).expect("read duplicates file")
    }
}

/// Builds a CSV body with the standard header and the given data lines.
pub fn csv(lines: &[&str]) -> String {
    let mut body = String::from(HEADER);
    body.push('\n');
    for line in lines {
        body.push_str(line);
        body.push('\n');
    }
    body
}
