//! Result tables and where they end up.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use pupil_bench_core::{Ellipse, ScalePolicy};
use pupil_bench_datasets::{AngleConvention, GroundTruth};
use serde::{Deserialize, Serialize};

use crate::{MethodTag, SinkError};

/// One row per (frame, detector, scale policy).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    pub group: String,
    pub clip: String,
    pub frame: usize,
    pub method: MethodTag,
    pub ground_truth: GroundTruth,
    pub confidence: f64,
    /// Detector ellipse in source-image pixels.
    #[serde(flatten)]
    pub ellipse: Ellipse,
    /// Seconds spent inside the detector call.
    pub detection_time: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableHeader {
    pub method: MethodTag,
    pub dataset: String,
    pub detector: String,
    pub scale: String,
    pub scale_policy: ScalePolicy,
    pub host: String,
    pub angle_convention: AngleConvention,
    pub record_count: usize,
}

/// Append-only table for one method tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    header: TableHeader,
    records: Vec<BenchmarkRecord>,
}

impl ResultTable {
    pub fn new(mut header: TableHeader) -> Self {
        header.record_count = 0;
        Self {
            header,
            records: Vec::new(),
        }
    }

    pub fn append(&mut self, record: BenchmarkRecord) {
        self.records.push(record);
        self.header.record_count = self.records.len();
    }

    pub fn header(&self) -> &TableHeader {
        &self.header
    }

    pub fn method(&self) -> &MethodTag {
        &self.header.method
    }

    pub fn records(&self) -> &[BenchmarkRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Destination for finished tables, one artifact per method tag.
pub trait TableStore {
    /// Persist `table`, replacing any earlier artifact with the same tag.
    fn persist(&mut self, table: &ResultTable) -> Result<(), SinkError>;

    fn load(&self, method: &MethodTag) -> Result<Option<ResultTable>, SinkError>;
}

/// Writes `<output_dir>/<method_tag>.json`.
#[derive(Clone, Debug)]
pub struct JsonTableStore {
    output_dir: PathBuf,
}

impl JsonTableStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn path_for(&self, method: &MethodTag) -> PathBuf {
        self.output_dir.join(format!("{method}.json"))
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SinkError + '_ {
    move |source| SinkError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl TableStore for JsonTableStore {
    fn persist(&mut self, table: &ResultTable) -> Result<(), SinkError> {
        fs::create_dir_all(&self.output_dir).map_err(io_err(&self.output_dir))?;
        let path = self.path_for(table.method());
        let json = serde_json::to_vec_pretty(table)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.output_dir)
            .map_err(io_err(&self.output_dir))?;
        tmp.write_all(&json).map_err(io_err(tmp.path()))?;
        tmp.as_file().sync_all().map_err(io_err(&path))?;
        tmp.persist(&path).map_err(|source| SinkError::Persist {
            path: path.clone(),
            source,
        })?;
        log::info!("wrote {} record(s) to {}", table.len(), path.display());
        Ok(())
    }

    fn load(&self, method: &MethodTag) -> Result<Option<ResultTable>, SinkError> {
        let path = self.path_for(method);
        if !path.is_file() {
            return Ok(None);
        }
        let raw = fs::read(&path).map_err(io_err(&path))?;
        Ok(Some(serde_json::from_slice(&raw)?))
    }
}

/// Keeps tables in memory; handy for dry runs and tests.
#[derive(Clone, Debug, Default)]
pub struct MemoryTableStore {
    tables: BTreeMap<MethodTag, ResultTable>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tables(&self) -> impl Iterator<Item = &ResultTable> {
        self.tables.values()
    }

    pub fn get(&self, method: &MethodTag) -> Option<&ResultTable> {
        self.tables.get(method)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl TableStore for MemoryTableStore {
    fn persist(&mut self, table: &ResultTable) -> Result<(), SinkError> {
        self.tables.insert(table.method().clone(), table.clone());
        Ok(())
    }

    fn load(&self, method: &MethodTag) -> Result<Option<ResultTable>, SinkError> {
        Ok(self.tables.get(method).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(method: &MethodTag) -> TableHeader {
        TableHeader {
            method: method.clone(),
            dataset: "lpw".into(),
            detector: "dark".into(),
            scale: "orig".into(),
            scale_policy: ScalePolicy::Identity,
            host: "h".into(),
            angle_convention: AngleConvention::NotApplicable,
            record_count: 99,
        }
    }

    fn record(method: &MethodTag, frame: usize) -> BenchmarkRecord {
        BenchmarkRecord {
            group: "1".into(),
            clip: "a".into(),
            frame,
            method: method.clone(),
            ground_truth: GroundTruth::Point {
                values: vec![1.0, 2.0],
            },
            confidence: 0.5,
            ellipse: Ellipse::new([3.0, 4.0], [5.0, 6.0], 7.0),
            detection_time: 0.001,
        }
    }

    #[test]
    fn header_count_tracks_appends() {
        let tag = MethodTag::new("lpw", "orig", "h", "dark").expect("tag");
        let mut table = ResultTable::new(header(&tag));
        assert_eq!(table.header().record_count, 0);
        table.append(record(&tag, 0));
        table.append(record(&tag, 1));
        assert_eq!(table.header().record_count, 2);
        assert_eq!(table.records()[1].frame, 1);
    }

    #[test]
    fn json_store_replaces_existing_artifact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tag = MethodTag::new("lpw", "orig", "h", "dark").expect("tag");
        let mut store = JsonTableStore::new(dir.path().join("out"));

        let mut first = ResultTable::new(header(&tag));
        first.append(record(&tag, 0));
        first.append(record(&tag, 1));
        store.persist(&first).expect("persist");

        let mut second = ResultTable::new(header(&tag));
        second.append(record(&tag, 0));
        store.persist(&second).expect("persist");

        let loaded = store.load(&tag).expect("load").expect("artifact");
        assert_eq!(loaded, second);
        let entries: Vec<_> = fs::read_dir(store.output_dir())
            .expect("read_dir")
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(entries.len(), 1);
        assert!(store.path_for(&tag).ends_with("benchmark.lpw.orig.h.dark.json"));
    }

    #[test]
    fn record_json_uses_flat_ellipse_columns() {
        let tag = MethodTag::new("lpw", "orig", "h", "dark").expect("tag");
        let value = serde_json::to_value(record(&tag, 3)).expect("json");
        assert_eq!(value["method"], "benchmark.lpw.orig.h.dark");
        assert_eq!(value["center"], serde_json::json!([3.0, 4.0]));
        assert_eq!(value["axes"], serde_json::json!([5.0, 6.0]));
        assert_eq!(value["angle"], 7.0);
        assert_eq!(value["ground_truth"]["kind"], "point");
    }
}
