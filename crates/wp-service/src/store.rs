//! CSV persistence for road segments.
//!
//! Both writers produce the roads CSV format read by
//! [`load_roads_reader`](crate::load_roads_reader), so a journal can be
//! replayed with [`apply_repair_journal`](crate::apply_repair_journal) and a
//! full dump can be loaded as the next run's input.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use csv::{Writer, WriterBuilder};

use wp_spatial::{RoadSegment, SpatialError, SpatialResult, TopologyStore};

use crate::LoadResult;

const HEADER: [&str; 10] = [
    "id", "source", "target", "cost", "reverse_cost", "oneway", "name", "fclass", "excluded", "geometry",
];

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

fn write_segment<W: Write>(writer: &mut Writer<W>, seg: &RoadSegment) -> csv::Result<()> {
    let coords: Vec<[f64; 2]> = seg.geometry.iter().map(|p| p.lon_lat()).collect();
    let geometry = serde_json::to_string(&coords).map_err(|e| csv::Error::from(std::io::Error::other(e)))?;
    writer.write_record(&[
        seg.id.0.to_string(),
        opt(seg.source.map(|v| v.0)),
        opt(seg.target.map(|v| v.0)),
        opt(seg.cost),
        opt(seg.reverse_cost),
        seg.oneway.code().to_owned(),
        seg.name.clone().unwrap_or_default(),
        seg.fclass.clone().unwrap_or_default(),
        (seg.excluded as u8).to_string(),
        geometry,
    ])
}

/// Write every segment in `segments` to `writer` with a header row.
pub fn write_roads_csv<W: Write>(writer: W, segments: &[RoadSegment]) -> LoadResult<()> {
    let mut out = Writer::from_writer(writer);
    out.write_record(HEADER)?;
    for seg in segments {
        write_segment(&mut out, seg)?;
    }
    out.flush()?;
    Ok(())
}

// ── CsvTopologyStore ──────────────────────────────────────────────────────────

/// Append-only journal of repaired segments.
///
/// Every [`persist`](TopologyStore::persist) appends one full row and
/// flushes, so a crash mid-repair loses at most the segment being written.
/// The header is written only when the file is new or empty.
pub struct CsvTopologyStore {
    path:   PathBuf,
    writer: Writer<File>,
    rows:   usize,
}

impl CsvTopologyStore {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: &Path) -> LoadResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let fresh = file.metadata()?.len() == 0;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if fresh {
            writer.write_record(HEADER)?;
            writer.flush()?;
        }
        log::debug!("repair journal {} opened ({})", path.display(), if fresh { "new" } else { "append" });
        Ok(Self { path: path.to_path_buf(), writer, rows: 0 })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended through this handle.
    pub fn rows_written(&self) -> usize {
        self.rows
    }
}

impl TopologyStore for CsvTopologyStore {
    fn persist(&mut self, segment: &RoadSegment) -> SpatialResult<()> {
        write_segment(&mut self.writer, segment)
            .and_then(|()| self.writer.flush().map_err(csv::Error::from))
            .map_err(|e| SpatialError::Store(format!("{}: {e}", self.path.display())))?;
        self.rows += 1;
        Ok(())
    }
}
