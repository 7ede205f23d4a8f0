use anyhow::{Context, Result};
use csv::{Writer, WriterBuilder};
use serde::Serialize;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::render::{RenderFrame, RenderSink};

pub const OUTPUT_SCHEMA_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub schema_version: String,
    pub source: String,
    pub path_shape: String,
    pub frames: usize,
    pub seed: u64,
    pub rms_err_raw: f64,
    pub rms_err_stabilized: f64,
    pub tracking_frames: u64,
    pub holding_frames: u64,
    pub recentering_frames: u64,
}

fn fmt_f64(v: f64) -> String {
    format!("{v:.10}")
}

pub fn ensure_outdir(outdir: &Path) -> Result<()> {
    fs::create_dir_all(outdir)
        .with_context(|| format!("failed to create output directory: {}", outdir.display()))
}

/// Streams render frames into a CSV file, one row per frame
pub struct CsvFrameSink {
    wtr: Writer<File>,
    rows: usize,
}

impl CsvFrameSink {
    pub fn create(path: &Path) -> Result<Self> {
        let mut wtr = WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .with_context(|| format!("failed to open frames.csv for writing: {}", path.display()))?;

        let mut header: Vec<String> = [
            "timestamp_ms",
            "regime",
            "raw_valid",
            "raw_confidence",
            "x_m",
            "y_m",
            "z_m",
            "yaw_deg",
            "pitch_deg",
            "roll_deg",
            "confidence",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        header.extend((0..16).map(|i| format!("view_{i}")));
        header.extend((0..16).map(|i| format!("proj_{i}")));
        header.push("schema_version".to_string());
        wtr.write_record(&header)?;

        Ok(Self { wtr, rows: 0 })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn finish(mut self) -> Result<usize> {
        self.wtr.flush()?;
        Ok(self.rows)
    }
}

impl RenderSink for CsvFrameSink {
    fn submit(&mut self, frame: &RenderFrame) -> Result<()> {
        let pose = &frame.pose;
        let mut record = vec![
            pose.timestamp_ms.to_string(),
            frame.regime.as_str().to_string(),
            frame.raw.valid.to_string(),
            fmt_f64(frame.raw.confidence),
            fmt_f64(pose.position_m.x),
            fmt_f64(pose.position_m.y),
            fmt_f64(pose.position_m.z),
            fmt_f64(pose.yaw_pitch_roll_deg.x),
            fmt_f64(pose.yaw_pitch_roll_deg.y),
            fmt_f64(pose.yaw_pitch_roll_deg.z),
            fmt_f64(pose.confidence),
        ];
        record.extend(frame.state.view_matrix.iter().map(|&v| fmt_f64(v as f64)));
        record.extend(frame.state.proj_matrix.iter().map(|&v| fmt_f64(v as f64)));
        record.push(OUTPUT_SCHEMA_VERSION.to_string());
        self.wtr.write_record(&record)?;
        self.rows += 1;
        Ok(())
    }
}

pub fn write_manifest_json(outdir: &Path, manifest: &Manifest) -> Result<PathBuf> {
    let path = outdir.join("manifest.json");
    let payload = serde_json::to_string_pretty(manifest).context("failed to serialize manifest")?;
    fs::write(&path, payload)
        .with_context(|| format!("failed to write manifest: {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppSettings;
    use crate::pipeline::Pipeline;
    use crate::pose::Pose;
    use crate::source::ScriptedSource;
    use nalgebra::Vector3;

    #[test]
    fn test_csv_sink_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.csv");

        let poses = (0..4)
            .map(|i| Pose::at(i * 33, Vector3::new(0.0, 0.0, 0.7)))
            .collect();
        let mut pipeline =
            Pipeline::new(Box::new(ScriptedSource::new(poses)), &AppSettings::default()).unwrap();
        pipeline.start();

        let mut sink = CsvFrameSink::create(&path).unwrap();
        pipeline.run_into(&mut sink, 4).unwrap();
        assert_eq!(sink.finish().unwrap(), 4);

        let mut rdr = csv::ReaderBuilder::new().from_path(&path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(headers.len(), 11 + 32 + 1);
        assert_eq!(&headers[1], "regime");
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(&rows[0][1], "tracking");
        assert_eq!(&rows[3][0], "99");
    }

    #[test]
    fn test_manifest_written() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest {
            schema_version: OUTPUT_SCHEMA_VERSION.to_string(),
            source: "scripted".to_string(),
            path_shape: "orbit".to_string(),
            frames: 10,
            seed: 1,
            rms_err_raw: 0.01,
            rms_err_stabilized: 0.005,
            tracking_frames: 8,
            holding_frames: 2,
            recentering_frames: 0,
        };
        let path = write_manifest_json(dir.path(), &manifest).unwrap();
        let text = fs::read_to_string(path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["frames"], 10);
        assert_eq!(value["schema_version"], OUTPUT_SCHEMA_VERSION);
    }
}
