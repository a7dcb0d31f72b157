//! Best-effort side channels: scalar metrics and prediction diagnostics.
//!
//! Hook errors never reach the training loop. The orchestrator logs them and
//! carries on.

use crate::data::FrameworkMeta;
use crate::persistence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Receiver of named per-epoch scalars.
pub trait MetricsHook {
    fn add_scalar(&mut self, tag: &str, value: f64, epoch: usize) -> anyhow::Result<()>;

    /// Flush and release resources.
    fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Receiver of decoded predictions for rendering.
pub trait VisualizationHook {
    fn render(
        &mut self,
        sample: &FrameworkMeta,
        predicted: &[u32],
        label: &str,
    ) -> anyhow::Result<()>;
}

/// Hook that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHook;

impl MetricsHook for NullHook {
    fn add_scalar(&mut self, _tag: &str, _value: f64, _epoch: usize) -> anyhow::Result<()> {
        Ok(())
    }
}

impl VisualizationHook for NullHook {
    fn render(&mut self, _: &FrameworkMeta, _: &[u32], _: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// One line of the scalar event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarEvent {
    pub run_id: Uuid,
    pub tag: String,
    pub value: f64,
    pub epoch: usize,
    pub recorded_at: DateTime<Utc>,
}

/// JSON-lines scalar log in `<runs_dir>/scalars.jsonl`.
pub struct ScalarLog {
    run_id: Uuid,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl ScalarLog {
    pub const FILE_NAME: &'static str = "scalars.jsonl";

    /// Clear `runs_dir` and start a new log in it.
    pub fn create(runs_dir: &Path) -> anyhow::Result<Self> {
        persistence::reset_dir(runs_dir)?;
        let path = runs_dir.join(Self::FILE_NAME);
        let file = File::create(&path)?;
        Ok(Self {
            run_id: Uuid::new_v4(),
            path,
            writer: Some(BufWriter::new(file)),
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse a scalar log written by [`ScalarLog`].
    pub fn read(path: &Path) -> anyhow::Result<Vec<ScalarEvent>> {
        let reader = BufReader::new(File::open(path)?);
        let mut events = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(&line)?);
        }
        Ok(events)
    }
}

impl MetricsHook for ScalarLog {
    fn add_scalar(&mut self, tag: &str, value: f64, epoch: usize) -> anyhow::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("scalar log {} is closed", self.path.display()))?;
        let event = ScalarEvent {
            run_id: self.run_id,
            tag: tag.to_string(),
            value,
            epoch,
            recorded_at: Utc::now(),
        };
        serde_json::to_writer(&mut *writer, &event)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

/// One rendered prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub label: String,
    pub framework: FrameworkMeta,
    pub predicted: Vec<u32>,
}

/// Appends predictions as JSON lines for offline rendering.
#[derive(Debug, Clone)]
pub struct PredictionLog {
    path: PathBuf,
}

impl PredictionLog {
    pub const FILE_NAME: &'static str = "predictions.jsonl";

    pub fn new(log_root: &Path) -> Self {
        Self {
            path: log_root.join(Self::FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl VisualizationHook for PredictionLog {
    fn render(
        &mut self,
        sample: &FrameworkMeta,
        predicted: &[u32],
        label: &str,
    ) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let record = PredictionRecord {
            label: label.to_string(),
            framework: sample.clone(),
            predicted: predicted.to_vec(),
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        file.write_all(&line)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scalar_log_clears_runs_dir() {
        let dir = TempDir::new().unwrap();
        let runs = dir.path().join("runs");
        std::fs::create_dir_all(&runs).unwrap();
        std::fs::write(runs.join("events.old"), b"stale").unwrap();

        let log = ScalarLog::create(&runs).unwrap();
        assert!(!runs.join("events.old").exists());
        assert!(log.path().exists());
    }

    #[test]
    fn test_scalar_log_write_and_read() {
        let dir = TempDir::new().unwrap();
        let mut log = ScalarLog::create(&dir.path().join("runs")).unwrap();
        log.add_scalar("loss/train", 1.5, 1).unwrap();
        log.add_scalar("loss/valid", 2.5, 1).unwrap();
        log.close().unwrap();

        let events = ScalarLog::read(log.path()).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].tag, "loss/valid");
        assert_eq!(events[1].value, 2.5);
        assert!(events.iter().all(|e| e.run_id == log.run_id()));
    }

    #[test]
    fn test_scalar_log_rejects_writes_after_close() {
        let dir = TempDir::new().unwrap();
        let mut log = ScalarLog::create(&dir.path().join("runs")).unwrap();
        log.close().unwrap();
        assert!(log.add_scalar("loss/train", 1.0, 1).is_err());
    }

    #[test]
    fn test_prediction_log_appends() {
        let dir = TempDir::new().unwrap();
        let mut hook = PredictionLog::new(dir.path());
        let meta = FrameworkMeta {
            name: "login_form".into(),
            labels: vec!["button".into(), "input".into()],
        };
        hook.render(&meta, &[3, 1, 4], "epoch_1_").unwrap();
        hook.render(&meta, &[1, 5], "epoch_2_").unwrap();

        let content = std::fs::read_to_string(hook.path()).unwrap();
        let records: Vec<PredictionRecord> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].predicted, vec![3, 1, 4]);
        assert_eq!(records[1].label, "epoch_2_");
    }
}
