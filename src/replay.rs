//! 离线回放：从 JSONL 录制文件读取姿态帧，跑完整的校准与计数流程
//!
//! 每行一个 `PoseFrame`，例如 `{"timestampMs": 33, "pose": [...]}`。
//! 空行和无法解析的行会被跳过。

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::engine::calibration::{CalibrationProgress, CalibrationThresholds, Calibrator, FrameSource};
use crate::engine::config::EngineConfig;
use crate::engine::session::TrackingSession;
use crate::engine::types::PoseFrame;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Failed to read recording: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid engine config: {0}")]
    Config(String),
}

/// 按行读取的帧源
pub struct JsonlFrameSource<R> {
    lines: Lines<R>,
    line_no: usize,
    skipped: usize,
}

impl JsonlFrameSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> JsonlFrameSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            skipped: 0,
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<R: BufRead> Iterator for JsonlFrameSource<R> {
    type Item = PoseFrame;

    fn next(&mut self) -> Option<PoseFrame> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(line = self.line_no + 1, error = %e, "Stopping replay on read error");
                    return None;
                }
            };
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<PoseFrame>(trimmed) {
                Ok(frame) => return Some(frame),
                Err(e) => {
                    self.skipped += 1;
                    tracing::warn!(line = self.line_no, error = %e, "Skipping malformed frame");
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    pub frames: u64,
    pub missing_frames: u64,
    pub counter: u32,
    pub standing_angle: f64,
    pub squat_angle: f64,
    pub thresholds: CalibrationThresholds,
    pub warnings: u64,
}

/// 统计拉取过的帧，校准与计数阶段共用同一份计数
struct CountingSource<'a, S: ?Sized> {
    inner: &'a mut S,
    frames: u64,
    missing: u64,
}

impl<'a, S: FrameSource + ?Sized> CountingSource<'a, S> {
    fn new(inner: &'a mut S) -> Self {
        Self {
            inner,
            frames: 0,
            missing: 0,
        }
    }
}

impl<S: FrameSource + ?Sized> Iterator for CountingSource<'_, S> {
    type Item = PoseFrame;

    fn next(&mut self) -> Option<PoseFrame> {
        let frame = self.inner.next_frame()?;
        self.frames += 1;
        if frame.pose.is_none() {
            self.missing += 1;
        }
        Some(frame)
    }
}

/// 先校准再计数，直到帧源耗尽
pub fn replay<S>(source: &mut S, config: EngineConfig) -> Result<ReplaySummary, ReplayError>
where
    S: FrameSource + ?Sized,
{
    config.validate().map_err(ReplayError::Config)?;

    let mut source = CountingSource::new(source);
    let calibrator = Calibrator::new(config.calibration, config.leg_selection.clone());
    let result = calibrator.run(&mut source, &mut |progress: &CalibrationProgress| {
        tracing::debug!(
            phase = progress.phase.as_str(),
            step = ?progress.step,
            remaining_secs = progress.remaining_secs,
            samples = progress.samples,
            "Calibration progress"
        );
    });

    let outcome = result.outcome;
    let mut session = TrackingSession::with_thresholds(config, outcome.thresholds);
    let mut warnings = 0_u64;

    let mut pending = result.pending;
    while let Some(frame) = pending.take().or_else(|| source.next_frame()) {
        let snapshot = session.process(&frame);
        warnings += snapshot.warnings.len() as u64;
    }

    let counter = session.counter();
    let frames = source.frames;
    tracing::info!(frames, missing_frames = source.missing, counter, "Replay finished");

    Ok(ReplaySummary {
        frames,
        missing_frames: source.missing,
        counter,
        standing_angle: outcome.standing_angle,
        squat_angle: outcome.squat_angle,
        thresholds: outcome.thresholds,
        warnings,
    })
}
