use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use image::RgbImage;
use log::{debug, info};
use serde::Deserialize;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::{MatchOptions, Opts, OutputFormat};
use crate::detection::{BoundingBox, Detection, Detector};
use crate::pipeline::{Frame, FrameResult, LatestFrame, spawn_pipeline};
use crate::utils::imread;

#[derive(Parser, Debug, Clone)]
pub struct ReplayCommand {
    #[command(flatten)]
    pub matching: MatchOptions,
    /// 帧清单文件（JSON），其中的图片路径相对于清单所在目录
    pub manifest: PathBuf,
    /// 输出所有帧的结果，默认丢弃比已输出帧更旧的结果
    #[arg(long)]
    pub all: bool,
    /// 输出格式
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    pub output_format: OutputFormat,
}

/// 帧清单
#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub frames: Vec<ManifestFrame>,
}

#[derive(Debug, Deserialize)]
pub struct ManifestFrame {
    pub image: PathBuf,
    #[serde(default)]
    pub detections: Vec<ManifestDetection>,
}

/// 预先记录的检测结果
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestDetection {
    pub bbox: BoundingBox,
    #[serde(default)]
    pub labels: Vec<String>,
    pub tracking_id: Option<i32>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取清单: {}", path.display()))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// 按顺序返回清单中记录的检测结果
pub struct ScriptedDetector {
    script: VecDeque<Vec<ManifestDetection>>,
}

impl ScriptedDetector {
    pub fn new(script: impl IntoIterator<Item = Vec<ManifestDetection>>) -> Self {
        Self { script: script.into_iter().collect() }
    }
}

impl Detector for ScriptedDetector {
    type Error = &'static str;

    fn detect(&mut self, frame: &RgbImage) -> Result<Vec<Detection>, Self::Error> {
        let detections = self.script.pop_front().ok_or("清单中的检测结果已用完")?;
        Ok(detections
            .into_iter()
            .map(|d| {
                Detection {
                    bounding_box: d.bbox,
                    labels: d.labels,
                    tracking_id: d.tracking_id,
                    crop: None,
                }
                .with_crop_from(frame)
            })
            .collect())
    }
}

impl SubCommandExtend for ReplayCommand {
    async fn run(&self, opts: &Opts) -> Result<()> {
        let manifest = Manifest::load(&self.manifest)?;
        let base = self.manifest.parent().unwrap_or(Path::new("."));
        info!("回放 {} 帧", manifest.frames.len());

        let images = block_in_place(|| {
            manifest
                .frames
                .iter()
                .map(|frame| {
                    let path = base.join(&frame.image);
                    imread(&path).with_context(|| format!("无法读取图片: {}", path.display()))
                })
                .collect::<Result<Vec<_>>>()
        })?;
        let detector = ScriptedDetector::new(manifest.frames.into_iter().map(|f| f.detections));

        let recognizer = Arc::new(opts.conf_dir.recognizer(&self.matching).open().await?);
        recognizer.start_session();
        let (tx, mut rx, tasks) = spawn_pipeline(detector, recognizer);

        let sender = tokio::spawn(async move {
            for (seq, image) in images.into_iter().enumerate() {
                let frame = Frame { seq: seq as u64, image: Arc::new(image) };
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        let mut latest = LatestFrame::new();
        while let Some(result) = rx.recv().await {
            if !latest.accept(&result) && !self.all {
                debug!("丢弃过期的第 {} 帧结果", result.seq);
                continue;
            }
            print_frame(&result, self.output_format)?;
        }

        sender.await?;
        for task in tasks {
            task.await?;
        }
        Ok(())
    }
}

fn print_frame(result: &FrameResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(result)?),
        OutputFormat::Table => {
            for r in &result.recognitions {
                let tracking_id = r.tracking_id.map(|id| id.to_string()).unwrap_or_else(|| "-".into());
                let source = if r.cached { "cache" } else { "match" };
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    result.seq,
                    tracking_id,
                    r.bounding_box,
                    r.label.text(),
                    if r.label.is_custom() { source } else { "-" }
                );
            }
        }
    }
    Ok(())
}
