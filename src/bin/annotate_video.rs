// 该文件是 yolo-labeler 项目的一部分。
// src/bin/annotate_video.rs - 视频逐帧检测标注
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use yolo_labeler::{
  config::{DEFAULT_WEIGHTS, VideoAnnotateConfig, parse_color, read_class_names},
  model::YoloOnnxBuilder,
  task::predict_on_video,
};

/// 对视频逐帧做目标检测，输出画好检测框的新视频
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型文件路径或 yolo:// URL
  #[arg(long, value_name = "MODEL", default_value = DEFAULT_WEIGHTS)]
  pub model: String,
  /// 输入视频
  #[arg(long, value_name = "VIDEO")]
  pub video: Option<PathBuf>,
  /// 输出视频
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<PathBuf>,
  /// 置信度阈值
  #[arg(long, value_name = "CONF")]
  pub confidence: Option<f32>,
  /// 推理输入边长
  #[arg(long, value_name = "SIZE")]
  pub imgsz: Option<u32>,
  /// 类别名称文件，每行一个
  #[arg(long, value_name = "FILE", conflicts_with = "class_name")]
  pub classes_file: Option<PathBuf>,
  /// 类别名称，可重复，按类别编号顺序
  #[arg(long, value_name = "NAME")]
  pub class_name: Vec<String>,
  /// 颜色，可重复: #rrggbb 或 r,g,b
  #[arg(long, value_name = "COLOR", value_parser = parse_color)]
  pub color: Vec<image::Rgb<u8>>,
  /// 字体文件
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
}

impl Args {
  fn to_config(&self) -> Result<VideoAnnotateConfig> {
    let mut config = VideoAnnotateConfig {
      weights_path: PathBuf::from(&self.model),
      ..Default::default()
    };
    if let Some(video) = &self.video {
      config.video_path = video.clone();
    }
    if let Some(output) = &self.output {
      config.output_path = output.clone();
    }
    if let Some(confidence) = self.confidence {
      config.confidence_threshold = confidence;
    }
    if let Some(imgsz) = self.imgsz {
      config.imgsz = imgsz;
    }
    if let Some(path) = &self.classes_file {
      config.class_names = Some(read_class_names(path)?);
    } else if !self.class_name.is_empty() {
      config.class_names = Some(self.class_name.clone());
    }
    if !self.color.is_empty() {
      config.colors = Some(self.color.clone());
    }
    config.font = self.font.clone();
    Ok(config)
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let config = args.to_config()?;

  info!("模型: {}", args.model);
  info!("输入视频: {}", config.video_path.display());
  info!("输出视频: {}", config.output_path.display());

  let model = YoloOnnxBuilder::parse(&args.model)?
    .class_names(config.class_names.clone().unwrap_or_default())
    .build()?;

  let now = std::time::Instant::now();
  let frames = predict_on_video(&model, &config)?;
  info!("处理 {} 帧，耗时: {:.2?}", frames, now.elapsed());

  Ok(())
}
