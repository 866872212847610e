// 该文件是 yolo-labeler 项目的一部分。
// src/config.rs - 运行配置
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

use std::{
  fs::File,
  io::{BufRead, BufReader},
  path::{Path, PathBuf},
};

use image::Rgb;
use thiserror::Error;

use crate::{
  model::{DEFAULT_IMGSZ, PredictOptions},
  output::draw::AnnotateStyle,
};

pub const DEFAULT_WEIGHTS: &str = "weights.onnx";

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("颜色格式无效: {0}")]
  InvalidColor(String),
  #[error("置信度阈值超出 [0, 1]: {0}")]
  InvalidConfidence(f32),
  #[error("推理尺寸无效: {0}")]
  InvalidImgsz(u32),
  #[error("无法读取类别文件 {path}: {source}")]
  ClassesFile {
    path: String,
    #[source]
    source: std::io::Error,
  },
}

/// 单张图像检测配置
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePredictConfig {
  pub weights_path: PathBuf,
  pub image_path: PathBuf,
  pub confidence_threshold: f32,
  pub label_output_path: PathBuf,
  pub create_output_image: bool,
  pub output_image_path: PathBuf,
  /// 结果图绘制全部原生检测而不只是被接受的检测
  pub plot_unfiltered: bool,
  pub font: Option<PathBuf>,
}

impl Default for ImagePredictConfig {
  fn default() -> Self {
    Self {
      weights_path: PathBuf::from(DEFAULT_WEIGHTS),
      image_path: PathBuf::from("test.jpg"),
      confidence_threshold: 0.5,
      label_output_path: PathBuf::from("label_output.txt"),
      create_output_image: true,
      output_image_path: PathBuf::from("image_output.jpg"),
      plot_unfiltered: false,
      font: None,
    }
  }
}

impl ImagePredictConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    validate_confidence(self.confidence_threshold)
  }
}

/// 视频标注配置
#[derive(Debug, Clone, PartialEq)]
pub struct VideoAnnotateConfig {
  pub weights_path: PathBuf,
  pub video_path: PathBuf,
  pub confidence_threshold: f32,
  pub imgsz: u32,
  pub output_path: PathBuf,
  pub class_names: Option<Vec<String>>,
  pub colors: Option<Vec<Rgb<u8>>>,
  pub font: Option<PathBuf>,
}

impl Default for VideoAnnotateConfig {
  fn default() -> Self {
    Self {
      weights_path: PathBuf::from(DEFAULT_WEIGHTS),
      video_path: PathBuf::from("surg_1.mp4"),
      confidence_threshold: 0.4,
      imgsz: DEFAULT_IMGSZ,
      output_path: PathBuf::from("./surg_1_annotated.mp4"),
      class_names: Some(vec![
        "Empty".to_string(),
        "Tweezers".to_string(),
        "Needle Driver".to_string(),
      ]),
      colors: Some(vec![Rgb([0, 255, 0]), Rgb([255, 0, 0]), Rgb([0, 0, 255])]),
      font: None,
    }
  }
}

impl VideoAnnotateConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    validate_confidence(self.confidence_threshold)?;
    if self.imgsz == 0 {
      return Err(ConfigError::InvalidImgsz(self.imgsz));
    }
    Ok(())
  }

  pub fn predict_options(&self) -> PredictOptions {
    PredictOptions::default()
      .with_imgsz(self.imgsz)
      .with_conf(self.confidence_threshold)
  }

  pub fn annotate_style(&self) -> AnnotateStyle {
    AnnotateStyle::new(self.class_names.clone(), self.colors.clone())
  }
}

fn validate_confidence(conf: f32) -> Result<(), ConfigError> {
  if (0.0..=1.0).contains(&conf) {
    Ok(())
  } else {
    Err(ConfigError::InvalidConfidence(conf))
  }
}

/// 解析 `#rrggbb`、`rrggbb` 或 `r,g,b`
pub fn parse_color(text: &str) -> Result<Rgb<u8>, ConfigError> {
  let invalid = || ConfigError::InvalidColor(text.to_string());
  let trimmed = text.trim();

  if trimmed.contains(',') {
    let parts = trimmed
      .split(',')
      .map(|p| p.trim().parse::<u8>().map_err(|_| invalid()))
      .collect::<Result<Vec<_>, _>>()?;
    return match parts.as_slice() {
      [r, g, b] => Ok(Rgb([*r, *g, *b])),
      _ => Err(invalid()),
    };
  }

  let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
  if hex.len() != 6 || !hex.is_ascii() {
    return Err(invalid());
  }
  let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
  Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

/// 每行一个类别名称，忽略空行
pub fn read_class_names(path: &Path) -> Result<Vec<String>, ConfigError> {
  let io_err = |source| ConfigError::ClassesFile {
    path: path.display().to_string(),
    source,
  };

  let file = File::open(path).map_err(io_err)?;
  let mut names = Vec::new();
  for line in BufReader::new(file).lines() {
    let line = line.map_err(io_err)?;
    let name = line.trim();
    if !name.is_empty() {
      names.push(name.to_string());
    }
  }
  Ok(names)
}
