// 该文件是 yolo-labeler 项目的一部分。
// src/bin/predict_image.rs - 单张图像检测并生成 YOLO 标签
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
  config::{DEFAULT_WEIGHTS, ImagePredictConfig, read_class_names},
  model::YoloOnnxBuilder,
  task::predict_on_image,
};

/// 对单张图像做目标检测，写出 YOLO 格式标签文件
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型文件路径或 yolo:// URL
  #[arg(long, value_name = "MODEL", default_value = DEFAULT_WEIGHTS)]
  pub model: String,
  /// 输入图像
  #[arg(long, value_name = "IMAGE")]
  pub image: Option<PathBuf>,
  /// 置信度阈值（含）
  #[arg(long, value_name = "CONF")]
  pub confidence: Option<f32>,
  /// 标签输出文件
  #[arg(long, value_name = "LABEL")]
  pub label: Option<PathBuf>,
  /// 结果图输出文件
  #[arg(long, value_name = "OUTPUT")]
  pub output_image: Option<PathBuf>,
  /// 不生成结果图
  #[arg(long)]
  pub no_output_image: bool,
  /// 结果图中绘制全部原生检测
  #[arg(long)]
  pub plot_unfiltered: bool,
  /// 类别名称文件，每行一个
  #[arg(long, value_name = "FILE")]
  pub classes_file: Option<PathBuf>,
  /// 字体文件
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
}

impl Args {
  fn to_config(&self) -> ImagePredictConfig {
    let mut config = ImagePredictConfig {
      weights_path: PathBuf::from(&self.model),
      ..Default::default()
    };
    if let Some(image) = &self.image {
      config.image_path = image.clone();
    }
    if let Some(confidence) = self.confidence {
      config.confidence_threshold = confidence;
    }
    if let Some(label) = &self.label {
      config.label_output_path = label.clone();
    }
    if let Some(output) = &self.output_image {
      config.output_image_path = output.clone();
    }
    config.create_output_image = !self.no_output_image;
    config.plot_unfiltered = self.plot_unfiltered;
    config.font = self.font.clone();
    config
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let config = args.to_config();

  info!("模型: {}", args.model);
  info!("输入图像: {}", config.image_path.display());
  info!("置信度阈值: {}", config.confidence_threshold);

  let names = match &args.classes_file {
    Some(path) => read_class_names(path)?,
    None => Vec::new(),
  };
  let model = YoloOnnxBuilder::parse(&args.model)?
    .class_names(names)
    .build()?;

  let records = predict_on_image(&model, &config)?;
  for record in &records {
    info!(
      "类别 {} 置信度 {:.2} 中心 ({:.4}, {:.4}) 尺寸 ({:.4}, {:.4})",
      record.class_id,
      record.confidence,
      record.x_center,
      record.y_center,
      record.width,
      record.height
    );
  }

  Ok(())
}
