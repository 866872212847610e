// 该文件是 yolo-labeler 项目的一部分。
// src/model.rs - 模型
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

use std::sync::Arc;

use image::RgbImage;

use crate::output::draw::Draw;

mod detection;
pub mod postprocess;
pub use self::detection::Detection;

#[cfg(feature = "model_onnx")]
mod yolo_onnx;
#[cfg(feature = "model_onnx")]
pub use self::yolo_onnx::{YoloOnnx, YoloOnnxBuilder, YoloOnnxError};

pub const DEFAULT_IMGSZ: u32 = 640;
pub const DEFAULT_CONF: f32 = 0.25;
pub const DEFAULT_IOU: f32 = 0.7;
pub const DEFAULT_MAX_DET: usize = 300;

/// 单次推理参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictOptions {
  /// 推理输入边长
  pub imgsz: u32,
  /// 模型自身的置信度下限
  pub conf: f32,
  /// NMS IoU 阈值
  pub iou: f32,
  /// 每张图最多保留的检测数
  pub max_det: usize,
}

impl Default for PredictOptions {
  fn default() -> Self {
    Self {
      imgsz: DEFAULT_IMGSZ,
      conf: DEFAULT_CONF,
      iou: DEFAULT_IOU,
      max_det: DEFAULT_MAX_DET,
    }
  }
}

impl PredictOptions {
  pub fn with_imgsz(mut self, imgsz: u32) -> Self {
    self.imgsz = imgsz;
    self
  }

  pub fn with_conf(mut self, conf: f32) -> Self {
    self.conf = conf;
    self
  }
}

/// 一次推理的原生输出，检测顺序即模型输出顺序
#[derive(Debug, Clone)]
pub struct Predictions {
  pub detections: Vec<Detection>,
  /// 原图尺寸 (宽, 高)
  pub image_size: (u32, u32),
  /// 模型自带的类别名称表
  pub names: Arc<[String]>,
}

impl Predictions {
  pub fn new(detections: Vec<Detection>, image_size: (u32, u32), names: Arc<[String]>) -> Self {
    Self {
      detections,
      image_size,
      names,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.detections.is_empty()
  }

  pub fn len(&self) -> usize {
    self.detections.len()
  }

  pub fn class_name(&self, class_id: u32) -> String {
    self
      .names
      .get(class_id as usize)
      .cloned()
      .unwrap_or_else(|| class_id.to_string())
  }

  /// 把全部原生检测结果画到原图副本上
  pub fn plot(&self, image: &RgbImage, draw: &Draw) -> RgbImage {
    let mut canvas = image.clone();
    draw.plot_detections(&mut canvas, &self.detections, |id| self.class_name(id));
    canvas
  }
}

pub trait Model {
  type Error;

  fn predict(&self, image: &RgbImage, options: &PredictOptions) -> Result<Predictions, Self::Error>;
}
