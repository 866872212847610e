// 该文件是 yolo-labeler 项目的一部分。
// src/model/yolo_onnx.rs - 基于 ONNX Runtime 的 YOLO 检测模型
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
  cell::RefCell,
  path::{Path, PathBuf},
  sync::Arc,
};

use image::RgbImage;
use ort::{session::Session, value::Tensor};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbNchwTensor,
  model::{
    Model, PredictOptions, Predictions,
    postprocess::{PostprocessError, decode_candidates, non_maximum_suppression, to_detections},
  },
};

#[derive(Error, Debug)]
pub enum YoloOnnxError {
  #[error("模型文件不存在: {0}")]
  ModelNotFound(String),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(String),
  #[error("模型没有输出")]
  MissingOutput,
  #[error("后处理错误: {0}")]
  PostprocessError(#[from] PostprocessError),
}

fn ort_error(err: impl std::fmt::Display) -> YoloOnnxError {
  YoloOnnxError::OrtError(err.to_string())
}

pub struct YoloOnnxBuilder {
  model_path: PathBuf,
  names: Vec<String>,
}

impl FromUrlWithScheme for YoloOnnxBuilder {
  const SCHEME: &'static str = "yolo";
}

impl FromUrl for YoloOnnxBuilder {
  type Error = YoloOnnxError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(YoloOnnxError::ModelPathError(format!(
        "模型路径必须使用 {} 方案, 实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    Ok(YoloOnnxBuilder::new(url.path()))
  }
}

impl YoloOnnxBuilder {
  pub fn new(model_path: impl AsRef<Path>) -> Self {
    Self {
      model_path: model_path.as_ref().to_path_buf(),
      names: Vec::new(),
    }
  }

  /// 接受普通文件路径或 `yolo:` URL
  pub fn parse(location: &str) -> Result<Self, YoloOnnxError> {
    match Url::parse(location) {
      Ok(url) if url.scheme() == Self::SCHEME => Self::from_url(&url),
      _ => Ok(Self::new(location)),
    }
  }

  pub fn class_names(mut self, names: Vec<String>) -> Self {
    self.names = names;
    self
  }

  pub fn build(self) -> Result<YoloOnnx, YoloOnnxError> {
    if !self.model_path.is_file() {
      return Err(YoloOnnxError::ModelNotFound(
        self.model_path.display().to_string(),
      ));
    }

    info!("加载模型文件: {}", self.model_path.display());
    let session = Session::builder()
      .map_err(ort_error)?
      .commit_from_file(&self.model_path)
      .map_err(ort_error)?;
    info!("模型加载完成, 类别数: {}", self.names.len());

    Ok(YoloOnnx {
      session: RefCell::new(session),
      names: self.names.into(),
    })
  }
}

/// YOLO 检测模型，输入为单张 RGB 图像
pub struct YoloOnnx {
  session: RefCell<Session>,
  names: Arc<[String]>,
}

impl YoloOnnx {
  pub fn names(&self) -> &[String] {
    &self.names
  }
}

impl Model for YoloOnnx {
  type Error = YoloOnnxError;

  fn predict(&self, image: &RgbImage, options: &PredictOptions) -> Result<Predictions, Self::Error> {
    let image_size = image.dimensions();

    debug!("预处理输入 {}x{} -> {}", image_size.0, image_size.1, options.imgsz);
    let tensor = RgbNchwTensor::letterbox(image, options.imgsz);
    let letterbox = tensor.letterbox_params();
    let shape = tensor.shape();
    let input = Tensor::from_array((shape.to_vec(), tensor.into_data())).map_err(ort_error)?;

    debug!("执行模型推理");
    let mut session = self.session.borrow_mut();
    let outputs = session.run(ort::inputs![input]).map_err(ort_error)?;

    let (_, output) = outputs.iter().next().ok_or(YoloOnnxError::MissingOutput)?;
    let (output_shape, data) = output.try_extract_tensor::<f32>().map_err(ort_error)?;

    let candidates = decode_candidates(data, output_shape, options.imgsz, options.conf)?;
    let kept = non_maximum_suppression(candidates, options.iou, options.max_det);
    let detections = to_detections(&kept, &letterbox, image_size);
    debug!("检测到 {} 个物体", detections.len());

    Ok(Predictions::new(detections, image_size, self.names.clone()))
  }
}
