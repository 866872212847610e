// 该文件是 yolo-labeler 项目的一部分。
// src/task.rs - 检测任务
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

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  config::{ConfigError, ImagePredictConfig, VideoAnnotateConfig},
  frame::Frame,
  input::{ReadImageFileError, VideoFileInput, VideoFileInputError, read_image_file},
  model::{Detection, Model, PredictOptions, Predictions},
  output::{
    FrameSink, LabelFileError, LabelRecord, SaveImageFileError, VideoFileOutput,
    VideoFileOutputError, draw::AnnotateStyle, draw::Draw, save_image, write_label_file,
  },
};

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum TaskError {
  #[error(transparent)]
  Config(#[from] ConfigError),
  #[error(transparent)]
  ReadImage(#[from] ReadImageFileError),
  #[error(transparent)]
  VideoInput(#[from] VideoFileInputError),
  #[error(transparent)]
  VideoOutput(#[from] VideoFileOutputError),
  #[error(transparent)]
  LabelFile(#[from] LabelFileError),
  #[error(transparent)]
  SaveImage(#[from] SaveImageFileError),
  #[error("模型推理错误: {0}")]
  Model(BoxedError),
  #[error("读取帧错误: {0}")]
  Input(BoxedError),
  #[error("写入帧错误: {0}")]
  Output(BoxedError),
}

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: &M, output: O) -> Result<Self::Output, Self::Error>;
}

/// 单张图像检测的输出位置
#[derive(Debug, Clone)]
pub struct ImagePredictOutput {
  pub label_path: PathBuf,
  /// 为 None 时不生成结果图
  pub annotated_image: Option<PathBuf>,
}

/// 单张图像检测：过滤、写标签文件、可选结果图
pub struct ImagePredictTask {
  confidence_threshold: f32,
  plot_unfiltered: bool,
  draw: Option<Draw>,
}

impl ImagePredictTask {
  pub fn new(confidence_threshold: f32) -> Self {
    Self {
      confidence_threshold,
      plot_unfiltered: false,
      draw: None,
    }
  }

  pub fn with_plot_unfiltered(mut self, plot_unfiltered: bool) -> Self {
    self.plot_unfiltered = plot_unfiltered;
    self
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = Some(draw);
    self
  }

  /// 置信度不低于阈值的检测，保持模型输出顺序
  pub fn accept(&self, detections: &[Detection]) -> Vec<Detection> {
    detections
      .iter()
      .filter(|det| det.confidence >= self.confidence_threshold)
      .copied()
      .collect()
  }
}

impl<M, ME> Task<RgbImage, M, ImagePredictOutput> for ImagePredictTask
where
  M: Model<Error = ME>,
  ME: std::error::Error + Send + Sync + 'static,
{
  type Output = Vec<LabelRecord>;
  type Error = TaskError;

  fn run_task(
    self,
    image: RgbImage,
    model: &M,
    output: ImagePredictOutput,
  ) -> Result<Self::Output, Self::Error> {
    let now = std::time::Instant::now();
    let predictions = model
      .predict(&image, &PredictOptions::default())
      .map_err(|e| TaskError::Model(Box::new(e)))?;
    info!(
      "推理完成，耗时: {:.2?}，原生检测 {} 个",
      now.elapsed(),
      predictions.len()
    );

    let accepted = self.accept(&predictions.detections);
    let records: Vec<LabelRecord> = accepted.iter().map(LabelRecord::from).collect();

    write_label_file(&output.label_path, &records)?;
    info!(
      "已保存 {} 条标签到 {}",
      records.len(),
      output.label_path.display()
    );

    if let Some(path) = output.annotated_image {
      let draw = self.draw.unwrap_or_default();
      let plotted = if self.plot_unfiltered {
        predictions.plot(&image, &draw)
      } else {
        Predictions::new(accepted, predictions.image_size, predictions.names.clone())
          .plot(&image, &draw)
      };
      save_image(&plotted, &path)?;
      info!("结果图已保存到 {}", path.display());
    }

    Ok(records)
  }
}

/// 视频逐帧标注：每帧推理一次，检测框与标签直接画在帧上
pub struct VideoAnnotateTask {
  options: PredictOptions,
  style: AnnotateStyle,
  draw: Draw,
}

impl VideoAnnotateTask {
  pub fn new(options: PredictOptions, style: AnnotateStyle, draw: Draw) -> Self {
    Self {
      options,
      style,
      draw,
    }
  }
}

impl<I, IE, M, ME, O, OE> Task<I, M, O> for VideoAnnotateTask
where
  I: Iterator<Item = Result<Frame, IE>>,
  IE: std::error::Error + Send + Sync + 'static,
  M: Model<Error = ME>,
  ME: std::error::Error + Send + Sync + 'static,
  O: FrameSink<Error = OE>,
  OE: std::error::Error + Send + Sync + 'static,
{
  type Output = u64;
  type Error = TaskError;

  fn run_task(self, input: I, model: &M, mut output: O) -> Result<Self::Output, Self::Error> {
    info!("开始逐帧标注...");
    for frame in input {
      let Frame {
        mut image, index, ..
      } = frame.map_err(|e| TaskError::Input(Box::new(e)))?;

      let predictions = model
        .predict(&image, &self.options)
        .map_err(|e| TaskError::Model(Box::new(e)))?;
      debug!("第 {} 帧检测到 {} 个物体", index, predictions.len());

      self
        .draw
        .annotate_frame(&mut image, &predictions.detections, &self.style);
      output
        .write_frame(&image)
        .map_err(|e| TaskError::Output(Box::new(e)))?;
    }

    output
      .finish()
      .map_err(|e| TaskError::Output(Box::new(e)))?;
    Ok(output.frames_written())
  }
}

/// 读取图像并执行单张检测，图像无法读取时不会生成任何输出文件
pub fn predict_on_image<M, ME>(
  model: &M,
  config: &ImagePredictConfig,
) -> Result<Vec<LabelRecord>, TaskError>
where
  M: Model<Error = ME>,
  ME: std::error::Error + Send + Sync + 'static,
{
  config.validate()?;
  let image = read_image_file(&config.image_path)?;

  let mut task =
    ImagePredictTask::new(config.confidence_threshold).with_plot_unfiltered(config.plot_unfiltered);
  if config.create_output_image {
    task = task.with_draw(Draw::with_font_path(config.font.as_deref()));
  }

  let output = ImagePredictOutput {
    label_path: config.label_output_path.clone(),
    annotated_image: config
      .create_output_image
      .then(|| config.output_image_path.clone()),
  };
  task.run_task(image, model, output)
}

/// 标注整个视频文件，返回写出的帧数
pub fn predict_on_video<M, ME>(model: &M, config: &VideoAnnotateConfig) -> Result<u64, TaskError>
where
  M: Model<Error = ME>,
  ME: std::error::Error + Send + Sync + 'static,
{
  config.validate()?;
  let input = VideoFileInput::open(&config.video_path)?;
  let info = *input.info();
  match info.frame_count {
    Some(count) => info!("视频共 {} 帧, 帧率 {} fps", count, info.frame_rate),
    None => info!("视频帧数未知, 帧率 {} fps", info.frame_rate),
  }

  let output = VideoFileOutput::create(&config.output_path, &info)?;
  let task = VideoAnnotateTask::new(
    config.predict_options(),
    config.annotate_style(),
    Draw::with_font_path(config.font.as_deref()),
  );
  let frames = task.run_task(input, model, output)?;

  info!(
    "标注视频已保存到 {}，共写入 {} 帧",
    config.output_path.display(),
    frames
  );
  Ok(frames)
}
