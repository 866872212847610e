// 该文件是 yolo-labeler 项目的一部分。
// tests/video_annotate.rs - 视频逐帧标注测试
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

use std::{cell::Cell, convert::Infallible, sync::Arc};

use image::{Rgb, RgbImage};
use yolo_labeler::{
  config::VideoAnnotateConfig,
  frame::Frame,
  model::{Detection, Model, PredictOptions, Predictions},
  output::{FrameSink, draw::Draw},
  task::{Task, TaskError, VideoAnnotateTask, predict_on_video},
};

/// 每帧返回一个检测，类别编号随帧递增
struct CountingModel {
  calls: Cell<u32>,
}

impl Model for CountingModel {
  type Error = Infallible;

  fn predict(&self, image: &RgbImage, options: &PredictOptions) -> Result<Predictions, Self::Error> {
    assert_eq!(options.imgsz, 320);
    assert_eq!(options.conf, 0.4);
    let class_id = self.calls.get();
    self.calls.set(class_id + 1);
    let det = Detection::from_xyxy(class_id, 0.6, [4.0, 12.0, 24.0, 30.0], image.dimensions());
    Ok(Predictions::new(vec![det], image.dimensions(), Arc::from(Vec::new())))
  }
}

#[derive(Default)]
struct MemorySink {
  frames: Vec<RgbImage>,
  finished: bool,
}

impl FrameSink for MemorySink {
  type Error = Infallible;

  fn write_frame(&mut self, image: &RgbImage) -> Result<(), Self::Error> {
    self.frames.push(image.clone());
    Ok(())
  }

  fn finish(&mut self) -> Result<(), Self::Error> {
    self.finished = true;
    Ok(())
  }

  fn frames_written(&self) -> u64 {
    self.frames.len() as u64
  }
}

impl FrameSink for &mut MemorySink {
  type Error = Infallible;

  fn write_frame(&mut self, image: &RgbImage) -> Result<(), Self::Error> {
    (**self).write_frame(image)
  }

  fn finish(&mut self) -> Result<(), Self::Error> {
    (**self).finish()
  }

  fn frames_written(&self) -> u64 {
    (**self).frames_written()
  }
}

#[test]
fn colors_cycle_with_class_ids_across_frames() {
  let config = VideoAnnotateConfig {
    imgsz: 320,
    ..Default::default()
  };
  let model = CountingModel {
    calls: Cell::new(0),
  };
  let frames =
    (0..7u64).map(|i| Ok::<_, Infallible>(Frame::new(RgbImage::new(40, 40), i, i * 33)));

  let mut sink = MemorySink::default();
  let task = VideoAnnotateTask::new(
    config.predict_options(),
    config.annotate_style(),
    Draw::new(None),
  );
  let written = task.run_task(frames, &model, &mut sink).unwrap();

  assert_eq!(written, 7);
  assert!(sink.finished);
  let palette = [Rgb([0, 255, 0]), Rgb([255, 0, 0]), Rgb([0, 0, 255])];
  for (i, frame) in sink.frames.iter().enumerate() {
    assert_eq!(*frame.get_pixel(4, 12), palette[i % 3]);
    assert_eq!(*frame.get_pixel(24, 30), palette[i % 3]);
  }
}

#[test]
fn missing_video_is_a_video_open_error() {
  let dir = tempfile::tempdir().unwrap();
  let config = VideoAnnotateConfig {
    video_path: dir.path().join("surg_1.mp4"),
    output_path: dir.path().join("out/annotated.mp4"),
    ..Default::default()
  };
  let model = CountingModel {
    calls: Cell::new(0),
  };

  let err = predict_on_video(&model, &config).unwrap_err();

  assert!(matches!(err, TaskError::VideoInput(_)));
  assert!(!config.output_path.exists());
  assert_eq!(model.calls.get(), 0);
}
