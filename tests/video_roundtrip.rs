// 该文件是 yolo-labeler 项目的一部分。
// tests/video_roundtrip.rs - 真实视频文件的解码、标注与编码
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
  cell::Cell,
  convert::Infallible,
  path::Path,
  process::{Command, Stdio},
  sync::Arc,
};

use image::{Rgb, RgbImage};
use yolo_labeler::{
  config::VideoAnnotateConfig,
  input::{FrameRate, VideoFileInput, VideoInfo},
  model::{Detection, Model, PredictOptions, Predictions},
  output::{FrameSink, VideoFileOutput},
  task::predict_on_video,
};

const WIDTH: u32 = 96;
const HEIGHT: u32 = 64;
const FRAMES: u64 = 12;

fn ffmpeg_available() -> bool {
  Command::new("ffmpeg")
    .arg("-version")
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .status()
    .map(|s| s.success())
    .unwrap_or(false)
}

/// 每帧在左上角报告一个检测
struct CornerModel {
  calls: Cell<u64>,
}

impl Model for CornerModel {
  type Error = Infallible;

  fn predict(&self, image: &RgbImage, _: &PredictOptions) -> Result<Predictions, Self::Error> {
    self.calls.set(self.calls.get() + 1);
    let det = Detection::from_xyxy(1, 0.9, [8.0, 24.0, 40.0, 56.0], image.dimensions());
    Ok(Predictions::new(vec![det], image.dimensions(), Arc::from(Vec::new())))
  }
}

fn encode_clip(path: &Path, frames: u64) {
  let info = VideoInfo {
    width: WIDTH,
    height: HEIGHT,
    frame_rate: FrameRate::new(25, 1),
    frame_count: None,
  };
  let mut output = VideoFileOutput::create(path, &info).unwrap();
  for i in 0..frames {
    let shade = (i * 20) as u8;
    let frame = RgbImage::from_fn(WIDTH, HEIGHT, |x, _| Rgb([shade, (x * 2) as u8, 128]));
    output.write_frame(&frame).unwrap();
  }
  output.finish().unwrap();
}

fn decoded_sizes(path: &Path) -> Vec<(u32, u32)> {
  VideoFileInput::open(path)
    .unwrap()
    .map(|frame| frame.unwrap().image.dimensions())
    .collect()
}

#[test]
fn annotated_video_keeps_every_frame() {
  if !ffmpeg_available() {
    eprintln!("跳过: 未安装 ffmpeg");
    return;
  }
  let dir = tempfile::tempdir().unwrap();
  let source = dir.path().join("clip.mp4");
  encode_clip(&source, FRAMES);

  let config = VideoAnnotateConfig {
    video_path: source.clone(),
    output_path: dir.path().join("out/clip_annotated.mp4"),
    ..Default::default()
  };
  let model = CornerModel {
    calls: Cell::new(0),
  };

  let written = predict_on_video(&model, &config).unwrap();

  assert_eq!(written, FRAMES);
  assert_eq!(model.calls.get(), FRAMES);

  let input = VideoFileInput::open(&config.output_path).unwrap();
  let info = *input.info();
  assert_eq!((info.width, info.height), (WIDTH, HEIGHT));
  assert!((info.frame_rate.as_f64() - 25.0).abs() < 0.01);
  assert_eq!(decoded_sizes(&config.output_path), vec![(WIDTH, HEIGHT); FRAMES as usize]);
}

#[test]
fn rotated_video_frames_match_reported_size() {
  if !ffmpeg_available() {
    eprintln!("跳过: 未安装 ffmpeg");
    return;
  }
  let dir = tempfile::tempdir().unwrap();
  let source = dir.path().join("clip.mp4");
  encode_clip(&source, FRAMES);

  // 只写入显示旋转元数据，编码尺寸不变
  let rotated = dir.path().join("rotated.mp4");
  let remuxed = Command::new("ffmpeg")
    .args(["-y", "-loglevel", "error", "-display_rotation", "90", "-i"])
    .arg(&source)
    .args(["-c", "copy"])
    .arg(&rotated)
    .stdout(Stdio::null())
    .stderr(Stdio::null())
    .status()
    .map(|s| s.success())
    .unwrap_or(false);
  if !remuxed {
    eprintln!("跳过: ffmpeg 不支持 -display_rotation");
    return;
  }

  let input = VideoFileInput::open(&rotated).unwrap();
  let info = *input.info();
  assert_eq!((info.width, info.height), (WIDTH, HEIGHT));

  let mut count = 0;
  for frame in input {
    let frame = frame.unwrap();
    assert_eq!(frame.image.dimensions(), (info.width, info.height));
    assert_eq!(frame.index, count);
    count += 1;
  }
  assert_eq!(count, FRAMES);
}
