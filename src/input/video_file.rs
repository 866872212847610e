// 该文件是 yolo-labeler 项目的一部分。
// src/input/video_file.rs - 视频文件输入
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
  fmt,
  path::{Path, PathBuf},
};

use ffmpeg_next as ffmpeg;
use ffmpeg_next::format::{Pixel, input};
use ffmpeg_next::media::Type;
use ffmpeg_next::software::scaling::{context::Context as ScalingContext, flag::Flags};
use ffmpeg_next::util::frame::video::Video;
use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};

use crate::frame::Frame;

#[derive(Error, Debug)]
pub enum VideoFileInputError {
  #[error("无法打开视频 {path}: {reason}")]
  VideoOpen { path: String, reason: String },
  #[error("视频解码错误: {0}")]
  Decode(#[from] ffmpeg::Error),
  #[error("第 {index} 帧尺寸异常: 期望 {expected:?}, 实际 {actual:?}")]
  FrameSizeMismatch {
    index: u64,
    expected: (u32, u32),
    actual: (u32, u32),
  },
}

/// 有理数帧率，例如 `30000/1001`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
  pub num: u32,
  pub den: u32,
}

impl FrameRate {
  pub fn new(num: u32, den: u32) -> Self {
    Self { num, den }
  }

  pub fn as_f64(&self) -> f64 {
    if self.den == 0 {
      0.0
    } else {
      self.num as f64 / self.den as f64
    }
  }

  pub fn is_valid(&self) -> bool {
    self.num > 0 && self.den > 0
  }

  fn from_rational(rate: ffmpeg::Rational) -> Option<Self> {
    let (num, den) = (rate.numerator(), rate.denominator());
    if num <= 0 || den <= 0 {
      return None;
    }
    Some(Self::new(num as u32, den as u32))
  }
}

impl fmt::Display for FrameRate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.den == 1 {
      write!(f, "{}", self.num)
    } else {
      write!(f, "{}/{}", self.num, self.den)
    }
  }
}

/// 视频流信息，宽高取自解码器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoInfo {
  pub width: u32,
  pub height: u32,
  pub frame_rate: FrameRate,
  /// 容器声明的帧数，可能缺失
  pub frame_count: Option<u64>,
}

impl VideoInfo {
  pub fn frame_bytes(&self) -> usize {
    self.width as usize * self.height as usize * 3
  }

  fn timestamp_ms(&self, index: u64) -> u64 {
    let FrameRate { num, den } = self.frame_rate;
    if num == 0 {
      return 0;
    }
    index * 1000 * den as u64 / num as u64
  }
}

/// 逐帧解码的视频文件，帧转换为 RGB24
pub struct VideoFileInput {
  path: PathBuf,
  info: VideoInfo,
  input_context: ffmpeg::format::context::Input,
  video_stream_index: usize,
  decoder: ffmpeg::decoder::Video,
  scaler: ScalingContext,
  /// 时间基准（秒）
  time_base: f64,
  next_index: u64,
  eof_sent: bool,
  finished: bool,
}

impl VideoFileInput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, VideoFileInputError> {
    let path = path.as_ref().to_path_buf();
    let open_err = |reason: String| VideoFileInputError::VideoOpen {
      path: path.display().to_string(),
      reason,
    };

    if !path.is_file() {
      return Err(open_err("文件不存在".to_string()));
    }

    ffmpeg::init().map_err(|e| open_err(format!("无法初始化 FFmpeg: {}", e)))?;
    let input_context = input(&path).map_err(|e| open_err(e.to_string()))?;

    let video_stream = input_context
      .streams()
      .best(Type::Video)
      .ok_or_else(|| open_err("找不到视频流".to_string()))?;
    let video_stream_index = video_stream.index();

    let decoder = ffmpeg::codec::context::Context::from_parameters(video_stream.parameters())
      .and_then(|context| context.decoder().video())
      .map_err(|e| open_err(format!("无法创建解码器: {}", e)))?;

    let (width, height) = (decoder.width(), decoder.height());
    if width == 0 || height == 0 {
      return Err(open_err(format!("视频尺寸无效: {}x{}", width, height)));
    }

    // avg_frame_rate 缺失时退回 r_frame_rate
    let frame_rate = FrameRate::from_rational(video_stream.avg_frame_rate())
      .or_else(|| FrameRate::from_rational(video_stream.rate()))
      .ok_or_else(|| open_err("无法确定帧率".to_string()))?;

    let frame_count = u64::try_from(video_stream.frames())
      .ok()
      .filter(|&n| n > 0);

    let time_base = video_stream.time_base();
    let time_base = if time_base.denominator() == 0 {
      0.0
    } else {
      time_base.numerator() as f64 / time_base.denominator() as f64
    };

    let scaler = ScalingContext::get(
      decoder.format(),
      width,
      height,
      Pixel::RGB24,
      width,
      height,
      Flags::BILINEAR,
    )
    .map_err(|e| open_err(format!("无法创建缩放上下文: {}", e)))?;

    let info = VideoInfo {
      width,
      height,
      frame_rate,
      frame_count,
    };
    info!(
      "打开视频 {}: {}x{} @ {} fps",
      path.display(),
      width,
      height,
      frame_rate
    );

    Ok(Self {
      path,
      info,
      input_context,
      video_stream_index,
      decoder,
      scaler,
      time_base,
      next_index: 0,
      eof_sent: false,
      finished: false,
    })
  }

  pub fn info(&self) -> &VideoInfo {
    &self.info
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// 解码下一帧，输入耗尽且解码器排空后返回 None
  fn decode_next_frame(&mut self) -> Result<Option<Video>, VideoFileInputError> {
    loop {
      let mut decoded = Video::empty();
      match self.decoder.receive_frame(&mut decoded) {
        Ok(()) => return Ok(Some(decoded)),
        Err(ffmpeg::Error::Eof) => return Ok(None),
        Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::util::error::EAGAIN => {}
        Err(e) => return Err(e.into()),
      }

      if self.eof_sent {
        return Ok(None);
      }

      let mut sent = false;
      for (stream, packet) in self.input_context.packets() {
        if stream.index() == self.video_stream_index {
          self.decoder.send_packet(&packet)?;
          sent = true;
          break;
        }
      }

      if !sent {
        self.decoder.send_eof()?;
        self.eof_sent = true;
      }
    }
  }

  fn convert(&mut self, decoded: &Video) -> Result<Frame, VideoFileInputError> {
    let index = self.next_index;
    let actual = (decoded.width(), decoded.height());
    let expected = (self.info.width, self.info.height);
    if actual != expected {
      return Err(VideoFileInputError::FrameSizeMismatch {
        index,
        expected,
        actual,
      });
    }

    let mut rgb_frame = Video::empty();
    self.scaler.run(decoded, &mut rgb_frame)?;

    let data = rgb_frame.data(0);
    let stride = rgb_frame.stride(0);
    let row_bytes = self.info.width as usize * 3;

    // 去掉行尾对齐填充
    let mut image_data = Vec::with_capacity(self.info.frame_bytes());
    for y in 0..self.info.height as usize {
      let row_start = y * stride;
      image_data.extend_from_slice(&data[row_start..row_start + row_bytes]);
    }

    let image = RgbImage::from_raw(self.info.width, self.info.height, image_data).ok_or(
      VideoFileInputError::FrameSizeMismatch {
        index,
        expected,
        actual,
      },
    )?;

    let timestamp_ms = match decoded.timestamp() {
      Some(ts) if ts >= 0 && self.time_base > 0.0 => (ts as f64 * self.time_base * 1000.0) as u64,
      _ => self.info.timestamp_ms(index),
    };

    self.next_index += 1;
    debug!("读取第 {} 帧", index);
    Ok(Frame::new(image, index, timestamp_ms))
  }
}

impl Iterator for VideoFileInput {
  type Item = Result<Frame, VideoFileInputError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.finished {
      return None;
    }

    let result = match self.decode_next_frame() {
      Ok(Some(decoded)) => self.convert(&decoded),
      Ok(None) => {
        self.finished = true;
        debug!("视频读取结束，共 {} 帧", self.next_index);
        return None;
      }
      Err(e) => Err(e),
    };

    if result.is_err() {
      self.finished = true;
    }
    Some(result)
  }
}
