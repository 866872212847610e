// 该文件是 yolo-labeler 项目的一部分。
// src/frame.rs - 帧与 NCHW 张量定义
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

use image::{
  RgbImage,
  imageops::{self, FilterType},
};

const RGB_CHANNELS: usize = 3;
const LETTERBOX_FILL: u8 = 114;

/// 帧数据
#[derive(Debug, Clone)]
pub struct Frame {
  /// RGB 图像数据
  pub image: RgbImage,
  /// 帧索引
  pub index: u64,
  /// 时间戳（毫秒）
  pub timestamp_ms: u64,
}

impl Frame {
  pub fn new(image: RgbImage, index: u64, timestamp_ms: u64) -> Self {
    Self {
      image,
      index,
      timestamp_ms,
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}

/// letterbox 缩放参数，模型坐标通过它映射回原图坐标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
  pub gain: f32,
  pub pad_x: u32,
  pub pad_y: u32,
  pub scaled_width: u32,
  pub scaled_height: u32,
}

impl Letterbox {
  /// 计算把 `width x height` 等比缩放进 `size x size` 画布的参数
  pub fn fit(width: u32, height: u32, size: u32) -> Self {
    let gain = (size as f32 / height as f32).min(size as f32 / width as f32);
    let scaled_width = ((width as f32 * gain).round() as u32).clamp(1, size);
    let scaled_height = ((height as f32 * gain).round() as u32).clamp(1, size);

    // 奇数填充时左上少一个像素
    let pad_x = ((size - scaled_width) as f32 / 2.0 - 0.1).round().max(0.0) as u32;
    let pad_y = ((size - scaled_height) as f32 / 2.0 - 0.1).round().max(0.0) as u32;

    Self {
      gain,
      pad_x,
      pad_y,
      scaled_width,
      scaled_height,
    }
  }

  /// 模型输入坐标 -> 原图像素坐标
  pub fn unscale(&self, x: f32, y: f32) -> (f32, f32) {
    (
      (x - self.pad_x as f32) / self.gain,
      (y - self.pad_y as f32) / self.gain,
    )
  }
}

/// 归一化到 [0, 1] 的 NCHW 浮点张量，批大小为 1
#[derive(Debug, Clone)]
pub struct RgbNchwTensor {
  data: Box<[f32]>,
  size: u32,
  letterbox: Letterbox,
}

impl RgbNchwTensor {
  /// 以灰色 (114) 填充的 letterbox 方式缩放到 `size x size`
  pub fn letterbox(image: &RgbImage, size: u32) -> Self {
    let (width, height) = image.dimensions();
    let letterbox = Letterbox::fit(width, height, size);

    let resized = if (letterbox.scaled_width, letterbox.scaled_height) == (width, height) {
      image.clone()
    } else {
      imageops::resize(
        image,
        letterbox.scaled_width,
        letterbox.scaled_height,
        FilterType::Triangle,
      )
    };

    let side = size as usize;
    let plane = side * side;
    let mut data = vec![LETTERBOX_FILL as f32 / 255.0; RGB_CHANNELS * plane];

    for (x, y, pixel) in resized.enumerate_pixels() {
      let row = (y + letterbox.pad_y) as usize;
      let col = (x + letterbox.pad_x) as usize;
      if row >= side || col >= side {
        continue;
      }
      let idx = row * side + col;
      for c in 0..RGB_CHANNELS {
        data[c * plane + idx] = pixel[c] as f32 / 255.0;
      }
    }

    Self {
      data: data.into_boxed_slice(),
      size,
      letterbox,
    }
  }

  pub fn shape(&self) -> [usize; 4] {
    [1, RGB_CHANNELS, self.size as usize, self.size as usize]
  }

  pub fn letterbox_params(&self) -> Letterbox {
    self.letterbox
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  pub fn into_data(self) -> Box<[f32]> {
    self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn letterbox_wide_image_pads_vertically() {
    let lb = Letterbox::fit(1280, 640, 640);
    assert_eq!(lb.gain, 0.5);
    assert_eq!((lb.scaled_width, lb.scaled_height), (640, 320));
    assert_eq!((lb.pad_x, lb.pad_y), (0, 160));

    let (x, y) = lb.unscale(320.0, 320.0);
    assert!((x - 640.0).abs() < 1e-3);
    assert!((y - 320.0).abs() < 1e-3);
  }

  #[test]
  fn letterbox_square_image_is_identity() {
    let lb = Letterbox::fit(640, 640, 640);
    assert_eq!(lb.gain, 1.0);
    assert_eq!((lb.pad_x, lb.pad_y), (0, 0));
    assert_eq!(lb.unscale(12.5, 40.0), (12.5, 40.0));
  }

  #[test]
  fn tensor_is_planar_and_padded_with_gray() {
    let mut image = RgbImage::new(4, 2);
    for pixel in image.pixels_mut() {
      *pixel = Rgb([255, 0, 51]);
    }
    let tensor = RgbNchwTensor::letterbox(&image, 4);
    assert_eq!(tensor.shape(), [1, 3, 4, 4]);

    let data = tensor.as_slice();
    let plane = 16;
    let gray = 114.0 / 255.0;
    // 第一行是填充
    assert!((data[0] - gray).abs() < 1e-6);
    // 第二行开始是图像内容
    assert!((data[4] - 1.0).abs() < 1e-6);
    assert!(data[plane + 4].abs() < 1e-6);
    assert!((data[2 * plane + 4] - 0.2).abs() < 1e-6);
    // 最后一行是填充
    assert!((data[12] - gray).abs() < 1e-6);
  }
}
