// 该文件是 yolo-labeler 项目的一部分。
// src/input/read_image_file.rs - 读取图像文件
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

use std::path::Path;

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Error, Debug)]
pub enum ReadImageFileError {
  #[error("图像不存在或无法解码: {path}")]
  ImageNotFound {
    path: String,
    #[source]
    source: image::ImageError,
  },
}

/// 读取并解码为 RGB 图像
pub fn read_image_file(path: &Path) -> Result<RgbImage, ReadImageFileError> {
  let not_found = |source: image::ImageError| {
    error!("无法读取图像 {}: {}", path.display(), source);
    ReadImageFileError::ImageNotFound {
      path: path.display().to_string(),
      source,
    }
  };

  let image = ImageReader::open(path)
    .map_err(|e| not_found(image::ImageError::IoError(e)))?
    .with_guessed_format()
    .map_err(|e| not_found(image::ImageError::IoError(e)))?
    .decode()
    .map_err(not_found)?;

  debug!(
    "读取图像 {}: {}x{}",
    path.display(),
    image.width(),
    image.height()
  );
  Ok(image.to_rgb8())
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn missing_file_is_image_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope.jpg");
    let err = read_image_file(&path).unwrap_err();
    let ReadImageFileError::ImageNotFound { path: reported, .. } = err;
    assert_eq!(reported, path.display().to_string());
  }

  #[test]
  fn garbage_file_is_image_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.png");
    std::fs::write(&path, b"not an image").unwrap();
    assert!(read_image_file(&path).is_err());
  }

  #[test]
  fn reads_rgb_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pixel.png");
    RgbImage::from_pixel(3, 2, Rgb([9, 8, 7])).save(&path).unwrap();

    let image = read_image_file(&path).unwrap();
    assert_eq!(image.dimensions(), (3, 2));
    assert_eq!(*image.get_pixel(2, 1), Rgb([9, 8, 7]));
  }
}
