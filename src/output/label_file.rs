// 该文件是 yolo-labeler 项目的一部分。
// src/output/label_file.rs - YOLO 文本标签文件
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
  io::{BufWriter, Write},
  path::Path,
};

use thiserror::Error;
use tracing::debug;

use crate::model::Detection;

#[derive(Error, Debug)]
pub enum LabelFileError {
  #[error("无法创建目录 {path}: {source}")]
  CreateDir {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("无法写入标签文件 {path}: {source}")]
  Write {
    path: String,
    #[source]
    source: std::io::Error,
  },
}

/// 一条被接受的检测，坐标为归一化中心点形式
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelRecord {
  pub class_id: u32,
  pub confidence: f32,
  pub x_center: f32,
  pub y_center: f32,
  pub width: f32,
  pub height: f32,
}

impl From<&Detection> for LabelRecord {
  fn from(det: &Detection) -> Self {
    let [x_center, y_center, width, height] = det.xywhn;
    Self {
      class_id: det.class_id,
      confidence: det.confidence,
      x_center,
      y_center,
      width,
      height,
    }
  }
}

impl LabelRecord {
  /// `class_id x_center y_center width height`，不含置信度
  pub fn to_line(&self) -> String {
    format!(
      "{} {} {} {} {}\n",
      self.class_id, self.x_center, self.y_center, self.width, self.height
    )
  }

  pub fn as_tuple(&self) -> (u32, f32, f32, f32, f32, f32) {
    (
      self.class_id,
      self.confidence,
      self.x_center,
      self.y_center,
      self.width,
      self.height,
    )
  }
}

/// 覆盖写入标签文件，记录为空时生成空文件
pub fn write_label_file(path: &Path, records: &[LabelRecord]) -> Result<(), LabelFileError> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent).map_err(|source| LabelFileError::CreateDir {
      path: parent.display().to_string(),
      source,
    })?;
  }

  let write_err = |source| LabelFileError::Write {
    path: path.display().to_string(),
    source,
  };

  let file = File::create(path).map_err(write_err)?;
  let mut writer = BufWriter::new(file);
  for record in records {
    writer
      .write_all(record.to_line().as_bytes())
      .map_err(write_err)?;
  }
  writer.flush().map_err(write_err)?;

  debug!("写入 {} 行标签到 {}", records.len(), path.display());
  Ok(())
}
