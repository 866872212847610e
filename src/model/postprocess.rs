// 该文件是 yolo-labeler 项目的一部分。
// src/model/postprocess.rs - YOLO 输出解码与 NMS
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

use std::cmp::Ordering;

use thiserror::Error;
use tracing::debug;

use crate::{frame::Letterbox, model::Detection};

const BOX_FEATURES: usize = 4;
const HEAD_STRIDES: [u32; 3] = [8, 16, 32];

#[derive(Error, Debug)]
pub enum PostprocessError {
  #[error("输出张量形状无效: {0:?}")]
  InvalidShape(Vec<i64>),
  #[error("输出数据长度不匹配: 期望 {expected}, 实际 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 模型输入坐标系下的候选框
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
  pub class_id: u32,
  pub score: f32,
  /// [x1, y1, x2, y2]
  pub xyxy: [f32; 4],
}

/// 解码 YOLOv8 风格的检测头输出
///
/// 支持 `[1, 4 + nc, anchors]` 与转置后的 `[1, anchors, 4 + nc]` 两种布局，
/// 只保留最高类别分数严格大于 `conf` 的锚点。布局由 `imgsz` 对应的锚点数判定。
pub fn decode_candidates(
  data: &[f32],
  shape: &[i64],
  imgsz: u32,
  conf: f32,
) -> Result<Vec<Candidate>, PostprocessError> {
  if shape.len() != 3 || shape[0] != 1 || shape.iter().any(|&d| d <= 0) {
    return Err(PostprocessError::InvalidShape(shape.to_vec()));
  }

  let (dim1, dim2) = (shape[1] as usize, shape[2] as usize);
  let expected = anchor_count(imgsz);
  let features_first = if dim2 == expected {
    true
  } else if dim1 == expected {
    false
  } else {
    // 导出尺寸未知时，锚点数通常大于特征数
    debug!("输出形状 {:?} 与 imgsz {} 的锚点数 {} 不符", shape, imgsz, expected);
    dim1 <= dim2
  };
  let (features, anchors) = if features_first {
    (dim1, dim2)
  } else {
    (dim2, dim1)
  };

  if features <= BOX_FEATURES {
    return Err(PostprocessError::InvalidShape(shape.to_vec()));
  }
  if data.len() != features * anchors {
    return Err(PostprocessError::LengthMismatch {
      expected: features * anchors,
      actual: data.len(),
    });
  }

  let at = |feature: usize, anchor: usize| {
    if features_first {
      data[feature * anchors + anchor]
    } else {
      data[anchor * features + feature]
    }
  };

  let mut candidates = Vec::new();
  for anchor in 0..anchors {
    let (class_id, score) = (BOX_FEATURES..features)
      .map(|f| (f - BOX_FEATURES, at(f, anchor)))
      .fold((0usize, f32::MIN), |best, cur| {
        if cur.1 > best.1 { cur } else { best }
      });

    if score <= conf {
      continue;
    }

    let (cx, cy, w, h) = (at(0, anchor), at(1, anchor), at(2, anchor), at(3, anchor));
    candidates.push(Candidate {
      class_id: class_id as u32,
      score,
      xyxy: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
    });
  }

  debug!("解码得到 {} 个候选框 (锚点 {})", candidates.len(), anchors);
  Ok(candidates)
}

/// 三个检测头 (步长 8/16/32) 的锚点总数
pub fn anchor_count(imgsz: u32) -> usize {
  HEAD_STRIDES
    .iter()
    .map(|&stride| {
      let side = imgsz.div_ceil(stride) as usize;
      side * side
    })
    .sum()
}

pub fn intersection_over_union(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}

/// 按类别做非极大值抑制，结果按置信度降序，最多 `max_det` 个
pub fn non_maximum_suppression(
  mut candidates: Vec<Candidate>,
  iou_threshold: f32,
  max_det: usize,
) -> Vec<Candidate> {
  candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

  let mut kept: Vec<Candidate> = Vec::new();
  for candidate in candidates {
    if kept.len() >= max_det {
      break;
    }
    let suppressed = kept.iter().any(|k| {
      k.class_id == candidate.class_id
        && intersection_over_union(&k.xyxy, &candidate.xyxy) > iou_threshold
    });
    if !suppressed {
      kept.push(candidate);
    }
  }
  kept
}

/// 通过 letterbox 参数映射回原图并裁剪到图像范围内
pub fn to_detections(
  candidates: &[Candidate],
  letterbox: &Letterbox,
  image_size: (u32, u32),
) -> Vec<Detection> {
  let (w, h) = (image_size.0 as f32, image_size.1 as f32);

  candidates
    .iter()
    .map(|c| {
      let (x1, y1) = letterbox.unscale(c.xyxy[0], c.xyxy[1]);
      let (x2, y2) = letterbox.unscale(c.xyxy[2], c.xyxy[3]);
      let xyxy = [
        x1.clamp(0.0, w),
        y1.clamp(0.0, h),
        x2.clamp(0.0, w),
        y2.clamp(0.0, h),
      ];
      Detection::from_xyxy(c.class_id, c.score, xyxy, image_size)
    })
    .collect()
}
