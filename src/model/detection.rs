// 该文件是 yolo-labeler 项目的一部分。
// src/model/detection.rs - 检测结果定义
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

/// 单个检测目标
///
/// 两种中心点表示在构造时一次算好：
/// `xywh` 为像素坐标，`xywhn` 为相对原图宽高归一化后的坐标。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
  pub class_id: u32,
  pub confidence: f32,
  /// [x_center, y_center, width, height]，像素
  pub xywh: [f32; 4],
  /// [x_center, y_center, width, height]，[0, 1]
  pub xywhn: [f32; 4],
}

impl Detection {
  pub fn from_xywh(class_id: u32, confidence: f32, xywh: [f32; 4], image_size: (u32, u32)) -> Self {
    let w = image_size.0.max(1) as f32;
    let h = image_size.1.max(1) as f32;
    let [xc, yc, bw, bh] = xywh;

    Self {
      class_id,
      confidence,
      xywh,
      xywhn: [xc / w, yc / h, bw / w, bh / h],
    }
  }

  pub fn from_xyxy(class_id: u32, confidence: f32, xyxy: [f32; 4], image_size: (u32, u32)) -> Self {
    let [x1, y1, x2, y2] = xyxy;
    let xywh = [
      (x1 + x2) / 2.0,
      (y1 + y2) / 2.0,
      (x2 - x1).max(0.0),
      (y2 - y1).max(0.0),
    ];
    Self::from_xywh(class_id, confidence, xywh, image_size)
  }

  /// [x1, y1, x2, y2]，像素
  pub fn xyxy(&self) -> [f32; 4] {
    let [xc, yc, bw, bh] = self.xywh;
    [xc - bw / 2.0, yc - bh / 2.0, xc + bw / 2.0, yc + bh / 2.0]
  }

  /// 整数像素角点，左上向下取整、右下向上取整，
  /// 宽高为正时保证 x1 < x2 且 y1 < y2
  pub fn pixel_corners(&self) -> [i32; 4] {
    let [x1, y1, x2, y2] = self.xyxy();
    [
      x1.floor() as i32,
      y1.floor() as i32,
      x2.ceil() as i32,
      y2.ceil() as i32,
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn both_forms_are_consistent() {
    let det = Detection::from_xyxy(2, 0.9, [100.0, 50.0, 300.0, 250.0], (400, 500));
    assert_eq!(det.xywh, [200.0, 150.0, 200.0, 200.0]);
    assert_eq!(det.xywhn, [0.5, 0.3, 0.5, 0.4]);
    assert_eq!(det.xyxy(), [100.0, 50.0, 300.0, 250.0]);
  }

  #[test]
  fn pixel_corners_are_strictly_ordered_for_tiny_boxes() {
    for (xc, bw) in [(10.2_f32, 0.3_f32), (7.0, 0.01), (3.5, 1.0), (0.0, 0.5)] {
      let det = Detection::from_xywh(0, 0.5, [xc, xc, bw, bw], (64, 64));
      let [x1, y1, x2, y2] = det.pixel_corners();
      assert!(x1 < x2, "x1={x1} x2={x2} for xc={xc} bw={bw}");
      assert!(y1 < y2);
    }
  }

  #[test]
  fn zero_sized_image_does_not_divide_by_zero() {
    let det = Detection::from_xywh(0, 0.5, [0.0, 0.0, 0.0, 0.0], (0, 0));
    assert!(det.xywhn.iter().all(|v| v.is_finite()));
  }
}
