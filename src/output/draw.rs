// 该文件是 yolo-labeler 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use tracing::{debug, warn};

use crate::model::Detection;

// 文本渲染常量
const PLOT_FONT_SIZE: f32 = 20.0;
const ANNOTATE_FONT_SIZE: f32 = 18.0;
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const ANNOTATE_TEXT_OFFSET: i32 = 10;
const BOX_THICKNESS: i32 = 2;

pub const DEFAULT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

// 按类别轮换的调色板
const PALETTE: [[u8; 3]; 20] = [
  [0xFF, 0x38, 0x38],
  [0xFF, 0x9D, 0x97],
  [0xFF, 0x70, 0x1F],
  [0xFF, 0xB2, 0x1D],
  [0xCF, 0xD2, 0x31],
  [0x48, 0xF9, 0x0A],
  [0x92, 0xCC, 0x17],
  [0x3D, 0xDB, 0x86],
  [0x1A, 0x93, 0x34],
  [0x00, 0xD4, 0xBB],
  [0x2C, 0x99, 0xA8],
  [0x00, 0xC2, 0xFF],
  [0x34, 0x45, 0x93],
  [0x64, 0x73, 0xFF],
  [0x00, 0x18, 0xEC],
  [0x84, 0x38, 0xFF],
  [0x52, 0x00, 0x85],
  [0xCB, 0x38, 0xFF],
  [0xFF, 0x95, 0xC8],
  [0xFF, 0x37, 0xC7],
];

// 内置字体 DejaVu Sans
const EMBEDDED_FONT: &[u8] = include_bytes!("../../assets/font.ttf");

pub fn palette_color(class_id: u32) -> Rgb<u8> {
  Rgb(PALETTE[class_id as usize % PALETTE.len()])
}

fn embedded_font() -> Option<FontArc> {
  match FontArc::try_from_slice(EMBEDDED_FONT) {
    Ok(font) => Some(font),
    Err(e) => {
      warn!("内置字体无效: {}", e);
      None
    }
  }
}

/// 加载字体，指定的字体不可用时使用内置字体
pub fn load_font(path: Option<&Path>) -> Option<FontArc> {
  let Some(path) = path else {
    return embedded_font();
  };

  match std::fs::read(path).map(FontArc::try_from_vec) {
    Ok(Ok(font)) => {
      debug!("使用字体: {}", path.display());
      Some(font)
    }
    Ok(Err(e)) => {
      warn!("字体文件无效 {}: {}，改用内置字体", path.display(), e);
      embedded_font()
    }
    Err(e) => {
      warn!("无法读取字体 {}: {}，改用内置字体", path.display(), e);
      embedded_font()
    }
  }
}

/// 视频标注样式：可选的类别名称表与颜色表
#[derive(Debug, Clone, Default)]
pub struct AnnotateStyle {
  pub class_names: Option<Vec<String>>,
  pub colors: Option<Vec<Rgb<u8>>>,
}

impl AnnotateStyle {
  pub fn new(class_names: Option<Vec<String>>, colors: Option<Vec<Rgb<u8>>>) -> Self {
    Self {
      class_names,
      colors,
    }
  }

  /// `colors[class_id % len]`，没有颜色表时为绿色
  pub fn color_for(&self, class_id: u32) -> Rgb<u8> {
    match &self.colors {
      Some(colors) if !colors.is_empty() => colors[class_id as usize % colors.len()],
      _ => DEFAULT_COLOR,
    }
  }

  pub fn name_for(&self, class_id: u32) -> String {
    self
      .class_names
      .as_ref()
      .and_then(|names| names.get(class_id as usize))
      .cloned()
      .unwrap_or_else(|| format!("Class {}", class_id))
  }

  pub fn label_for(&self, class_id: u32, confidence: f32) -> String {
    format!("{} ({:.2})", self.name_for(class_id), confidence)
  }
}

pub struct Draw {
  font: Option<FontArc>,
  plot_scale: PxScale,
  annotate_scale: PxScale,
}

impl Default for Draw {
  fn default() -> Self {
    Self::new(load_font(None))
  }
}

impl Draw {
  pub fn new(font: Option<FontArc>) -> Self {
    Self {
      font,
      plot_scale: PxScale::from(PLOT_FONT_SIZE),
      annotate_scale: PxScale::from(ANNOTATE_FONT_SIZE),
    }
  }

  pub fn with_font_path(path: Option<&Path>) -> Self {
    Self::new(load_font(path))
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  // 边框向内加粗，角点为闭区间
  fn draw_box(image: &mut RgbImage, corners: [i32; 4], color: Rgb<u8>) {
    let [x1, y1, x2, y2] = corners;
    for t in 0..BOX_THICKNESS {
      let width = x2 - x1 + 1 - 2 * t;
      let height = y2 - y1 + 1 - 2 * t;
      if width <= 0 || height <= 0 {
        break;
      }
      let rect = Rect::at(x1 + t, y1 + t).of_size(width as u32, height as u32);
      draw_hollow_rect_mut(image, rect, color);
    }
  }

  /// 检测框 + 实心标签底 + 白字 "name conf"
  pub fn plot_detections<F>(&self, image: &mut RgbImage, detections: &[Detection], name_of: F)
  where
    F: Fn(u32) -> String,
  {
    for det in detections {
      let color = palette_color(det.class_id);
      let corners = det.pixel_corners();
      Self::draw_box(image, corners, color);

      let Some(font) = &self.font else {
        continue;
      };

      let label = format!("{} {:.2}", name_of(det.class_id), det.confidence);
      let (text_width, text_height) = text_size(self.plot_scale, font, &label);
      let label_height = text_height as i32 + 2 * LABEL_TEXT_VERTICAL_PADDING;
      let label_x = corners[0].max(0);
      let label_y = (corners[1] - label_height).max(0);

      let rect = Rect::at(label_x, label_y).of_size(text_width.max(1), label_height as u32);
      draw_filled_rect_mut(image, rect, color);
      draw_text_mut(
        image,
        TEXT_COLOR,
        label_x,
        label_y + LABEL_TEXT_VERTICAL_PADDING,
        self.plot_scale,
        font,
        &label,
      );
    }
  }

  /// 直接在帧上绘制检测框与彩色文字，文字位于框上方且不超出画面顶部
  pub fn annotate_frame(&self, image: &mut RgbImage, detections: &[Detection], style: &AnnotateStyle) {
    for det in detections {
      let color = style.color_for(det.class_id);
      let corners = det.pixel_corners();
      Self::draw_box(image, corners, color);

      if let Some(font) = &self.font {
        let label = style.label_for(det.class_id, det.confidence);
        let (_, text_height) = text_size(self.annotate_scale, font, &label);
        let text_y = (corners[1] - ANNOTATE_TEXT_OFFSET - text_height as i32).max(0);
        draw_text_mut(
          image,
          color,
          corners[0],
          text_y,
          self.annotate_scale,
          font,
          &label,
        );
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn color_is_picked_modulo_table_length() {
    let colors = vec![Rgb([0, 255, 0]), Rgb([255, 0, 0]), Rgb([0, 0, 255])];
    let style = AnnotateStyle::new(None, Some(colors.clone()));
    for class_id in 0..10u32 {
      assert_eq!(style.color_for(class_id), colors[class_id as usize % 3]);
    }
  }

  #[test]
  fn missing_or_empty_color_table_falls_back_to_green() {
    assert_eq!(AnnotateStyle::default().color_for(7), DEFAULT_COLOR);
    assert_eq!(
      AnnotateStyle::new(None, Some(Vec::new())).color_for(7),
      DEFAULT_COLOR
    );
  }

  #[test]
  fn labels_use_names_or_class_ids() {
    let style = AnnotateStyle::new(
      Some(vec!["Empty".into(), "Tweezers".into(), "Needle Driver".into()]),
      None,
    );
    assert_eq!(style.label_for(1, 0.876), "Tweezers (0.88)");
    assert_eq!(style.label_for(5, 0.5), "Class 5 (0.50)");
    assert_eq!(AnnotateStyle::default().label_for(2, 0.4), "Class 2 (0.40)");
  }

  #[test]
  fn annotate_draws_box_edges_without_font() {
    let draw = Draw::new(None);
    let mut image = RgbImage::new(32, 32);
    let det = Detection::from_xyxy(1, 0.9, [4.0, 6.0, 20.0, 24.0], (32, 32));
    let style = AnnotateStyle::new(None, Some(vec![Rgb([10, 20, 30]), Rgb([200, 100, 50])]));

    draw.annotate_frame(&mut image, &[det], &style);

    assert_eq!(*image.get_pixel(4, 6), Rgb([200, 100, 50]));
    assert_eq!(*image.get_pixel(5, 7), Rgb([200, 100, 50]));
    assert_eq!(*image.get_pixel(20, 24), Rgb([200, 100, 50]));
    // 框内部不变
    assert_eq!(*image.get_pixel(12, 15), Rgb([0, 0, 0]));
  }

  #[test]
  fn boxes_touching_the_border_do_not_panic() {
    let draw = Draw::new(None);
    let mut image = RgbImage::new(16, 16);
    let det = Detection::from_xyxy(0, 0.9, [0.0, 0.0, 16.0, 16.0], (16, 16));
    draw.plot_detections(&mut image, &[det], |id| id.to_string());
    assert_eq!(*image.get_pixel(0, 0), palette_color(0));
  }

  #[test]
  fn bundled_font_is_always_available() {
    assert!(Draw::default().has_font());
    let dir = tempfile::tempdir().unwrap();
    assert!(Draw::with_font_path(Some(dir.path().join("missing.ttf").as_path())).has_font());
  }

  #[test]
  fn annotate_writes_label_text_above_the_box() {
    let draw = Draw::default();
    let mut image = RgbImage::new(160, 120);
    let det = Detection::from_xyxy(1, 0.9, [10.0, 60.0, 100.0, 110.0], (160, 120));
    let red = Rgb([255, 0, 0]);
    let style = AnnotateStyle::new(
      Some(vec!["Empty".into(), "Tweezers".into()]),
      Some(vec![Rgb([0, 255, 0]), red]),
    );

    draw.annotate_frame(&mut image, &[det], &style);

    // 框上边在 y = 60，文字全部位于其上方
    let text_pixels = (0..160)
      .flat_map(|x| (0..58).map(move |y| (x, y)))
      .filter(|&(x, y)| *image.get_pixel(x, y) != Rgb([0, 0, 0]))
      .count();
    assert!(text_pixels > 0);
  }
}
