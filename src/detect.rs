// 该文件是 Linzhi （林芝） 项目的一部分。
// src/detect.rs - 检测后处理核心
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

//! 单阶段检测网络输出的后处理：解码、打分、非极大值抑制。
//!
//! 整个核心是纯计算，没有 I/O，也没有内部可变状态，
//! 因此 [`DetectionPipeline`] 可以在多个线程之间共享。

use thiserror::Error;

mod config;
mod decoder;
mod nms;
mod palette;
mod pipeline;
mod scorer;

pub use self::config::{
  Anchor, AnchorTemplate, ClassActivation, GridSize, PipelineConfig, PipelineConfigBuilder,
  TensorLayout,
};
pub use self::decoder::{CellIter, Logits, RawCell, TensorDecoder};
pub use self::nms::{Nms, NonMaxSuppressor, iou};
pub use self::palette::label_color;
pub use self::pipeline::DetectionPipeline;
pub use self::scorer::{BoxScorer, sigmoid, softmax};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectError {
  #[error("张量形状不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  ShapeMismatch { expected: usize, actual: usize },
  #[error("配置无效: {0}")]
  InvalidConfiguration(String),
  #[error("图像尺寸无效: {width}x{height}")]
  InvalidImageSize { width: u32, height: u32 },
}

impl DetectError {
  pub fn invalid(msg: impl Into<String>) -> Self {
    DetectError::InvalidConfiguration(msg.into())
  }
}

/// 模型对单张图像的原始输出
#[derive(Debug, Clone, PartialEq)]
pub struct RawTensor {
  data: Box<[f32]>,
}

impl RawTensor {
  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }
}

impl From<Vec<f32>> for RawTensor {
  fn from(data: Vec<f32>) -> Self {
    Self {
      data: data.into_boxed_slice(),
    }
  }
}

impl From<&[f32]> for RawTensor {
  fn from(data: &[f32]) -> Self {
    Self { data: data.into() }
  }
}

impl AsRef<[f32]> for RawTensor {
  fn as_ref(&self) -> &[f32] {
    &self.data
  }
}

/// 中心点形式的轴对齐边界框，单位为图像像素
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bbox {
  pub cx: f32,
  pub cy: f32,
  pub width: f32,
  pub height: f32,
}

impl Bbox {
  pub fn cxcywh(cx: f32, cy: f32, width: f32, height: f32) -> Self {
    Self {
      cx,
      cy,
      width,
      height,
    }
  }

  /// 由左上角和右下角坐标构造
  pub fn xyxy(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
    Self {
      cx: (x_min + x_max) / 2.0,
      cy: (y_min + y_max) / 2.0,
      width: x_max - x_min,
      height: y_max - y_min,
    }
  }

  pub fn x_min(&self) -> f32 {
    self.cx - self.width / 2.0
  }

  pub fn y_min(&self) -> f32 {
    self.cy - self.height / 2.0
  }

  pub fn x_max(&self) -> f32 {
    self.cx + self.width / 2.0
  }

  pub fn y_max(&self) -> f32 {
    self.cy + self.height / 2.0
  }

  /// 与 `intersection` 用同一组角点计算，保证框与自身的交并比恰为 1
  pub fn area(&self) -> f32 {
    (self.x_max() - self.x_min()).max(0.0) * (self.y_max() - self.y_min()).max(0.0)
  }

  pub fn is_finite(&self) -> bool {
    self.cx.is_finite() && self.cy.is_finite() && self.width.is_finite() && self.height.is_finite()
  }

  /// 交集面积，不重叠时为 0
  pub fn intersection(&self, other: &Bbox) -> f32 {
    let x1 = self.x_min().max(other.x_min());
    let y1 = self.y_min().max(other.y_min());
    let x2 = self.x_max().min(other.x_max());
    let y2 = self.y_max().min(other.y_max());

    (x2 - x1).max(0.0) * (y2 - y1).max(0.0)
  }

  /// 裁剪到 `[0, width] x [0, height]`
  ///
  /// 连续坐标的右边界 `width` 对应的像素下标为 `width - 1`，
  /// 所以裁剪后的框覆盖的像素总在 `[0, width) x [0, height)` 之内。
  pub fn clamp(&self, width: f32, height: f32) -> Bbox {
    let x1 = self.x_min().clamp(0.0, width);
    let y1 = self.y_min().clamp(0.0, height);
    let x2 = self.x_max().clamp(0.0, width);
    let y2 = self.y_max().clamp(0.0, height);
    Bbox::xyxy(x1, y1, x2, y2)
  }
}

/// 打分后的候选框
#[derive(Debug, Clone, PartialEq)]
pub struct BoxProposal {
  pub bbox: Bbox,
  pub confidence: f32,
  pub class_id: usize,
  pub label: String,
  pub class_probabilities: Box<[f32]>,
}

/// 经过抑制后保留下来的检测结果
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub bbox: Bbox,
  pub confidence: f32,
  pub class_id: usize,
  pub label: String,
  pub class_probabilities: Box<[f32]>,
  pub color: [u8; 3],
}

impl From<BoxProposal> for Detection {
  fn from(proposal: BoxProposal) -> Self {
    let color = label_color(&proposal.label);
    Detection {
      bbox: proposal.bbox,
      confidence: proposal.confidence,
      class_id: proposal.class_id,
      label: proposal.label,
      class_probabilities: proposal.class_probabilities,
      color,
    }
  }
}

impl Detection {
  /// 像素矩形 `(x, y, width, height)`，保证落在图像内
  ///
  /// 框完全在图像外或面积为 0 时返回 `None`。
  pub fn pixel_rect(&self, image_width: u32, image_height: u32) -> Option<(u32, u32, u32, u32)> {
    if image_width == 0 || image_height == 0 {
      return None;
    }
    let bbox = self.bbox.clamp(image_width as f32, image_height as f32);
    let x_min = bbox.x_min().floor() as u32;
    let y_min = bbox.y_min().floor() as u32;
    let x_max = (bbox.x_max().ceil() as u32).min(image_width);
    let y_max = (bbox.y_max().ceil() as u32).min(image_height);

    if x_min >= x_max || y_min >= y_max {
      return None;
    }
    Some((x_min, y_min, x_max - x_min, y_max - y_min))
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }
}

impl From<Vec<Detection>> for DetectResult {
  fn from(items: Vec<Detection>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn intersection_of_offset_boxes() {
    let a = Bbox::xyxy(0.0, 0.0, 10.0, 10.0);
    let b = Bbox::xyxy(5.0, 5.0, 15.0, 15.0);
    assert_eq!(a.intersection(&b), 25.0);
    assert_eq!(b.intersection(&a), 25.0);
  }

  #[test]
  fn area_equals_self_intersection() {
    let bbox = Bbox::cxcywh(74.98, 149.2, 10.23, 1.61);
    assert_eq!(bbox.area(), bbox.intersection(&bbox));
    assert_eq!(Bbox::cxcywh(1.0, 1.0, -2.0, 3.0).area(), 0.0);
  }

  #[test]
  fn intersection_is_zero_when_apart() {
    let a = Bbox::xyxy(0.0, 0.0, 10.0, 10.0);
    let b = Bbox::xyxy(20.0, 0.0, 30.0, 10.0);
    assert_eq!(a.intersection(&b), 0.0);
  }

  #[test]
  fn clamp_keeps_partial_box() {
    let bbox = Bbox::xyxy(-20.0, 90.0, 40.0, 130.0).clamp(100.0, 100.0);
    assert_eq!(bbox.x_min(), 0.0);
    assert_eq!(bbox.x_max(), 40.0);
    assert_eq!(bbox.y_min(), 90.0);
    assert_eq!(bbox.y_max(), 100.0);
  }

  #[test]
  fn pixel_rect_stays_inside_image() {
    let proposal = BoxProposal {
      bbox: Bbox::xyxy(-5.0, -5.0, 120.5, 99.2),
      confidence: 0.9,
      class_id: 0,
      label: "cat".to_string(),
      class_probabilities: vec![1.0].into_boxed_slice(),
    };
    let detection = Detection::from(proposal);
    assert_eq!(detection.pixel_rect(100, 100), Some((0, 0, 100, 100)));
    assert_eq!(detection.pixel_rect(0, 100), None);
  }

  #[test]
  fn detection_color_follows_label() {
    let make = |label: &str| {
      Detection::from(BoxProposal {
        bbox: Bbox::cxcywh(1.0, 1.0, 1.0, 1.0),
        confidence: 0.5,
        class_id: 0,
        label: label.to_string(),
        class_probabilities: vec![1.0].into_boxed_slice(),
      })
    };
    assert_eq!(make("dog").color, make("dog").color);
    assert_eq!(make("dog").color, label_color("dog"));
  }
}
