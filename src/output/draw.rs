// 该文件是 Linzhi （林芝） 项目的一部分。
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

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{DetectResult, Detection};

const LABEL_FONT_SIZE: f32 = 16.0;
const BOX_THICKNESS: u32 = 3;
const LABEL_TEXT_COLOR: [u8; 3] = [0, 0, 0];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("读取字体文件失败: {0}")]
  IoError(#[from] std::io::Error),
  #[error("无效的字体文件: {0}")]
  InvalidFont(String),
}

/// 绘制边框与标签；未加载字体时只画边框
pub struct Draw {
  font: Option<FontVec>,
  font_size: f32,
  thickness: u32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font: None,
      font_size: LABEL_FONT_SIZE,
      thickness: BOX_THICKNESS,
    }
  }
}

impl Draw {
  pub fn with_font_file(path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let data = std::fs::read(path.as_ref())?;
    let font = FontVec::try_from_vec(data).map_err(|e| DrawError::InvalidFont(e.to_string()))?;
    info!("加载字体: {}", path.as_ref().display());
    Ok(Self {
      font: Some(font),
      ..Self::default()
    })
  }

  /// 从输出 URL 的 `font=` 参数构造
  pub fn from_query(url: &url::Url) -> Result<Self, DrawError> {
    match url.query_pairs().find(|(k, _)| k == "font") {
      Some((_, path)) => Self::with_font_file(path.into_owned()),
      None => {
        info!("未指定字体 (font=)，只绘制边框，不绘制标签文字");
        Ok(Self::default())
      }
    }
  }

  pub fn draws_labels(&self) -> bool {
    self.font.is_some()
  }

  pub fn thickness(mut self, thickness: u32) -> Self {
    self.thickness = thickness.max(1);
    self
  }

  pub fn draw_detections_on_image(&self, image: &mut RgbImage, result: &DetectResult) {
    for detection in result.iter() {
      self.draw_bbox_with_label(image, detection);
    }
    debug!("绘制 {} 个检测框", result.len());
  }

  pub fn draw_detection(&self, image: &RgbImage, result: &DetectResult) -> RgbImage {
    let mut image = image.clone();
    self.draw_detections_on_image(&mut image, result);
    image
  }

  fn draw_bbox_with_label(&self, image: &mut RgbImage, detection: &Detection) {
    let Some((x, y, w, h)) = detection.pixel_rect(image.width(), image.height()) else {
      return;
    };
    let color = Rgb(detection.color);

    // 由外向内逐像素加粗
    for t in 0..self.thickness {
      if w <= 2 * t || h <= 2 * t {
        break;
      }
      let rect = Rect::at((x + t) as i32, (y + t) as i32).of_size(w - 2 * t, h - 2 * t);
      draw_hollow_rect_mut(image, rect, color);
    }

    let Some(font) = self.font.as_ref() else {
      return;
    };

    let text = format!("{} ({:.0}%)", detection.label, detection.confidence * 100.0);
    let scale = PxScale::from(self.font_size);
    let (text_width, text_height) = text_size(scale, font, &text);

    // 标签放在边框上方，空间不足时放在框内
    let label_y = if y > text_height { y - text_height - 1 } else { y };
    let label_width = text_width.min(image.width() - x);
    let label_height = text_height.min(image.height() - label_y);

    if label_width > 0 && label_height > 0 {
      let rect = Rect::at(x as i32, label_y as i32).of_size(label_width, label_height);
      draw_filled_rect_mut(image, rect, color);
      draw_text_mut(
        image,
        Rgb(LABEL_TEXT_COLOR),
        x as i32,
        label_y as i32,
        scale,
        font,
        &text,
      );
    }
  }
}

/// 检测结果的旁路记录格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
  /// `label, score, x_min, y_min, x_max, y_max`
  Name,
  /// `class_id, score, x_min, y_min, x_max, y_max`
  Id,
  Json,
}

impl Record {
  pub fn with(kind: &str) -> Self {
    match kind {
      "id" => Record::Id,
      "json" => Record::Json,
      _ => Record::Name,
    }
  }

  pub fn extension(&self) -> &'static str {
    match self {
      Record::Name | Record::Id => "txt",
      Record::Json => "json",
    }
  }

  pub fn render(&self, result: &DetectResult) -> String {
    match self {
      Record::Name | Record::Id => result
        .iter()
        .map(|item| {
          let name = match self {
            Record::Id => item.class_id.to_string(),
            _ => item.label.clone(),
          };
          format!(
            "{}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
            name,
            item.confidence,
            item.bbox.x_min(),
            item.bbox.y_min(),
            item.bbox.x_max(),
            item.bbox.y_max()
          )
        })
        .collect::<Vec<_>>()
        .join("\n"),
      Record::Json => {
        let items: Vec<_> = result
          .iter()
          .map(|item| {
            serde_json::json!({
              "label": item.label,
              "class_id": item.class_id,
              "confidence": item.confidence,
              "bbox": [item.bbox.x_min(), item.bbox.y_min(), item.bbox.x_max(), item.bbox.y_max()],
              "color": item.color,
            })
          })
          .collect();
        serde_json::Value::Array(items).to_string()
      }
    }
  }

  pub fn record(&self, result: &DetectResult, path: &Path) -> Result<(), std::io::Error> {
    std::fs::write(path.with_extension(self.extension()), self.render(result))
  }
}
