// 该文件是 Linzhi （林芝） 项目的一部分。
// src/frame.rs - 图像帧定义
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

use std::path::{Path, PathBuf};

use image::RgbImage;

/// 从文件读取的一帧图像
#[derive(Debug, Clone)]
pub struct ImageFrame {
  index: usize,
  path: PathBuf,
  image: RgbImage,
}

impl ImageFrame {
  pub fn new(index: usize, path: impl Into<PathBuf>, image: RgbImage) -> Self {
    Self {
      index,
      path: path.into(),
      image,
    }
  }

  pub fn index(&self) -> usize {
    self.index
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// 文件名（含扩展名），用于输出同名文件
  pub fn file_name(&self) -> String {
    self
      .path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| format!("frame-{:04}.png", self.index))
  }

  /// 不含扩展名的文件名，用于查找同名张量文件
  pub fn file_stem(&self) -> String {
    self
      .path
      .file_stem()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| format!("frame-{:04}", self.index))
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn image(&self) -> &RgbImage {
    &self.image
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn names_come_from_path() {
    let frame = ImageFrame::new(3, "/data/images/dog 1.jpg", RgbImage::new(4, 2));
    assert_eq!(frame.file_name(), "dog 1.jpg");
    assert_eq!(frame.file_stem(), "dog 1");
    assert_eq!((frame.width(), frame.height()), (4, 2));
  }

  #[test]
  fn names_fall_back_to_index() {
    let frame = ImageFrame::new(7, "", RgbImage::new(1, 1));
    assert_eq!(frame.file_name(), "frame-0007.png");
    assert_eq!(frame.file_stem(), "frame-0007");
  }
}
