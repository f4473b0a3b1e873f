// 该文件是 Linzhi （林芝） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::path::PathBuf;

use chrono::{Datelike, Local};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::ImageFrame,
  model::DetectResult,
  output::{
    Render,
    draw::{Draw, DrawError, Record},
  },
  url_path,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("绘制错误: {0}")]
  DrawError(#[from] DrawError),
}

/// 每张输入图像在目录中保存一张同名的标注图像
///
/// URL 参数:
/// - `record=name|id|json` 额外写出同名记录文件
/// - `dated` 按 `YYYY/MM/DD` 分子目录
/// - `skip_empty` 没有检测结果时不保存
/// - `font=/path/to/font.ttf` 绘制标签文字
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Draw,
  record: Option<Record>,
  dated: bool,
  skip_empty: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let record = uri
      .query_pairs()
      .find(|(k, _)| k == "record")
      .map(|(_, v)| Record::with(&v));
    let dated = uri.query_pairs().any(|(k, _)| k == "dated");
    let skip_empty = uri.query_pairs().any(|(k, _)| k == "skip_empty");

    let output = DirectoryRecordOutput {
      directory: url_path(uri),
      draw: Draw::from_query(uri)?,
      record,
      dated,
      skip_empty,
    };
    info!(
      "输出目录: {}, 记录: {:?}, 按日期: {}, 跳过空结果: {}",
      output.directory.display(),
      output.record,
      output.dated,
      output.skip_empty
    );
    Ok(output)
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl Into<PathBuf>, draw: Draw) -> Self {
    Self {
      directory: directory.into(),
      draw,
      record: None,
      dated: false,
      skip_empty: false,
    }
  }

  pub fn with_record(mut self, record: Option<Record>) -> Self {
    self.record = record;
    self
  }

  pub fn with_dated(mut self, dated: bool) -> Self {
    self.dated = dated;
    self
  }

  pub fn with_skip_empty(mut self, skip_empty: bool) -> Self {
    self.skip_empty = skip_empty;
    self
  }

  fn frame_path(&self, frame: &ImageFrame) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = if self.dated {
      let now = Local::now();
      self
        .directory
        .join(now.year().to_string())
        .join(format!("{:02}", now.month()))
        .join(format!("{:02}", now.day()))
    } else {
      self.directory.clone()
    };
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(frame.file_name()))
  }
}

impl Render<ImageFrame, DetectResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &ImageFrame, result: &DetectResult) -> Result<(), Self::Error> {
    if self.skip_empty && result.is_empty() {
      debug!("{} 没有检测结果, 跳过保存", frame.file_name());
      return Ok(());
    }

    let path = self.frame_path(frame)?;
    let image = self.draw.draw_detection(frame.image(), result);
    image.save(&path)?;
    if let Some(record) = self.record {
      record.record(result, &path)?;
    }

    debug!("保存标注图像: {}", path.display());
    Ok(())
  }
}
