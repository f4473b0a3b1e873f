// 该文件是 Linzhi （林芝） 项目的一部分。
// src/model/tensor_file.rs - 预先计算的张量文件
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

use std::{path::PathBuf, str::FromStr};

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::ImageFrame,
  model::{Model, RawTensor},
  url_path,
};

#[derive(Error, Debug)]
pub enum TensorFileError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("未知的张量文件格式: {0}")]
  UnknownFormat(String),
  #[error("读取张量文件 {path} 失败: {source}")]
  IoError {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("解析张量文件 {path} 失败: {source}")]
  JsonError {
    path: PathBuf,
    source: serde_json::Error,
  },
  #[error("张量文件 {path} 长度 {len} 不是 4 的整数倍")]
  TruncatedBinary { path: PathBuf, len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorFileFormat {
  /// JSON 数组
  #[default]
  Json,
  /// 小端 f32 原始字节
  F32Le,
}

impl TensorFileFormat {
  pub fn extension(&self) -> &'static str {
    match self {
      TensorFileFormat::Json => "json",
      TensorFileFormat::F32Le => "f32",
    }
  }
}

impl FromStr for TensorFileFormat {
  type Err = TensorFileError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "json" => Ok(TensorFileFormat::Json),
      "f32" | "f32le" | "raw" => Ok(TensorFileFormat::F32Le),
      other => Err(TensorFileError::UnknownFormat(other.to_string())),
    }
  }
}

/// 从目录中读取每张图像对应的网络输出
///
/// 图像 `dog.jpg` 对应 `<directory>/dog.json`（或 `dog.f32`）。
/// 网络本身不在本项目范围内，这一后端用离线导出的输出代替推理。
#[derive(Debug, Clone)]
pub struct TensorFileModel {
  directory: PathBuf,
  format: TensorFileFormat,
}

impl FromUrlWithScheme for TensorFileModel {
  const SCHEME: &'static str = "tensor";
}

impl FromUrl for TensorFileModel {
  type Error = TensorFileError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(TensorFileError::SchemeMismatch(format!(
        "期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let format = match url.query_pairs().find(|(k, _)| k == "format") {
      Some((_, v)) => v.parse()?,
      None => TensorFileFormat::default(),
    };

    info!("张量目录: {}, 格式: {:?}", url_path(url).display(), format);
    Ok(TensorFileModel::new(url_path(url), format))
  }
}

impl TensorFileModel {
  pub fn new(directory: impl Into<PathBuf>, format: TensorFileFormat) -> Self {
    Self {
      directory: directory.into(),
      format,
    }
  }

  pub fn tensor_path(&self, frame: &ImageFrame) -> PathBuf {
    self
      .directory
      .join(format!("{}.{}", frame.file_stem(), self.format.extension()))
  }

  fn read(&self, path: PathBuf) -> Result<RawTensor, TensorFileError> {
    let bytes = match std::fs::read(&path) {
      Ok(bytes) => bytes,
      Err(source) => return Err(TensorFileError::IoError { path, source }),
    };

    let values = match self.format {
      TensorFileFormat::Json => match serde_json::from_slice::<Vec<f32>>(&bytes) {
        Ok(values) => values,
        Err(source) => return Err(TensorFileError::JsonError { path, source }),
      },
      TensorFileFormat::F32Le => {
        if bytes.len() % 4 != 0 {
          return Err(TensorFileError::TruncatedBinary {
            path,
            len: bytes.len(),
          });
        }
        bytes
          .chunks_exact(4)
          .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
          .collect()
      }
    };

    debug!("读取张量 {}: {} 个数值", path.display(), values.len());
    Ok(RawTensor::from(values))
  }
}

impl Model for TensorFileModel {
  type Input = ImageFrame;
  type Output = RawTensor;
  type Error = TensorFileError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.read(self.tensor_path(input))
  }
}
