// 该文件是 Linzhi （林芝） 项目的一部分。
// src/model/detector.rs - 推理与后处理组合
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

use thiserror::Error;
use tracing::debug;

use crate::{
  detect::{DetectError, DetectionPipeline},
  frame::ImageFrame,
  model::{DetectResult, Model, RawTensor},
};

#[derive(Error, Debug)]
pub enum DetectorError<E: std::error::Error + 'static> {
  #[error("模型推理错误: {0}")]
  Model(#[source] E),
  #[error("后处理错误: {0}")]
  Detect(#[from] DetectError),
}

/// 将输出原始张量的模型与后处理流水线组合为检测器
pub struct Detector<M> {
  model: M,
  pipeline: DetectionPipeline,
}

impl<M> Detector<M> {
  pub fn new(model: M, pipeline: DetectionPipeline) -> Self {
    Self { model, pipeline }
  }

  pub fn pipeline(&self) -> &DetectionPipeline {
    &self.pipeline
  }
}

impl<M, E> Model for Detector<M>
where
  M: Model<Input = ImageFrame, Output = RawTensor, Error = E>,
  E: std::error::Error + 'static,
{
  type Input = ImageFrame;
  type Output = DetectResult;
  type Error = DetectorError<E>;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let tensor = self.model.infer(input).map_err(DetectorError::Model)?;
    debug!(
      "图像 {} 输出张量长度 {}, 期望 {}",
      input.file_name(),
      tensor.len(),
      self.pipeline.expected_len()
    );
    let result = self
      .pipeline
      .run(tensor.as_ref(), input.width(), input.height())?;
    Ok(result)
  }
}
