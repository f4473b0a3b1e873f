// 该文件是 Linzhi （林芝） 项目的一部分。
// src/detect/pipeline.rs - 后处理流水线
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

use tracing::debug;

use super::{
  BoxScorer, DetectError, DetectResult, NonMaxSuppressor, PipelineConfig, TensorDecoder,
};

/// 解码 -> 打分 -> 抑制 -> 裁剪
///
/// 构造后只读，`run` 不修改任何内部状态，可在线程间共享。
#[derive(Debug, Clone)]
pub struct DetectionPipeline {
  config: PipelineConfig,
  decoder: TensorDecoder,
  scorer: BoxScorer,
  suppressor: NonMaxSuppressor,
}

impl DetectionPipeline {
  pub fn new(config: PipelineConfig) -> Result<Self, DetectError> {
    config.validate()?;
    let decoder = TensorDecoder::from_config(&config);
    let scorer = BoxScorer::from_config(&config);
    let suppressor = NonMaxSuppressor::from_config(&config);
    Ok(Self {
      config,
      decoder,
      scorer,
      suppressor,
    })
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  pub fn expected_len(&self) -> usize {
    self.decoder.expected_len()
  }

  /// 对一张 `image_width x image_height` 图像的网络输出做后处理
  ///
  /// 返回的框坐标是连续坐标，裁剪到闭区间 `[0, W] x [0, H]`；
  /// 换算成像素（见 [`Detection::pixel_rect`](super::Detection::pixel_rect)）后
  /// 总落在 `[0, W) x [0, H)` 之内。张量长度不符时返回 `ShapeMismatch`，
  /// 图像尺寸为 0 时返回 `InvalidImageSize`。
  pub fn run(
    &self,
    tensor: &[f32],
    image_width: u32,
    image_height: u32,
  ) -> Result<DetectResult, DetectError> {
    if image_width == 0 || image_height == 0 {
      return Err(DetectError::InvalidImageSize {
        width: image_width,
        height: image_height,
      });
    }

    let (width, height) = (image_width as f32, image_height as f32);
    let grid = self.decoder.grid();
    let cell_width = width / grid.cols as f32;
    let cell_height = height / grid.rows as f32;

    let proposals: Vec<_> = self
      .decoder
      .decode(tensor, cell_width, cell_height)?
      .filter_map(|cell| self.scorer.score(&cell))
      .collect();
    debug!("阈值过滤后剩余 {} 个候选框", proposals.len());

    let items: Vec<_> = self
      .suppressor
      .suppress(proposals)
      .into_iter()
      .map(|mut detection| {
        detection.bbox = detection.bbox.clamp(width, height);
        detection
      })
      .collect();

    Ok(DetectResult::from(items))
  }
}
