// 该文件是 Linzhi （林芝） 项目的一部分。
// src/args.rs - 后处理参数配置
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

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use tracing::info;

use crate::{
  detect::{
    AnchorTemplate, ClassActivation, GridSize, PipelineConfig, PipelineConfigBuilder, TensorLayout,
  },
  label::LabelSet,
};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Preset {
  /// Tiny YOLO v2，VOC 20 类
  TinyYoloVoc,
  /// 不使用预设，所有参数需显式给出
  None,
}

/// 后处理参数，各二进制程序通过 `#[command(flatten)]` 引入
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
  /// 参数预设
  #[arg(long, value_enum, default_value = "tiny-yolo-voc")]
  pub preset: Preset,

  /// 网格尺寸，形如 13x13
  #[arg(long, value_name = "ROWSxCOLS")]
  pub grid: Option<GridSize>,

  /// 锚框尺寸（网格单元），形如 1.08,1.19,3.42,4.41
  #[arg(long, value_name = "W,H,...")]
  pub anchors: Option<AnchorTemplate>,

  /// 类别标签文件，每行一个
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 类别分数激活方式: softmax 或 sigmoid
  #[arg(long, value_name = "ACTIVATION")]
  pub activation: Option<ClassActivation>,

  /// 张量布局: interleaved 或 planar
  #[arg(long, value_name = "LAYOUT")]
  pub layout: Option<TensorLayout>,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub score_threshold: Option<f32>,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub iou_threshold: Option<f32>,

  /// 每个类别最多保留的检测数
  #[arg(long, value_name = "COUNT")]
  pub max_per_label: Option<usize>,
}

impl PipelineArgs {
  pub fn into_config(self) -> Result<PipelineConfig> {
    let mut builder = match self.preset {
      Preset::TinyYoloVoc => PipelineConfigBuilder::tiny_yolo_voc(),
      Preset::None => PipelineConfig::builder(),
    };

    if let Some(grid) = self.grid {
      builder = builder.grid(grid);
    }
    if let Some(anchors) = &self.anchors {
      builder = builder.anchor_template(anchors);
    }
    if let Some(path) = &self.labels {
      let labels = LabelSet::from_file(path)
        .with_context(|| format!("无法读取标签文件: {}", path.display()))?;
      builder = builder.labels(labels);
    }
    if let Some(activation) = self.activation {
      builder = builder.activation(activation);
    }
    if let Some(layout) = self.layout {
      builder = builder.layout(layout);
    }
    if let Some(threshold) = self.score_threshold {
      builder = builder.score_threshold(threshold);
    }
    if let Some(threshold) = self.iou_threshold {
      builder = builder.iou_threshold(threshold);
    }
    if let Some(max) = self.max_per_label {
      builder = builder.max_per_label(max);
    }

    let config = builder.build()?;
    info!(
      "后处理参数: 网格 {}, 锚框 {} 个, 类别 {} 个, {:?}/{:?}, 置信度阈值 {}, NMS 阈值 {}, 每类最多 {}",
      config.grid,
      config.anchors.len(),
      config.labels.len(),
      config.activation,
      config.layout,
      config.score_threshold,
      config.iou_threshold,
      config.max_per_label
    );
    Ok(config)
  }
}
