// 该文件是 Linzhi （林芝） 项目的一部分。
// src/detect/config.rs - 后处理配置
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

use std::{fmt, str::FromStr, sync::Arc};

use tracing::debug;

use super::DetectError;
use crate::label::LabelSet;

const TINY_YOLO_GRID: (usize, usize) = (13, 13);
const TINY_YOLO_ANCHORS: [(f32, f32); 5] = [
  (1.08, 1.19),
  (3.42, 4.41),
  (6.63, 11.38),
  (9.42, 5.11),
  (16.62, 10.52),
];
const DEFAULT_SCORE_THRESHOLD: f32 = 0.3;
const DEFAULT_IOU_THRESHOLD: f32 = 0.5;
const DEFAULT_MAX_PER_LABEL: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSize {
  pub rows: usize,
  pub cols: usize,
}

impl GridSize {
  pub fn new(rows: usize, cols: usize) -> Self {
    Self { rows, cols }
  }

  pub fn cells(&self) -> usize {
    self.rows * self.cols
  }
}

/// 形如 `13x13`，先行后列
impl FromStr for GridSize {
  type Err = DetectError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (rows, cols) = s
      .split_once(['x', 'X'])
      .ok_or_else(|| DetectError::invalid(format!("网格尺寸格式应为 ROWSxCOLS: {s}")))?;
    let parse = |v: &str| {
      v.trim()
        .parse::<usize>()
        .map_err(|e| DetectError::invalid(format!("网格尺寸无法解析 '{v}': {e}")))
    };
    Ok(GridSize::new(parse(rows)?, parse(cols)?))
  }
}

impl fmt::Display for GridSize {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}x{}", self.rows, self.cols)
  }
}

/// 锚框尺寸，单位为网格单元
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
  pub width: f32,
  pub height: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnchorTemplate {
  anchors: Arc<[Anchor]>,
}

impl AnchorTemplate {
  pub fn new(pairs: impl IntoIterator<Item = (f32, f32)>) -> Result<Self, DetectError> {
    let anchors: Arc<[Anchor]> = pairs
      .into_iter()
      .map(|(width, height)| Anchor { width, height })
      .collect();

    if anchors.is_empty() {
      return Err(DetectError::invalid("锚框模板为空"));
    }
    if let Some((idx, anchor)) = anchors
      .iter()
      .enumerate()
      .find(|(_, a)| !is_positive(a.width) || !is_positive(a.height))
    {
      return Err(DetectError::invalid(format!(
        "锚框 {idx} 尺寸无效: {}x{}",
        anchor.width, anchor.height
      )));
    }

    Ok(Self { anchors })
  }

  pub fn len(&self) -> usize {
    self.anchors.len()
  }

  pub fn is_empty(&self) -> bool {
    self.anchors.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<Anchor> {
    self.anchors.get(index).copied()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Anchor> {
    self.anchors.iter()
  }
}

/// 形如 `w,h,w,h,...`
impl FromStr for AnchorTemplate {
  type Err = DetectError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let values = s
      .split(',')
      .map(str::trim)
      .filter(|v| !v.is_empty())
      .map(|v| {
        v.parse::<f32>()
          .map_err(|e| DetectError::invalid(format!("锚框数值无法解析 '{v}': {e}")))
      })
      .collect::<Result<Vec<_>, _>>()?;

    if values.len() % 2 != 0 {
      return Err(DetectError::invalid(format!(
        "锚框数值个数必须为偶数, 实际为 {}",
        values.len()
      )));
    }

    Self::new(values.chunks_exact(2).map(|pair| (pair[0], pair[1])))
  }
}

/// 类别分数的激活方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassActivation {
  #[default]
  Softmax,
  Sigmoid,
}

impl FromStr for ClassActivation {
  type Err = DetectError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "softmax" => Ok(ClassActivation::Softmax),
      "sigmoid" => Ok(ClassActivation::Sigmoid),
      other => Err(DetectError::invalid(format!("未知的激活方式: {other}"))),
    }
  }
}

/// 原始张量的内存布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
  /// `(row, col, anchor, channel)` 行优先
  #[default]
  Interleaved,
  /// `(anchor, channel, row, col)`，每个通道是一整张 `rows x cols` 平面
  Planar,
}

impl FromStr for TensorLayout {
  type Err = DetectError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "interleaved" | "nhwc" => Ok(TensorLayout::Interleaved),
      "planar" | "nchw" => Ok(TensorLayout::Planar),
      other => Err(DetectError::invalid(format!("未知的张量布局: {other}"))),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
  pub grid: GridSize,
  pub anchors: AnchorTemplate,
  pub labels: LabelSet,
  pub activation: ClassActivation,
  pub layout: TensorLayout,
  pub score_threshold: f32,
  pub iou_threshold: f32,
  pub max_per_label: usize,
}

impl PipelineConfig {
  pub fn builder() -> PipelineConfigBuilder {
    PipelineConfigBuilder::default()
  }

  /// 每个网格单元、每个锚框的通道数
  pub fn channels(&self) -> usize {
    5 + self.labels.len()
  }

  pub fn expected_len(&self) -> usize {
    self.grid.cells() * self.anchors.len() * self.channels()
  }

  pub fn validate(&self) -> Result<(), DetectError> {
    if self.grid.rows == 0 || self.grid.cols == 0 {
      return Err(DetectError::invalid(format!("网格尺寸不能为 0: {}", self.grid)));
    }
    if self.anchors.is_empty() {
      return Err(DetectError::invalid("锚框模板为空"));
    }
    if self.labels.is_empty() {
      return Err(DetectError::invalid("类别标签列表为空"));
    }
    check_unit_interval("score_threshold", self.score_threshold)?;
    check_unit_interval("iou_threshold", self.iou_threshold)?;
    Ok(())
  }
}

/// 所有字段都可空，`build` 时统一校验
#[derive(Debug, Clone)]
pub struct PipelineConfigBuilder {
  grid: Option<GridSize>,
  anchors: Option<Vec<(f32, f32)>>,
  labels: Option<LabelSet>,
  activation: ClassActivation,
  layout: TensorLayout,
  score_threshold: f32,
  iou_threshold: f32,
  max_per_label: usize,
}

impl Default for PipelineConfigBuilder {
  fn default() -> Self {
    Self {
      grid: None,
      anchors: None,
      labels: None,
      activation: ClassActivation::default(),
      layout: TensorLayout::default(),
      score_threshold: DEFAULT_SCORE_THRESHOLD,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      max_per_label: DEFAULT_MAX_PER_LABEL,
    }
  }
}

impl PipelineConfigBuilder {
  /// Tiny YOLO v2 (VOC) 的网格、锚框与阈值
  pub fn tiny_yolo_voc() -> Self {
    Self {
      grid: Some(GridSize::new(TINY_YOLO_GRID.0, TINY_YOLO_GRID.1)),
      anchors: Some(TINY_YOLO_ANCHORS.to_vec()),
      labels: Some(LabelSet::voc()),
      activation: ClassActivation::Softmax,
      layout: TensorLayout::Planar,
      ..Self::default()
    }
  }

  pub fn grid(mut self, grid: GridSize) -> Self {
    self.grid = Some(grid);
    self
  }

  pub fn anchors(mut self, anchors: impl IntoIterator<Item = (f32, f32)>) -> Self {
    self.anchors = Some(anchors.into_iter().collect());
    self
  }

  pub fn anchor_template(mut self, template: &AnchorTemplate) -> Self {
    self.anchors = Some(template.iter().map(|a| (a.width, a.height)).collect());
    self
  }

  pub fn labels(mut self, labels: LabelSet) -> Self {
    self.labels = Some(labels);
    self
  }

  pub fn activation(mut self, activation: ClassActivation) -> Self {
    self.activation = activation;
    self
  }

  pub fn layout(mut self, layout: TensorLayout) -> Self {
    self.layout = layout;
    self
  }

  pub fn score_threshold(mut self, threshold: f32) -> Self {
    self.score_threshold = threshold;
    self
  }

  pub fn iou_threshold(mut self, threshold: f32) -> Self {
    self.iou_threshold = threshold;
    self
  }

  pub fn max_per_label(mut self, max: usize) -> Self {
    self.max_per_label = max;
    self
  }

  pub fn build(self) -> Result<PipelineConfig, DetectError> {
    let grid = self.grid.ok_or_else(|| DetectError::invalid("未指定网格尺寸"))?;
    let anchors = AnchorTemplate::new(self.anchors.unwrap_or_default())?;
    let labels = self.labels.unwrap_or_else(|| LabelSet::new(Vec::<String>::new()));

    let config = PipelineConfig {
      grid,
      anchors,
      labels,
      activation: self.activation,
      layout: self.layout,
      score_threshold: self.score_threshold,
      iou_threshold: self.iou_threshold,
      max_per_label: self.max_per_label,
    };
    config.validate()?;

    debug!(
      "后处理配置: 网格 {}, 锚框 {} 个, 类别 {} 个, 期望张量长度 {}",
      config.grid,
      config.anchors.len(),
      config.labels.len(),
      config.expected_len()
    );

    Ok(config)
  }
}

fn is_positive(value: f32) -> bool {
  value.is_finite() && value > 0.0
}

fn check_unit_interval(name: &str, value: f32) -> Result<(), DetectError> {
  if (0.0..=1.0).contains(&value) {
    Ok(())
  } else {
    Err(DetectError::invalid(format!("{name} 必须在 [0, 1] 之间, 实际为 {value}")))
  }
}
