// 该文件是 Linzhi （林芝） 项目的一部分。
// src/detect/decoder.rs - 原始张量解码
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
  AnchorTemplate, Bbox, DetectError, GridSize, PipelineConfig, TensorLayout, scorer::sigmoid,
};

const GEOMETRY_CHANNELS: usize = 4;
const OBJECTNESS_CHANNEL: usize = 4;
const CLASS_CHANNEL_OFFSET: usize = 5;

/// 单个网格单元、单个锚框对应的原始输出
#[derive(Debug, Clone, Copy)]
pub struct RawCell<'a> {
  pub row: usize,
  pub col: usize,
  pub anchor: usize,
  /// `[tx, ty, tw, th]`
  pub geometry: [f32; GEOMETRY_CHANNELS],
  pub objectness: f32,
  pub logits: Logits<'a>,
  /// 解码到图像像素空间后的边界框
  pub bbox: Bbox,
}

/// 类别 logits 的视图，交错布局下连续，平面布局下按固定步长分布
#[derive(Debug, Clone, Copy)]
pub struct Logits<'a> {
  data: &'a [f32],
  start: usize,
  stride: usize,
  len: usize,
}

impl<'a> Logits<'a> {
  pub fn len(&self) -> usize {
    self.len
  }

  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  pub fn get(&self, class_id: usize) -> Option<f32> {
    (class_id < self.len).then(|| self.data[self.start + class_id * self.stride])
  }

  pub fn iter(&self) -> impl Iterator<Item = f32> + 'a {
    let data = self.data;
    let (start, stride) = (self.start, self.stride);
    (0..self.len).map(move |c| data[start + c * stride])
  }

  pub fn to_vec(&self) -> Vec<f32> {
    self.iter().collect()
  }
}

#[derive(Debug, Clone)]
pub struct TensorDecoder {
  grid: GridSize,
  anchors: AnchorTemplate,
  num_classes: usize,
  layout: TensorLayout,
}

impl TensorDecoder {
  pub fn new(
    grid: GridSize,
    anchors: AnchorTemplate,
    num_classes: usize,
    layout: TensorLayout,
  ) -> Self {
    Self {
      grid,
      anchors,
      num_classes,
      layout,
    }
  }

  pub fn from_config(config: &PipelineConfig) -> Self {
    Self::new(
      config.grid,
      config.anchors.clone(),
      config.labels.len(),
      config.layout,
    )
  }

  pub fn grid(&self) -> GridSize {
    self.grid
  }

  pub fn channels(&self) -> usize {
    CLASS_CHANNEL_OFFSET + self.num_classes
  }

  pub fn expected_len(&self) -> usize {
    self.grid.cells() * self.anchors.len() * self.channels()
  }

  /// 将扁平张量解码为逐单元、逐锚框的惰性序列
  ///
  /// `cell_width` 与 `cell_height` 是一个网格单元在图像中的像素尺寸。
  pub fn decode<'a>(
    &'a self,
    tensor: &'a [f32],
    cell_width: f32,
    cell_height: f32,
  ) -> Result<CellIter<'a>, DetectError> {
    let expected = self.expected_len();
    if tensor.len() != expected {
      return Err(DetectError::ShapeMismatch {
        expected,
        actual: tensor.len(),
      });
    }

    debug!(
      "解码张量: 网格 {}, 锚框 {} 个, 通道 {}, 单元尺寸 {:.1}x{:.1}",
      self.grid,
      self.anchors.len(),
      self.channels(),
      cell_width,
      cell_height
    );

    Ok(CellIter {
      decoder: self,
      tensor,
      cell_width,
      cell_height,
      next: 0,
      total: self.grid.cells() * self.anchors.len(),
    })
  }

  fn offset(&self, row: usize, col: usize, anchor: usize, channel: usize) -> usize {
    let channels = self.channels();
    match self.layout {
      TensorLayout::Interleaved => {
        ((row * self.grid.cols + col) * self.anchors.len() + anchor) * channels + channel
      }
      TensorLayout::Planar => {
        ((anchor * channels + channel) * self.grid.rows + row) * self.grid.cols + col
      }
    }
  }

  /// 相邻两个类别通道之间的距离
  fn class_stride(&self) -> usize {
    match self.layout {
      TensorLayout::Interleaved => 1,
      TensorLayout::Planar => self.grid.cells(),
    }
  }
}

pub struct CellIter<'a> {
  decoder: &'a TensorDecoder,
  tensor: &'a [f32],
  cell_width: f32,
  cell_height: f32,
  next: usize,
  total: usize,
}

impl<'a> Iterator for CellIter<'a> {
  type Item = RawCell<'a>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.next >= self.total {
      return None;
    }

    let decoder = self.decoder;
    let num_anchors = decoder.anchors.len();
    let anchor = self.next % num_anchors;
    let col = (self.next / num_anchors) % decoder.grid.cols;
    let row = self.next / (num_anchors * decoder.grid.cols);
    self.next += 1;

    let at = |channel: usize| self.tensor[decoder.offset(row, col, anchor, channel)];
    let geometry = [at(0), at(1), at(2), at(3)];
    let objectness = at(OBJECTNESS_CHANNEL);

    let logits = Logits {
      data: self.tensor,
      start: decoder.offset(row, col, anchor, CLASS_CHANNEL_OFFSET),
      stride: decoder.class_stride(),
      len: decoder.num_classes,
    };

    // 锚框下标在 0..num_anchors 内
    let prior = decoder.anchors.get(anchor)?;
    let [tx, ty, tw, th] = geometry;
    let bbox = Bbox::cxcywh(
      (sigmoid(tx) + col as f32) * self.cell_width,
      (sigmoid(ty) + row as f32) * self.cell_height,
      prior.width * tw.exp() * self.cell_width,
      prior.height * th.exp() * self.cell_height,
    );

    Some(RawCell {
      row,
      col,
      anchor,
      geometry,
      objectness,
      logits,
      bbox,
    })
  }

  fn size_hint(&self) -> (usize, Option<usize>) {
    let remaining = self.total - self.next;
    (remaining, Some(remaining))
  }
}

impl ExactSizeIterator for CellIter<'_> {}
