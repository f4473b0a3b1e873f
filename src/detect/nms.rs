// 该文件是 Linzhi （林芝） 项目的一部分。
// src/detect/nms.rs - 非极大值抑制
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

use std::collections::{BTreeMap, VecDeque};

use tracing::debug;

use super::{Bbox, BoxProposal, Detection, PipelineConfig};

/// 交并比，并集为 0 时（含两个完全相同的零面积框）定义为 0
pub fn iou(a: &Bbox, b: &Bbox) -> f32 {
  let intersection = a.intersection(b);
  let union = a.area() + b.area() - intersection;
  if union > 0.0 {
    (intersection / union).clamp(0.0, 1.0)
  } else {
    0.0
  }
}

/// 可参与抑制的检测项
pub trait Nms {
  fn bbox(&self) -> &Bbox;
  fn confidence(&self) -> f32;
  fn class_id(&self) -> usize;
}

impl Nms for BoxProposal {
  fn bbox(&self) -> &Bbox {
    &self.bbox
  }

  fn confidence(&self) -> f32 {
    self.confidence
  }

  fn class_id(&self) -> usize {
    self.class_id
  }
}

impl Nms for Detection {
  fn bbox(&self) -> &Bbox {
    &self.bbox
  }

  fn confidence(&self) -> f32 {
    self.confidence
  }

  fn class_id(&self) -> usize {
    self.class_id
  }
}

#[derive(Debug, Clone, Copy)]
pub struct NonMaxSuppressor {
  iou_threshold: f32,
  max_per_label: usize,
}

impl NonMaxSuppressor {
  pub fn new(iou_threshold: f32, max_per_label: usize) -> Self {
    Self {
      iou_threshold,
      max_per_label,
    }
  }

  pub fn from_config(config: &PipelineConfig) -> Self {
    Self::new(config.iou_threshold, config.max_per_label)
  }

  pub fn suppress(&self, proposals: impl IntoIterator<Item = BoxProposal>) -> Vec<Detection> {
    self
      .select(proposals)
      .into_iter()
      .map(Detection::from)
      .collect()
  }

  /// 按类别分组的贪心选择
  ///
  /// 输出先按类别下标排序，同类内按置信度降序；置信度相同的保持输入顺序。
  pub fn select<T: Nms>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut groups: BTreeMap<usize, Vec<T>> = BTreeMap::new();
    let mut total = 0usize;
    for item in items {
      groups.entry(item.class_id()).or_default().push(item);
      total += 1;
    }

    let mut kept = Vec::new();
    for (class_id, mut group) in groups {
      // sort_by 是稳定排序
      group.sort_by(|a, b| b.confidence().total_cmp(&a.confidence()));

      let before = kept.len();
      let mut remaining = VecDeque::from(group);
      while kept.len() - before < self.max_per_label {
        let Some(best) = remaining.pop_front() else {
          break;
        };
        remaining.retain(|other| iou(best.bbox(), other.bbox()) <= self.iou_threshold);
        kept.push(best);
      }

      debug!(
        "类别 {} 保留 {} 个检测框",
        class_id,
        kept.len() - before
      );
    }

    debug!("非极大值抑制: {} -> {}", total, kept.len());
    kept
  }
}
