// 该文件是 Linzhi （林芝） 项目的一部分。
// src/detect/scorer.rs - 候选框打分
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

use tracing::trace;

use super::{BoxProposal, ClassActivation, PipelineConfig, RawCell};
use crate::label::LabelSet;

pub fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

/// 减去最大值后再取指数，避免溢出
pub fn softmax(logits: &[f32]) -> Vec<f32> {
  let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
  let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
  let sum: f32 = exps.iter().sum();
  exps.into_iter().map(|v| v / sum).collect()
}

/// 并列时取下标最小的类别
fn argmax(values: &[f32]) -> Option<(usize, f32)> {
  let mut best: Option<(usize, f32)> = None;
  for (idx, &value) in values.iter().enumerate() {
    match best {
      Some((_, top)) if value <= top => {}
      _ => best = Some((idx, value)),
    }
  }
  best
}

#[derive(Debug, Clone)]
pub struct BoxScorer {
  activation: ClassActivation,
  score_threshold: f32,
  labels: LabelSet,
}

impl BoxScorer {
  pub fn new(activation: ClassActivation, score_threshold: f32, labels: LabelSet) -> Self {
    Self {
      activation,
      score_threshold,
      labels,
    }
  }

  pub fn from_config(config: &PipelineConfig) -> Self {
    Self::new(
      config.activation,
      config.score_threshold,
      config.labels.clone(),
    )
  }

  pub fn class_probabilities(&self, logits: &[f32]) -> Vec<f32> {
    match self.activation {
      ClassActivation::Softmax => softmax(logits),
      ClassActivation::Sigmoid => logits.iter().map(|&v| sigmoid(v)).collect(),
    }
  }

  /// 低于阈值或含非有限值的候选框返回 `None`
  pub fn score(&self, cell: &RawCell<'_>) -> Option<BoxProposal> {
    let objectness = sigmoid(cell.objectness);
    let probabilities = self.class_probabilities(&cell.logits.to_vec());

    if !cell.bbox.is_finite()
      || !objectness.is_finite()
      || probabilities.iter().any(|p| !p.is_finite())
    {
      trace!(
        "丢弃含非有限值的候选框: ({}, {}, {})",
        cell.row, cell.col, cell.anchor
      );
      return None;
    }

    let (class_id, top) = argmax(&probabilities)?;
    let confidence = (objectness * top).clamp(0.0, 1.0);
    if confidence < self.score_threshold {
      return None;
    }

    let label = self.labels.get(class_id)?.to_string();

    Some(BoxProposal {
      bbox: cell.bbox,
      confidence,
      class_id,
      label,
      class_probabilities: probabilities.into_boxed_slice(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detect::{AnchorTemplate, GridSize, TensorDecoder, TensorLayout};

  fn single_cell(values: &[f32], classes: usize) -> (TensorDecoder, Vec<f32>) {
    let decoder = TensorDecoder::new(
      GridSize::new(1, 1),
      AnchorTemplate::new([(1.0, 1.0)]).unwrap(),
      classes,
      TensorLayout::Interleaved,
    );
    (decoder, values.to_vec())
  }

  fn labels(n: usize) -> LabelSet {
    LabelSet::new((0..n).map(|i| format!("class{i}")))
  }

  #[test]
  fn softmax_sums_to_one() {
    let probs = softmax(&[1.0, 2.0, 3.0, -4.0]);
    let sum: f32 = probs.iter().sum();
    assert!((sum - 1.0).abs() < 1e-6);
    assert!(probs[2] > probs[1] && probs[1] > probs[0]);
  }

  #[test]
  fn softmax_is_stable_for_large_logits() {
    let probs = softmax(&[1000.0, 1000.0]);
    assert!((probs[0] - 0.5).abs() < 1e-6);
    assert!((probs[1] - 0.5).abs() < 1e-6);
  }

  #[test]
  fn argmax_prefers_lowest_index_on_tie() {
    assert_eq!(argmax(&[0.2, 0.4, 0.4]), Some((1, 0.4)));
    assert_eq!(argmax(&[]), None);
  }

  #[test]
  fn confidence_combines_objectness_and_class() {
    let (decoder, tensor) = single_cell(&[0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0], 2);
    let scorer = BoxScorer::new(ClassActivation::Softmax, 0.0, labels(2));
    let cell = decoder.decode(&tensor, 10.0, 10.0).unwrap().next().unwrap();
    let proposal = scorer.score(&cell).unwrap();
    // sigmoid(0) * 0.5
    assert!((proposal.confidence - 0.25).abs() < 1e-6);
    assert_eq!(proposal.class_id, 0);
    assert_eq!(proposal.label, "class0");
  }

  #[test]
  fn sigmoid_activation_scores_classes_independently() {
    let (decoder, tensor) = single_cell(&[0.0, 0.0, 0.0, 0.0, 20.0, 0.0, 20.0], 2);
    let scorer = BoxScorer::new(ClassActivation::Sigmoid, 0.0, labels(2));
    let cell = decoder.decode(&tensor, 10.0, 10.0).unwrap().next().unwrap();
    let proposal = scorer.score(&cell).unwrap();
    assert_eq!(proposal.class_id, 1);
    assert!((proposal.class_probabilities[0] - 0.5).abs() < 1e-6);
    assert!(proposal.confidence > 0.99);
  }

  #[test]
  fn below_threshold_is_discarded() {
    let (decoder, tensor) = single_cell(&[0.0, 0.0, 0.0, 0.0, -50.0, 10.0], 1);
    let scorer = BoxScorer::new(ClassActivation::Softmax, 0.1, labels(1));
    let cell = decoder.decode(&tensor, 10.0, 10.0).unwrap().next().unwrap();
    assert!(scorer.score(&cell).is_none());
  }

  #[test]
  fn non_finite_values_are_discarded() {
    let scorer = BoxScorer::new(ClassActivation::Softmax, 0.0, labels(1));

    let (decoder, tensor) = single_cell(&[f32::NAN, 0.0, 0.0, 0.0, 10.0, 10.0], 1);
    let cell = decoder.decode(&tensor, 10.0, 10.0).unwrap().next().unwrap();
    assert!(scorer.score(&cell).is_none());

    // exp(1000) 溢出为无穷大
    let (decoder, tensor) = single_cell(&[0.0, 0.0, 1000.0, 0.0, 10.0, 10.0], 1);
    let cell = decoder.decode(&tensor, 10.0, 10.0).unwrap().next().unwrap();
    assert!(scorer.score(&cell).is_none());

    let (decoder, tensor) = single_cell(&[0.0, 0.0, 0.0, 0.0, 10.0, f32::INFINITY], 1);
    let cell = decoder.decode(&tensor, 10.0, 10.0).unwrap().next().unwrap();
    assert!(scorer.score(&cell).is_none());
  }
}
