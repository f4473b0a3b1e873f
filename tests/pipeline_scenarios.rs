use linzhi::detect::{
  Bbox, BoxProposal, DetectError, DetectionPipeline, GridSize, NonMaxSuppressor, PipelineConfig,
  PipelineConfigBuilder, TensorLayout, iou,
};
use linzhi::label::LabelSet;

fn single_cell_pipeline() -> DetectionPipeline {
  let config = PipelineConfig::builder()
    .grid(GridSize::new(1, 1))
    .anchors([(1.0, 1.0)])
    .labels(LabelSet::new(["person"]))
    .build()
    .unwrap();
  DetectionPipeline::new(config).unwrap()
}

fn proposal(confidence: f32, bbox: Bbox) -> BoxProposal {
  BoxProposal {
    bbox,
    confidence,
    class_id: 0,
    label: "person".to_string(),
    class_probabilities: vec![1.0].into_boxed_slice(),
  }
}

#[test]
fn single_cell_single_anchor_yields_centered_detection() {
  let pipeline = single_cell_pipeline();
  let result = pipeline.run(&[0.0, 0.0, 0.0, 0.0, 10.0, 10.0], 100, 100).unwrap();

  assert_eq!(result.len(), 1);
  let detection = &result.items[0];
  assert!((detection.confidence - 1.0).abs() < 1e-3);
  assert!((detection.bbox.cx - 50.0).abs() < 1e-3);
  assert!((detection.bbox.cy - 50.0).abs() < 1e-3);
  assert!((detection.bbox.width - 100.0).abs() < 1e-3);
  assert!((detection.bbox.height - 100.0).abs() < 1e-3);
  assert_eq!(detection.label, "person");
}

#[test]
fn very_negative_objectness_yields_nothing() {
  let config = PipelineConfigBuilder::tiny_yolo_voc().build().unwrap();
  let channels = config.channels();
  let cells = config.grid.cells();
  let mut tensor = vec![0.0f32; config.expected_len()];
  // 平面布局: 每个锚框的第 4 个通道是 objectness
  for anchor in 0..config.anchors.len() {
    let start = (anchor * channels + 4) * cells;
    tensor[start..start + cells].fill(-50.0);
  }

  let pipeline = DetectionPipeline::new(config).unwrap();
  let result = pipeline.run(&tensor, 416, 416).unwrap();
  assert!(result.is_empty());
}

#[test]
fn wrong_tensor_length_is_a_shape_mismatch() {
  let pipeline = single_cell_pipeline();
  let err = pipeline.run(&[0.0; 5], 100, 100).unwrap_err();
  assert_eq!(
    err,
    DetectError::ShapeMismatch {
      expected: 6,
      actual: 5
    }
  );
}

#[test]
fn high_overlap_keeps_only_the_stronger_box() {
  let strong = Bbox::xyxy(0.0, 0.0, 100.0, 100.0);
  let weak = Bbox::xyxy(0.0, 0.0, 100.0, 90.0);
  assert!((iou(&strong, &weak) - 0.9).abs() < 1e-5);

  let kept = NonMaxSuppressor::new(0.5, 5).suppress([proposal(0.8, weak), proposal(0.9, strong)]);
  assert_eq!(kept.len(), 1);
  assert_eq!(kept[0].confidence, 0.9);
}

#[test]
fn low_overlap_keeps_both_boxes() {
  let a = Bbox::xyxy(0.0, 0.0, 100.0, 100.0);
  // 交集 20x100, 并集 18000, IoU = 1/9
  let b = Bbox::xyxy(80.0, 0.0, 180.0, 100.0);
  assert!(iou(&a, &b) < 0.12);

  let kept = NonMaxSuppressor::new(0.5, 5).suppress([proposal(0.9, a), proposal(0.8, b)]);
  assert_eq!(kept.len(), 2);
}

#[test]
fn interleaved_and_planar_layouts_agree() {
  let build = |layout| {
    PipelineConfig::builder()
      .grid(GridSize::new(2, 3))
      .anchors([(1.0, 1.0), (2.0, 3.0)])
      .labels(LabelSet::new(["a", "b"]))
      .layout(layout)
      .score_threshold(0.0)
      .max_per_label(100)
      .iou_threshold(1.0)
      .build()
      .unwrap()
  };
  let interleaved = DetectionPipeline::new(build(TensorLayout::Interleaved)).unwrap();
  let planar = DetectionPipeline::new(build(TensorLayout::Planar)).unwrap();

  let (rows, cols, anchors, channels) = (2, 3, 2, 7);
  let mut nhwc = vec![0.0f32; rows * cols * anchors * channels];
  let mut nchw = vec![0.0f32; nhwc.len()];
  for row in 0..rows {
    for col in 0..cols {
      for anchor in 0..anchors {
        for channel in 0..channels {
          let value = ((row * 31 + col * 17 + anchor * 7 + channel * 3) % 11) as f32 * 0.1 - 0.5;
          nhwc[((row * cols + col) * anchors + anchor) * channels + channel] = value;
          nchw[((anchor * channels + channel) * rows + row) * cols + col] = value;
        }
      }
    }
  }

  let a = interleaved.run(&nhwc, 60, 40).unwrap();
  let b = planar.run(&nchw, 60, 40).unwrap();
  assert_eq!(a, b);
  assert_eq!(a.len(), rows * cols * anchors);
}

#[test]
fn output_is_grouped_by_class_then_confidence() {
  let config = PipelineConfig::builder()
    .grid(GridSize::new(1, 2))
    .anchors([(0.5, 0.5)])
    .labels(LabelSet::new(["a", "b"]))
    .score_threshold(0.0)
    .build()
    .unwrap();
  let pipeline = DetectionPipeline::new(config).unwrap();
  // 单元 0 倾向类别 b, 单元 1 倾向类别 a
  let tensor = [
    0.0, 0.0, 0.0, 0.0, 5.0, 0.0, 3.0, //
    0.0, 0.0, 0.0, 0.0, 5.0, 3.0, 0.0,
  ];
  let result = pipeline.run(&tensor, 200, 100).unwrap();
  let labels: Vec<_> = result.iter().map(|d| d.label.as_str()).collect();
  assert_eq!(labels, ["a", "b"]);
}
