#![cfg(feature = "directory_record")]

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};

use linzhi::{
  FromUrl,
  detect::{DetectionPipeline, GridSize, PipelineConfig},
  input::ImageFolderInput,
  label::LabelSet,
  model::{Detector, TensorFileFormat, TensorFileModel},
  output::{DirectoryRecordOutput, draw::{Draw, Record}},
  task::{ContinuousTask, Task},
};

fn pipeline() -> DetectionPipeline {
  let config = PipelineConfig::builder()
    .grid(GridSize::new(1, 1))
    .anchors([(0.5, 0.5)])
    .labels(LabelSet::new(["dog", "cat"]))
    .build()
    .unwrap();
  DetectionPipeline::new(config).unwrap()
}

fn write_image(dir: &Path, name: &str) {
  RgbImage::from_pixel(40, 40, Rgb([200, 200, 200]))
    .save(dir.join(name))
    .unwrap();
}

fn write_tensor(dir: &Path, stem: &str, values: &[f32]) {
  let json = serde_json::to_string(values).unwrap();
  std::fs::write(dir.join(format!("{stem}.json")), json).unwrap();
}

fn read_json(path: &Path) -> serde_json::Value {
  serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn only_child(dir: &Path) -> PathBuf {
  let entries: Vec<_> = std::fs::read_dir(dir)
    .unwrap()
    .map(|e| e.unwrap().path())
    .collect();
  assert_eq!(entries.len(), 1, "{} 下应只有一个条目", dir.display());
  entries.into_iter().next().unwrap()
}

/// 偶数编号的图像有一个 dog，奇数编号的没有检测结果
fn write_mixed_inputs(images: &Path, tensors: &Path, count: usize) {
  for i in 0..count {
    let stem = format!("img{i}");
    write_image(images, &format!("{stem}.png"));
    let objectness = if i % 2 == 0 { 10.0 } else { -50.0 };
    write_tensor(tensors, &stem, &[0.0, 0.0, 0.0, 0.0, objectness, 5.0, -5.0]);
  }
}

fn detector(tensors: &Path) -> Detector<TensorFileModel> {
  Detector::new(TensorFileModel::new(tensors, TensorFileFormat::Json), pipeline())
}

#[test]
fn every_image_is_annotated_and_recorded() {
  let images = tempfile::tempdir().unwrap();
  let tensors = tempfile::tempdir().unwrap();
  let annotated = tempfile::tempdir().unwrap();

  write_image(images.path(), "a.png");
  write_image(images.path(), "b.png");
  // a: 类别 cat；b: objectness 太低
  write_tensor(tensors.path(), "a", &[0.0, 0.0, 0.0, 0.0, 10.0, -5.0, 5.0]);
  write_tensor(tensors.path(), "b", &[0.0, 0.0, 0.0, 0.0, -50.0, 5.0, 0.0]);

  let input = ImageFolderInput::open(images.path()).unwrap();
  let model = Detector::new(
    TensorFileModel::new(tensors.path(), TensorFileFormat::Json),
    pipeline(),
  );
  let output = DirectoryRecordOutput::new(annotated.path(), Draw::default().thickness(1))
    .with_record(Some(Record::Json));

  let summary = ContinuousTask::default()
    .run_task(input, model, output)
    .unwrap();
  assert_eq!(summary.frames, 2);
  assert_eq!(summary.skipped, 0);
  assert_eq!(summary.detections, 1);

  let saved = image::open(annotated.path().join("a.png")).unwrap().to_rgb8();
  assert_eq!(saved.dimensions(), (40, 40));
  assert!(annotated.path().join("b.png").exists());

  let record = read_json(&annotated.path().join("a.json"));
  let items = record.as_array().unwrap();
  assert_eq!(items.len(), 1);
  assert_eq!(items[0]["label"], "cat");
  assert_eq!(items[0]["class_id"], 1);

  let empty = read_json(&annotated.path().join("b.json"));
  assert!(empty.as_array().unwrap().is_empty());
}

#[test]
fn images_with_bad_tensors_are_skipped() {
  let images = tempfile::tempdir().unwrap();
  let tensors = tempfile::tempdir().unwrap();
  let annotated = tempfile::tempdir().unwrap();

  write_image(images.path(), "good.png");
  write_image(images.path(), "missing.png");
  write_image(images.path(), "short.png");
  std::fs::write(images.path().join("notes.txt"), "not an image").unwrap();
  write_tensor(tensors.path(), "good", &[0.0, 0.0, 0.0, 0.0, 10.0, 5.0, -5.0]);
  write_tensor(tensors.path(), "short", &[0.0, 0.0, 0.0]);

  let input = ImageFolderInput::open(images.path()).unwrap();
  assert_eq!(input.remaining(), 3);

  let model = Detector::new(
    TensorFileModel::new(tensors.path(), TensorFileFormat::Json),
    pipeline(),
  );
  let output = DirectoryRecordOutput::new(annotated.path(), Draw::default());

  let summary = ContinuousTask::default()
    .run_task(input, model, output)
    .unwrap();
  assert_eq!(summary.frames, 1);
  assert_eq!(summary.skipped, 2);
  assert!(annotated.path().join("good.png").exists());
  assert!(!annotated.path().join("short.png").exists());
}

#[test]
fn frame_limit_stops_early() {
  let images = tempfile::tempdir().unwrap();
  let tensors = tempfile::tempdir().unwrap();
  let annotated = tempfile::tempdir().unwrap();

  for name in ["1", "2", "3"] {
    write_image(images.path(), &format!("{name}.png"));
    write_tensor(tensors.path(), name, &[0.0; 7]);
  }

  let summary = ContinuousTask::default()
    .with_frame_number(Some(2))
    .run_task(
      ImageFolderInput::open(images.path()).unwrap(),
      Detector::new(
        TensorFileModel::new(tensors.path(), TensorFileFormat::Json),
        pipeline(),
      ),
      DirectoryRecordOutput::new(annotated.path(), Draw::default()),
    )
    .unwrap();
  assert_eq!(summary.frames, 2);
  assert!(!annotated.path().join("3.png").exists());
}

#[test]
fn dated_output_skips_images_without_detections() {
  let images = tempfile::tempdir().unwrap();
  let tensors = tempfile::tempdir().unwrap();
  let annotated = tempfile::tempdir().unwrap();
  write_mixed_inputs(images.path(), tensors.path(), 4);

  let url = url::Url::parse(&format!(
    "folder://{}?skip_empty&dated&record=name",
    annotated.path().display()
  ))
  .unwrap();
  let output = DirectoryRecordOutput::from_url(&url).unwrap();

  let summary = ContinuousTask::default()
    .run_task(
      ImageFolderInput::open(images.path()).unwrap(),
      detector(tensors.path()),
      output,
    )
    .unwrap();
  assert_eq!(summary.frames, 4);
  assert_eq!(summary.detections, 2);

  // YYYY/MM/DD
  let year = only_child(annotated.path());
  let month = only_child(&year);
  let day = only_child(&month);
  let name = |p: &Path| p.file_name().unwrap().to_string_lossy().into_owned();
  assert_eq!(name(&year).len(), 4);
  assert_eq!(name(&month).len(), 2);
  assert_eq!(name(&day).len(), 2);

  let mut files: Vec<_> = std::fs::read_dir(&day)
    .unwrap()
    .map(|e| name(&e.unwrap().path()))
    .collect();
  files.sort();
  assert_eq!(files, ["img0.png", "img0.txt", "img2.png", "img2.txt"]);

  let record = std::fs::read_to_string(day.join("img0.txt")).unwrap();
  assert!(record.starts_with("dog, "));
}

#[cfg(feature = "rayon")]
#[test]
fn parallel_run_matches_sequential_run() {
  use linzhi::task::ParallelTask;

  let images = tempfile::tempdir().unwrap();
  let tensors = tempfile::tempdir().unwrap();
  let sequential = tempfile::tempdir().unwrap();
  let parallel = tempfile::tempdir().unwrap();
  write_mixed_inputs(images.path(), tensors.path(), 8);

  let run = |task_output: &Path, parallel_run: bool| {
    let input = ImageFolderInput::open(images.path()).unwrap();
    let output = DirectoryRecordOutput::new(task_output, Draw::default())
      .with_record(Some(Record::Json));
    let summary = if parallel_run {
      ParallelTask.run_task(input, detector(tensors.path()), output)
    } else {
      ContinuousTask::default().run_task(input, detector(tensors.path()), output)
    };
    summary.unwrap()
  };

  let a = run(sequential.path(), false);
  let b = run(parallel.path(), true);
  assert_eq!(a, b);
  assert_eq!(b.frames, 8);
  assert_eq!(b.detections, 4);

  for i in 0..8 {
    let record = format!("img{i}.json");
    assert_eq!(
      read_json(&sequential.path().join(&record)),
      read_json(&parallel.path().join(&record))
    );
    let image = format!("img{i}.png");
    assert_eq!(
      image::open(sequential.path().join(&image)).unwrap().to_rgb8(),
      image::open(parallel.path().join(&image)).unwrap().to_rgb8()
    );
  }
}
