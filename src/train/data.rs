//! Datasets and batch loaders

use super::Batch;
use crate::{Error, Result};
use ndarray::{Array1, Array2, ArrayD, Axis, IxDyn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::Deserialize;
use std::path::Path;

/// Source of batches for one pass over a dataset
pub trait DataLoader: Send {
    /// Number of batches one pass yields
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over one pass of batches
    fn batches(&mut self) -> Box<dyn Iterator<Item = Result<Batch>> + '_>;
}

impl DataLoader for Vec<Batch> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn batches(&mut self) -> Box<dyn Iterator<Item = Result<Batch>> + '_> {
        Box::new(self.iter().cloned().map(Ok))
    }
}

/// Labelled samples held in memory, sample index on axis 0
#[derive(Debug, Clone)]
pub struct Dataset {
    inputs: ArrayD<f32>,
    targets: Array1<usize>,
}

#[derive(Deserialize)]
struct DatasetFile {
    inputs: Vec<Vec<f32>>,
    targets: Vec<usize>,
    #[serde(default)]
    sample_shape: Option<Vec<usize>>,
}

impl Dataset {
    pub fn new(inputs: ArrayD<f32>, targets: Array1<usize>) -> Result<Self> {
        if inputs.ndim() < 2 {
            return Err(Error::Data(format!(
                "inputs need a batch axis and at least one feature axis, got shape {:?}",
                inputs.shape()
            )));
        }
        let batch = Batch::new(inputs, targets);
        batch.validate()?;
        Ok(Self {
            inputs: batch.inputs,
            targets: batch.targets,
        })
    }

    /// Gaussian blobs: one random centre per class, samples spread around it
    pub fn synthetic_blobs(
        samples: usize,
        features: usize,
        classes: usize,
        spread: f32,
        seed: u64,
    ) -> Result<Self> {
        if classes == 0 || features == 0 {
            return Err(Error::InvalidParameter(
                "synthetic dataset needs at least one class and one feature".into(),
            ));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let centre_dist = Normal::new(0.0f32, 2.0)
            .map_err(|e| Error::InvalidParameter(format!("blob centres: {e}")))?;
        let noise = Normal::new(0.0f32, spread)
            .map_err(|e| Error::InvalidParameter(format!("blob spread: {e}")))?;

        let centres = Array2::from_shape_simple_fn((classes, features), || {
            centre_dist.sample(&mut rng)
        });
        let targets = Array1::from_iter((0..samples).map(|i| i % classes));
        let mut inputs = Array2::zeros((samples, features));
        for (mut row, &class) in inputs.outer_iter_mut().zip(targets.iter()) {
            for (x, &c) in row.iter_mut().zip(centres.row(class)) {
                *x = c + noise.sample(&mut rng);
            }
        }

        Self::new(inputs.into_dyn(), targets)
    }

    /// Load `{ "inputs": [[..]], "targets": [..], "sample_shape": [..] }`
    ///
    /// Each input row is one flattened sample; `sample_shape` (optional)
    /// restores its shape, e.g. `[1, 28, 28]`.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let file: DatasetFile = serde_json::from_str(&content)?;

        let rows = file.inputs.len();
        let width = file.inputs.first().map_or(0, Vec::len);
        if file.inputs.iter().any(|r| r.len() != width) {
            return Err(Error::Data(format!(
                "{}: input rows have differing lengths",
                path.display()
            )));
        }

        let sample_shape = file.sample_shape.unwrap_or_else(|| vec![width]);
        if sample_shape.iter().product::<usize>() != width {
            return Err(Error::ShapeMismatch {
                expected: sample_shape,
                got: vec![width],
            });
        }
        let mut shape = vec![rows];
        shape.extend(sample_shape);

        let flat: Vec<f32> = file.inputs.into_iter().flatten().collect();
        let inputs = ArrayD::from_shape_vec(IxDyn(&shape), flat)
            .map_err(|e| Error::Data(format!("{}: {e}", path.display())))?;
        Self::new(inputs, Array1::from(file.targets))
    }

    /// Shuffle and split off `valid_fraction` of the samples
    ///
    /// Returns `(train, valid)`; each side keeps at least one sample when
    /// the dataset has two or more.
    pub fn split(&self, valid_fraction: f32, seed: u64) -> Result<(Self, Self)> {
        if !(0.0..1.0).contains(&valid_fraction) {
            return Err(Error::InvalidParameter(format!(
                "valid fraction must be in [0, 1), got {valid_fraction}"
            )));
        }
        let n = self.len();
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));

        let mut n_valid = (n as f32 * valid_fraction).round() as usize;
        if n >= 2 && valid_fraction > 0.0 {
            n_valid = n_valid.clamp(1, n - 1);
        }
        let (valid_idx, train_idx) = order.split_at(n_valid);
        Ok((self.select(train_idx), self.select(valid_idx)))
    }

    fn select(&self, indices: &[usize]) -> Self {
        Self {
            inputs: self.inputs.select(Axis(0), indices),
            targets: self.targets.select(Axis(0), indices),
        }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Flattened size of one sample
    pub fn num_features(&self) -> usize {
        self.inputs.shape().iter().skip(1).product()
    }

    /// Shape of one sample (without the batch axis)
    pub fn sample_shape(&self) -> &[usize] {
        &self.inputs.shape()[1..]
    }

    /// Largest target + 1
    pub fn num_classes(&self) -> usize {
        self.targets.iter().max().map_or(0, |&m| m + 1)
    }

    pub fn inputs(&self) -> &ArrayD<f32> {
        &self.inputs
    }

    pub fn targets(&self) -> &Array1<usize> {
        &self.targets
    }
}

/// Batches a [`Dataset`] held in memory
#[derive(Debug, Clone)]
pub struct InMemoryLoader {
    dataset: Dataset,
    batch_size: usize,
    rng: Option<StdRng>,
    drop_last: bool,
}

impl InMemoryLoader {
    pub fn new(dataset: Dataset, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidParameter("batch size must be > 0".into()));
        }
        Ok(Self {
            dataset,
            batch_size,
            rng: None,
            drop_last: false,
        })
    }

    /// Reshuffle sample order on every pass
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.rng = Some(StdRng::seed_from_u64(seed));
        self
    }

    /// Skip the trailing partial batch
    pub fn with_drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }
}

impl DataLoader for InMemoryLoader {
    fn len(&self) -> usize {
        let n = self.dataset.len();
        if self.drop_last {
            n / self.batch_size
        } else {
            n.div_ceil(self.batch_size)
        }
    }

    fn batches(&mut self) -> Box<dyn Iterator<Item = Result<Batch>> + '_> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if let Some(rng) = self.rng.as_mut() {
            order.shuffle(rng);
        }
        let batch_size = self.batch_size;
        let drop_last = self.drop_last;
        let dataset = &self.dataset;

        let chunks: Vec<Vec<usize>> = order
            .chunks(batch_size)
            .filter(|c| !drop_last || c.len() == batch_size)
            .map(<[usize]>::to_vec)
            .collect();

        Box::new(chunks.into_iter().map(move |idx| {
            let part = dataset.select(&idx);
            Ok(Batch::new(part.inputs, part.targets))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn toy(n: usize) -> Dataset {
        let inputs = Array2::from_shape_fn((n, 2), |(i, j)| (i * 2 + j) as f32).into_dyn();
        Dataset::new(inputs, Array1::from_iter((0..n).map(|i| i % 2))).unwrap()
    }

    #[test]
    fn test_loader_len_and_partial_batch() {
        let mut loader = InMemoryLoader::new(toy(10), 4).unwrap();
        assert_eq!(loader.len(), 3);
        let sizes: Vec<usize> = loader.batches().map(|b| b.unwrap().len()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn test_loader_drop_last() {
        let mut loader = InMemoryLoader::new(toy(10), 4)
            .unwrap()
            .with_drop_last(true);
        assert_eq!(loader.len(), 2);
        assert_eq!(loader.batches().count(), 2);
    }

    #[test]
    fn test_loader_without_shuffle_keeps_order() {
        let mut loader = InMemoryLoader::new(toy(4), 2).unwrap();
        let first = loader.batches().next().unwrap().unwrap();
        assert_eq!(first.targets.to_vec(), vec![0, 1]);
        assert_eq!(first.inputs[[1, 0]], 2.0);
    }

    #[test]
    fn test_shuffle_covers_every_sample_once() {
        let mut loader = InMemoryLoader::new(toy(9), 4).unwrap().with_shuffle(3);
        let mut seen: Vec<f32> = loader
            .batches()
            .flat_map(|b| {
                let batch = b.unwrap();
                batch.inputs.index_axis(Axis(1), 0).iter().copied().collect::<Vec<_>>()
            })
            .collect();
        seen.sort_by(|a, b| a.total_cmp(b));
        let expected: Vec<f32> = (0..9).map(|i| (i * 2) as f32).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(InMemoryLoader::new(toy(3), 0).is_err());
    }

    #[test]
    fn test_synthetic_blobs() {
        let data = Dataset::synthetic_blobs(30, 4, 3, 0.5, 1).unwrap();
        assert_eq!(data.len(), 30);
        assert_eq!(data.num_features(), 4);
        assert_eq!(data.num_classes(), 3);
        let again = Dataset::synthetic_blobs(30, 4, 3, 0.5, 1).unwrap();
        assert_eq!(data.inputs(), again.inputs());
    }

    #[test]
    fn test_split_keeps_both_sides_non_empty() {
        let (train, valid) = toy(10).split(0.2, 0).unwrap();
        assert_eq!((train.len(), valid.len()), (8, 2));
        let (train, valid) = toy(3).split(0.01, 0).unwrap();
        assert_eq!((train.len(), valid.len()), (2, 1));
        assert!(toy(3).split(1.0, 0).is_err());
    }

    #[test]
    fn test_from_json_file_with_sample_shape() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"inputs": [[1,2,3,4],[5,6,7,8]], "targets": [0, 1], "sample_shape": [1, 2, 2]}}"#
        )
        .unwrap();
        let data = Dataset::from_json_file(file.path()).unwrap();
        assert_eq!(data.inputs().shape(), &[2, 1, 2, 2]);
        assert_eq!(data.sample_shape(), &[1, 2, 2]);
        assert_eq!(data.num_classes(), 2);
    }

    #[test]
    fn test_from_json_file_rejects_ragged_rows() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"inputs": [[1,2],[3]], "targets": [0, 1]}}"#).unwrap();
        assert!(matches!(
            Dataset::from_json_file(file.path()),
            Err(Error::Data(_))
        ));
    }

    #[test]
    fn test_vec_loader() {
        let mut batches = vec![Batch::new(ArrayD::zeros(IxDyn(&[1, 2])), Array1::from(vec![0]))];
        assert_eq!(DataLoader::len(&batches), 1);
        assert_eq!(batches.batches().count(), 1);
    }
}
