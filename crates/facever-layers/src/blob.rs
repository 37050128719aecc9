//! N-dimensional `f32` buffer with a gradient buffer of the same size.

use facever_core::{Error, Result};

/// Row-major data plus its gradient.
///
/// Axis 0 is the batch (`num`), axis 1 the channels, and every further
/// axis belongs to the spatial extent.
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    shape: Vec<usize>,
    pub data: Vec<f32>,
    pub diff: Vec<f32>,
}

impl Blob {
    /// Zero-filled blob
    pub fn new(shape: &[usize]) -> Self {
        let count = shape.iter().product();
        Self {
            shape: shape.to_vec(),
            data: vec![0.0; count],
            diff: vec![0.0; count],
        }
    }

    /// Blob holding `data`; the gradient starts at zero.
    pub fn from_data(shape: &[usize], data: Vec<f32>) -> Result<Self> {
        let count: usize = shape.iter().product();
        if count != data.len() {
            return Err(Error::Layer(format!(
                "Shape {:?} requires {} elements, got {}",
                shape,
                count,
                data.len()
            )));
        }
        Ok(Self {
            shape: shape.to_vec(),
            diff: vec![0.0; count],
            data,
        })
    }

    /// Zero-length placeholder for a top blob that `reshape` will size.
    pub fn empty() -> Self {
        Self::new(&[0])
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Total number of elements
    pub fn count(&self) -> usize {
        self.data.len()
    }

    /// Size of axis 0
    pub fn num(&self) -> usize {
        self.shape.first().copied().unwrap_or(1)
    }

    /// Size of axis 1
    pub fn channels(&self) -> usize {
        self.shape.get(1).copied().unwrap_or(1)
    }

    /// Product of the axes after the channels
    pub fn spatial_dim(&self) -> usize {
        self.shape.iter().skip(2).product()
    }

    /// Elements per sample
    pub fn dim(&self) -> usize {
        match self.num() {
            0 => 0,
            n => self.count() / n,
        }
    }

    /// Flat offset of `(n, c, 0, ...)`
    pub fn offset(&self, n: usize, c: usize) -> usize {
        (n * self.channels() + c) * self.spatial_dim()
    }

    /// Resize, zeroing data and gradient when the element count changes.
    pub fn reshape(&mut self, shape: &[usize]) {
        let count: usize = shape.iter().product();
        self.shape = shape.to_vec();
        if count != self.data.len() {
            self.data = vec![0.0; count];
            self.diff = vec![0.0; count];
        }
    }

    pub fn reshape_like(&mut self, other: &Blob) {
        self.reshape(other.shape());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_dims() {
        let blob = Blob::new(&[2, 3, 4, 5]);
        assert_eq!(blob.count(), 120);
        assert_eq!(blob.num(), 2);
        assert_eq!(blob.channels(), 3);
        assert_eq!(blob.spatial_dim(), 20);
        assert_eq!(blob.dim(), 60);
        assert_eq!(blob.offset(1, 2), 100);
    }

    #[test]
    fn test_blob_rank_two() {
        let blob = Blob::new(&[4, 8]);
        assert_eq!(blob.spatial_dim(), 1);
        assert_eq!(blob.offset(2, 3), 19);
    }

    #[test]
    fn test_from_data_checks_count() {
        assert!(Blob::from_data(&[2, 2], vec![1.0; 4]).is_ok());
        assert!(Blob::from_data(&[2, 2], vec![1.0; 3]).is_err());
    }

    #[test]
    fn test_reshape() {
        let mut blob = Blob::from_data(&[2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        blob.reshape(&[4, 1]);
        assert_eq!(blob.data, vec![1.0, 2.0, 3.0, 4.0]);

        blob.reshape(&[3]);
        assert_eq!(blob.data, vec![0.0; 3]);
        assert_eq!(blob.diff.len(), 3);
    }
}
