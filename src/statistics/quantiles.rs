//! Approximate quantiles of a stream of numeric values.

use ordered_float::OrderedFloat;

/// The default compression. Larger values produce more accurate sketches that occupy more memory.
pub const DEFAULT_COMPRESSION: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Centroid {
    mean: f64,
    weight: f64,
}

/// A merging t-digest. Values are buffered and periodically merged into a sorted list of centroids
/// whose sizes are bounded by `4 * n * q * (1 - q) / compression`, so the tails of the distribution
/// are represented more precisely than its middle.
#[derive(Debug, Clone)]
pub struct QuantileSketch {
    compression: f64,
    centroids: Vec<Centroid>,
    buffer: Vec<f64>,
    count: u64,
    min: f64,
    max: f64,
}

impl Default for QuantileSketch {
    fn default() -> Self {
        QuantileSketch::new()
    }
}

impl QuantileSketch {
    /// Creates a sketch with the [default compression](self::DEFAULT_COMPRESSION).
    pub fn new() -> Self {
        QuantileSketch::with_compression(DEFAULT_COMPRESSION)
    }

    pub fn with_compression(compression: f64) -> Self {
        assert!(compression > 0.0, "compression must be positive");
        QuantileSketch {
            compression,
            centroids: Vec::new(),
            buffer: Vec::new(),
            count: 0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// Adds a value to this sketch. NaNs are ignored.
    pub fn add(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.buffer.push(value);
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        if self.buffer.len() as f64 >= self.compression * 5.0 {
            self.compress();
        }
    }

    /// Merges buffered values into centroids.
    pub fn compress(&mut self) {
        if !self.buffer.is_empty() {
            let buffer = std::mem::take(&mut self.buffer);
            self.centroids = self.merged_centroids(&buffer);
        }
    }

    /// The number of values added to this sketch.
    pub fn len(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn min(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.min)
        }
    }

    pub fn max(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.max)
        }
    }

    /// Returns the estimated fraction of values that are less than or equal to `x`.
    /// Returns `NaN` if this sketch is empty.
    pub fn cdf(&self, x: f64) -> f64 {
        if self.is_empty() {
            return f64::NAN;
        }
        if x < self.min {
            return 0.0;
        }
        if x >= self.max {
            return 1.0;
        }

        let points = self.points();
        for pair in points.windows(2) {
            let (x0, y0) = pair[0];
            let (x1, y1) = pair[1];
            if x <= x1 {
                return if x1 > x0 {
                    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
                } else {
                    y1
                };
            }
        }
        1.0
    }

    /// Returns the estimated value below which the given fraction `q` of values fall.
    /// Returns `NaN` if this sketch is empty.
    pub fn quantile(&self, q: f64) -> f64 {
        if self.is_empty() {
            return f64::NAN;
        }
        if q <= 0.0 {
            return self.min;
        }
        if q >= 1.0 {
            return self.max;
        }

        let points = self.points();
        for pair in points.windows(2) {
            let (x0, y0) = pair[0];
            let (x1, y1) = pair[1];
            if q <= y1 {
                return if y1 > y0 {
                    x0 + (x1 - x0) * (q - y0) / (y1 - y0)
                } else {
                    x1
                };
            }
        }
        self.max
    }

    // The cumulative distribution as a piecewise linear function: (min, 0), one point at the mean
    // of every centroid (half of its weight is to the left of the mean) and (max, 1).
    fn points(&self) -> Vec<(f64, f64)> {
        let centroids = if self.buffer.is_empty() {
            self.centroids.clone()
        } else {
            self.merged_centroids(&self.buffer)
        };
        let total = self.count as f64;

        let mut points = Vec::with_capacity(centroids.len() + 2);
        points.push((self.min, 0.0));
        let mut cumulative = 0.0;
        for c in centroids.iter() {
            points.push((c.mean, (cumulative + c.weight / 2.0) / total));
            cumulative += c.weight;
        }
        points.push((self.max, 1.0));
        points
    }

    fn merged_centroids(&self, values: &[f64]) -> Vec<Centroid> {
        let mut all: Vec<Centroid> = self.centroids.clone();
        all.extend(values.iter().map(|v| Centroid { mean: *v, weight: 1.0 }));
        all.sort_by_key(|c| OrderedFloat(c.mean));

        let total: f64 = all.iter().map(|c| c.weight).sum();
        let mut result = Vec::with_capacity(all.len().min(self.compression as usize * 2));
        let mut iter = all.into_iter();
        let mut current = match iter.next() {
            Some(c) => c,
            None => return result,
        };
        let mut weight_so_far = 0.0;

        for next in iter {
            let q = (weight_so_far + (current.weight + next.weight) / 2.0) / total;
            let limit = (4.0 * total * q * (1.0 - q) / self.compression).max(1.0);
            if current.weight + next.weight <= limit {
                let weight = current.weight + next.weight;
                current.mean += (next.mean - current.mean) * next.weight / weight;
                current.weight = weight;
            } else {
                weight_so_far += current.weight;
                result.push(current);
                current = next;
            }
        }
        result.push(current);
        result
    }
}
