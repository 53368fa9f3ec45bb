//! Rank-error-bounded quantile summary (Greenwald-Khanna)
//!
//! A summary over `n` values answers a quantile query `q` with a value whose
//! rank lies within `relative_error * n` of `ceil(q * n)`. Memory is bounded
//! by the insert buffer plus `O((1/ε) log(εn))` retained samples.
//!
//! Invariant for every retained sample: `g + delta <= max(1, floor(2εn))`.
//! Merging propagates rank uncertainty across summaries so the invariant,
//! and therefore the query bound, survives partition-wise construction.

/// Inserts are buffered and folded into the samples in sorted batches
const DEFAULT_BUFFER_CAPACITY: usize = 50_000;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    value: f64,
    /// Rank gap to the previous sample
    g: u64,
    /// Uncertainty of this sample's maximum rank
    delta: u64,
}

#[derive(Debug, Clone)]
pub struct QuantileSummary {
    relative_error: f64,
    buffer_capacity: usize,
    buffer: Vec<f64>,
    samples: Vec<Sample>,
    count: u64,
}

impl QuantileSummary {
    /// `relative_error` must be in (0, 1); callers validate it.
    pub fn new(relative_error: f64) -> Self {
        Self::with_buffer_capacity(relative_error, DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_buffer_capacity(relative_error: f64, buffer_capacity: usize) -> Self {
        Self {
            relative_error,
            buffer_capacity: buffer_capacity.max(1),
            buffer: Vec::new(),
            samples: Vec::new(),
            count: 0,
        }
    }

    pub fn relative_error(&self) -> f64 {
        self.relative_error
    }

    /// Values observed, including buffered ones
    pub fn count(&self) -> u64 {
        self.count + self.buffer.len() as u64
    }

    /// Retained samples (excludes the insert buffer)
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Add a value. NaN is ignored.
    pub fn insert(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.buffer.push(value);
        if self.buffer.len() >= self.buffer_capacity {
            self.flush();
            self.compress();
        }
    }

    /// Fold buffered values into the samples and compress
    pub fn finish(mut self) -> Self {
        self.flush();
        self.compress();
        self
    }

    fn merge_threshold(&self) -> u64 {
        (2.0 * self.relative_error * self.count as f64).floor() as u64
    }

    fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.sort_by(f64::total_cmp);

        let mut merged = Vec::with_capacity(self.samples.len() + buffer.len());
        let mut next = 0;
        let last = buffer.len() - 1;
        for (i, &value) in buffer.iter().enumerate() {
            while next < self.samples.len() && self.samples[next].value <= value {
                merged.push(self.samples[next]);
                next += 1;
            }
            self.count += 1;

            // A new minimum or maximum has an exact rank.
            let delta = if merged.is_empty() || (next == self.samples.len() && i == last) {
                0
            } else {
                self.merge_threshold().saturating_sub(1)
            };
            merged.push(Sample { value, g: 1, delta });
        }
        merged.extend_from_slice(&self.samples[next..]);
        self.samples = merged;
    }

    /// Merge adjacent samples whose combined band fits the error budget.
    /// The first sample is never absorbed and the last keeps its value.
    fn compress(&mut self) {
        if self.samples.len() < 3 {
            return;
        }
        let threshold = self.merge_threshold();
        let last = self.samples.len() - 1;

        let mut kept: Vec<Sample> = Vec::with_capacity(self.samples.len());
        let mut head = self.samples[last];
        for i in (1..last).rev() {
            let sample = self.samples[i];
            if sample.g + head.g + head.delta <= threshold {
                head.g += sample.g;
            } else {
                kept.push(head);
                head = sample;
            }
        }
        kept.push(head);
        kept.push(self.samples[0]);
        kept.reverse();
        self.samples = kept;
    }

    /// Combine two summaries. Pending buffers on either side are flushed
    /// first; the merged summary uses the larger relative error.
    pub fn merge(mut self, mut other: QuantileSummary) -> QuantileSummary {
        self.flush();
        other.flush();
        if other.count == 0 {
            self.compress();
            return self;
        }
        if self.count == 0 {
            other.compress();
            return other;
        }

        let (a, b) = (&self.samples, &other.samples);
        let mut merged = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() || j < b.len() {
            let take_a = j == b.len() || (i < a.len() && a[i].value <= b[j].value);
            if take_a {
                let s = a[i];
                // Rows of `b` between our neighbours are unknown: widen by the
                // band of the next `b` sample.
                let widen = b.get(j).map_or(0, |n| n.g + n.delta - 1);
                merged.push(Sample {
                    delta: s.delta + widen,
                    ..s
                });
                i += 1;
            } else {
                let s = b[j];
                let widen = a.get(i).map_or(0, |n| n.g + n.delta - 1);
                merged.push(Sample {
                    delta: s.delta + widen,
                    ..s
                });
                j += 1;
            }
        }

        let mut result = QuantileSummary {
            relative_error: self.relative_error.max(other.relative_error),
            buffer_capacity: self.buffer_capacity,
            buffer: Vec::new(),
            samples: merged,
            count: self.count + other.count,
        };
        result.compress();
        result
    }

    /// Approximate `q`-quantile, `q` in [0, 1]. `None` on an empty summary.
    ///
    /// Buffered values are not visible; call [`finish`](Self::finish) first.
    pub fn query(&self, q: f64) -> Option<f64> {
        let (last, rest) = self.samples.split_last()?;
        let n = self.count as f64;
        let rank = (q * n).ceil().clamp(1.0, n);
        let target_error = self.relative_error * n;

        let mut min_rank = 0u64;
        for sample in rest {
            min_rank += sample.g;
            let max_rank = min_rank + sample.delta;
            if max_rank as f64 - target_error <= rank && rank <= min_rank as f64 + target_error {
                return Some(sample.value);
            }
        }
        Some(last.value)
    }
}
