use ordered_float::OrderedFloat;
use std::cmp::Ordering;

use crate::error::SketchError;

/// Default accuracy/size trade-off when none is configured.
pub const DEFAULT_COMPRESSION: f64 = 100.0;

/// Uncompressed centroids may accumulate up to this multiple of `compression`
/// before the digest is recompressed in place.
const RECOMPRESS_FACTOR: f64 = 6.0;

/// A cluster of nearby values, summarized as a position (weighted mean) and
/// the total mass it carries.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Centroid {
    position: OrderedFloat<f64>,
    mass: OrderedFloat<f64>,
}

impl PartialOrd for Centroid {
    fn partial_cmp(&self, other: &Centroid) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Centroid {
    fn cmp(&self, other: &Centroid) -> Ordering {
        self.position.cmp(&other.position)
    }
}

impl Centroid {
    pub fn new(position: impl Into<OrderedFloat<f64>>, mass: impl Into<OrderedFloat<f64>>) -> Self {
        Centroid {
            position: position.into(),
            mass: mass.into(),
        }
    }

    #[inline]
    pub fn position(&self) -> f64 {
        self.position.into_inner()
    }

    #[inline]
    pub fn mass(&self) -> f64 {
        self.mass.into_inner()
    }

    /// Folds `sum` (a pre-multiplied Σ position·mass) and `mass` into this
    /// centroid, moving its position to the combined weighted mean.
    fn absorb(&mut self, sum: f64, mass: f64) {
        if mass <= 0.0 {
            return;
        }
        let new_sum = sum + self.position.into_inner() * self.mass.into_inner();
        let new_mass = self.mass.into_inner() + mass;
        self.position = OrderedFloat::from(new_sum / new_mass);
        self.mass = OrderedFloat::from(new_mass);
    }
}

/// An incrementally mergeable t-digest.
///
/// Centroids are kept sorted by position at all times. While `max_discrete`
/// is positive and the number of distinct values fits under it, updates are
/// retained exactly (equal positions coalesce, nothing is interpolated);
/// past that threshold the digest falls back to centroid clustering bounded
/// by `compression`.
#[derive(Debug, Clone, PartialEq)]
pub struct TDigest {
    compression: f64,
    max_discrete: i32,
    centroids: Vec<Centroid>,
}

impl Default for TDigest {
    fn default() -> Self {
        TDigest {
            compression: DEFAULT_COMPRESSION,
            max_discrete: 0,
            centroids: Vec::new(),
        }
    }
}

impl TDigest {
    pub fn new(compression: f64, max_discrete: i32) -> Result<Self, SketchError> {
        if !compression.is_finite() || compression < 1.0 {
            return Err(SketchError::Configuration(format!(
                "compression must be a finite value >= 1, got {compression}"
            )));
        }
        if max_discrete < 0 {
            return Err(SketchError::Configuration(format!(
                "max_discrete must be >= 0, got {max_discrete}"
            )));
        }
        Ok(TDigest {
            compression,
            max_discrete,
            centroids: Vec::new(),
        })
    }

    /// Rebuilds a digest from decoded centroid storage.
    ///
    /// Lengths are validated here even when the caller already checked them;
    /// the ascending order of `positions` is trusted once they are.
    pub fn from_parts(
        compression: f64,
        max_discrete: i32,
        positions: Vec<f64>,
        masses: Vec<f64>,
    ) -> Result<Self, SketchError> {
        if positions.len() != masses.len() {
            return Err(SketchError::Consistency(format!(
                "{} centroid positions but {} masses",
                positions.len(),
                masses.len()
            )));
        }
        let mut digest = Self::new(compression, max_discrete)?;
        digest.centroids = positions
            .into_iter()
            .zip(masses)
            .map(|(position, mass)| Centroid::new(position, mass))
            .collect();
        Ok(digest)
    }

    #[inline]
    pub fn compression(&self) -> f64 {
        self.compression
    }

    #[inline]
    pub fn max_discrete(&self) -> i32 {
        self.max_discrete
    }

    /// Number of live centroids.
    #[inline]
    pub fn size(&self) -> usize {
        self.centroids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    pub fn total_mass(&self) -> f64 {
        self.centroids.iter().map(|c| c.mass()).sum()
    }

    /// Copies exactly `size()` centroid positions, in ascending order.
    pub fn centroid_positions(&self) -> Vec<f64> {
        self.centroids.iter().map(|c| c.position()).collect()
    }

    /// Copies exactly `size()` centroid masses, parallel to
    /// [`Self::centroid_positions`].
    pub fn centroid_masses(&self) -> Vec<f64> {
        self.centroids.iter().map(|c| c.mass()).collect()
    }

    pub fn update(&mut self, value: f64) {
        self.update_weighted(value, 1.0);
    }

    /// Records `value` with the given mass. NaN values carry no information
    /// about the distribution and are ignored, like nulls upstream.
    pub fn update_weighted(&mut self, value: f64, mass: f64) {
        if value.is_nan() || !mass.is_finite() || mass <= 0.0 {
            return;
        }
        let value = OrderedFloat::from(value);
        if self.max_discrete > 0 {
            match self
                .centroids
                .binary_search_by(|c| c.position.cmp(&value))
            {
                Ok(found) => {
                    self.centroids[found].mass += mass;
                    return;
                }
                Err(at) if self.centroids.len() < self.max_discrete as usize => {
                    self.centroids.insert(at, Centroid::new(value, mass));
                    return;
                }
                Err(_) => {}
            }
        }
        let at = self.centroids.partition_point(|c| c.position <= value);
        self.centroids.insert(at, Centroid::new(value, mass));
        if self.centroids.len() as f64 > self.compression * RECOMPRESS_FACTOR {
            self.compress();
        }
    }

    /// Folds `other` into `self`, consuming the donor. The surviving digest
    /// keeps its own `compression` and `max_discrete`; total mass is the
    /// exact sum of both inputs, whatever the merge order.
    pub fn merge_from(&mut self, other: TDigest) {
        if other.centroids.is_empty() {
            return;
        }
        let merged = Self::merge_sorted(std::mem::take(&mut self.centroids), other.centroids);
        self.centroids = if self.max_discrete > 0 && merged.len() <= self.max_discrete as usize {
            merged
        } else if merged.len() as f64 > self.compression {
            Self::compress_centroids(merged, self.compression)
        } else {
            merged
        };
    }

    /// Compacts the centroid list down to the budget implied by
    /// `compression`. Idempotent; mass is conserved.
    pub fn compress(&mut self) {
        if self.centroids.len() <= 1 {
            return;
        }
        if self.max_discrete > 0 && self.centroids.len() <= self.max_discrete as usize {
            return;
        }
        let centroids = std::mem::take(&mut self.centroids);
        self.centroids = Self::compress_centroids(centroids, self.compression);
    }

    fn k_to_q(k: f64, d: f64) -> f64 {
        let k_div_d = k / d;
        if k_div_d >= 0.5 {
            let base = 1.0 - k_div_d;
            1.0 - 2.0 * base * base
        } else {
            2.0 * k_div_d * k_div_d
        }
    }

    /// Merges two ascending centroid runs, coalescing exactly-equal
    /// positions.
    fn merge_sorted(a: Vec<Centroid>, b: Vec<Centroid>) -> Vec<Centroid> {
        fn push(out: &mut Vec<Centroid>, centroid: Centroid) {
            if let Some(last) = out.last_mut() {
                if last.position == centroid.position {
                    last.mass += centroid.mass.into_inner();
                    return;
                }
            }
            out.push(centroid);
        }

        let mut out = Vec::with_capacity(a.len() + b.len());
        let mut iter_a = a.into_iter().peekable();
        let mut iter_b = b.into_iter().peekable();
        loop {
            let take_a = match (iter_a.peek(), iter_b.peek()) {
                (Some(ca), Some(cb)) => ca.position <= cb.position,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            let next = if take_a { iter_a.next() } else { iter_b.next() };
            if let Some(c) = next {
                push(&mut out, c);
            }
        }
        out
    }

    fn compress_centroids(centroids: Vec<Centroid>, compression: f64) -> Vec<Centroid> {
        let total: f64 = centroids.iter().map(|c| c.mass()).sum();
        let mut compressed: Vec<Centroid> = Vec::with_capacity(compression as usize + 1);

        let mut k_limit: f64 = 1.0;
        let mut q_limit_times_total = Self::k_to_q(k_limit, compression) * total;
        k_limit += 1.0;

        let mut iter = centroids.into_iter();
        let Some(mut curr) = iter.next() else {
            return compressed;
        };
        let mut mass_so_far = curr.mass();
        let mut sums_to_merge = 0.0;
        let mut masses_to_merge = 0.0;

        for next in iter {
            mass_so_far += next.mass();
            if mass_so_far <= q_limit_times_total {
                sums_to_merge += next.position() * next.mass();
                masses_to_merge += next.mass();
            } else {
                curr.absorb(sums_to_merge, masses_to_merge);
                sums_to_merge = 0.0;
                masses_to_merge = 0.0;
                compressed.push(curr);
                q_limit_times_total = Self::k_to_q(k_limit, compression) * total;
                k_limit += 1.0;
                curr = next;
            }
        }
        curr.absorb(sums_to_merge, masses_to_merge);
        compressed.push(curr);
        compressed.sort();
        compressed
    }

    /// Estimates the value at quantile `q` (clamped to `[0, 1]`).
    ///
    /// Empty digests have no quantiles and yield NaN. In discrete mode the
    /// result is the smallest retained value whose cumulative mass reaches
    /// the rank; otherwise adjacent centroid positions are interpolated.
    pub fn quantile(&self, q: f64) -> f64 {
        let n = self.centroids.len();
        if n == 0 {
            return f64::NAN;
        }
        let q = q.clamp(0.0, 1.0);
        let total = self.total_mass();
        let rank = q * total;

        if self.max_discrete > 0 {
            let mut cumulative = 0.0;
            for c in &self.centroids {
                cumulative += c.mass();
                if cumulative >= rank {
                    return c.position();
                }
            }
            return self.centroids[n - 1].position();
        }

        if n == 1 {
            return self.centroids[0].position();
        }
        let mut cumulative = 0.0;
        for (i, c) in self.centroids.iter().enumerate() {
            let mid = cumulative + c.mass() / 2.0;
            if rank < mid {
                if i == 0 {
                    return c.position();
                }
                let prev = &self.centroids[i - 1];
                let prev_mid = cumulative - prev.mass() / 2.0;
                let t = (rank - prev_mid) / (mid - prev_mid);
                return prev.position() + t * (c.position() - prev.position());
            }
            cumulative += c.mass();
        }
        self.centroids[n - 1].position()
    }

    /// Estimates the fraction of accumulated mass at or below `x`.
    pub fn cdf(&self, x: f64) -> f64 {
        let n = self.centroids.len();
        if n == 0 || x.is_nan() {
            return f64::NAN;
        }
        let total = self.total_mass();

        if self.max_discrete > 0 {
            let below: f64 = self
                .centroids
                .iter()
                .take_while(|c| c.position() <= x)
                .map(|c| c.mass())
                .sum();
            return below / total;
        }

        if x < self.centroids[0].position() {
            return 0.0;
        }
        if x >= self.centroids[n - 1].position() {
            return 1.0;
        }
        let mut cumulative = 0.0;
        for i in 0..n - 1 {
            let c = &self.centroids[i];
            let next = &self.centroids[i + 1];
            if x < next.position() {
                // x is within [c.position(), next.position()) here
                let mid = cumulative + c.mass() / 2.0;
                let next_mid = cumulative + c.mass() + next.mass() / 2.0;
                let t = (x - c.position()) / (next.position() - c.position());
                let rank = mid + t * (next_mid - mid);
                return (rank / total).clamp(0.0, 1.0);
            }
            cumulative += c.mass();
        }
        1.0
    }
}
