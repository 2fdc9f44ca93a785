//! Fixed-bucket histograms filled by scoring functions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{PilumError, Result};

/// Largest bucket count a single aggregation may declare.
pub const MAX_BUCKETS: usize = i32::MAX as usize;

/// One histogram: a name and a fixed number of buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketAggregationSpec {
    pub name: String,
    pub buckets: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BucketsField {
    Count(u64),
    Text(String),
}

#[derive(Deserialize)]
struct RawSpec {
    name: String,
    buckets: BucketsField,
}

impl BucketAggregationSpec {
    /// Create a new spec.
    pub fn new<S: Into<String>>(name: S, buckets: usize) -> Self {
        BucketAggregationSpec {
            name: name.into(),
            buckets,
        }
    }

    fn from_raw(raw: RawSpec) -> Result<Self> {
        let buckets = match raw.buckets {
            BucketsField::Count(n) => n,
            BucketsField::Text(text) => text.trim().parse::<u64>().map_err(|_| {
                PilumError::config(format!(
                    "aggregation <{}> has a non-numeric bucket count <{text}>",
                    raw.name
                ))
            })?,
        };
        if buckets > MAX_BUCKETS as u64 {
            return Err(PilumError::config(format!(
                "aggregation <{}> has too many buckets <{buckets}>",
                raw.name
            )));
        }
        Ok(BucketAggregationSpec::new(raw.name, buckets as usize))
    }

    /// Check that every spec has between 1 and [`MAX_BUCKETS`] buckets and
    /// that the counts array of an aggregator over all of them fits in memory
    /// addressing.
    pub fn validate(specs: &[Self]) -> Result<()> {
        for spec in specs {
            if spec.buckets == 0 {
                return Err(PilumError::config(format!(
                    "aggregation <{}> has no buckets",
                    spec.name
                )));
            }
            if spec.buckets > MAX_BUCKETS {
                return Err(PilumError::config(format!(
                    "aggregation <{}> has too many buckets <{}>",
                    spec.name, spec.buckets
                )));
            }
        }
        let max_bucket_count = specs.iter().map(|s| s.buckets).max().unwrap_or(0);
        max_bucket_count
            .checked_mul(specs.len())
            .and_then(|slots| slots.checked_mul(std::mem::size_of::<i64>()))
            .filter(|bytes| *bytes <= isize::MAX as usize)
            .map(|_| ())
            .ok_or_else(|| {
                PilumError::config(format!(
                    "{} aggregations of up to {max_bucket_count} buckets are too large",
                    specs.len()
                ))
            })
    }

    /// Parse a single `{name, buckets}` object.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let raw: RawSpec = serde_json::from_value(value.clone())
            .map_err(|e| PilumError::config(format!("malformed aggregation spec: {e}")))?;
        Self::from_raw(raw)
    }

    /// Parse a JSON list of `{name, buckets}` objects. `buckets` may be an
    /// integer or a numeric string.
    pub fn parse_list(json: &str) -> Result<Vec<Self>> {
        let raw: Vec<RawSpec> = serde_json::from_str(json)
            .map_err(|e| PilumError::config(format!("malformed aggregation specs: {e}")))?;
        raw.into_iter().map(Self::from_raw).collect()
    }
}

impl<'de> Deserialize<'de> for BucketAggregationSpec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawSpec::deserialize(deserializer)?;
        Self::from_raw(raw).map_err(serde::de::Error::custom)
    }
}

/// A non-zero bucket in aggregation results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketCount {
    pub label: usize,
    pub count: i64,
}

/// Counts for every configured histogram, stored in one flat array of
/// `max_bucket_count * specs.len()` slots that is never resized.
#[derive(Debug, Clone, Default)]
pub struct BucketAggregator {
    specs: Vec<BucketAggregationSpec>,
    max_bucket_count: usize,
    counts: Vec<i64>,
}

impl BucketAggregator {
    /// Create an aggregator for the given specs.
    pub fn new(specs: Vec<BucketAggregationSpec>) -> Self {
        let max_bucket_count = specs.iter().map(|s| s.buckets).max().unwrap_or(0);
        let counts = vec![0; max_bucket_count * specs.len()];
        BucketAggregator {
            specs,
            max_bucket_count,
            counts,
        }
    }

    /// Get the specs.
    pub fn specs(&self) -> &[BucketAggregationSpec] {
        &self.specs
    }

    /// Largest bucket count of all specs.
    pub fn max_bucket_count(&self) -> usize {
        self.max_bucket_count
    }

    fn slot(&self, index: usize, bucket: usize) -> Result<usize> {
        if self.specs.is_empty() {
            return Err(PilumError::invalid_state(
                "no bucket aggregations are configured for this query",
            ));
        }
        let spec = self.specs.get(index).ok_or_else(|| {
            PilumError::script(format!(
                "aggregation index {index} out of range, {} configured",
                self.specs.len()
            ))
        })?;
        if bucket >= spec.buckets {
            return Err(PilumError::script(format!(
                "bucket {bucket} out of range for aggregation <{}> with {} buckets",
                spec.name, spec.buckets
            )));
        }
        Ok(index * self.max_bucket_count + bucket)
    }

    /// Add `increment` to a bucket.
    pub fn aggregate(&mut self, index: usize, bucket: usize, increment: i64) -> Result<()> {
        let slot = self.slot(index, bucket)?;
        self.counts[slot] += increment;
        Ok(())
    }

    /// Get the count of a bucket.
    pub fn count(&self, index: usize, bucket: usize) -> Result<i64> {
        Ok(self.counts[self.slot(index, bucket)?])
    }

    /// Add the counts of an aggregator built from the same specs.
    pub fn merge(&mut self, other: &BucketAggregator) -> Result<()> {
        if self.specs != other.specs {
            return Err(PilumError::invalid_state(
                "cannot merge aggregators built from different specs",
            ));
        }
        for (count, other) in self.counts.iter_mut().zip(&other.counts) {
            *count += other;
        }
        Ok(())
    }

    /// Non-zero buckets per aggregation name, sorted by count descending.
    /// Aggregations without a non-zero bucket are left out.
    pub fn results(&self) -> BTreeMap<String, Vec<BucketCount>> {
        let mut results = BTreeMap::new();
        for (index, spec) in self.specs.iter().enumerate() {
            let base = index * self.max_bucket_count;
            let mut buckets: Vec<BucketCount> = self.counts[base..base + spec.buckets]
                .iter()
                .enumerate()
                .filter(|(_, count)| **count > 0)
                .map(|(bucket, count)| BucketCount {
                    label: bucket,
                    count: *count,
                })
                .collect();
            if buckets.is_empty() {
                continue;
            }
            buckets.sort_by(|a, b| b.count.cmp(&a.count));
            results.insert(spec.name.clone(), buckets);
        }
        results
    }
}
