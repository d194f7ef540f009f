//! Candidate generation strategies behind `VectorIndex::search`.
//!
//! A strategy only decides which rows are worth scoring. The index scores
//! every candidate exactly and applies the ordering contract itself, so an
//! approximate strategy can lose recall but never reorder results.
use campus_core::config::{SearchSettings, SearchStrategyKind};

use crate::index::{dot, Rows};

const KMEANS_ITERATIONS: usize = 10;

pub enum Candidates {
    All,
    Rows(Vec<usize>),
}

pub trait SearchStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    /// Called whenever the stored rows change.
    fn rebuild(&mut self, rows: Rows<'_>);
    fn candidates(&self, rows: Rows<'_>, query: &[f32]) -> Candidates;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyConfig {
    Exact,
    InvertedFile { nprobe: usize, min_rows: usize },
}

impl Default for StrategyConfig {
    fn default() -> Self { Self::Exact }
}

impl StrategyConfig {
    pub fn from_settings(settings: &SearchSettings) -> Self {
        match settings.strategy {
            SearchStrategyKind::Exact => Self::Exact,
            SearchStrategyKind::Ivf => Self::InvertedFile { nprobe: settings.nprobe, min_rows: settings.min_rows },
        }
    }

    pub fn build(&self) -> Box<dyn SearchStrategy> {
        match *self {
            Self::Exact => Box::new(ExactScan),
            Self::InvertedFile { nprobe, min_rows } => Box::new(InvertedFile::new(nprobe, min_rows)),
        }
    }
}

/// Full scan: every row is a candidate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactScan;

impl SearchStrategy for ExactScan {
    fn name(&self) -> &'static str { "exact" }
    fn rebuild(&mut self, _rows: Rows<'_>) {}
    fn candidates(&self, _rows: Rows<'_>, _query: &[f32]) -> Candidates { Candidates::All }
}

/// Inverted file: rows are partitioned by spherical k-means and a query
/// scores only the rows of its `nprobe` nearest partitions.
///
/// Results equal the exact scan restricted to the probed partitions. With
/// `nprobe >= nlist`, or fewer than `min_rows` rows, every row is probed and
/// results are identical to `ExactScan`.
#[derive(Debug, Clone)]
pub struct InvertedFile {
    nprobe: usize,
    min_rows: usize,
    dim: usize,
    centroids: Vec<f32>,
    lists: Vec<Vec<usize>>,
}

impl InvertedFile {
    pub fn new(nprobe: usize, min_rows: usize) -> Self {
        Self { nprobe: nprobe.max(1), min_rows, dim: 0, centroids: Vec::new(), lists: Vec::new() }
    }

    pub fn nlist(&self) -> usize { self.lists.len() }

    fn centroid(&self, j: usize) -> &[f32] { &self.centroids[j * self.dim..(j + 1) * self.dim] }

    fn centroid_count(&self) -> usize {
        if self.dim == 0 { 0 } else { self.centroids.len() / self.dim }
    }

    fn nearest(&self, v: &[f32]) -> usize {
        let mut best = 0;
        let mut best_score = f32::NEG_INFINITY;
        for j in 0..self.centroid_count() {
            let s = dot(self.centroid(j), v);
            if s > best_score {
                best = j;
                best_score = s;
            }
        }
        best
    }
}

/// Roughly √n partitions, never more than there are rows.
pub fn partition_count(rows: usize) -> usize {
    if rows <= 1 { return rows; }
    ((rows as f64).sqrt().ceil() as usize).clamp(1, rows)
}

impl SearchStrategy for InvertedFile {
    fn name(&self) -> &'static str { "ivf" }

    fn rebuild(&mut self, rows: Rows<'_>) {
        self.dim = rows.dim();
        self.centroids.clear();
        self.lists.clear();
        let n = rows.len();
        if n == 0 || n < self.min_rows { return; }

        let nlist = partition_count(n);
        for j in 0..nlist {
            self.centroids.extend_from_slice(rows.row(j * n / nlist));
        }

        let mut assignment = vec![0usize; n];
        for _ in 0..KMEANS_ITERATIONS {
            for (i, slot) in assignment.iter_mut().enumerate() {
                *slot = self.nearest(rows.row(i));
            }
            let mut sums = vec![0f32; nlist * self.dim];
            let mut counts = vec![0usize; nlist];
            for (i, &j) in assignment.iter().enumerate() {
                counts[j] += 1;
                for (s, x) in sums[j * self.dim..(j + 1) * self.dim].iter_mut().zip(rows.row(i)) { *s += x; }
            }
            for j in 0..nlist {
                // empty partitions keep their previous centroid
                if counts[j] == 0 { continue; }
                let sum = &mut sums[j * self.dim..(j + 1) * self.dim];
                let norm = sum.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm > 0.0 {
                    for x in sum.iter_mut() { *x /= norm; }
                }
                self.centroids[j * self.dim..(j + 1) * self.dim].copy_from_slice(sum);
            }
        }

        self.lists = vec![Vec::new(); nlist];
        for i in 0..n {
            let j = self.nearest(rows.row(i));
            self.lists[j].push(i);
        }
        tracing::debug!(rows = n, nlist, "inverted file rebuilt");
    }

    fn candidates(&self, _rows: Rows<'_>, query: &[f32]) -> Candidates {
        if self.lists.is_empty() || self.nprobe >= self.lists.len() {
            return Candidates::All;
        }
        let mut order: Vec<(usize, f32)> = (0..self.lists.len()).map(|j| (j, dot(self.centroid(j), query))).collect();
        order.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        let rows = order
            .iter()
            .take(self.nprobe)
            .flat_map(|&(j, _)| self.lists[j].iter().copied())
            .collect();
        Candidates::Rows(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_count_tracks_sqrt() {
        assert_eq!(partition_count(0), 0);
        assert_eq!(partition_count(1), 1);
        assert_eq!(partition_count(4), 2);
        assert_eq!(partition_count(10_000), 100);
        assert_eq!(partition_count(10_001), 101);
    }

    #[test]
    fn settings_map_to_strategies() {
        let mut settings = SearchSettings::default();
        assert_eq!(StrategyConfig::from_settings(&settings), StrategyConfig::Exact);
        settings.strategy = SearchStrategyKind::Ivf;
        settings.nprobe = 3;
        settings.min_rows = 10;
        assert_eq!(StrategyConfig::from_settings(&settings), StrategyConfig::InvertedFile { nprobe: 3, min_rows: 10 });
        assert_eq!(StrategyConfig::from_settings(&settings).build().name(), "ivf");
    }
}
