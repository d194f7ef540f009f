use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::fmt;
use std::path::Path;

use campus_core::types::{Passage, PassageId, ScoredPassage};
use campus_core::{Error, Result};

use crate::snapshot;
use crate::strategy::{Candidates, SearchStrategy, StrategyConfig};

/// Borrowed row-major view over the stored, normalized vectors.
#[derive(Clone, Copy)]
pub struct Rows<'a> {
    dim: usize,
    data: &'a [f32],
}

impl<'a> Rows<'a> {
    pub fn dim(&self) -> usize { self.dim }
    pub fn len(&self) -> usize { self.data.len() / self.dim }
    pub fn is_empty(&self) -> bool { self.data.is_empty() }
    pub fn row(&self, i: usize) -> &'a [f32] { &self.data[i * self.dim..(i + 1) * self.dim] }
}

pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

fn normalized(v: &[f32]) -> Vec<f32> {
    let norm = dot(v, v).sqrt();
    if norm > 0.0 { v.iter().map(|x| x / norm).collect() } else { v.to_vec() }
}

/// Owns the vectors, their passages and the search structure built over them.
///
/// Row `i` of the vector storage belongs to `passages[i]`; the two always
/// have the same length.
pub struct VectorIndex {
    dim: usize,
    vectors: Vec<f32>,
    passages: Vec<Passage>,
    ids: HashSet<PassageId>,
    strategy_config: StrategyConfig,
    strategy: Box<dyn SearchStrategy>,
}

impl fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dim", &self.dim)
            .field("len", &self.passages.len())
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

impl VectorIndex {
    pub fn new(dim: usize, strategy: StrategyConfig) -> Result<Self> {
        if dim == 0 {
            return Err(Error::InvalidArgument("vector dimension must be > 0".to_string()));
        }
        Ok(Self {
            dim,
            vectors: Vec::new(),
            passages: Vec::new(),
            ids: HashSet::new(),
            strategy_config: strategy,
            strategy: strategy.build(),
        })
    }

    pub fn dim(&self) -> usize { self.dim }
    pub fn len(&self) -> usize { self.passages.len() }
    pub fn is_empty(&self) -> bool { self.passages.is_empty() }
    pub fn passages(&self) -> &[Passage] { &self.passages }
    pub fn strategy_name(&self) -> &'static str { self.strategy.name() }
    pub fn strategy_config(&self) -> StrategyConfig { self.strategy_config }

    pub fn rows(&self) -> Rows<'_> { Rows { dim: self.dim, data: &self.vectors } }

    /// Appends vectors and their passages. Nothing is stored unless the whole
    /// batch is valid.
    pub fn add(&mut self, vectors: Vec<Vec<f32>>, passages: Vec<Passage>) -> Result<()> {
        if vectors.len() != passages.len() {
            return Err(Error::CountMismatch { vectors: vectors.len(), passages: passages.len() });
        }
        let mut batch_ids = HashSet::with_capacity(passages.len());
        for (v, p) in vectors.iter().zip(&passages) {
            self.check_vector(v)?;
            if self.ids.contains(&p.id) || !batch_ids.insert(p.id) {
                return Err(Error::InvalidArgument(format!("duplicate passage id {}", p.id)));
            }
        }
        self.vectors.reserve(vectors.len() * self.dim);
        for v in &vectors {
            self.vectors.extend(normalized(v));
        }
        self.ids.extend(batch_ids);
        self.passages.extend(passages);
        self.rebuild_strategy();
        Ok(())
    }

    /// Top `k` passages by cosine similarity, descending; equal scores are
    /// ordered by ascending passage id. `k` larger than the index returns
    /// everything.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredPassage>> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be > 0".to_string()));
        }
        self.check_vector(query)?;
        if self.is_empty() {
            return Ok(Vec::new());
        }
        let query = normalized(query);
        let rows = self.rows();
        let mut heap = BinaryHeap::with_capacity(k.min(self.len()) + 1);
        let mut consider = |row: usize| {
            // `+ 0.0` folds -0.0 into 0.0 so equal scores fall through to the id order
            let score = dot(rows.row(row), &query).clamp(-1.0, 1.0) + 0.0;
            heap.push(Ranked { score, id: self.passages[row].id, row });
            if heap.len() > k {
                heap.pop();
            }
        };
        match self.strategy.candidates(rows, &query) {
            Candidates::All => (0..rows.len()).for_each(&mut consider),
            Candidates::Rows(list) => list.into_iter().for_each(&mut consider),
        }
        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|r| ScoredPassage { passage: self.passages[r.row].clone(), score: r.score })
            .collect())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        snapshot::write_snapshot(path, self.dim, &self.vectors, &self.passages)
    }

    /// Restores an index from a snapshot without re-embedding. When
    /// `expected_dim` is given, a snapshot of any other dimension is rejected.
    pub fn load(path: &Path, expected_dim: Option<usize>, strategy: StrategyConfig) -> Result<Self> {
        let snap = snapshot::read_snapshot(path, expected_dim)?;
        let ids = snap.passages.iter().map(|p| p.id).collect();
        let mut index = Self {
            dim: snap.dim,
            vectors: snap.vectors,
            passages: snap.passages,
            ids,
            strategy_config: strategy,
            strategy: strategy.build(),
        };
        index.rebuild_strategy();
        Ok(index)
    }

    fn rebuild_strategy(&mut self) {
        let rows = Rows { dim: self.dim, data: &self.vectors };
        self.strategy.rebuild(rows);
    }

    fn check_vector(&self, v: &[f32]) -> Result<()> {
        if v.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: v.len() });
        }
        if v.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidArgument("vector contains a non-finite value".to_string()));
        }
        Ok(())
    }
}

/// Heap entry ordered so that "greater" means "ranks worse": lower score,
/// then higher id. The max-heap top is therefore the entry to evict.
struct Ranked {
    score: f32,
    id: PassageId,
    row: usize,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering { other.score.total_cmp(&self.score).then(self.id.cmp(&other.id)) }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for Ranked {}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(id: PassageId) -> Passage {
        Passage { id, text: format!("passage {id}"), source_id: format!("src_{id}"), chunk_index: 0 }
    }

    #[test]
    fn ranked_orders_by_score_then_id() {
        let mut v = vec![
            Ranked { score: 0.5, id: 3, row: 0 },
            Ranked { score: 0.9, id: 7, row: 1 },
            Ranked { score: 0.5, id: 1, row: 2 },
        ];
        v.sort();
        let ids: Vec<_> = v.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![7, 1, 3]);
    }

    #[test]
    fn zero_query_ties_break_by_id_regardless_of_sign() {
        let mut index = VectorIndex::new(2, StrategyConfig::Exact).expect("index");
        index.add(vec![vec![1.0, 1.0], vec![-1.0, -1.0]], vec![passage(2), passage(1)]).expect("add");
        let hits = index.search(&[0.0, 0.0], 2).expect("search");
        let ids: Vec<_> = hits.iter().map(|h| h.passage.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(hits.iter().all(|h| h.score == 0.0 && h.score.is_sign_positive()));
    }

    #[test]
    fn stored_rows_are_normalized() {
        let mut index = VectorIndex::new(2, StrategyConfig::Exact).expect("index");
        index.add(vec![vec![3.0, 4.0]], vec![passage(0)]).expect("add");
        let row = index.rows().row(0);
        assert!((row[0] - 0.6).abs() < 1e-6 && (row[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn invalid_batch_leaves_index_unchanged() {
        let mut index = VectorIndex::new(2, StrategyConfig::Exact).expect("index");
        index.add(vec![vec![1.0, 0.0]], vec![passage(0)]).expect("add");
        let err = index.add(vec![vec![0.0, 1.0], vec![1.0, 1.0, 1.0]], vec![passage(1), passage(2)]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3 }));
        assert_eq!(index.len(), 1);
        assert_eq!(index.rows().len(), 1);
    }
}
