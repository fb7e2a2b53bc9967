//! Turning digest buckets and accepted pairs into groups.

use std::cmp::Ordering;

use indexmap::IndexMap;
use reelsift_core::{
    DuplicateGroup, FileDescriptor, FullDigest, SimilarGroup, SimilarPair, SimilarityScore,
};
use uuid::Uuid;

/// Build duplicate groups from full-digest buckets.
///
/// Buckets with fewer than two members are dropped. The representative is
/// the earliest modified member (the first encountered on ties). Groups are
/// sorted by reclaimable size, largest first; equal waste keeps bucket order.
pub fn build_duplicate_groups<I>(buckets: I) -> Vec<DuplicateGroup>
where
    I: IntoIterator<Item = (FullDigest, Vec<FileDescriptor>)>,
{
    let mut groups: Vec<DuplicateGroup> = buckets
        .into_iter()
        .filter(|(_, files)| files.len() > 1)
        .filter_map(|(digest, files)| {
            let representative = files
                .iter()
                .reduce(|best, f| if f.modified < best.modified { f } else { best })?
                .clone();

            let total_size: u64 = files.iter().map(|f| f.size).sum();
            let waste_size = total_size.saturating_sub(representative.size);

            Some(DuplicateGroup {
                id: Uuid::new_v4(),
                digest,
                files,
                total_size,
                waste_size,
                representative,
            })
        })
        .collect();

    groups.sort_by(|a, b| b.waste_size.cmp(&a.waste_size));
    groups
}

/// Union-find over `0..n` with path compression and union by size.
#[derive(Debug, Clone)]
pub struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Representative of the set containing `x`.
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }

        root
    }

    /// Merge the sets containing `a` and `b`, returning the new root.
    pub fn union(&mut self, a: usize, b: usize) -> usize {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return ra;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
        ra
    }

    /// Whether `a` and `b` are in the same set.
    pub fn connected(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }
}

/// Accepted pair waiting to be grouped, in arrival order.
#[derive(Debug, Clone, Copy)]
struct PendingPair {
    first: usize,
    second: usize,
    score: SimilarityScore,
}

/// Collects accepted pairs over file indices and clusters them into
/// connected components.
#[derive(Debug, Clone)]
pub struct SimilarGroupBuilder {
    sets: DisjointSet,
    pairs: Vec<PendingPair>,
}

impl SimilarGroupBuilder {
    /// Create a builder for `file_count` files.
    pub fn new(file_count: usize) -> Self {
        Self {
            sets: DisjointSet::new(file_count),
            pairs: Vec::new(),
        }
    }

    /// Record that files `a` and `b` scored `score` and were accepted.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    pub fn add_pair(&mut self, a: usize, b: usize, score: SimilarityScore) {
        self.sets.union(a, b);
        self.pairs.push(PendingPair {
            first: a.min(b),
            second: a.max(b),
            score,
        });
    }

    /// Number of pairs added so far.
    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    /// Produce one group per connected component.
    ///
    /// `files` must be the slice the indices refer to. Members are listed in
    /// index order and pairs in the order they were added. Groups are sorted
    /// by average similarity descending, then by lowest member index.
    pub fn finish(mut self, files: &[FileDescriptor]) -> Vec<SimilarGroup> {
        // root -> (member indices, pairs)
        let mut components: IndexMap<usize, (Vec<usize>, Vec<PendingPair>)> = IndexMap::new();

        for pair in std::mem::take(&mut self.pairs) {
            let root = self.sets.find(pair.first);
            let (members, pairs) = components.entry(root).or_default();
            members.extend([pair.first, pair.second]);
            pairs.push(pair);
        }

        let mut built: Vec<(usize, SimilarGroup)> = components
            .into_values()
            .map(|(mut members, pairs)| {
                members.sort_unstable();
                members.dedup();

                let average_similarity =
                    pairs.iter().map(|p| p.score.overall()).sum::<f64>() / pairs.len() as f64;

                let group = SimilarGroup {
                    id: Uuid::new_v4(),
                    files: members.iter().map(|&i| files[i].clone()).collect(),
                    average_similarity,
                    pairs: pairs
                        .into_iter()
                        .map(|p| SimilarPair {
                            first: files[p.first].clone(),
                            second: files[p.second].clone(),
                            score: p.score,
                        })
                        .collect(),
                };
                (members[0], group)
            })
            .collect();

        built.sort_by(|(ia, a), (ib, b)| {
            b.average_similarity
                .partial_cmp(&a.average_similarity)
                .unwrap_or(Ordering::Equal)
                .then(ia.cmp(ib))
        });

        built.into_iter().map(|(_, group)| group).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use reelsift_core::SimilarityWeights;

    fn file(name: &str, size: u64) -> FileDescriptor {
        FileDescriptor::new(format!("/v/{name}"), size, Utc::now())
    }

    fn score(overall: f64) -> SimilarityScore {
        SimilarityScore::weighted(overall, overall, overall, overall, &SimilarityWeights::DEFAULT)
    }

    #[test]
    fn test_disjoint_set() {
        let mut sets = DisjointSet::new(5);
        sets.union(0, 1);
        sets.union(3, 4);
        assert!(sets.connected(0, 1));
        assert!(!sets.connected(1, 3));

        sets.union(1, 4);
        assert!(sets.connected(0, 3));
        assert!(!sets.connected(2, 0));
        assert_eq!(sets.len(), 5);
    }

    #[test]
    fn test_duplicate_representative_is_earliest() {
        let now = Utc::now();
        let mut a = file("a.mp4", 100);
        a.modified = now;
        let mut b = file("b.mp4", 100);
        b.modified = now - Duration::hours(1);

        let groups = build_duplicate_groups([(FullDigest::new([1; 16]), vec![a, b])]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].representative.name(), "b.mp4");
        assert_eq!(groups[0].total_size, 200);
        assert_eq!(groups[0].waste_size, 100);
    }

    #[test]
    fn test_duplicate_ties_keep_first() {
        let now = Utc::now();
        let mut a = file("a.mp4", 10);
        a.modified = now;
        let mut b = file("b.mp4", 10);
        b.modified = now;

        let groups = build_duplicate_groups([(FullDigest::new([1; 16]), vec![a, b])]);
        assert_eq!(groups[0].representative.name(), "a.mp4");
    }

    #[test]
    fn test_duplicate_groups_sorted_by_waste() {
        let groups = build_duplicate_groups([
            (FullDigest::new([1; 16]), vec![file("s1", 10), file("s2", 10)]),
            (FullDigest::new([2; 16]), vec![file("b1", 500), file("b2", 500)]),
            (FullDigest::new([3; 16]), vec![file("lonely", 999)]),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].waste_size, 500);
        assert_eq!(groups[1].waste_size, 10);
    }

    #[test]
    fn test_similar_groups_are_transitive() {
        let files = vec![file("a", 1), file("b", 1), file("c", 1), file("d", 1)];
        let mut builder = SimilarGroupBuilder::new(files.len());
        builder.add_pair(0, 1, score(0.9));
        builder.add_pair(2, 1, score(0.8));

        let groups = builder.finish(&files);
        assert_eq!(groups.len(), 1);
        let names: Vec<_> = groups[0].files.iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(groups[0].pairs.len(), 2);
        assert!((groups[0].average_similarity - 0.85).abs() < 1e-9);
        // Pair endpoints are normalized to index order.
        assert_eq!(groups[0].pairs[1].first.name(), "b");
    }

    #[test]
    fn test_merged_components_keep_all_pairs() {
        let files: Vec<_> = (0..4).map(|i| file(&format!("f{i}"), 1)).collect();
        let mut builder = SimilarGroupBuilder::new(files.len());
        builder.add_pair(0, 1, score(1.0));
        builder.add_pair(2, 3, score(1.0));
        builder.add_pair(1, 2, score(1.0));

        let groups = builder.finish(&files);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].count(), 4);
        assert_eq!(groups[0].pairs.len(), 3);
    }

    #[test]
    fn test_similar_group_ordering() {
        let files: Vec<_> = (0..6).map(|i| file(&format!("f{i}"), 1)).collect();
        let mut builder = SimilarGroupBuilder::new(files.len());
        builder.add_pair(4, 5, score(0.9));
        builder.add_pair(0, 1, score(0.8));
        builder.add_pair(2, 3, score(0.9));

        let groups = builder.finish(&files);
        let firsts: Vec<_> = groups.iter().map(|g| g.files[0].name()).collect();
        assert_eq!(firsts, vec!["f2", "f4", "f0"]);
    }

    #[test]
    fn test_no_pairs_no_groups() {
        let files = vec![file("a", 1)];
        assert!(SimilarGroupBuilder::new(1).finish(&files).is_empty());
    }

    #[test]
    fn test_many_disjoint_components() {
        let files: Vec<_> = (0..1000).map(|i| file(&format!("f{i}.mp4"), 1)).collect();
        let mut builder = SimilarGroupBuilder::new(files.len());
        // Added in reverse so arrival order differs from index order.
        for i in (0..500).rev() {
            builder.add_pair(2 * i + 1, 2 * i, score(0.9));
        }

        let groups = builder.finish(&files);
        assert_eq!(groups.len(), 500);
        assert!(groups.iter().all(|g| g.count() == 2 && g.pairs.len() == 1));
        assert_eq!(groups[0].files[0].name(), "f0.mp4");
        assert_eq!(groups[499].files[1].name(), "f999.mp4");
    }
}
