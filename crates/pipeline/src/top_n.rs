//! Top-N selection and the catalog join.

use crate::types::{Candidate, ScoredItem};
use data_loader::{Catalog, MovieId};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Higher score first; equal scores by ascending position
fn rank_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.ranking_score()
        .total_cmp(&a.ranking_score())
        .then_with(|| a.position.cmp(&b.position))
}

/// Keep the `n` best candidates not in `excluded`, best first.
///
/// Partitions with `select_nth_unstable_by` and only sorts the survivors.
/// Returns everything eligible when fewer than `n` remain.
pub fn select_top_n(
    candidates: Vec<Candidate>,
    excluded: &HashSet<MovieId>,
    n: usize,
) -> Vec<Candidate> {
    let mut eligible: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| !excluded.contains(&c.movie_id))
        .collect();

    if n == 0 {
        return Vec::new();
    }
    if eligible.len() > n {
        eligible.select_nth_unstable_by(n - 1, rank_order);
        eligible.truncate(n);
    }
    eligible.sort_unstable_by(rank_order);
    eligible
}

/// Attach titles and genres. Candidates the catalog does not know are dropped.
pub fn enrich(candidates: Vec<Candidate>, catalog: &dyn Catalog) -> Vec<ScoredItem> {
    candidates
        .into_iter()
        .filter_map(|c| {
            let movie = catalog.lookup(&c.movie_id)?;
            Some(ScoredItem {
                movie_id: c.movie_id,
                title: movie.title.clone(),
                genres: movie.genres.clone(),
                svd_score: c.svd_score,
                hybrid_score: c.hybrid_score,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::{DataIndex, Movie, RawId};

    fn candidate(id: i64, position: usize, score: f64) -> Candidate {
        Candidate {
            movie_id: RawId::Int(id),
            position,
            svd_score: score,
            hybrid_score: None,
        }
    }

    fn ids(items: &[Candidate]) -> Vec<i64> {
        items.iter().filter_map(|c| c.movie_id.as_int()).collect()
    }

    #[test]
    fn test_selects_best_in_order() {
        let candidates = vec![
            candidate(1, 0, 3.6),
            candidate(2, 1, 3.3),
            candidate(3, 2, 3.5),
            candidate(4, 3, 4.9),
            candidate(5, 4, 1.0),
        ];
        let top = select_top_n(candidates, &HashSet::new(), 3);
        assert_eq!(ids(&top), vec![4, 1, 3]);
    }

    #[test]
    fn test_excludes_rated_items() {
        let candidates = vec![candidate(1, 0, 5.0), candidate(2, 1, 4.0), candidate(3, 2, 3.0)];
        let excluded: HashSet<MovieId> = [RawId::Int(1)].into_iter().collect();

        let top = select_top_n(candidates, &excluded, 10);
        assert_eq!(ids(&top), vec![2, 3]);
    }

    #[test]
    fn test_ties_follow_position() {
        let candidates = vec![
            candidate(30, 2, 4.0),
            candidate(10, 0, 4.0),
            candidate(20, 1, 4.0),
            candidate(40, 3, 4.0),
        ];
        let top = select_top_n(candidates, &HashSet::new(), 3);
        assert_eq!(ids(&top), vec![10, 20, 30]);
    }

    #[test]
    fn test_hybrid_score_drives_ranking() {
        let mut a = candidate(1, 0, 5.0);
        a.hybrid_score = Some(0.2);
        let mut b = candidate(2, 1, 3.0);
        b.hybrid_score = Some(0.9);

        let top = select_top_n(vec![a, b], &HashSet::new(), 2);
        assert_eq!(ids(&top), vec![2, 1]);
    }

    #[test]
    fn test_zero_n() {
        assert!(select_top_n(vec![candidate(1, 0, 1.0)], &HashSet::new(), 0).is_empty());
    }

    #[test]
    fn test_enrich_drops_unknown_items() {
        let mut index = DataIndex::new();
        index.insert_movie(Movie {
            id: RawId::Int(2),
            title: "Known (1999)".to_string(),
            year: Some(1999),
            genres: vec![],
        });

        let items = enrich(vec![candidate(1, 0, 4.0), candidate(2, 1, 3.0)], &index);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Known (1999)");
        assert_eq!(items[0].svd_score, 3.0);
    }
}
