use super::{normalize, row_applies};
use crate::catalog_store::FeedbackRow;
use crate::config::RankingSettings;
use std::collections::HashMap;

/// Scores tracks from stored feedback.
///
/// Every matching row contributes `polarity * context_weight * audience_weight`.
/// A label weighs `match_weight` when it equals what the request asks for,
/// `agnostic_weight` when the row has no label and `mismatch_weight` otherwise;
/// when the request asks for nothing the factor is 1.
pub struct FeedbackRanker {
    rows_by_title: HashMap<String, Vec<FeedbackRow>>,
    weights: RankingSettings,
}

impl FeedbackRanker {
    pub fn new(rows: Vec<FeedbackRow>, weights: RankingSettings) -> Self {
        let mut rows_by_title: HashMap<String, Vec<FeedbackRow>> = HashMap::new();
        for row in rows {
            rows_by_title
                .entry(normalize(&row.track_title))
                .or_default()
                .push(row);
        }
        Self {
            rows_by_title,
            weights,
        }
    }

    pub fn weights(&self) -> &RankingSettings {
        &self.weights
    }

    /// Signed preference for a track in a context. No feedback scores 0.
    pub fn score(
        &self,
        title: &str,
        artist: &str,
        contexts: &[&str],
        audience: Option<&str>,
    ) -> f64 {
        let Some(rows) = self.rows_by_title.get(&normalize(title)) else {
            return 0.0;
        };
        let audiences: Vec<&str> = audience.into_iter().collect();
        rows.iter()
            .filter(|row| row_applies(row.track_artist.as_deref(), artist))
            .map(|row| {
                row.rating.polarity()
                    * self.label_weight(row.context.as_deref(), contexts)
                    * self.label_weight(row.audience.as_deref(), &audiences)
            })
            .sum()
    }

    fn label_weight(&self, row_label: Option<&str>, wanted: &[&str]) -> f64 {
        if wanted.is_empty() {
            return 1.0;
        }
        match row_label.map(str::trim).filter(|l| !l.is_empty()) {
            None => self.weights.agnostic_weight,
            Some(label) if wanted.iter().any(|w| w.eq_ignore_ascii_case(label)) => {
                self.weights.match_weight
            }
            Some(_) => self.weights.mismatch_weight,
        }
    }
}
