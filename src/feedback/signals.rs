use super::{normalize, row_applies};
use crate::catalog_store::FeedbackRow;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Net likes and dislikes for one audience.
///
/// Rows count when they carry the audience or no audience at all. A title or
/// artist is liked when the polarity of its rows sums above zero and disliked
/// when it sums below.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FeedbackSignals {
    pub liked_titles: Vec<String>,
    pub disliked_titles: Vec<String>,
    pub liked_artists: Vec<String>,
    pub disliked_artists: Vec<String>,
    #[serde(skip)]
    disliked: Vec<(String, Option<String>)>,
}

struct Tally {
    display: String,
    polarity: f64,
}

impl FeedbackSignals {
    pub fn from_rows(rows: &[FeedbackRow], audience: Option<&str>) -> Self {
        let in_scope = |row: &&FeedbackRow| match (audience, row.audience.as_deref()) {
            (Some(wanted), Some(label)) => wanted.eq_ignore_ascii_case(label.trim()),
            _ => true,
        };

        let mut titles: BTreeMap<(String, Option<String>), Tally> = BTreeMap::new();
        let mut artists: BTreeMap<String, (String, f64)> = BTreeMap::new();
        for row in rows.iter().filter(in_scope) {
            let artist = row
                .track_artist
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty());
            let key = (normalize(&row.track_title), artist.map(normalize));
            let tally = titles.entry(key).or_insert_with(|| Tally {
                display: match artist {
                    Some(a) => format!("{} - {}", row.track_title.trim(), a),
                    None => row.track_title.trim().to_string(),
                },
                polarity: 0.0,
            });
            tally.polarity += row.rating.polarity();

            if let Some(artist) = artist {
                artists
                    .entry(normalize(artist))
                    .or_insert_with(|| (artist.to_string(), 0.0))
                    .1 += row.rating.polarity();
            }
        }

        let mut signals = FeedbackSignals::default();
        for ((title_key, artist_key), tally) in titles {
            if tally.polarity > 0.0 {
                signals.liked_titles.push(tally.display);
            } else if tally.polarity < 0.0 {
                signals.disliked_titles.push(tally.display);
                signals.disliked.push((title_key, artist_key));
            }
        }
        let mut liked_artists = BTreeSet::new();
        let mut disliked_artists = BTreeSet::new();
        for (display, polarity) in artists.into_values() {
            if polarity > 0.0 {
                liked_artists.insert(display);
            } else if polarity < 0.0 {
                disliked_artists.insert(display);
            }
        }
        signals.liked_artists = liked_artists.into_iter().collect();
        signals.disliked_artists = disliked_artists.into_iter().collect();
        signals
    }

    /// Is this title (by this artist) net-disliked for the audience?
    pub fn is_disliked(&self, title: &str, artist: &str) -> bool {
        let title = normalize(title);
        self.disliked
            .iter()
            .any(|(t, a)| *t == title && row_applies(a.as_deref(), artist))
    }

    pub fn is_empty(&self) -> bool {
        self.liked_titles.is_empty()
            && self.disliked_titles.is_empty()
            && self.liked_artists.is_empty()
            && self.disliked_artists.is_empty()
    }
}
