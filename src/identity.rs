//! Stable track identity across the id namespaces a track can carry.
//!
//! A track may be known to the streaming service, to the upstream catalog the
//! sync process mirrors, to the local database, or to nobody at all (a
//! gap-fill suggestion). The canonical id picks the first available of those,
//! in that order, and falls back to a slug built from title and artist.

use crate::catalog_store::Track;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

lazy_static! {
    static ref NON_ALPHANUMERIC: Regex = Regex::new("[^a-z0-9]+").unwrap();
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CanonicalId {
    Streaming(String),
    External(String),
    Local(i64),
    Slug(String),
}

impl fmt::Display for CanonicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalId::Streaming(id) => write!(f, "spotify:{}", id),
            CanonicalId::External(id) => write!(f, "catalog:{}", id),
            CanonicalId::Local(id) => write!(f, "local:{}", id),
            CanonicalId::Slug(slug) => write!(f, "slug:{}", slug),
        }
    }
}

impl Serialize for CanonicalId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The identifying fields of a track, whatever its origin.
#[derive(Clone, Copy, Debug)]
pub struct TrackIdentity<'a> {
    pub spotify_id: Option<&'a str>,
    pub external_id: Option<&'a str>,
    pub local_id: Option<i64>,
    pub title: &'a str,
    pub artist: &'a str,
}

impl<'a> TrackIdentity<'a> {
    /// Identity of something that only has a title and an artist.
    pub fn unlinked(title: &'a str, artist: &'a str) -> Self {
        Self {
            spotify_id: None,
            external_id: None,
            local_id: None,
            title,
            artist,
        }
    }

    pub fn canonical_id(&self) -> CanonicalId {
        let present = |id: Option<&'a str>| id.map(str::trim).filter(|s| !s.is_empty());
        if let Some(id) = present(self.spotify_id) {
            CanonicalId::Streaming(id.to_string())
        } else if let Some(id) = present(self.external_id) {
            CanonicalId::External(id.to_string())
        } else if let Some(id) = self.local_id {
            CanonicalId::Local(id)
        } else {
            CanonicalId::Slug(track_slug(self.title, self.artist))
        }
    }

    pub fn key(&self) -> String {
        track_key(self.title, self.artist)
    }
}

impl<'a> From<&'a Track> for TrackIdentity<'a> {
    fn from(track: &'a Track) -> Self {
        Self {
            spotify_id: track.spotify_id.as_deref(),
            external_id: track.external_id.as_deref(),
            local_id: Some(track.id),
            title: &track.title,
            artist: &track.artist,
        }
    }
}

/// Case- and whitespace-insensitive `title|artist` key.
pub fn track_key(title: &str, artist: &str) -> String {
    format!(
        "{}|{}",
        title.trim().to_lowercase(),
        artist.trim().to_lowercase()
    )
}

/// Lowercase ASCII alphanumerics with every other run collapsed to `-`.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    NON_ALPHANUMERIC
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// `{title}--{artist}` slug. A part with no ASCII alphanumerics left (for
/// instance a title in a non-Latin script) becomes a short hash of its text,
/// so distinct tracks keep distinct slugs.
pub fn track_slug(title: &str, artist: &str) -> String {
    let part = |text: &str, fallback: &str| {
        let slug = slugify(text);
        if !slug.is_empty() {
            slug
        } else if text.trim().is_empty() {
            fallback.to_string()
        } else {
            format!("x{:016x}", fnv1a(text.trim().to_lowercase().as_bytes()))
        }
    };
    format!(
        "{}--{}",
        part(title, "unknown-title"),
        part(artist, "unknown-artist")
    )
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf29ce484222325u64, |hash, b| {
        (hash ^ *b as u64).wrapping_mul(0x100000001b3)
    })
}

/// Tracks already placed in the routine being built.
///
/// A track counts as placed if either its canonical id or its title/artist
/// key was seen, so the same song arriving once from the catalog and once as
/// an unlinked suggestion is still caught.
#[derive(Clone, Debug, Default)]
pub struct ExclusionSet {
    ids: HashSet<CanonicalId>,
    keys: HashSet<String>,
    local_ids: BTreeSet<i64>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, identity: &TrackIdentity<'_>) -> bool {
        self.ids.contains(&identity.canonical_id()) || self.keys.contains(&identity.key())
    }

    pub fn insert(&mut self, identity: &TrackIdentity<'_>) {
        self.ids.insert(identity.canonical_id());
        self.keys.insert(identity.key());
        if let Some(local_id) = identity.local_id {
            self.local_ids.insert(local_id);
        }
    }

    /// Catalog row ids of placed tracks, ascending.
    pub fn local_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.local_ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
