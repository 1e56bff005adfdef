//! Pure shape detection and scanning over a raw user container document
//!
//! Everything here is synchronous and store-free so the strategies can be
//! tested against literal documents. Matching tolerates the historical key
//! drift: gists carry their identifier as `gistId` or `id`, links as
//! `link_id` or `id`, and a link's gist back-reference as `gistId` or
//! `gist_id`.

use bson::{Bson, Document};

use crate::types::gist::{GISTS_FIELD, LINKS_FIELD};

/// Fields whose presence marks a container as gist-shaped (embedded
/// single-gist case). At least two must be present.
pub const GIST_MARKER_FIELDS: [&str; 4] = ["title", "link", "status", "segments"];

/// Where a gist physically lives relative to its user container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GistHome {
    /// Element of the container's ordered gists sequence
    Array { index: usize },
    /// Value in a keyed map; `key` is the dotted prefix of the record
    /// (a top-level ordinal like `"0"`, or `"gists.0"` when the gists
    /// field itself is a map)
    KeyedMap { key: String },
    /// The container's own fields are the gist
    Embedded,
    /// Document in the per-user gists subcollection
    Subcollection { id: String },
}

impl GistHome {
    /// Dotted path to a field of the located gist within the user
    /// container. `None` for the subcollection shape, where fields live
    /// in the subcollection document itself.
    pub fn field_path(&self, field: &str) -> Option<String> {
        match self {
            Self::Array { index } => Some(format!("{}.{}.{}", GISTS_FIELD, index, field)),
            Self::KeyedMap { key } => Some(format!("{}.{}", key, field)),
            Self::Embedded => Some(field.to_string()),
            Self::Subcollection { .. } => None,
        }
    }
}

/// Where a link physically lives relative to its user container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkHome {
    Array { index: usize },
    KeyedMap { key: String },
    Subcollection { id: String },
}

impl LinkHome {
    pub fn field_path(&self, field: &str) -> Option<String> {
        match self {
            Self::Array { index } => Some(format!("{}.{}.{}", LINKS_FIELD, index, field)),
            Self::KeyedMap { key } => Some(format!("{}.{}", key, field)),
            Self::Subcollection { .. } => None,
        }
    }
}

/// A located gist: its home plus a snapshot of the record
#[derive(Debug, Clone)]
pub struct LocatedGist {
    pub home: GistHome,
    pub record: Document,
}

/// A located link: its home plus a snapshot of the record
#[derive(Debug, Clone)]
pub struct LocatedLink {
    pub home: LinkHome,
    pub record: Document,
}

fn str_field<'a>(doc: &'a Document, key: &str) -> Option<&'a str> {
    match doc.get(key) {
        Some(Bson::String(s)) => Some(s.as_str()),
        _ => None,
    }
}

/// Identifier equality over both `gistId` and `id` keys
pub fn gist_id_matches(record: &Document, gist_id: &str) -> bool {
    str_field(record, "gistId") == Some(gist_id) || str_field(record, "id") == Some(gist_id)
}

/// Identifier equality over both `link_id` and `id` keys
pub fn link_id_matches(record: &Document, link_id: &str) -> bool {
    str_field(record, "link_id") == Some(link_id) || str_field(record, "id") == Some(link_id)
}

/// A link's gist back-reference, under either historical key
pub fn link_gist_ref(record: &Document) -> Option<&str> {
    str_field(record, "gistId").or_else(|| str_field(record, "gist_id"))
}

/// Whether a container's own fields look like a gist (>= 2 marker fields)
pub fn looks_gist_shaped(container: &Document) -> bool {
    GIST_MARKER_FIELDS
        .iter()
        .filter(|f| container.contains_key(**f))
        .count()
        >= 2
}

/// Map-shape entries: the record field as a keyed map, plus top-level
/// stringified-ordinal keys on the container itself. Returns the dotted
/// key prefix and the record for each entry.
fn map_entries<'a>(container: &'a Document, field: &str) -> Vec<(String, &'a Document)> {
    let mut out = Vec::new();
    if let Some(Bson::Document(map)) = container.get(field) {
        for (key, value) in map {
            if let Bson::Document(record) = value {
                out.push((format!("{}.{}", field, key), record));
            }
        }
    }
    for (key, value) in container {
        if key.parse::<i64>().is_ok() {
            if let Bson::Document(record) = value {
                out.push((key.clone(), record));
            }
        }
    }
    out
}

fn array_entries<'a>(container: &'a Document, field: &str) -> Vec<(usize, &'a Document)> {
    let mut out = Vec::new();
    if let Ok(arr) = container.get_array(field) {
        for (index, item) in arr.iter().enumerate() {
            if let Bson::Document(record) = item {
                out.push((index, record));
            }
        }
    }
    out
}

/// Strategies 1-3 for gists: ordered sequence, keyed map, embedded single.
/// Title fallback is NOT attempted here; see [`scan_gist_by_title`].
pub fn scan_container_gist(container: &Document, gist_id: &str) -> Option<LocatedGist> {
    for (index, record) in array_entries(container, GISTS_FIELD) {
        if gist_id_matches(record, gist_id) {
            return Some(LocatedGist {
                home: GistHome::Array { index },
                record: record.clone(),
            });
        }
    }

    for (key, record) in map_entries(container, GISTS_FIELD) {
        if gist_id_matches(record, gist_id) {
            return Some(LocatedGist {
                home: GistHome::KeyedMap { key },
                record: record.clone(),
            });
        }
    }

    if looks_gist_shaped(container) {
        let has_own_id = container.contains_key("gistId") || container.contains_key("id");
        if !has_own_id || gist_id_matches(container, gist_id) {
            return Some(LocatedGist {
                home: GistHome::Embedded,
                record: container.clone(),
            });
        }
    }

    None
}

/// Last-resort accommodation: upstream callers sometimes pass a title
/// where an identifier is expected. Only consulted after every keyed
/// strategy (including the subcollection lookup) has missed.
pub fn scan_gist_by_title(container: &Document, gist_id: &str) -> Option<LocatedGist> {
    for (index, record) in array_entries(container, GISTS_FIELD) {
        if str_field(record, "title") == Some(gist_id) {
            return Some(LocatedGist {
                home: GistHome::Array { index },
                record: record.clone(),
            });
        }
    }

    for (key, record) in map_entries(container, GISTS_FIELD) {
        if str_field(record, "title") == Some(gist_id) {
            return Some(LocatedGist {
                home: GistHome::KeyedMap { key },
                record: record.clone(),
            });
        }
    }

    None
}

/// All gists present in the container itself (shapes 1-3). The first
/// matching shape wins; only one is authoritative per user in practice.
pub fn list_container_gists(container: &Document) -> Vec<(GistHome, Document)> {
    let from_array: Vec<_> = array_entries(container, GISTS_FIELD)
        .into_iter()
        .map(|(index, record)| (GistHome::Array { index }, record.clone()))
        .collect();
    if !from_array.is_empty() {
        return from_array;
    }

    let from_map: Vec<_> = map_entries(container, GISTS_FIELD)
        .into_iter()
        .map(|(key, record)| (GistHome::KeyedMap { key }, record.clone()))
        .collect();
    if !from_map.is_empty() {
        return from_map;
    }

    if looks_gist_shaped(container) {
        return vec![(GistHome::Embedded, container.clone())];
    }

    Vec::new()
}

/// Container-level link lookup (array and keyed-map shapes)
pub fn scan_container_link(container: &Document, link_id: &str) -> Option<LocatedLink> {
    for (index, record) in array_entries(container, LINKS_FIELD) {
        if link_id_matches(record, link_id) {
            return Some(LocatedLink {
                home: LinkHome::Array { index },
                record: record.clone(),
            });
        }
    }

    if let Some(Bson::Document(map)) = container.get(LINKS_FIELD) {
        for (key, value) in map {
            if let Bson::Document(record) = value {
                if link_id_matches(record, link_id) {
                    return Some(LocatedLink {
                        home: LinkHome::KeyedMap {
                            key: format!("{}.{}", LINKS_FIELD, key),
                        },
                        record: record.clone(),
                    });
                }
            }
        }
    }

    None
}

/// All links present in the container itself
pub fn list_container_links(container: &Document) -> Vec<(LinkHome, Document)> {
    let from_array: Vec<_> = array_entries(container, LINKS_FIELD)
        .into_iter()
        .map(|(index, record)| (LinkHome::Array { index }, record.clone()))
        .collect();
    if !from_array.is_empty() {
        return from_array;
    }

    if let Some(Bson::Document(map)) = container.get(LINKS_FIELD) {
        return map
            .iter()
            .filter_map(|(key, value)| match value {
                Bson::Document(record) => Some((
                    LinkHome::KeyedMap {
                        key: format!("{}.{}", LINKS_FIELD, key),
                    },
                    record.clone(),
                )),
                _ => None,
            })
            .collect();
    }

    Vec::new()
}
