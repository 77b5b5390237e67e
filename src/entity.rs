//! Entity records handed to the encoder.
//!
//! Records are plain owned values. The encoder only ever reads them; a [`Block`]
//! is moved into whichever writer or worker consumes it.
//!
//! Text fields (user names, tag keys and values, member roles) are stored as raw
//! bytes. They are expected to hold UTF-8 but the encoder does not assume it:
//! the Unicode escaping scheme reports malformed input as an encoding error,
//! the byte scheme escapes it byte by byte.

use chrono::{DateTime, NaiveDateTime};
use std::fmt;

/// Seconds since the Unix epoch. Zero means "not set".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u32);

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

impl Timestamp {
    pub const fn from_secs(secs: u32) -> Self {
        Self(secs)
    }

    pub const fn as_secs(self) -> u32 {
        self.0
    }

    pub const fn is_set(self) -> bool {
        self.0 != 0
    }

    /// Parse `YYYY-MM-DDTHH:MM:SSZ`. Returns `None` for malformed text or
    /// instants outside the `u32` second range.
    pub fn parse_iso(text: &str) -> Option<Self> {
        let parsed = NaiveDateTime::parse_from_str(text, ISO_FORMAT).ok()?;
        u32::try_from(parsed.and_utc().timestamp()).ok().map(Self)
    }

    /// ISO 8601 rendering in UTC; the unset timestamp renders as empty text.
    pub fn to_iso(self) -> String {
        if !self.is_set() {
            return String::new();
        }
        DateTime::from_timestamp(i64::from(self.0), 0)
            .map(|dt| dt.format(ISO_FORMAT).to_string())
            .unwrap_or_default()
    }
}

impl From<u32> for Timestamp {
    fn from(secs: u32) -> Self {
        Self(secs)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso())
    }
}

/// A longitude/latitude pair in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Location {
    pub lon: f64,
    pub lat: f64,
}

impl Location {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// One key/value pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tag {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Ordered tag list, unique by key.
///
/// Iteration yields tags in insertion order. Inserting a key that is already
/// present replaces its value without moving it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagList {
    tags: Vec<Tag>,
}

impl TagList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        let key = key.into();
        let value = value.into();
        match self.tags.iter_mut().find(|t| t.key == key) {
            Some(existing) => existing.value = value,
            None => self.tags.push(Tag { key, value }),
        }
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<&[u8]> {
        let key = key.as_ref();
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_slice())
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.tags.iter()
    }
}

impl<K: Into<Vec<u8>>, V: Into<Vec<u8>>> FromIterator<(K, V)> for TagList {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut list = Self::new();
        for (k, v) in iter {
            list.insert(k, v);
        }
        list
    }
}

impl<'a> IntoIterator for &'a TagList {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.tags.iter()
    }
}

/// Fields shared by points, ways and relations.
#[derive(Clone, Debug, PartialEq)]
pub struct Meta {
    pub id: i64,
    pub version: u32,
    pub visible: bool,
    pub changeset: u32,
    pub timestamp: Timestamp,
    pub uid: i32,
    pub user: Vec<u8>,
    pub tags: TagList,
}

impl Meta {
    /// A visible object with the given id and every other field zeroed.
    pub fn new(id: i64) -> Self {
        Self {
            id,
            version: 0,
            visible: true,
            changeset: 0,
            timestamp: Timestamp::default(),
            uid: 0,
            user: Vec::new(),
            tags: TagList::new(),
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn changeset(mut self, changeset: u32) -> Self {
        self.changeset = changeset;
        self
    }

    pub fn timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn user(mut self, uid: i32, name: impl Into<Vec<u8>>) -> Self {
        self.uid = uid;
        self.user = name.into();
        self
    }

    pub fn tag(mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        self.tags.insert(key, value);
        self
    }
}

/// A node. `location == None` is distinct from a location at (0, 0).
#[derive(Clone, Debug, PartialEq)]
pub struct Point {
    pub meta: Meta,
    pub location: Option<Location>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Way {
    pub meta: Meta,
    /// Node references in path order; closed ways repeat the first id.
    pub nodes: Vec<i64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberType {
    Node,
    Way,
    Relation,
}

impl MemberType {
    pub const fn as_char(self) -> char {
        match self {
            Self::Node => 'n',
            Self::Way => 'w',
            Self::Relation => 'r',
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Member {
    pub kind: MemberType,
    pub reference: i64,
    pub role: Vec<u8>,
}

impl Member {
    pub fn new(kind: MemberType, reference: i64, role: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            reference,
            role: role.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Relation {
    pub meta: Meta,
    pub members: Vec<Member>,
}

/// Two optional corners; either may be unset independently.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub bottom_left: Option<Location>,
    pub top_right: Option<Location>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Changeset {
    pub id: u32,
    pub created_at: Timestamp,
    /// Unset while the changeset is still open.
    pub closed_at: Timestamp,
    pub num_changes: u32,
    pub uid: i32,
    pub user: Vec<u8>,
    pub bounds: BoundingBox,
    pub tags: TagList,
}

/// Closed set of entity kinds the encoder understands.
#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    Point(Point),
    Way(Way),
    Relation(Relation),
    Changeset(Changeset),
}

impl Record {
    /// Common metadata; changesets carry none.
    pub fn meta(&self) -> Option<&Meta> {
        match self {
            Self::Point(p) => Some(&p.meta),
            Self::Way(w) => Some(&w.meta),
            Self::Relation(r) => Some(&r.meta),
            Self::Changeset(_) => None,
        }
    }
}

impl From<Point> for Record {
    fn from(p: Point) -> Self {
        Self::Point(p)
    }
}

impl From<Way> for Record {
    fn from(w: Way) -> Self {
        Self::Way(w)
    }
}

impl From<Relation> for Record {
    fn from(r: Relation) -> Self {
        Self::Relation(r)
    }
}

impl From<Changeset> for Record {
    fn from(c: Changeset) -> Self {
        Self::Changeset(c)
    }
}

/// An ordered batch of records encoded as one unit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Block {
    records: Vec<Record>,
}

impl Block {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl From<Vec<Record>> for Block {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}

impl FromIterator<Record> for Block {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Block {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
