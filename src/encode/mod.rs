//! OPL line encoding.
//!
//! Every record becomes exactly one newline-terminated line. The line starts
//! with a type letter and the id, followed by space-separated fields, each
//! introduced by its own letter:
//!
//! ```text
//! n<id> v<version> d<V|D> c<changeset> t<timestamp> i<uid> u<user> x<lon> y<lat> T<tags>
//! w<id> v.. d.. c.. t.. i.. u.. N<n<ref>,...> T<tags>
//! r<id> v.. d.. c.. t.. i.. u.. M<type><ref>@<role>,... T<tags>
//! c<id> k<changes> s<created> e<closed> i<uid> u<user> x<lon> y<lat> X<lon> Y<lat> T<tags>
//! ```
//!
//! Coordinates carry seven decimals; an absent location leaves just the field
//! letter. Empty lists leave just the section letter.

pub mod escape;

pub use escape::{EscapeScheme, escape, unescape};

use crate::entity::{Block, Changeset, Location, Meta, Point, Record, Relation, TagList, Way};
use crate::error::{OplError, Result};
use std::fmt::Write;

/// Encodes one block of records into OPL text.
///
/// Implementations must be pure with respect to the block: the block pipeline
/// calls them from arbitrary worker threads and concatenates the results in
/// submission order.
pub trait BlockEncoder: Send + Sync {
    fn encode_block(&self, block: &Block) -> Result<String>;
}

/// The OPL text encoder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OplEncoder {
    scheme: EscapeScheme,
}

impl OplEncoder {
    pub const fn new(scheme: EscapeScheme) -> Self {
        Self { scheme }
    }

    pub const fn scheme(&self) -> EscapeScheme {
        self.scheme
    }

    /// Encode one record as a newline-terminated line.
    pub fn encode(&self, record: &Record) -> Result<String> {
        let mut out = String::with_capacity(128);
        self.encode_into(record, &mut out)?;
        Ok(out)
    }

    /// Append the line for `record` to `out`.
    ///
    /// On error `out` is restored to its previous length, so a partial line is
    /// never left behind.
    pub fn encode_into(&self, record: &Record, out: &mut String) -> Result<()> {
        let mark = out.len();
        let res = match record {
            Record::Point(p) => self.point(p, out),
            Record::Way(w) => self.way(w, out),
            Record::Relation(r) => self.relation(r, out),
            Record::Changeset(c) => self.changeset(c, out),
        };
        if res.is_err() {
            out.truncate(mark);
        }
        res
    }

    fn point(&self, point: &Point, out: &mut String) -> Result<()> {
        out.push('n');
        self.meta(&point.meta, out)?;
        push_location(out, point.location, 'x', 'y')?;
        self.tags(&point.meta.tags, out)?;
        out.push('\n');
        Ok(())
    }

    fn way(&self, way: &Way, out: &mut String) -> Result<()> {
        out.push('w');
        self.meta(&way.meta, out)?;
        out.push_str(" N");
        for (i, node) in way.nodes.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "n{node}");
        }
        self.tags(&way.meta.tags, out)?;
        out.push('\n');
        Ok(())
    }

    fn relation(&self, relation: &Relation, out: &mut String) -> Result<()> {
        out.push('r');
        self.meta(&relation.meta, out)?;
        out.push_str(" M");
        for (i, member) in relation.members.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "{}{}@", member.kind.as_char(), member.reference);
            escape::append_escaped(out, "role", &member.role, self.scheme)?;
        }
        self.tags(&relation.meta.tags, out)?;
        out.push('\n');
        Ok(())
    }

    fn changeset(&self, cs: &Changeset, out: &mut String) -> Result<()> {
        let _ = write!(
            out,
            "c{} k{} s{} e{} i{} u",
            cs.id,
            cs.num_changes,
            cs.created_at.to_iso(),
            cs.closed_at.to_iso(),
            cs.uid
        );
        escape::append_escaped(out, "user", &cs.user, self.scheme)?;
        push_location(out, cs.bounds.bottom_left, 'x', 'y')?;
        push_location(out, cs.bounds.top_right, 'X', 'Y')?;
        self.tags(&cs.tags, out)?;
        out.push('\n');
        Ok(())
    }

    // Everything after the type letter up to and including the user name.
    fn meta(&self, meta: &Meta, out: &mut String) -> Result<()> {
        let _ = write!(
            out,
            "{} v{} d{} c{} t{} i{} u",
            meta.id,
            meta.version,
            if meta.visible { 'V' } else { 'D' },
            meta.changeset,
            meta.timestamp.to_iso(),
            meta.uid
        );
        escape::append_escaped(out, "user", &meta.user, self.scheme)
    }

    fn tags(&self, tags: &TagList, out: &mut String) -> Result<()> {
        out.push_str(" T");
        for (i, tag) in tags.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            escape::append_escaped(out, "tag key", &tag.key, self.scheme)?;
            out.push('=');
            escape::append_escaped(out, "tag value", &tag.value, self.scheme)?;
        }
        Ok(())
    }
}

impl BlockEncoder for OplEncoder {
    fn encode_block(&self, block: &Block) -> Result<String> {
        let mut out = String::with_capacity(block.len() * 96);
        for (index, record) in block.iter().enumerate() {
            self.encode_into(record, &mut out)
                .map_err(|e| e.in_block(index))?;
        }
        Ok(out)
    }
}

fn push_location(out: &mut String, location: Option<Location>, x: char, y: char) -> Result<()> {
    match location {
        Some(loc) => {
            if !loc.lon.is_finite() || !loc.lat.is_finite() {
                return Err(OplError::encoding(
                    "location",
                    format!("non-finite coordinate ({}, {})", loc.lon, loc.lat),
                ));
            }
            let _ = write!(out, " {x}{:.7} {y}{:.7}", loc.lon, loc.lat);
        }
        None => {
            out.push(' ');
            out.push(x);
            out.push(' ');
            out.push(y);
        }
    }
    Ok(())
}

/// Encode a single record with the default (Unicode) scheme.
pub fn encode(record: &Record) -> Result<String> {
    OplEncoder::default().encode(record)
}

/// Encode a block with the default (Unicode) scheme.
pub fn encode_block(block: &Block) -> Result<String> {
    OplEncoder::default().encode_block(block)
}
