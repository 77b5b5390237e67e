//! Pre-built records and blocks for tests and benchmarks.

use crate::entity::{
    Block, BoundingBox, Changeset, Location, Member, MemberType, Meta, Point, Record, Relation,
    Timestamp, Way,
};

/// 2014-01-01T00:00:00Z
pub const SAMPLE_TIMESTAMP: Timestamp = Timestamp::from_secs(1_388_534_400);

/// Visible version-1 metadata by user 1 "u" in changeset 1.
#[must_use]
pub fn sample_meta(id: i64) -> Meta {
    Meta::new(id)
        .version(1)
        .changeset(1)
        .timestamp(SAMPLE_TIMESTAMP)
        .user(1, "u")
}

/// Point 1 at (1.0, 2.0) tagged `a=1`; encodes to
/// `n1 v1 dV c1 t2014-01-01T00:00:00Z i1 uu x1.0000000 y2.0000000 Ta=1`.
#[must_use]
pub fn sample_point() -> Point {
    Point {
        meta: sample_meta(1).tag("a", "1"),
        location: Some(Location::new(1.0, 2.0)),
    }
}

/// A closed way over three nodes.
#[must_use]
pub fn sample_way() -> Way {
    Way {
        meta: sample_meta(10).tag("highway", "residential").tag("name", "Main St"),
        nodes: vec![1, 2, 3, 1],
    }
}

#[must_use]
pub fn sample_relation() -> Relation {
    Relation {
        meta: sample_meta(100).tag("type", "multipolygon"),
        members: vec![
            Member::new(MemberType::Way, 10, "outer"),
            Member::new(MemberType::Way, 11, "inner"),
            Member::new(MemberType::Node, 1, ""),
        ],
    }
}

/// An open changeset (no close time) with a full bounding box.
#[must_use]
pub fn sample_changeset() -> Changeset {
    Changeset {
        id: 42,
        created_at: SAMPLE_TIMESTAMP,
        closed_at: Timestamp::default(),
        num_changes: 3,
        uid: 1,
        user: b"u".to_vec(),
        bounds: BoundingBox {
            bottom_left: Some(Location::new(-0.5, 51.25)),
            top_right: Some(Location::new(0.25, 51.5)),
        },
        tags: [("comment", "fix roads")].into_iter().collect(),
    }
}

/// `count` records cycling through every kind, ids starting at `first_id`.
#[must_use]
pub fn sample_records(first_id: i64, count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| {
            let id = first_id + i as i64;
            match i % 4 {
                0 => Record::Point(Point {
                    meta: sample_meta(id).tag("name", format!("point {id}")),
                    location: Some(Location::new(
                        (id % 360) as f64 * 0.5 - 90.0,
                        (id % 180) as f64 * 0.25 - 22.5,
                    )),
                }),
                1 => Record::Point(Point {
                    meta: sample_meta(id).visible(false),
                    location: None,
                }),
                2 => Record::Way(Way {
                    meta: sample_meta(id).tag("highway", "path"),
                    nodes: vec![id - 2, id - 1, id - 2],
                }),
                _ => Record::Relation(Relation {
                    meta: sample_meta(id).tag("type", "route"),
                    members: vec![
                        Member::new(MemberType::Way, id - 1, "forward"),
                        Member::new(MemberType::Node, id - 3, "stop, platform"),
                    ],
                }),
            }
        })
        .collect()
}

/// `blocks` blocks of `per_block` records with consecutive ids.
#[must_use]
pub fn sample_blocks(blocks: usize, per_block: usize) -> Vec<Block> {
    (0..blocks)
        .map(|b| Block::new(sample_records((b * per_block) as i64 + 1, per_block)))
        .collect()
}
