use oplstream::testing::*;
use oplstream::*;

fn unicode() -> OplEncoder {
    OplEncoder::new(EscapeScheme::Unicode)
}

#[test]
fn point_matches_reference_line() -> Result<()> {
    let line = encode(&Record::Point(sample_point()))?;
    assert_eq!(
        line,
        "n1 v1 dV c1 t2014-01-01T00:00:00Z i1 uu x1.0000000 y2.0000000 Ta=1\n"
    );
    Ok(())
}

#[test]
fn point_without_location_has_bare_markers() -> Result<()> {
    let mut p = sample_point();
    p.location = None;
    let line = encode(&Record::Point(p))?;
    assert_eq!(line, "n1 v1 dV c1 t2014-01-01T00:00:00Z i1 uu x y Ta=1\n");
    Ok(())
}

#[test]
fn location_at_origin_is_not_absent() -> Result<()> {
    let p = Point {
        meta: Meta::new(3),
        location: Some(Location::new(0.0, 0.0)),
    };
    assert_eq!(encode(&p.into())?, "n3 v0 dV c0 t i0 u x0.0000000 y0.0000000 T\n");
    Ok(())
}

#[test]
fn empty_tag_list_renders_bare_section() -> Result<()> {
    let p = Point {
        meta: Meta::new(-5).version(2).visible(false),
        location: None,
    };
    let line = encode(&p.into())?;
    assert_eq!(line, "n-5 v2 dD c0 t i0 u x y T\n");
    assert!(!line.contains(",\n"));
    Ok(())
}

#[test]
fn coordinates_are_rounded_to_seven_decimals() -> Result<()> {
    let p = Point {
        meta: Meta::new(1),
        location: Some(Location::new(1.234_567_89, -45.000_000_04)),
    };
    let line = encode(&p.into())?;
    assert!(line.contains(" x1.2345679 y-45.0000000 "), "{line}");
    Ok(())
}

#[test]
fn way_lists_node_refs_in_order() -> Result<()> {
    let line = unicode().encode(&sample_way().into())?;
    assert_eq!(
        line,
        "w10 v1 dV c1 t2014-01-01T00:00:00Z i1 uu Nn1,n2,n3,n1 Thighway=residential,name=Main%0020St\n"
    );
    Ok(())
}

#[test]
fn way_without_nodes_has_bare_node_section() -> Result<()> {
    let way = Way {
        meta: Meta::new(2),
        nodes: vec![],
    };
    assert_eq!(encode(&way.into())?, "w2 v0 dV c0 t i0 u N T\n");
    Ok(())
}

#[test]
fn relation_lists_typed_members_with_roles() -> Result<()> {
    let line = unicode().encode(&sample_relation().into())?;
    assert_eq!(
        line,
        "r100 v1 dV c1 t2014-01-01T00:00:00Z i1 uu Mw10@outer,w11@inner,n1@ Ttype=multipolygon\n"
    );
    Ok(())
}

#[test]
fn relation_roles_are_escaped() -> Result<()> {
    let rel = Relation {
        meta: Meta::new(7),
        members: vec![
            Member::new(MemberType::Relation, 8, "sub area"),
            Member::new(MemberType::Node, -9, "a,b"),
        ],
    };
    let line = encode(&rel.into())?;
    assert_eq!(line, "r7 v0 dV c0 t i0 u Mr8@sub%0020area,n-9@a%002cb T\n");
    Ok(())
}

#[test]
fn open_changeset_has_empty_close_time() -> Result<()> {
    let line = encode(&sample_changeset().into())?;
    assert_eq!(
        line,
        "c42 k3 s2014-01-01T00:00:00Z e i1 uu x-0.5000000 y51.2500000 X0.2500000 Y51.5000000 Tcomment=fix%0020roads\n"
    );
    Ok(())
}

#[test]
fn changeset_without_bounds_has_four_bare_markers() -> Result<()> {
    let mut cs = sample_changeset();
    cs.bounds = BoundingBox::default();
    cs.closed_at = Timestamp::from_secs(1_388_538_000);
    cs.tags = TagList::new();
    let line = encode(&cs.into())?;
    assert_eq!(
        line,
        "c42 k3 s2014-01-01T00:00:00Z e2014-01-01T01:00:00Z i1 uu x y X Y T\n"
    );
    Ok(())
}

#[test]
fn tags_keep_insertion_order_and_replace_in_place() -> Result<()> {
    let mut meta = Meta::new(1);
    meta.tags.insert("z", "1");
    meta.tags.insert("a", "2");
    meta.tags.insert("z", "3");
    let line = encode(&Point { meta, location: None }.into())?;
    assert!(line.ends_with(" Tz=3,a=2\n"), "{line}");
    Ok(())
}

#[test]
fn byte_scheme_differs_from_unicode_scheme() -> Result<()> {
    let point = Point {
        meta: Meta::new(1).user(5, "Jörg M").tag("name:de", "Straße"),
        location: None,
    };
    let bytes = OplEncoder::new(EscapeScheme::Bytes).encode(&point.clone().into())?;
    let uni = unicode().encode(&point.into())?;
    assert_eq!(bytes, "n1 v0 dV c0 t i5 uJ%c3%b6rg%20M x y Tname:de=Stra%c3%9fe\n");
    assert_eq!(uni, "n1 v0 dV c0 t i5 uJörg%0020M x y Tname:de=Straße\n");
    Ok(())
}

#[test]
fn escaping_round_trips_structural_characters() -> Result<()> {
    let samples = ["a b", "x,y=z", "user@host", "100%", "tab\there", "ümlaut ∑ 東京", ""];
    for scheme in [EscapeScheme::Unicode, EscapeScheme::Bytes] {
        for s in samples {
            let escaped = escape(s.as_bytes(), scheme)?;
            assert!(!escaped.contains([' ', ',', '@', '=', '\n']), "{escaped}");
            assert_eq!(unescape(&escaped, scheme)?, s.as_bytes(), "{scheme:?} {s}");
        }
    }
    Ok(())
}

#[test]
fn malformed_utf8_fails_the_block_with_its_position() {
    let bad = Point {
        meta: Meta::new(2).user(1, vec![b'a', 0xc3]),
        location: None,
    };
    let block = Block::new(vec![sample_point().into(), bad.into()]);
    let err = unicode().encode_block(&block).unwrap_err();
    assert!(err.is_encoding());
    match err {
        OplError::Block { index, source } => {
            assert_eq!(index, 1);
            assert!(matches!(*source, OplError::Encoding { field: "user", .. }));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn byte_scheme_accepts_malformed_utf8() -> Result<()> {
    let bad = Point {
        meta: Meta::new(2).user(1, vec![b'a', 0xc3]),
        location: None,
    };
    let line = OplEncoder::new(EscapeScheme::Bytes).encode(&bad.into())?;
    assert!(line.contains(" ua%c3 "), "{line}");
    Ok(())
}

#[test]
fn failed_record_leaves_no_partial_line() {
    let mut out = String::from("keep\n");
    let bad = Point {
        meta: Meta::new(1).tag("k", vec![0xff]),
        location: None,
    };
    assert!(unicode().encode_into(&bad.into(), &mut out).is_err());
    assert_eq!(out, "keep\n");
}

#[test]
fn non_finite_coordinates_are_rejected() {
    let p = Point {
        meta: Meta::new(1),
        location: Some(Location::new(f64::NAN, 0.0)),
    };
    assert!(encode(&p.into()).unwrap_err().is_encoding());
}

#[test]
fn block_encoding_concatenates_lines_in_order() -> Result<()> {
    let records = sample_records(1, 12);
    let expected: String = records
        .iter()
        .map(|r| unicode().encode(r))
        .collect::<Result<Vec<_>>>()?
        .concat();
    let text = encode_block(&Block::new(records))?;
    assert_eq!(text, expected);
    assert_eq!(text.lines().count(), 12);
    assert!(text.ends_with('\n'));
    Ok(())
}

#[test]
fn timestamps_render_and_parse_iso() {
    let ts = Timestamp::parse_iso("2014-01-01T00:00:00Z").unwrap();
    assert_eq!(ts, SAMPLE_TIMESTAMP);
    assert_eq!(ts.to_iso(), "2014-01-01T00:00:00Z");
    assert_eq!(Timestamp::default().to_iso(), "");
    assert!(Timestamp::parse_iso("yesterday").is_none());
}

#[test]
fn negative_uids_are_rendered_signed() -> Result<()> {
    let p = Point {
        meta: Meta::new(4).user(-1, "anon"),
        location: None,
    };
    assert_eq!(encode(&p.into())?, "n4 v0 dV c0 t i-1 uanon x y T\n");

    let mut cs = sample_changeset();
    cs.uid = -7;
    assert!(encode(&cs.into())?.contains(" i-7 uu "));
    Ok(())
}
