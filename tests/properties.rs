//! Property tests for the flattener invariants (spec §8 P1/P2) and the
//! round-trip laws (R1/R2), run across a wider input space than the
//! hand-written boundary cases in `src/flattener.rs`.

use ip_denylist_core::flattener::flatten;
use ip_denylist_core::ip::{int_to_ip, ip_to_int};
use ip_denylist_core::tag::{IntervalRecord, Payload, Tag};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn tag_with_id(id: u32) -> Tag {
    serde_json::json!({"type": "denylist", "source": "prop", "id": id})
        .as_object()
        .unwrap()
        .clone()
}

fn arb_interval(max_bound: u32) -> impl Strategy<Value = (u32, u32)> {
    (0..=max_bound, 0..=max_bound).prop_map(|(a, b)| if a <= b { (a, b) } else { (b, a) })
}

proptest! {
    // P1: output is disjoint and its union covers the union of inputs.
    #[test]
    fn p1_output_is_disjoint_and_covers_input_union(
        intervals in prop::collection::vec(arb_interval(2000), 1..20)
    ) {
        let tagged: Vec<(u32, u32, Tag)> = intervals
            .iter()
            .enumerate()
            .map(|(i, (s, e))| (*s, *e, tag_with_id(i as u32)))
            .collect();

        let records = flatten(tagged.clone());

        let mut sorted = records.clone();
        sorted.sort_by_key(|r| r.start);
        for window in sorted.windows(2) {
            prop_assert!(window[0].end < window[1].start, "records must be disjoint and sorted");
        }

        let mut covered_input = std::collections::HashSet::new();
        for (s, e, _) in &tagged {
            for x in *s..=*e {
                covered_input.insert(x);
            }
        }
        let mut covered_output = std::collections::HashSet::new();
        for r in &records {
            for x in r.start..=r.end {
                covered_output.insert(x);
            }
        }
        prop_assert_eq!(covered_input, covered_output);
    }

    // P2: every output record's payload is exactly the set of input tags
    // whose interval contains every point in that record (sampled at the
    // record's endpoints and midpoint, since exhaustive point checks would
    // be redundant with the disjointness check above).
    #[test]
    fn p2_payload_matches_active_tags_at_sampled_points(
        intervals in prop::collection::vec(arb_interval(500), 1..10)
    ) {
        let tagged: Vec<(u32, u32, Tag)> = intervals
            .iter()
            .enumerate()
            .map(|(i, (s, e))| (*s, *e, tag_with_id(i as u32)))
            .collect();

        let records = flatten(tagged.clone());

        for record in &records {
            let sample_points = [record.start, record.end, record.start + (record.end - record.start) / 2];
            for &x in &sample_points {
                let expected_ids: std::collections::BTreeSet<u32> = tagged
                    .iter()
                    .enumerate()
                    .filter(|(_, (s, e, _))| *s <= x && x <= *e)
                    .map(|(i, _)| i as u32)
                    .collect();

                let actual_ids: std::collections::BTreeSet<u32> = record.payload
                    .get("denylist")
                    .map(|bodies| bodies.iter().map(|b| b["id"].as_u64().unwrap() as u32).collect())
                    .unwrap_or_default();

                prop_assert_eq!(expected_ids, actual_ids);
            }
        }
    }

    // R1: int_to_ip(ip_to_int(s)) == s for every valid dotted-quad s.
    #[test]
    fn r1_ip_int_round_trip(a in 0u8..=255, b in 0u8..=255, c in 0u8..=255, d in 0u8..=255) {
        let s = format!("{a}.{b}.{c}.{d}");
        let n = ip_to_int(&s).unwrap();
        prop_assert_eq!(int_to_ip(n), s);
    }

    // R2: serialize-then-parse of an interval record yields the original triple.
    #[test]
    fn r2_member_serialize_parse_round_trip(start in any::<u32>(), len in 0u32..1000) {
        let end = start.saturating_add(len);
        let mut payload: Payload = BTreeMap::new();
        payload.insert("denylist".to_string(), vec![serde_json::json!({"source": "x", "id": 1})]);
        let record = IntervalRecord { start, end, payload };

        let member = record.to_member();
        let parsed = IntervalRecord::from_member(&member).unwrap();
        prop_assert_eq!(parsed, record);
    }
}

// Boundary edges at n=0 and n=2^32-1 called out as under-tested in spec §9's
// open questions; exercised here beyond the hand-written cases in
// src/flattener.rs.
#[test]
fn boundary_zero_and_u32_max_do_not_panic_across_many_shapes() {
    let cases: Vec<Vec<(u32, u32, Tag)>> = vec![
        vec![(0, 0, tag_with_id(1))],
        vec![(u32::MAX, u32::MAX, tag_with_id(1))],
        vec![(0, u32::MAX, tag_with_id(1))],
        vec![(0, 10, tag_with_id(1)), (u32::MAX - 10, u32::MAX, tag_with_id(2))],
    ];
    for case in cases {
        let records = flatten(case);
        assert!(!records.is_empty());
    }
}
