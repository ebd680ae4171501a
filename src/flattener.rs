//! Sweep-line range flattener: turns an arbitrary, possibly overlapping,
//! tagged interval multiset into the sorted, disjoint partition the index
//! stores. This is the algorithmic heart of the ingestion pipeline (spec
//! §4.C) and the crate's density hotspot.

use std::collections::HashMap;

use crate::tag::{canonical_json, strip_type, tag_type, IntervalRecord, Payload, Tag};

#[derive(Clone)]
struct Event {
    n: u32,
    tag: Tag,
    is_end: bool,
}

/// The active multiset of source intervals covering the sweep cursor,
/// represented as a map from a tag's canonical JSON identity to the tag
/// body and its current open-interval count. This is the O(k) replacement
/// for the reference implementation's O(k^2) linear-scan-and-remove.
#[derive(Default)]
struct ActiveSet {
    entries: HashMap<String, (Tag, u32)>,
}

impl ActiveSet {
    fn add(&mut self, tag: &Tag) {
        let key = canonical_json(tag);
        let entry = self.entries.entry(key).or_insert_with(|| (tag.clone(), 0));
        entry.1 += 1;
    }

    fn remove_one(&mut self, tag: &Tag) {
        let key = canonical_json(tag);
        if let Some(entry) = self.entries.get_mut(&key) {
            if entry.1 <= 1 {
                self.entries.remove(&key);
            } else {
                entry.1 -= 1;
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The deduplicated set of currently-active tags, grouped by `type`, with
    /// each group's bodies in a stable (sorted) order.
    fn payload(&self) -> Payload {
        let mut payload: Payload = Payload::new();
        for (tag, _count) in self.entries.values() {
            let ty = tag_type(tag).to_string();
            let body = strip_type(tag.clone());
            payload.entry(ty).or_default().push(body);
        }
        for bodies in payload.values_mut() {
            bodies.sort_by_key(|v| v.to_string());
            bodies.dedup();
        }
        payload
    }
}

/// Flattens a multiset of `(start, end, tag)` triples into the sorted,
/// non-overlapping interval records the index stores.
///
/// Correctness rests on two facts: sorting starts before ends at a shared
/// coordinate means the active set at any coordinate is exactly the set of
/// source intervals containing it, and the `+-1` adjustments convert that
/// half-open sweep reasoning into the closed-interval reporting the rest of
/// the system expects.
pub fn flatten(intervals: impl IntoIterator<Item = (u32, u32, Tag)>) -> Vec<IntervalRecord> {
    let mut events = Vec::new();
    for (start, end, tag) in intervals {
        events.push(Event {
            n: start,
            tag: tag.clone(),
            is_end: false,
        });
        events.push(Event {
            n: end,
            tag,
            is_end: true,
        });
    }

    events.sort_by(|a, b| a.n.cmp(&b.n).then(a.is_end.cmp(&b.is_end)));

    let mut active = ActiveSet::default();
    let mut out = Vec::new();

    for idx in 0..events.len() {
        let cur = &events[idx];

        if cur.is_end {
            active.remove_one(&cur.tag);
        } else {
            active.add(&cur.tag);
        }

        let Some(nex) = events.get(idx + 1) else {
            continue;
        };

        let n = if cur.is_end {
            match cur.n.checked_add(1) {
                Some(v) => v,
                None => continue, // cur.n == u32::MAX; nothing after it to report
            }
        } else {
            cur.n
        };

        let m = if nex.is_end {
            nex.n
        } else {
            match nex.n.checked_sub(1) {
                Some(v) => v,
                None => continue, // nex.n == 0 and nex is a start; no valid segment before it
            }
        };

        if n <= m && !active.is_empty() {
            out.push(IntervalRecord {
                start: n,
                end: m,
                payload: active.payload(),
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tag(fields: serde_json::Value) -> Tag {
        fields.as_object().unwrap().clone()
    }

    fn t(name: &str, source: &str) -> Tag {
        tag(json!({"type": "denylist", "source": source, "name": name}))
    }

    fn find<'a>(records: &'a [IntervalRecord], s: u32, e: u32) -> &'a IntervalRecord {
        records
            .iter()
            .find(|r| r.start == s && r.end == e)
            .unwrap_or_else(|| panic!("no record for [{s},{e}] in {records:?}"))
    }

    // B1: adjacent ranges produce two records with no gap.
    #[test]
    fn adjacent_ranges_have_no_gap() {
        let records = flatten(vec![(1, 10, t("a", "x")), (11, 20, t("b", "y"))]);
        assert_eq!(records.len(), 2);
        let r1 = find(&records, 1, 10);
        let r2 = find(&records, 11, 20);
        assert_eq!(r1.payload["denylist"].len(), 1);
        assert_eq!(r2.payload["denylist"].len(), 1);
    }

    // B2: overlapping ranges split into three segments.
    #[test]
    fn overlapping_ranges_split_into_three_segments() {
        let records = flatten(vec![(1, 10, t("a", "t1")), (5, 15, t("b", "t2"))]);
        assert_eq!(records.len(), 3);
        assert_eq!(find(&records, 1, 4).payload["denylist"].len(), 1);
        assert_eq!(find(&records, 5, 10).payload["denylist"].len(), 2);
        assert_eq!(find(&records, 11, 15).payload["denylist"].len(), 1);
    }

    // B3: coincident endpoints exercise the start-before-end tie-break.
    #[test]
    fn coincident_endpoints_tie_break_start_before_end() {
        let records = flatten(vec![(1, 5, t("a", "t1")), (5, 10, t("b", "t2"))]);
        assert_eq!(records.len(), 3);
        assert_eq!(find(&records, 1, 4).payload["denylist"].len(), 1);
        let mid = find(&records, 5, 5);
        assert_eq!(mid.payload["denylist"].len(), 2);
        assert_eq!(find(&records, 6, 10).payload["denylist"].len(), 1);
    }

    // B4: a single-host interval is its own record.
    #[test]
    fn single_host_interval_is_its_own_record() {
        let records = flatten(vec![(42, 42, t("a", "t1"))]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].start, 42);
        assert_eq!(records[0].end, 42);
        assert_eq!(records[0].payload["denylist"].len(), 1);
    }

    // B5: empty input yields an empty index.
    #[test]
    fn empty_input_yields_no_records() {
        let records = flatten(Vec::<(u32, u32, Tag)>::new());
        assert!(records.is_empty());
    }

    // S1 from spec: two overlapping /24 and /25-sized ranges.
    #[test]
    fn scenario_two_overlapping_plugin_ranges() {
        let records = flatten(vec![
            (
                crate::ip::ip_to_int("10.0.0.0").unwrap(),
                crate::ip::ip_to_int("10.0.0.255").unwrap(),
                t("a", "feed_a"),
            ),
            (
                crate::ip::ip_to_int("10.0.0.128").unwrap(),
                crate::ip::ip_to_int("10.0.0.255").unwrap(),
                t("b", "feed_b"),
            ),
        ]);
        let q1 = crate::ip::ip_to_int("10.0.0.1").unwrap();
        let q2 = crate::ip::ip_to_int("10.0.0.200").unwrap();
        let q3 = crate::ip::ip_to_int("10.0.1.0").unwrap();

        let hit1 = records.iter().find(|r| r.contains(q1)).unwrap();
        assert_eq!(hit1.payload["denylist"].len(), 1);

        let hit2 = records.iter().find(|r| r.contains(q2)).unwrap();
        assert_eq!(hit2.payload["denylist"].len(), 2);

        assert!(records.iter().all(|r| !r.contains(q3)));
    }

    // S3: two plugins emitting the exact same range under different sources
    // both survive under `list`/payload, deduplicated only if identical.
    #[test]
    fn two_plugins_same_range_both_survive() {
        let records = flatten(vec![(1, 10, t("x", "plugin_one")), (1, 10, t("y", "plugin_two"))]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload["denylist"].len(), 2);
    }

    // Exact duplicate tags (same canonical JSON) from overlapping ranges
    // must not appear twice within the same type list (I2).
    #[test]
    fn exact_duplicate_tags_are_not_repeated() {
        let records = flatten(vec![(1, 10, t("dup", "same")), (5, 15, t("dup", "same"))]);
        let mid = find(&records, 5, 10);
        assert_eq!(mid.payload["denylist"].len(), 1);
    }

    // P1/P2-flavored check with three overlapping sources and a manual tally.
    #[test]
    fn union_of_output_covers_union_of_input() {
        let records = flatten(vec![
            (0, 100, t("a", "s1")),
            (50, 150, t("b", "s2")),
            (200, 250, t("c", "s3")),
        ]);
        let covered: u64 = records.iter().map(|r| r.end as u64 - r.start as u64 + 1).sum();
        // [0,150] is 151 integers, [200,250] is 51 integers, with a gap [151,199].
        assert_eq!(covered, 151 + 51);
        for r in &records {
            assert!(!r.payload.is_empty());
        }
        // No overlap between consecutive records.
        let mut sorted = records.clone();
        sorted.sort_by_key(|r| r.start);
        for w in sorted.windows(2) {
            assert!(w[0].end < w[1].start);
        }
    }

    #[test]
    fn boundary_at_zero() {
        let records = flatten(vec![(0, 5, t("a", "x"))]);
        assert_eq!(find(&records, 0, 5).payload["denylist"].len(), 1);
    }

    #[test]
    fn boundary_at_u32_max_does_not_overflow() {
        let records = flatten(vec![(u32::MAX - 5, u32::MAX, t("a", "x"))]);
        assert_eq!(find(&records, u32::MAX - 5, u32::MAX).payload["denylist"].len(), 1);
    }

    #[test]
    fn two_ranges_both_ending_at_u32_max() {
        let records = flatten(vec![
            (u32::MAX - 10, u32::MAX, t("a", "s1")),
            (u32::MAX - 3, u32::MAX, t("b", "s2")),
        ]);
        assert_eq!(find(&records, u32::MAX - 3, u32::MAX).payload["denylist"].len(), 2);
        assert_eq!(find(&records, u32::MAX - 10, u32::MAX - 4).payload["denylist"].len(), 1);
    }
}
