use super::*;

use crate::format::{inflate_block, read_i32, ChildPtr, Entry, RecordReader, BLOCK_HEADER_SIZE};
use proptest::prelude::*;
use std::collections::BTreeMap;

#[derive(Default)]
struct Walk {
    records: usize,
    keys: usize,
}

/// Re-derive every offset in the blob from record sizes and return the size
/// of the subtree rooted at `abs`.
fn validate_record<C: BlockCodec>(
    buf: &[u8],
    base: usize,
    abs: usize,
    codec: &C,
    walk: &mut Walk,
) -> usize {
    let local = abs - base;
    let mut reader = RecordReader::new(buf, local).expect("record header");
    let mut children = Vec::new();
    let mut first_bytes = Vec::new();
    for entry in reader.by_ref() {
        match entry.expect("record entry") {
            Entry::Data(_) => walk.keys += 1,
            Entry::Edge { label, child } => {
                assert_eq!(label.len(), 1, "build edges are single bytes");
                assert!(
                    !first_bytes.contains(&label[0]),
                    "sibling edges must not share a first byte"
                );
                first_bytes.push(label[0]);
                children.push(child);
            }
        }
    }
    walk.records += 1;

    let header = reader.position() - local;
    let mut next = abs + header;
    for child in children {
        assert_eq!(
            child.offset(),
            next,
            "child offset must follow the header and earlier siblings"
        );
        let size = match child {
            ChildPtr::Plain(off) => validate_record(buf, base, off, codec, walk),
            ChildPtr::Compressed(off) => {
                let at = off - base;
                let inflated = inflate_block(buf, at, off, codec).expect("block inflates");
                let inner = validate_record(&inflated, off, off, codec, walk);
                assert_eq!(inner, inflated.len(), "block holds exactly one subtree");
                let packed_len = read_i32(buf, at, "block header").expect("block header");
                BLOCK_HEADER_SIZE + packed_len as usize
            }
        };
        next += size;
    }
    next - abs
}

fn validate_blob<C: BlockCodec>(t: &Trie<C>) {
    assert!(t.is_encoded());
    let blob = t.sink.as_slice();
    let mut walk = Walk::default();
    let size = validate_record(blob, 0, 0, &t.codec, &mut walk);
    assert_eq!(size, blob.len(), "root subtree spans the whole blob");

    let stats = t.stats().expect("stats recorded");
    assert_eq!(walk.records, stats.records, "one record per build node");
    assert_eq!(walk.keys, stats.keys, "one data entry per key");
}

fn key_strategy() -> impl Strategy<Value = Vec<u8>> + Clone {
    // A small alphabet keeps prefixes shared and subtrees deep.
    prop_oneof![
        3 => prop::collection::vec(0u8..4, 0..=12),
        1 => prop::collection::vec(any::<u8>(), 0..=format::MAX_KEY_LEN),
    ]
}

fn value_strategy() -> impl Strategy<Value = Vec<u8>> + Clone {
    prop_oneof![
        3 => prop::collection::vec(b'a'..=b'c', 0..=48),
        1 => prop::collection::vec(any::<u8>(), 0..=16),
    ]
}

fn pairs_strategy() -> impl Strategy<Value = Vec<(Vec<u8>, Vec<u8>)>> {
    prop::collection::vec((key_strategy(), value_strategy()), 0..=400)
}

#[derive(Clone, Debug)]
enum Op {
    Insert(Vec<u8>, Vec<u8>),
    Search(Vec<u8>),
    Encode,
    Compact,
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let key = key_strategy();
    let op = prop_oneof![
        50 => (key.clone(), value_strategy()).prop_map(|(k, v)| Op::Insert(k, v)),
        40 => key.prop_map(Op::Search),
        8 => Just(Op::Encode),
        2 => Just(Op::Compact),
    ];
    prop::collection::vec(op, 0..=500)
}

fn check_round_trip<C: BlockCodec>(
    mut t: Trie<C>,
    pairs: Vec<(Vec<u8>, Vec<u8>)>,
    queries: Vec<Vec<u8>>,
) -> std::result::Result<(), TestCaseError> {
    let mut m: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
    for (k, v) in pairs {
        let old_t = t.insert(&k, v.clone()).expect("key within limit");
        let old_m = m.insert(k, v);
        prop_assert_eq!(old_t, old_m);
    }
    t.encode().expect("encode");
    validate_blob(&t);
    prop_assert_eq!(t.len(), m.len());

    for (k, v) in &m {
        let got = t.get(k).expect("lookup");
        prop_assert_eq!(got.as_deref(), Some(v.as_slice()));
    }
    for k in queries {
        let got = t.get(&k).expect("lookup").map(|v| v.into_owned());
        prop_assert_eq!(got, m.get(&k).cloned());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        max_shrink_iters: 10_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_round_trip_plain(pairs in pairs_strategy(), queries in prop::collection::vec(key_strategy(), 0..=64)) {
        check_round_trip(Trie::new(), pairs, queries)?;
    }

    #[test]
    fn prop_round_trip_nested_blocks(pairs in pairs_strategy(), queries in prop::collection::vec(key_strategy(), 0..=64)) {
        // A low window packs subtrees at several depths, nesting blocks.
        let config = TrieConfig::default().with_compression(true).with_window(24, 1 << 20);
        check_round_trip(Trie::with_config(config), pairs, queries)?;
    }

    #[test]
    fn prop_round_trip_zstd(pairs in pairs_strategy(), queries in prop::collection::vec(key_strategy(), 0..=64)) {
        let config = TrieConfig::default().with_compression(true).with_window(64, 8 * 1024);
        check_round_trip(Trie::with_codec(config, Zstd::default()), pairs, queries)?;
    }

    #[test]
    fn prop_encode_cycles(ops in ops_strategy()) {
        let config = TrieConfig::default().with_compression(true).with_window(48, 1 << 16);
        let mut t = Trie::with_config(config);
        // Each encode replaces the blob with the keys inserted since the last one.
        let mut pending: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        let mut blob: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        let mut dirty = true;

        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    dirty = true;
                    let old_t = t.insert(&k, v.clone()).expect("key within limit");
                    let old_m = pending.insert(k, v);
                    prop_assert_eq!(old_t, old_m);
                }
                Op::Search(k) => {
                    if dirty {
                        blob = std::mem::take(&mut pending);
                        dirty = false;
                    }
                    let got = t.search(&k).expect("search").map(|v| v.into_owned());
                    prop_assert_eq!(got, blob.get(&k).cloned());
                }
                Op::Encode => {
                    if dirty {
                        blob = std::mem::take(&mut pending);
                        dirty = false;
                    }
                    t.encode().expect("encode");
                    validate_blob(&t);
                }
                Op::Compact => {
                    t.compact();
                }
            }
            prop_assert_eq!(t.is_encoded(), !dirty);
        }
    }
}

/// Visit every ordering of `items` by swapping in place.
fn visit_orderings<T>(items: &mut [T], fixed: usize, visit: &mut impl FnMut(&[T])) {
    if fixed + 1 >= items.len() {
        visit(items);
        return;
    }
    for i in fixed..items.len() {
        items.swap(fixed, i);
        visit_orderings(items, fixed + 1, visit);
        items.swap(fixed, i);
    }
}

#[test]
fn exhaustive_insert_order_small_set() {
    let mut keys: Vec<Vec<u8>> = vec![
        b"".to_vec(),
        b"a".to_vec(),
        b"b".to_vec(),
        b"aa".to_vec(),
        b"ab".to_vec(),
        b"ba".to_vec(),
    ];
    let queries: Vec<&[u8]> = vec![b"", b"a", b"b", b"c", b"aa", b"ab", b"ac", b"ba", b"bb", b"aaa"];

    let mut sizes = Vec::new();
    visit_orderings(&mut keys, 0, &mut |order: &[Vec<u8>]| {
        let mut t = Trie::new();
        let mut m: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        for k in order {
            let v = [b"v:".as_slice(), k.as_slice()].concat();
            t.insert(k, v.clone()).unwrap();
            m.insert(k.clone(), v);
        }
        t.encode().unwrap();
        validate_blob(&t);
        sizes.push(t.encoded_len());

        for query in &queries {
            let got = t.get(query).unwrap().map(|v| v.into_owned());
            assert_eq!(got.as_ref(), m.get(*query), "query {query:?}");
        }
    });

    // Edge order changes with insertion order, record sizes do not.
    assert_eq!(sizes.len(), 720);
    assert!(sizes.windows(2).all(|w| w[0] == w[1]));
}
