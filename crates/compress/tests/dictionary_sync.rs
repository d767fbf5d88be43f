//! Sender and receiver contexts must agree on history across long,
//! interleaved sequences of literals and inserted blocks.

use compress::{CompressionLevel, DeflateContext, InflateContext, MAX_INSERT_CHUNK};
use proptest::prelude::*;

#[derive(Clone, Debug)]
enum Step {
    Literal(Vec<u8>),
    Insert(Vec<u8>),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 1..2048).prop_map(Step::Literal),
        prop::collection::vec(0u8..4, 1..4096).prop_map(Step::Insert),
    ]
}

fn replay(steps: &[Step], protocol: u32) -> Vec<u8> {
    let mut tx = DeflateContext::new(CompressionLevel::Fast, protocol);
    let mut rx = InflateContext::new(protocol);
    tx.begin().unwrap();
    rx.begin().unwrap();

    let mut rebuilt = Vec::new();
    for step in steps {
        match step {
            Step::Literal(bytes) => {
                let mut wire = Vec::new();
                tx.deflate(bytes, &mut wire).unwrap();
                rx.inflate(&wire, &mut rebuilt).unwrap();
            }
            Step::Insert(bytes) => {
                tx.insert(bytes).unwrap();
                rx.insert(bytes).unwrap();
                rebuilt.extend_from_slice(bytes);
            }
        }
    }
    tx.finish().unwrap();
    rx.finish().unwrap();
    rebuilt
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn interleaved_streams_reconstruct(steps in prop::collection::vec(step(), 1..12)) {
        let expected: Vec<u8> = steps
            .iter()
            .flat_map(|s| match s {
                Step::Literal(b) | Step::Insert(b) => b.clone(),
            })
            .collect();
        prop_assert_eq!(replay(&steps, 31), expected);
    }
}

#[test]
fn long_inserts_agree_on_old_protocols() {
    // Long inserts repeat the first chunk on both sides before protocol 31.
    let block: Vec<u8> = (0..MAX_INSERT_CHUNK * 2).map(|i| (i % 13) as u8).collect();
    let steps = vec![
        Step::Insert(block.clone()),
        Step::Literal(block[..512].to_vec()),
    ];
    let rebuilt = replay(&steps, 29);
    assert_eq!(&rebuilt[block.len()..], &block[..512]);
}

#[test]
fn empty_literal_is_harmless() {
    let mut tx = DeflateContext::new(CompressionLevel::Default, 31);
    let mut rx = InflateContext::new(31);
    tx.begin().unwrap();
    rx.begin().unwrap();
    let mut wire = Vec::new();
    tx.deflate(b"", &mut wire).unwrap();
    let mut plain = Vec::new();
    rx.inflate(&wire, &mut plain).unwrap();
    assert!(plain.is_empty());
}
