//! Model-based property tests for indras-record
//!
//! Data records are checked against a `BTreeMap` model under random
//! set/unset/get sequences and random page layouts. Query records are
//! generated with repeated keys and keys spelled like opcodes.

use std::collections::BTreeMap;

use indras_record::{from_text, to_text, Op, PageConfig, Record, RecordKind};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Action {
    Set(String, Option<String>),
    Unset(String),
    Get(String),
}

fn key_strategy() -> impl Strategy<Value = String> + Clone {
    // small alphabet so keys collide often; lowercase avoids reserved keys
    "[a-e]{1,3}"
}

fn value_strategy() -> impl Strategy<Value = Option<String>> {
    // embedded NULs end a stored string, so the model never generates them
    prop::option::weighted(0.9, "[^\\x00]{0,120}")
}

fn query_key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => "[a-c]{1,2}",
        1 => prop::sample::select(vec!["=", "T", ".", "N>", "C", "<="]).prop_map(str::to_owned),
    ]
}

fn query_strategy() -> impl Strategy<Value = Record> {
    let term = (query_key_strategy(), value_strategy(), any::<u32>());
    (config_strategy(), prop::collection::vec(term, 0..=24)).prop_map(|(config, terms)| {
        let mut query = Record::with_config(RecordKind::Query, config).unwrap();
        for (key, value, bits) in &terms {
            query.set(key, value.as_deref(), Op::from_bits(*bits));
        }
        query
    })
}

fn config_strategy() -> impl Strategy<Value = PageConfig> {
    (1usize..=16, 16usize..=512).prop_map(|(slots, arena_size)| PageConfig::new(slots, arena_size))
}

fn actions_strategy() -> impl Strategy<Value = Vec<Action>> {
    let key = key_strategy();
    let action = prop_oneof![
        50 => (key.clone(), value_strategy()).prop_map(|(k, v)| Action::Set(k, v)),
        25 => key.clone().prop_map(Action::Unset),
        25 => key.clone().prop_map(Action::Get),
    ];
    prop::collection::vec(action, 0..=400)
}

fn record_strategy() -> impl Strategy<Value = Record> {
    (
        config_strategy(),
        prop::collection::vec((key_strategy(), value_strategy()), 0..=40),
    )
        .prop_map(|(config, pairs)| {
            let mut record = Record::with_config(RecordKind::Data, config).unwrap();
            for (key, value) in &pairs {
                record.set(key, value.as_deref(), Op::NULL);
            }
            record
        })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_matches_map_model(config in config_strategy(), actions in actions_strategy()) {
        let mut record = Record::with_config(RecordKind::Data, config).unwrap();
        let mut model: BTreeMap<String, Option<String>> = BTreeMap::new();

        for action in actions {
            match action {
                Action::Set(key, value) => {
                    record.set(&key, value.as_deref(), Op::EQUAL);
                    let got = record.lookup(&key).map(|(v, op)| (v.map(str::to_owned), op));
                    prop_assert_eq!(got, Some((value.clone(), Op::NULL)));
                    model.insert(key, value);
                }
                Action::Unset(key) => {
                    prop_assert_eq!(record.unset(&key), model.remove(&key).is_some());
                }
                Action::Get(key) => {
                    let got = record.lookup(&key).map(|(v, _)| v.map(str::to_owned));
                    prop_assert_eq!(got, model.get(&key).cloned());
                }
            }
            prop_assert_eq!(record.count(), model.len());
            prop_assert_eq!(record.iter().count(), record.count());
        }

        let mut got: Vec<(String, Option<String>)> = record
            .iter()
            .map(|entry| (entry.key.to_owned(), entry.value.map(str::to_owned)))
            .collect();
        got.sort();
        let expected: Vec<(String, Option<String>)> = model.into_iter().collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_repeat_set_does_not_grow(record in record_strategy(), key in key_strategy()) {
        let mut record = record;
        record.set(&key, Some("first"), Op::NULL);
        let count = record.count();
        record.set(&key, Some("a considerably longer second value"), Op::NULL);
        record.set(&key, None, Op::NULL);
        prop_assert_eq!(record.count(), count);
    }

    #[test]
    fn prop_copy_is_equal_and_independent(record in record_strategy()) {
        let mut copy = record.copy();
        prop_assert_eq!(&copy, &record);

        copy.set("zzzz", Some("only in the copy"), Op::NULL);
        prop_assert!(!record.contains_key("zzzz"));
        prop_assert_ne!(&copy, &record);
    }

    #[test]
    fn prop_merge_with_copy_is_idempotent(record in record_strategy()) {
        let copy = record.copy();
        let mut merged = record.copy();
        merged.merge_from(&copy);
        prop_assert_eq!(&merged, &record);
        prop_assert_eq!(merged.count(), record.count());
    }

    #[test]
    fn prop_text_round_trip(record in record_strategy()) {
        let text = to_text(&record);
        let back = from_text(&text).unwrap();
        prop_assert_eq!(back, record);
    }

    #[test]
    fn prop_query_text_round_trip(query in query_strategy()) {
        let text = to_text(&query);
        let back = from_text(&text).unwrap();
        prop_assert_eq!(back.kind(), RecordKind::Query);

        // small layouts may place a later short term on an earlier page
        let terms = |record: &Record| -> Vec<(String, Option<String>, u32)> {
            let mut terms: Vec<_> = record
                .iter()
                .map(|entry| (entry.key.to_owned(), entry.value.map(str::to_owned), entry.op.bits()))
                .collect();
            terms.sort();
            terms
        };
        prop_assert_eq!(terms(&back), terms(&query));
        prop_assert_eq!(back, query);
    }
}
