//! TelemetryStore 属性测试

use proptest::prelude::*;
use std::collections::BTreeMap;
use tello_driver::TelemetryStore;
use tello_protocol::TelemetryPacket;

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,6}"
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[-0-9.,]{0,8}"
}

proptest! {
    #[test]
    fn test_set_is_idempotent(key in key_strategy(), value in value_strategy()) {
        let once = TelemetryStore::new();
        once.set(&key, &value);

        let twice = TelemetryStore::new();
        twice.set(&key, &value);
        twice.set(&key, &value);

        prop_assert_eq!(once.get_snapshot(), twice.get_snapshot());
    }

    #[test]
    fn test_apply_matches_last_write_wins(
        fields in prop::collection::vec((key_strategy(), value_strategy()), 0..24)
    ) {
        let payload: String = fields
            .iter()
            .map(|(k, v)| format!("{}:{};", k, v))
            .collect();

        let store = TelemetryStore::new();
        store.apply(&TelemetryPacket::parse(&payload));

        let mut expected = BTreeMap::new();
        for (k, v) in &fields {
            expected.insert(k.clone(), v.clone());
        }
        prop_assert_eq!(store.get_snapshot(), expected);
    }

    #[test]
    fn test_apply_equals_sequential_sets(
        fields in prop::collection::vec((key_strategy(), value_strategy()), 0..24)
    ) {
        let payload: String = fields
            .iter()
            .map(|(k, v)| format!("{}:{};", k, v))
            .collect();

        let batched = TelemetryStore::new();
        batched.apply(&TelemetryPacket::parse(&payload));

        let sequential = TelemetryStore::new();
        for (k, v) in &fields {
            sequential.set(k, v);
        }
        prop_assert_eq!(batched.get_snapshot(), sequential.get_snapshot());
    }
}
