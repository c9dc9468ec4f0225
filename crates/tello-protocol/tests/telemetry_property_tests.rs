//! 遥测解析的属性测试
//!
//! 使用 proptest 验证字段切分规则。

use proptest::prelude::*;
use tello_protocol::TelemetryPacket;

/// 生成不含分隔符的片段
fn token() -> impl Strategy<Value = String> {
    "[a-z0-9.,-]{0,8}"
}

proptest! {
    /// 由合法字段拼出的包，字段按原顺序全部解析出来
    #[test]
    fn well_formed_fields_roundtrip(pairs in prop::collection::vec((token(), token()), 0..20)) {
        let payload: String = pairs
            .iter()
            .map(|(k, v)| format!("{}:{};", k, v))
            .collect();
        let packet = TelemetryPacket::parse(&payload);

        prop_assert_eq!(packet.len(), pairs.len());
        prop_assert_eq!(packet.skipped, 0);
        for (field, (k, v)) in packet.fields.iter().zip(pairs.iter()) {
            prop_assert_eq!(field.key, k.as_str());
            prop_assert_eq!(field.value, v.as_str());
        }
    }

    /// 不含 `:` 的非空字段全部计入 skipped，且不影响合法字段
    #[test]
    fn garbage_fields_are_skipped(
        pairs in prop::collection::vec((token(), token()), 1..10),
        garbage in prop::collection::vec("[a-z]{1,6}", 0..5),
    ) {
        let mut parts: Vec<String> = pairs.iter().map(|(k, v)| format!("{}:{}", k, v)).collect();
        parts.extend(garbage.iter().cloned());
        let payload = parts.join(";");
        let packet = TelemetryPacket::parse(&payload);

        prop_assert_eq!(packet.len(), pairs.len());
        prop_assert_eq!(packet.skipped, garbage.len());
    }

    /// 任意输入都不会 panic，且每个字段都来自一个含分隔符的片段
    #[test]
    fn arbitrary_input_never_panics(payload in ".{0,200}") {
        let packet = TelemetryPacket::parse(&payload);
        let segments_with_sep = payload.split(';').filter(|s| s.contains(':')).count();
        prop_assert_eq!(packet.len(), segments_with_sep);
    }
}
