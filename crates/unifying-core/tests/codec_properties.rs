//! Property-based tests for the HID++ frame codec.

use proptest::prelude::*;
use unifying_core::protocol::{
    CodecError, HIDPP_VERSION_1, LONG_PAYLOAD_LEN, Message, ReportKind, decode, encode,
};

fn report_kind() -> impl Strategy<Value = ReportKind> {
    prop_oneof![Just(ReportKind::Short), Just(ReportKind::Long)]
}

prop_compose! {
    fn valid_message()(
        kind in report_kind(),
        device_index in any::<u8>(),
        sub_id in any::<u8>(),
        function_id in any::<u8>(),
        payload in prop::collection::vec(any::<u8>(), LONG_PAYLOAD_LEN),
    ) -> Message {
        Message::new(kind, device_index, sub_id, function_id)
            .with_payload(&payload[..kind.payload_len()])
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Encoding then decoding yields the original message.
    #[test]
    fn prop_round_trip(msg in valid_message()) {
        let bytes = encode(&msg).map_err(|e| TestCaseError::fail(format!("encode failed: {e}")))?;
        prop_assert_eq!(bytes.len(), msg.report_kind.frame_len());
        let decoded = decode(&bytes, HIDPP_VERSION_1)
            .map_err(|e| TestCaseError::fail(format!("decode failed: {e}")))?;
        prop_assert_eq!(decoded, msg);
    }

    /// Every strict prefix of a valid frame is rejected as truncated.
    #[test]
    fn prop_truncation_rejected(msg in valid_message()) {
        let bytes = encode(&msg).map_err(|e| TestCaseError::fail(format!("encode failed: {e}")))?;
        for len in 0..bytes.len() {
            let result = decode(&bytes[..len], HIDPP_VERSION_1);
            prop_assert!(
                matches!(result, Err(CodecError::TruncatedFrame { .. })),
                "prefix of {} bytes decoded as {:?}", len, result
            );
        }
    }

    /// Report ids other than 0x10 and 0x11 are never accepted.
    #[test]
    fn prop_unknown_report_id(
        id in any::<u8>().prop_filter("not a HID++ report id", |id| *id != 0x10 && *id != 0x11),
        rest in prop::collection::vec(any::<u8>(), 0..32),
    ) {
        let mut frame = vec![id];
        frame.extend_from_slice(&rest);
        prop_assert_eq!(
            decode(&frame, HIDPP_VERSION_1),
            Err(CodecError::UnknownReportKind(id))
        );
    }

    /// A short message with data past its capacity never encodes.
    #[test]
    fn prop_short_overflow_is_malformed(
        extra in 1u8..=255,
        offset in 3usize..LONG_PAYLOAD_LEN,
    ) {
        let mut msg = Message::short(0xFF, 0x80, 0x00);
        msg.payload[offset] = extra;
        prop_assert!(matches!(encode(&msg), Err(CodecError::MalformedMessage(_))));
    }
}
