//! Property tests for the station codecs
//!
//! Both codecs are pure functions of their input: the same bytes always
//! decode to the same reading, and arbitrary noise never panics.

use gauge_protocol::dimension::{
    decode_dimensions, encode_reply, find_valid_window, Dimensions, FRAME_START, REPLY_WINDOW,
};
use gauge_protocol::scale::{classify_liveness_reply, decode_weight, WeightMode, WeightReply};
use gauge_protocol::{EncodeCommand, SensorCommand};
use proptest::prelude::*;

fn dimensions() -> impl Strategy<Value = Dimensions> {
    (any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(l, w, h)| Dimensions::new(l, w, h))
}

proptest! {
    #[test]
    fn dimension_decoding_is_idempotent(data in prop::collection::vec(any::<u8>(), 0..200)) {
        prop_assert_eq!(decode_dimensions(&data), decode_dimensions(&data));
    }

    #[test]
    fn weight_decoding_is_idempotent(data in prop::collection::vec(any::<u8>(), 0..8)) {
        prop_assert_eq!(decode_weight(&data), decode_weight(&data));
    }

    #[test]
    fn reply_after_noise_is_located(
        dims in dimensions(),
        // Noise without the frame start byte cannot open a competing run
        noise in prop::collection::vec(any::<u8>().prop_filter("no frame start", |b| *b != FRAME_START), 0..40),
        tail in prop::collection::vec(any::<u8>(), 0..20),
    ) {
        let mut data = noise.clone();
        data.extend(encode_reply(dims));
        data.extend(tail);

        let window = find_valid_window(&data);
        prop_assert!(window.is_some());
        let window = window.unwrap();
        prop_assert_eq!(window.len(), REPLY_WINDOW);
        prop_assert_eq!(window, &data[noise.len()..noise.len() + REPLY_WINDOW]);
        prop_assert_eq!(decode_dimensions(&data), dims);
    }

    #[test]
    fn short_buffers_are_unknown(data in prop::collection::vec(any::<u8>(), 0..REPLY_WINDOW)) {
        prop_assert!(decode_dimensions(&data).is_unknown());
    }

    #[test]
    fn unstable_status_reads_zero(status in any::<u8>(), rest in any::<[u8; 4]>()) {
        prop_assume!(status != 128);
        let frame = [status, rest[0], rest[1], rest[2], rest[3]];
        prop_assert_eq!(decode_weight(&frame), Ok(0));
    }

    #[test]
    fn stable_grams_roundtrip(raw in any::<u16>()) {
        let frame = WeightReply::encode_stable(WeightMode::Grams, raw);
        prop_assert_eq!(decode_weight(&frame), Ok(u32::from(raw)));
        prop_assert!(classify_liveness_reply(&frame).is_some());
    }

    #[test]
    fn thresholds_in_range_encode_two_bytes(value in 1u16..=255) {
        let cmd: SensorCommand = format!("set_top_max:{}", value).parse().unwrap();
        prop_assert_eq!(cmd.encode(), vec![0x90, value as u8]);
    }

    #[test]
    fn thresholds_out_of_range_rejected(value in 256u32..100_000) {
        let parsed = format!("set_width_max:{}", value).parse::<SensorCommand>();
        prop_assert!(parsed.is_err());
    }
}
