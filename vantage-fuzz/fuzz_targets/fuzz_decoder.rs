#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use vantage_vpts::FrameDecoder;

fuzz_target!(|data: &[u8]| {
    // Whole input at once
    let mut decoder = FrameDecoder::new().with_max_len(Some(1 << 20));
    let mut src = BytesMut::from(data);
    let whole = decoder.decode(&mut src);

    // Same input split at an arbitrary point must agree
    let split = data.first().map_or(0, |b| *b as usize % (data.len() + 1));
    let mut decoder = FrameDecoder::new().with_max_len(Some(1 << 20));
    let mut src = BytesMut::from(&data[..split]);
    let first = decoder.decode(&mut src);
    let chunked = match first {
        Ok(None) => {
            src.extend_from_slice(&data[split..]);
            decoder.decode(&mut src)
        }
        other => other,
    };

    if let (Ok(Some(a)), Ok(Some(b))) = (&whole, &chunked) {
        assert_eq!(a, b);
    }
    assert_eq!(whole.is_ok(), chunked.is_ok());
});
