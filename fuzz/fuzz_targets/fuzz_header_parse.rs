#![no_main]
use calvin_rs::FileHeader;
use libfuzzer_sys::fuzz_target;

// Arbitrary bytes must parse or fail with a format error, never panic
fuzz_target!(|data: &[u8]| {
    match FileHeader::from_bytes(data) {
        Ok(header) => {
            // Anything that parses re-encodes to the same header length
            if let Ok(bytes) = header.to_bytes() {
                assert_eq!(bytes.len() as u64, header.encoded_len());
            }
        }
        Err(e) => assert!(e.is_format_error(), "{:?}", e),
    }
});
