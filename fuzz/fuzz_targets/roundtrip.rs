#![no_main]
use adalzw::{compress, expand, Mode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for &mode in &[Mode::Freeze, Mode::Reset, Mode::Monitor] {
        let compressed = compress(data, mode);
        let result = expand(&compressed);
        assert!(result.is_ok(), "{:?}", result);
        assert_eq!(result.ok().as_deref(), Some(data));
    }
});
