#![no_main]

use libfuzzer_sys::fuzz_target;
use tollgate_core::config::Config;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    // Any config that passes validation must yield a working bucket.
    if let Ok(config) = Config::from_toml_str(text) {
        let bucket = config.bucket.build().expect("validated config builds");
        assert_eq!(bucket.get_available_tokens(), config.bucket.capacity);
    }
});
