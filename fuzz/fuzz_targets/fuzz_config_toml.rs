#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(content) = std::str::from_utf8(data) {
        // Config parsing must reject, never panic
        if let Ok(config) = toml::from_str::<cdss::EngineConfig>(content) {
            let _ = config.backlink_path();
        }
    }
});
