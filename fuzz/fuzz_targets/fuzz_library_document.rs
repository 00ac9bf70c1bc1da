#![no_main]

use libfuzzer_sys::fuzz_target;

use cdss::Library;

fuzz_target!(|data: &[u8]| {
    if let Ok(document) = std::str::from_utf8(data) {
        let _ = Library::from_json(document);
        let _ = Library::from_yaml(document);
    }
});
