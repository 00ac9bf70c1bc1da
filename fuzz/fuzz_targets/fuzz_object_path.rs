#![no_main]

use libfuzzer_sys::fuzz_target;

use cdss::domain::value_objects::ObjectPath;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        // Anything that parses must print back to something that parses
        if let Ok(path) = ObjectPath::parse(text) {
            let printed = path.to_string();
            assert!(ObjectPath::parse(&printed).is_ok(), "{printed:?} does not re-parse");
        }
    }
});
