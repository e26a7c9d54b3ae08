#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Must not panic; anything accepted must re-parse to itself.
        if let Ok(id) = moadian::InvoiceId::parse(s) {
            assert_eq!(id.as_str(), s);
            let _ = (id.identity(), id.days_since_epoch(), id.sequence());
        }
    }
});
