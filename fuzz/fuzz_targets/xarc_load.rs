#![no_main]

use libfuzzer_sys::fuzz_target;
use tlkit::archive::Xarc;

fuzz_target!(|data: &[u8]| {
    let Ok(archive) = Xarc::from_bytes(data) else {
        return;
    };
    let packed = archive.pack().unwrap();
    let reloaded = Xarc::from_bytes(&packed).unwrap();
    assert_eq!(reloaded, archive);
});
