#![no_main]

use libfuzzer_sys::fuzz_target;
use tlkit::{
    DataCodec as _,
    formats::ani::Ani,
};

fuzz_target!(|data: &[u8]| {
    let Ok(decoded) = Ani::from_bytes(data) else {
        return;
    };
    let packed = decoded.pack().unwrap();
    let reloaded = Ani::from_bytes(&packed).unwrap();
    assert_eq!(reloaded.tree(), decoded.tree());
    assert_eq!(reloaded.pack().unwrap(), packed);
});
