#![no_main]

use libfuzzer_sys::fuzz_target;
use tlkit::{
    DataCodec as _,
    formats::cir::Cir,
};

fuzz_target!(|data: &[u8]| {
    let Ok(decoded) = Cir::from_bytes(data) else {
        return;
    };
    let packed = decoded.pack().unwrap();
    let reloaded = Cir::from_bytes(&packed).unwrap();
    assert_eq!(reloaded.tree(), decoded.tree());
    assert_eq!(reloaded.pack().unwrap(), packed);
});
