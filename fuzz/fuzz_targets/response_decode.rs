#![no_main]

use dbgp_debugger::protocol::{unmarshal, unmarshal_init};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(response) = unmarshal(data) {
        let _ = response.decoded_text();
        for property in &response.properties {
            let _ = property.value();
        }
    }
    let _ = unmarshal_init(data);
});
