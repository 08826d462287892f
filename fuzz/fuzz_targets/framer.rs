#![no_main]

use dbgp_debugger::protocol::{read_block, unmarshal};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let runtime = match tokio::runtime::Builder::new_current_thread().build() {
        Ok(rt) => rt,
        Err(_) => return,
    };
    let mut reader = data;
    runtime.block_on(async {
        while let Ok(block) = read_block(&mut reader).await {
            let _ = unmarshal(&block);
        }
    });
});
