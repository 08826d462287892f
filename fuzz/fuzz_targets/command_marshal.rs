#![no_main]

use dbgp_debugger::protocol::marshal;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (String, u32, Vec<(char, String)>, Option<Vec<u8>>)| {
    let (verb, id, args, data) = input;
    let args: Vec<(char, &str)> = args.iter().map(|(f, v)| (*f, v.as_str())).collect();
    if let Ok(wire) = marshal(&verb, id, &args, data.as_deref()) {
        assert!(wire.ends_with('\0'));
        assert_eq!(wire.matches('\0').count(), 1);
    }
});
