#![no_main]

use libfuzzer_sys::fuzz_target;
use werewolf_client::protocol::GameState;

fuzz_target!(|data: &[u8]| {
    let _ = serde_json::from_slice::<GameState>(data);

    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(state) = serde_json::from_str::<GameState>(s) {
            let _ = state.check_consistency();
        }
    }
});
