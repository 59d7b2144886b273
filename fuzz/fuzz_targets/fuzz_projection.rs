#![no_main]

use libfuzzer_sys::fuzz_target;
use werewolf_client::protocol::GameState;
use werewolf_client::{project, PanelHost};

// Any decodable snapshot must project without panicking, for any viewer,
// and the resulting panel must accept clicks on every player id.
fuzz_target!(|data: &[u8]| {
    let Ok(state) = serde_json::from_slice::<GameState>(data) else {
        return;
    };

    let mut host = PanelHost::new();
    for viewer in state.players.iter().map(|p| p.id.as_str()).chain(["nobody"]) {
        let view = project(Some(&state), viewer);
        host.sync(&view);
        if let Some(panel) = host.panel_mut() {
            for player in &state.players {
                panel.select(&player.id);
            }
            let _ = panel.begin_confirm();
        }
    }
});
