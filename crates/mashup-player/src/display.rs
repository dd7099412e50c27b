//! Terminal rendering of the beat ring and channel state

use mashup_core::audio::ChannelLayout;
use mashup_core::engine::{BeatRing, EngineAtomics};

/// The ring unrolled into one line, one cell per slice
///
/// Lit slices are `#`, the most recent one `@`.
pub fn ring_line(ring: &BeatRing, total_slices: u32) -> String {
    let mut cells = vec!['.'; total_slices as usize];
    for arc in ring.arcs() {
        if let Some(cell) = cells.get_mut(arc.slice_index as usize) {
            *cell = '#';
        }
    }
    if let Some(cell) = ring
        .arcs()
        .last()
        .and_then(|arc| cells.get_mut(arc.slice_index as usize))
    {
        *cell = '@';
    }
    format!("[{}]", cells.into_iter().collect::<String>())
}

/// One line per channel: `beat  (1.00)  [1 backseat]  2 yonkers  >3 so_fresh`
///
/// Brackets mark the audible track, `>` the one queued for the next bar.
pub fn channel_lines(layout: &[ChannelLayout], atomics: &EngineAtomics) -> Vec<String> {
    let width = layout.iter().map(|c| c.name.len()).max().unwrap_or(0);
    layout
        .iter()
        .enumerate()
        .map(|(i, channel)| {
            let (selected, pending, volume) = match atomics.channel(i) {
                Some(state) => (state.selected(), state.pending(), state.volume()),
                None => (0, None, 1.0),
            };
            let tracks: Vec<String> = channel
                .tracks
                .iter()
                .enumerate()
                .map(|(idx, name)| {
                    if idx == selected {
                        format!("[{} {}]", idx + 1, name)
                    } else if pending == Some(idx) {
                        format!(">{} {}", idx + 1, name)
                    } else {
                        format!(" {} {}", idx + 1, name)
                    }
                })
                .collect();
            format!(
                "{:width$}  ({:.2})  {}",
                channel.name,
                volume,
                tracks.join("  "),
                width = width
            )
        })
        .collect()
}

/// Transport summary line
pub fn transport_line(atomics: &EngineAtomics) -> String {
    let state = match (atomics.is_started(), atomics.is_playing()) {
        (false, _) => "stopped",
        (true, true) => "playing",
        (true, false) => "paused",
    };
    format!(
        "{}  bar {}  master {:.2}",
        state,
        atomics.bar() + 1,
        atomics.master_volume()
    )
}
