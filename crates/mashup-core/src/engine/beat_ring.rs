//! BeatRing - visual model of the bar as a ring of arcs
//!
//! Each tick lights one arc of a circle. Angles are in radians, measured
//! clockwise from 3 o'clock, with slice 0 starting at 12 o'clock. The
//! surface is cleared when the last slice of a bar arrives, so the ring
//! shows the bar filling up and then restarts.

use std::f64::consts::{FRAC_PI_2, TAU};

use super::tick_bus::{BeatEvent, Tick, TickListener};

/// One arc to draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcSegment {
    pub slice_index: u32,
    /// Start angle in radians
    pub start: f64,
    /// Sweep in radians
    pub length: f64,
    /// Clear the surface before drawing this arc
    pub restart: bool,
}

impl ArcSegment {
    pub fn end(&self) -> f64 {
        self.start + self.length
    }
}

/// Arc covering the tick's slice
pub fn arc_for_tick(tick: &Tick) -> ArcSegment {
    let total = tick.total_slices.max(1) as f64;
    let length = TAU / total;
    ArcSegment {
        slice_index: tick.slice_index,
        start: length * tick.slice_index as f64 - FRAC_PI_2,
        length,
        restart: tick.is_last_slice(),
    }
}

/// Arcs currently on the drawing surface
#[derive(Debug, Default, Clone)]
pub struct BeatRing {
    arcs: Vec<ArcSegment>,
}

impl BeatRing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the surface for an event; returns the arc drawn, if any
    pub fn apply(&mut self, event: &BeatEvent) -> Option<ArcSegment> {
        let BeatEvent::Tick(tick) = event else {
            return None;
        };
        let arc = arc_for_tick(tick);
        if arc.restart {
            self.arcs.clear();
        }
        self.arcs.push(arc);
        Some(arc)
    }

    pub fn arcs(&self) -> &[ArcSegment] {
        &self.arcs
    }

    pub fn clear(&mut self) {
        self.arcs.clear();
    }
}

impl TickListener for BeatRing {
    fn on_beat(&mut self, event: &BeatEvent) -> anyhow::Result<()> {
        self.apply(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(slice_index: u32, total_slices: u32) -> BeatEvent {
        BeatEvent::Tick(Tick {
            slice_index,
            total_slices,
            timestamp: 0.0,
            bar: 0,
        })
    }

    #[test]
    fn test_first_arc_starts_at_twelve_oclock() {
        let mut ring = BeatRing::new();
        let arc = ring.apply(&tick(0, 4)).unwrap();
        assert!((arc.start + FRAC_PI_2).abs() < 1e-12);
        assert!((arc.length - FRAC_PI_2).abs() < 1e-12);
        assert!(!arc.restart);

        let arc = ring.apply(&tick(2, 4)).unwrap();
        assert!((arc.start - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_arcs_tile_the_circle() {
        let mut ring = BeatRing::new();
        for slice in 0..31 {
            ring.apply(&tick(slice, 32));
        }
        let arcs = ring.arcs();
        assert_eq!(arcs.len(), 31);
        for pair in arcs.windows(2) {
            assert!((pair[0].end() - pair[1].start).abs() < 1e-9);
        }
    }

    #[test]
    fn test_last_slice_clears_surface() {
        let mut ring = BeatRing::new();
        for slice in 0..3 {
            ring.apply(&tick(slice, 4));
        }
        assert_eq!(ring.arcs().len(), 3);

        let arc = ring.apply(&tick(3, 4)).unwrap();
        assert!(arc.restart);
        assert_eq!(ring.arcs(), &[arc]);

        assert_eq!(ring.apply(&BeatEvent::Reset { timestamp: 1.5, bar: 0 }), None);
        assert_eq!(ring.arcs().len(), 1);
    }
}
