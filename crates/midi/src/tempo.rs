//! Tempo map construction from track-0 meta events.

use midly::{MetaMessage, TrackEvent, TrackEventKind};

/// As per the MIDI specification, 120 BPM is assumed until a tempo change
/// is reached.
pub const DEFAULT_BPM: f64 = 120.0;

/// One constant-tempo span of the tick timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TempoSegment {
    /// Absolute tick at which this tempo takes effect.
    pub start_tick: u64,
    /// Accumulated real time at `start_tick`, in milliseconds.
    pub real_time_ms: f64,
    /// Beats per minute from this tick onward.
    pub bpm: f64,
}

/// Ordered tempo segments partitioning the tick timeline.
///
/// The first segment always starts at tick 0: either the implicit
/// 120 BPM default, or an explicit tempo event that landed exactly there.
/// Start ticks are strictly increasing; a later tempo event on the same
/// tick replaces the earlier one.
#[derive(Debug, Clone)]
pub struct TempoMap {
    segments: Vec<TempoSegment>,
    ticks_per_quarter: u16,
    /// True while segment 0 is the assumed default rather than an event
    /// from the file.
    first_is_implicit: bool,
}

impl TempoMap {
    /// Build the map by walking a track's meta events, accumulating real
    /// time as `delta_ticks / tpq * (60000 / previous_bpm)` at each tempo
    /// change. Non-tempo events only advance the tick counter; a
    /// zero-valued tempo payload is skipped rather than dividing by zero
    /// later.
    pub fn from_track(track: &[TrackEvent<'_>], ticks_per_quarter: u16) -> Self {
        let mut segments = vec![TempoSegment {
            start_tick: 0,
            real_time_ms: 0.0,
            bpm: DEFAULT_BPM,
        }];
        let mut first_is_implicit = true;

        let mut current_bpm = DEFAULT_BPM;
        let mut real_time_ms = 0.0;
        let mut abs_tick: u64 = 0;
        let mut rel_delta: u64 = 0;

        for event in track {
            let delta = u64::from(event.delta.as_int());
            abs_tick += delta;
            rel_delta += delta;

            let TrackEventKind::Meta(MetaMessage::Tempo(us_per_quarter)) = event.kind else {
                continue;
            };
            let us_per_quarter = us_per_quarter.as_int();
            if us_per_quarter == 0 {
                log::warn!("skipping zero tempo event at tick {abs_tick}");
                continue;
            }

            real_time_ms += rel_delta as f64 / ticks_per_quarter as f64 * (60_000.0 / current_bpm);
            current_bpm = 60_000_000.0 / us_per_quarter as f64;
            rel_delta = 0;

            let last = segments.last_mut().expect("seeded with one segment");
            if last.start_tick == abs_tick {
                // Same tick: the later event wins, keeping start ticks
                // strictly increasing.
                last.real_time_ms = real_time_ms;
                last.bpm = current_bpm;
                if abs_tick == 0 {
                    first_is_implicit = false;
                }
            } else {
                segments.push(TempoSegment {
                    start_tick: abs_tick,
                    real_time_ms,
                    bpm: current_bpm,
                });
            }
        }

        Self {
            segments,
            ticks_per_quarter,
            first_is_implicit,
        }
    }

    pub fn segments(&self) -> &[TempoSegment] {
        &self.segments
    }

    pub fn ticks_per_quarter(&self) -> u16 {
        self.ticks_per_quarter
    }

    /// The segment governing `tick`: the last one whose start is `<= tick`.
    pub fn segment_at(&self, tick: u64) -> &TempoSegment {
        self.segments
            .iter()
            .rev()
            .find(|s| s.start_tick <= tick)
            .expect("segment 0 starts at tick 0")
    }

    /// BPM governing `tick`, or `None` when only the implicit default
    /// covers it. Callers with a better file-wide default fall back to
    /// that instead.
    pub fn explicit_bpm_at(&self, tick: u64) -> Option<f64> {
        let index = self
            .segments
            .iter()
            .rposition(|s| s.start_tick <= tick)
            .expect("segment 0 starts at tick 0");
        if index == 0 && self.first_is_implicit {
            None
        } else {
            Some(self.segments[index].bpm)
        }
    }

    /// Real time in milliseconds corresponding to an absolute tick.
    pub fn real_time_ms(&self, tick: u64) -> f64 {
        let segment = self.segment_at(tick);
        let rel_delta = (tick - segment.start_tick) as f64;
        segment.real_time_ms
            + rel_delta / self.ticks_per_quarter as f64 * (60_000.0 / segment.bpm)
    }
}
