//! Linear segments with parabolic blends (LSPB).
//!
//! A profile accelerates for `blend` ticks, cruises, then decelerates for the last
//! `blend` ticks so that the channel arrives exactly at its target after `total`
//! ticks. Positions are duties in µs.

/// Descriptor of one planned move.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Trajectory {
    pub accel: f32,
    pub start: f32,
    pub end: f32,
    pub total_ticks: u16,
    pub blend_ticks: u16,
}

impl Trajectory {
    /// Plans a move from `start` to `end` over `total` ticks with `blend` ticks of
    /// acceleration at each end.
    ///
    /// Timing is forced into `0 < blend <= total / 2`; callers validate operator
    /// input before it gets here.
    pub fn plan(start: u16, end: u16, total: u16, blend: u16) -> Self {
        let total = total.max(2);
        let blend = blend.clamp(1, total / 2);
        let (p0, pf) = (start as f32, end as f32);
        let (tf, tb) = (total as f32, blend as f32);

        Self {
            accel: (pf - p0) / (tb * (tf - tb)),
            start: p0,
            end: pf,
            total_ticks: total,
            blend_ticks: blend,
        }
    }

    /// A profile that does not move the channel.
    pub fn is_still(&self) -> bool {
        self.start == self.end
    }

    /// Position after `tick` elapsed ticks.
    pub fn sample(&self, tick: u32) -> f32 {
        if self.is_still() {
            return self.start;
        }
        let t = tick as f32;
        let tf = self.total_ticks as f32;
        let tb = self.blend_ticks as f32;
        let a = self.accel;

        if t <= tb {
            self.start + 0.5 * a * t * t
        } else if t <= tf - tb {
            self.start + 0.5 * a * tb * tb + a * tb * (t - tb)
        } else if t <= tf {
            let rest = tf - t;
            self.end - 0.5 * a * rest * rest
        } else {
            self.end
        }
    }

    /// Whether `tick` is at or past the end of the move.
    pub fn is_finished(&self, tick: u32) -> bool {
        tick >= self.total_ticks as u32
    }
}
