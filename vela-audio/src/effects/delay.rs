//! Feedback delay with mono and ping-pong topologies
//!
//! Both topologies are allocated at construction and always fed with the
//! input, sharing the same delay time and feedback. The selector only moves
//! a crossfade between their outputs, so flipping `ping_pong` never exposes
//! a half-switched graph and never steps the output.
//!
//! - Mono: per channel `delay → feedback → delay`
//! - Ping-pong: `delayL → feedbackL → delayR`, `delayR → feedbackR → delayL`

use super::{Bypass, Effect, StateSync};
use crate::smoother::SmoothedParam;

/// Maximum delay time in seconds
const MAX_DELAY_SECS: f32 = 2.0;
const MIN_DELAY_SECS: f32 = 0.001;

/// Feedback is hard-capped here; at or above 1.0 the loop diverges
const MAX_FEEDBACK: f32 = 0.9;

/// Which wiring feeds the wet output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelayTopology {
    #[default]
    Mono,
    PingPong,
}

/// Delay settings as held by the control plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayState {
    pub enabled: bool,
    /// Delay time in seconds (0.001 - 2)
    pub time: f32,
    /// Feedback amount (0 - 0.9)
    pub feedback: f32,
    pub ping_pong: bool,
    pub mix: f32,
}

impl Default for DelayState {
    fn default() -> Self {
        Self {
            enabled: false,
            time: 0.25,
            feedback: 0.3,
            ping_pong: false,
            mix: 0.5,
        }
    }
}

/// Single-channel circular delay line with linear fractional reads
#[derive(Debug, Clone)]
struct DelayLine {
    buffer: Vec<f32>,
    /// Next slot to write; `write_pos - 1` is the newest sample
    write_pos: usize,
}

impl DelayLine {
    fn new(len: usize) -> Self {
        Self {
            buffer: vec![0.0; len.max(4)],
            write_pos: 0,
        }
    }

    /// Longest delay (in frames) that can be read without wrapping into the write slot
    fn max_delay(&self) -> f32 {
        (self.buffer.len() - 2) as f32
    }

    #[inline]
    fn read(&self, delay_frames: f32) -> f32 {
        let len = self.buffer.len();
        let delay = delay_frames.clamp(1.0, self.max_delay());
        let int_delay = delay as usize;
        let frac = delay - int_delay as f32;

        let i0 = (self.write_pos + len - int_delay) % len;
        let i1 = (i0 + len - 1) % len;
        self.buffer[i0] * (1.0 - frac) + self.buffer[i1] * frac
    }

    #[inline]
    fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    fn release(&mut self) {
        self.buffer = Vec::new();
        self.write_pos = 0;
    }
}

/// Stereo feedback delay unit
pub struct Delay {
    sample_rate: f32,
    bypass: Bypass,

    time: SmoothedParam,
    feedback: SmoothedParam,
    topology: DelayTopology,
    /// 0.0 = mono output, 1.0 = ping-pong output
    selector: SmoothedParam,

    mono_l: DelayLine,
    mono_r: DelayLine,
    ping_l: DelayLine,
    ping_r: DelayLine,
}

impl Delay {
    /// Create a new delay with default settings (disabled)
    pub fn new(sample_rate: f32) -> Self {
        let defaults = DelayState::default();
        let len = (sample_rate * MAX_DELAY_SECS).ceil() as usize + 3;

        Self {
            sample_rate,
            bypass: Bypass::new(sample_rate, false, defaults.mix),
            time: SmoothedParam::new(sample_rate, defaults.time),
            feedback: SmoothedParam::new(sample_rate, defaults.feedback),
            topology: DelayTopology::Mono,
            selector: SmoothedParam::new(sample_rate, 0.0),
            mono_l: DelayLine::new(len),
            mono_r: DelayLine::new(len),
            ping_l: DelayLine::new(len),
            ping_r: DelayLine::new(len),
        }
    }

    /// Set delay time in seconds (0.001 - 2)
    pub fn set_time(&mut self, seconds: f32) {
        self.time.set(seconds.clamp(MIN_DELAY_SECS, MAX_DELAY_SECS));
    }

    pub fn time(&self) -> f32 {
        self.time.target()
    }

    /// Set feedback amount (capped at 0.9)
    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback.set(feedback.clamp(0.0, MAX_FEEDBACK));
    }

    pub fn feedback(&self) -> f32 {
        self.feedback.target()
    }

    /// Select the ping-pong or mono topology for the wet output
    pub fn set_ping_pong(&mut self, ping_pong: bool) {
        let topology = if ping_pong {
            DelayTopology::PingPong
        } else {
            DelayTopology::Mono
        };
        if topology != self.topology {
            self.topology = topology;
            self.selector.set(if ping_pong { 1.0 } else { 0.0 });
        }
    }

    pub fn ping_pong(&self) -> bool {
        self.topology == DelayTopology::PingPong
    }

    pub fn topology(&self) -> DelayTopology {
        self.topology
    }
}

impl Effect for Delay {
    fn process(&mut self, samples: &mut [f32]) {
        if self.bypass.is_disposed() {
            return;
        }

        let Self {
            sample_rate,
            bypass,
            time,
            feedback,
            selector,
            mono_l,
            mono_r,
            ping_l,
            ping_r,
            ..
        } = self;
        let sample_rate = *sample_rate;

        bypass.process(samples, |in_l, in_r| {
            let delay_frames = time.next() * sample_rate;
            let fb = feedback.next();
            let sel = selector.next();

            // Mono: each channel feeds back into itself
            let mono_out_l = mono_l.read(delay_frames);
            let mono_out_r = mono_r.read(delay_frames);
            mono_l.write(in_l + mono_out_l * fb);
            mono_r.write(in_r + mono_out_r * fb);

            // Ping-pong: each channel feeds back into the other
            let ping_out_l = ping_l.read(delay_frames);
            let ping_out_r = ping_r.read(delay_frames);
            ping_l.write(in_l + ping_out_r * fb);
            ping_r.write(in_r + ping_out_l * fb);

            (
                mono_out_l * (1.0 - sel) + ping_out_l * sel,
                mono_out_r * (1.0 - sel) + ping_out_r * sel,
            )
        });
    }

    fn reset(&mut self) {
        self.mono_l.clear();
        self.mono_r.clear();
        self.ping_l.clear();
        self.ping_r.clear();
    }

    fn bypass(&self) -> &Bypass {
        &self.bypass
    }

    fn bypass_mut(&mut self) -> &mut Bypass {
        &mut self.bypass
    }

    fn name(&self) -> &'static str {
        "Delay"
    }

    fn dispose(&mut self) {
        if self.bypass.dispose() {
            self.mono_l.release();
            self.mono_r.release();
            self.ping_l.release();
            self.ping_r.release();
        }
    }
}

impl StateSync for Delay {
    type State = DelayState;

    fn update_from_state(&mut self, state: &DelayState) {
        self.set_enabled(state.enabled);
        self.set_time(state.time);
        self.set_feedback(state.feedback);
        self.set_ping_pong(state.ping_pong);
        self.set_mix(state.mix);
    }

    fn state(&self) -> DelayState {
        DelayState {
            enabled: self.is_enabled(),
            time: self.time(),
            feedback: self.feedback(),
            ping_pong: self.ping_pong(),
            mix: self.mix(),
        }
    }
}
