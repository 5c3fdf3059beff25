//! Built-in test signal: a looping pattern of plucked-string notes
//!
//! Karplus-Strong: a noise burst circulates in a short delay line through an
//! averaging low-pass, which decays into a string-like tone.

/// Note pattern in Hz (A minor arpeggio)
const PATTERN: [f32; 8] = [220.0, 261.63, 329.63, 440.0, 329.63, 261.63, 196.0, 246.94];

/// Seconds between note onsets
const NOTE_SPACING: f32 = 0.4;

/// Per-pass loss in the string loop
const DAMPING: f32 = 0.996;

const OUTPUT_GAIN: f32 = 0.4;

/// Plucked-string pattern generator
pub struct PluckSource {
    sample_rate: f32,
    string: Vec<f32>,
    len: usize,
    pos: usize,
    note: usize,
    samples_until_next: usize,
    random_state: u64,
}

impl PluckSource {
    pub fn new(sample_rate: f32) -> Self {
        // Room for the lowest note in the pattern
        let capacity = (sample_rate / 60.0).ceil() as usize + 2;
        Self {
            sample_rate,
            string: vec![0.0; capacity],
            len: 1,
            pos: 0,
            note: 0,
            samples_until_next: 0,
            random_state: 0x2545_F491_4F6C_DD1D,
        }
    }

    /// xorshift64 PRNG, uniform in [-1, 1]
    fn next_noise(&mut self) -> f32 {
        self.random_state ^= self.random_state << 13;
        self.random_state ^= self.random_state >> 7;
        self.random_state ^= self.random_state << 17;
        (self.random_state as f32) / (u64::MAX as f32) * 2.0 - 1.0
    }

    fn pluck(&mut self) {
        let freq = PATTERN[self.note % PATTERN.len()];
        self.note += 1;

        self.len = ((self.sample_rate / freq).round() as usize).clamp(2, self.string.len());
        for i in 0..self.len {
            self.string[i] = self.next_noise();
        }
        self.pos = 0;
        self.samples_until_next = (self.sample_rate * NOTE_SPACING) as usize;
    }

    #[inline]
    fn next_sample(&mut self) -> f32 {
        if self.samples_until_next == 0 {
            self.pluck();
        }
        self.samples_until_next -= 1;

        let next = (self.pos + 1) % self.len;
        let out = self.string[self.pos];
        self.string[self.pos] = DAMPING * 0.5 * (out + self.string[next]);
        self.pos = next;
        out * OUTPUT_GAIN
    }

    /// Fill a stereo interleaved buffer
    pub fn fill(&mut self, samples: &mut [f32]) {
        for frame in samples.chunks_exact_mut(2) {
            let s = self.next_sample();
            frame[0] = s;
            frame[1] = s;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_is_bounded() {
        let mut source = PluckSource::new(48000.0);
        let mut buffer = vec![0.0f32; 2 * 48000];
        source.fill(&mut buffer);
        assert!(buffer.iter().all(|s| s.abs() <= OUTPUT_GAIN));
        assert!(buffer.iter().any(|s| s.abs() > 0.01));
    }

    #[test]
    fn test_notes_decay() {
        let mut source = PluckSource::new(48000.0);
        let spacing = (48000.0 * NOTE_SPACING) as usize;
        let mut buffer = vec![0.0f32; 2 * spacing];
        source.fill(&mut buffer);

        let head: f32 = buffer[..2000].iter().map(|s| s * s).sum();
        let tail: f32 = buffer[buffer.len() - 2000..].iter().map(|s| s * s).sum();
        assert!(tail < head);
    }
}
