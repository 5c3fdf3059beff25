//! Biquad building blocks (RBJ Audio EQ Cookbook)
//!
//! Coefficients are normalized by a0 and stored as feed-forward `b*` and
//! feedback `a*` terms; [`BiquadState`] holds per-channel history.

use std::f32::consts::PI;

/// Filter response shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiquadShape {
    LowPass,
    HighPass,
    LowShelf,
    HighShelf,
    Peaking,
}

/// Normalized biquad coefficients
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Default for BiquadCoeffs {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl BiquadCoeffs {
    /// Unity-gain passthrough
    pub const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Compute coefficients for a shape
    ///
    /// `gain_db` is only used by shelves and peaking; `q` is ignored by shelves
    /// (fixed slope S = 1).
    pub fn design(shape: BiquadShape, sample_rate: f32, freq: f32, q: f32, gain_db: f32) -> Self {
        let nyquist = sample_rate * 0.5;
        let freq = freq.clamp(1.0, nyquist * 0.999);
        let q = q.max(1e-3);

        let omega = 2.0 * PI * freq / sample_rate;
        let sin_omega = omega.sin();
        let cos_omega = omega.cos();

        match shape {
            BiquadShape::LowPass => {
                let alpha = sin_omega / (2.0 * q);
                let a0 = 1.0 + alpha;
                Self {
                    b0: ((1.0 - cos_omega) / 2.0) / a0,
                    b1: (1.0 - cos_omega) / a0,
                    b2: ((1.0 - cos_omega) / 2.0) / a0,
                    a1: (-2.0 * cos_omega) / a0,
                    a2: (1.0 - alpha) / a0,
                }
            }
            BiquadShape::HighPass => {
                let alpha = sin_omega / (2.0 * q);
                let a0 = 1.0 + alpha;
                Self {
                    b0: ((1.0 + cos_omega) / 2.0) / a0,
                    b1: (-(1.0 + cos_omega)) / a0,
                    b2: ((1.0 + cos_omega) / 2.0) / a0,
                    a1: (-2.0 * cos_omega) / a0,
                    a2: (1.0 - alpha) / a0,
                }
            }
            BiquadShape::LowShelf => {
                if gain_db.abs() < 0.01 {
                    return Self::IDENTITY;
                }
                let a = 10.0f32.powf(gain_db / 40.0);
                let alpha = sin_omega / 2.0 * 2.0f32.sqrt();
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                let a0 = (a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha;
                Self {
                    b0: (a * ((a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha)) / a0,
                    b1: (2.0 * a * ((a - 1.0) - (a + 1.0) * cos_omega)) / a0,
                    b2: (a * ((a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha)) / a0,
                    a1: (-2.0 * ((a - 1.0) + (a + 1.0) * cos_omega)) / a0,
                    a2: ((a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha) / a0,
                }
            }
            BiquadShape::HighShelf => {
                if gain_db.abs() < 0.01 {
                    return Self::IDENTITY;
                }
                let a = 10.0f32.powf(gain_db / 40.0);
                let alpha = sin_omega / 2.0 * 2.0f32.sqrt();
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * alpha;
                let a0 = (a + 1.0) - (a - 1.0) * cos_omega + two_sqrt_a_alpha;
                Self {
                    b0: (a * ((a + 1.0) + (a - 1.0) * cos_omega + two_sqrt_a_alpha)) / a0,
                    b1: (-2.0 * a * ((a - 1.0) + (a + 1.0) * cos_omega)) / a0,
                    b2: (a * ((a + 1.0) + (a - 1.0) * cos_omega - two_sqrt_a_alpha)) / a0,
                    a1: (2.0 * ((a - 1.0) - (a + 1.0) * cos_omega)) / a0,
                    a2: ((a + 1.0) - (a - 1.0) * cos_omega - two_sqrt_a_alpha) / a0,
                }
            }
            BiquadShape::Peaking => {
                if gain_db.abs() < 0.01 {
                    return Self::IDENTITY;
                }
                let a = 10.0f32.powf(gain_db / 40.0);
                let alpha = sin_omega / (2.0 * q);
                let a0 = 1.0 + alpha / a;
                Self {
                    b0: (1.0 + alpha * a) / a0,
                    b1: (-2.0 * cos_omega) / a0,
                    b2: (1.0 - alpha * a) / a0,
                    a1: (-2.0 * cos_omega) / a0,
                    a2: (1.0 - alpha / a) / a0,
                }
            }
        }
    }

    /// Magnitude response at `freq` (linear)
    pub fn magnitude_at(&self, sample_rate: f32, freq: f32) -> f32 {
        let w = 2.0 * PI * freq / sample_rate;
        let (c1, s1) = (w.cos(), w.sin());
        let (c2, s2) = ((2.0 * w).cos(), (2.0 * w).sin());

        let num_re = self.b0 + self.b1 * c1 + self.b2 * c2;
        let num_im = -(self.b1 * s1 + self.b2 * s2);
        let den_re = 1.0 + self.a1 * c1 + self.a2 * c2;
        let den_im = -(self.a1 * s1 + self.a2 * s2);

        ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt()
    }
}

/// Biquad filter state for a single channel (direct form I)
#[derive(Debug, Default, Clone)]
pub struct BiquadState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BiquadState {
    #[inline]
    pub fn process(&mut self, input: f32, coeffs: &BiquadCoeffs) -> f32 {
        let output = coeffs.b0 * input + coeffs.b1 * self.x1 + coeffs.b2 * self.x2
            - coeffs.a1 * self.y1
            - coeffs.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;

        output
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Stereo biquad stage: one coefficient set, two channel histories
#[derive(Debug, Default, Clone)]
pub struct StereoBiquad {
    pub coeffs: BiquadCoeffs,
    left: BiquadState,
    right: BiquadState,
}

impl StereoBiquad {
    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        (
            self.left.process(left, &self.coeffs),
            self.right.process(right, &self.coeffs),
        )
    }

    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}
