//! Uniformly partitioned FFT convolution (overlap-save)
//!
//! The kernel is cut into `PARTITION_SIZE` blocks whose spectra are computed
//! once, when the impulse response is synthesized. At run time each input
//! block is transformed once, pushed into a frequency-domain delay line and
//! multiplied against every kernel partition. Output lags input by exactly
//! one partition.
//!
//! Input and kernel are real, so only bins `0..=FFT_SIZE/2` are stored and
//! accumulated; the upper half is mirrored before the inverse transform.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::ImpulseResponse;

/// Block length in frames (also the added latency)
pub const PARTITION_SIZE: usize = 512;
const FFT_SIZE: usize = PARTITION_SIZE * 2;
const BINS: usize = FFT_SIZE / 2 + 1;

/// Pre-transformed kernel partitions for one channel
pub struct KernelSpectra {
    partitions: Vec<Vec<Complex<f32>>>,
}

impl KernelSpectra {
    pub fn new(ir: &[f32], planner: &mut FftPlanner<f32>) -> Self {
        let fft = planner.plan_fft_forward(FFT_SIZE);
        let mut scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        let mut buffer = vec![Complex::new(0.0, 0.0); FFT_SIZE];

        let partitions = ir
            .chunks(PARTITION_SIZE)
            .map(|block| {
                buffer.fill(Complex::new(0.0, 0.0));
                for (slot, &sample) in buffer.iter_mut().zip(block) {
                    slot.re = sample;
                }
                fft.process_with_scratch(&mut buffer, &mut scratch);
                buffer[..BINS].to_vec()
            })
            .collect();

        Self { partitions }
    }

    /// Number of partitions
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

/// Per-channel run-time state
struct ChannelState {
    /// Previous block followed by the block being collected
    input: Vec<f32>,
    /// Ring of input spectra, newest at `fdl_pos`
    fdl: Vec<Vec<Complex<f32>>>,
    /// Output of the last completed block
    output: Vec<f32>,
}

impl ChannelState {
    fn new(max_partitions: usize) -> Self {
        Self {
            input: vec![0.0; FFT_SIZE],
            fdl: vec![vec![Complex::new(0.0, 0.0); BINS]; max_partitions.max(1)],
            output: vec![0.0; PARTITION_SIZE],
        }
    }

    fn clear(&mut self) {
        self.input.fill(0.0);
        self.output.fill(0.0);
        for spectrum in &mut self.fdl {
            spectrum.fill(Complex::new(0.0, 0.0));
        }
    }
}

/// Stereo partitioned convolver
pub struct Convolver {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    impulse: Option<Arc<ImpulseResponse>>,
    channels: [ChannelState; 2],
    /// Frames collected into the current block
    block_pos: usize,
    fdl_pos: usize,
    work: Vec<Complex<f32>>,
    accum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl Convolver {
    /// Create a convolver whose delay line fits kernels of up to `max_ir_len` samples
    pub fn new(max_ir_len: usize) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(FFT_SIZE);
        let inverse = planner.plan_fft_inverse(FFT_SIZE);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        let max_partitions = max_ir_len.div_ceil(PARTITION_SIZE);

        Self {
            forward,
            inverse,
            impulse: None,
            channels: [
                ChannelState::new(max_partitions),
                ChannelState::new(max_partitions),
            ],
            block_pos: 0,
            fdl_pos: 0,
            work: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            accum: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
        }
    }

    /// Install a kernel; input history is kept so the new kernel picks up mid-stream
    pub fn set_impulse(&mut self, impulse: Arc<ImpulseResponse>) {
        let needed = impulse.spectra(0).len().max(1);
        for channel in &mut self.channels {
            if channel.fdl.len() < needed {
                // Only reached for kernels longer than the construction-time maximum
                channel.fdl.resize(needed, vec![Complex::new(0.0, 0.0); BINS]);
            }
        }
        self.impulse = Some(impulse);
    }

    pub fn impulse(&self) -> Option<&Arc<ImpulseResponse>> {
        self.impulse.as_ref()
    }

    /// Push one stereo frame, returning the frame delayed by one partition and convolved
    #[inline]
    pub fn process_frame(&mut self, left: f32, right: f32) -> (f32, f32) {
        let pos = self.block_pos;
        self.channels[0].input[PARTITION_SIZE + pos] = left;
        self.channels[1].input[PARTITION_SIZE + pos] = right;
        let out = (self.channels[0].output[pos], self.channels[1].output[pos]);

        self.block_pos += 1;
        if self.block_pos == PARTITION_SIZE {
            self.block_pos = 0;
            self.process_block();
        }
        out
    }

    fn process_block(&mut self) {
        let ring = self.channels[0].fdl.len();
        self.fdl_pos = (self.fdl_pos + 1) % ring;
        let norm = 1.0 / FFT_SIZE as f32;

        for (index, channel) in self.channels.iter_mut().enumerate() {
            // Transform the sliding window into the newest delay-line slot
            for (slot, &sample) in self.work.iter_mut().zip(&channel.input) {
                *slot = Complex::new(sample, 0.0);
            }
            self.forward
                .process_with_scratch(&mut self.work, &mut self.scratch);
            channel.fdl[self.fdl_pos].copy_from_slice(&self.work[..BINS]);

            // Slide the window for the next block
            channel.input.copy_within(PARTITION_SIZE.., 0);

            let Some(impulse) = &self.impulse else {
                channel.output.fill(0.0);
                continue;
            };

            let kernel = impulse.spectra(index);
            let half = &mut self.accum[..BINS];
            half.fill(Complex::new(0.0, 0.0));
            for (k, partition) in kernel.partitions.iter().enumerate().take(ring) {
                let spectrum = &channel.fdl[(self.fdl_pos + ring - k) % ring];
                for ((acc, x), h) in half.iter_mut().zip(spectrum).zip(partition) {
                    *acc += x * h;
                }
            }

            // Hermitian mirror for a real-valued result
            for bin in 1..FFT_SIZE / 2 {
                self.accum[FFT_SIZE - bin] = self.accum[bin].conj();
            }
            self.inverse
                .process_with_scratch(&mut self.accum, &mut self.scratch);

            for (out, value) in channel.output.iter_mut().zip(&self.accum[PARTITION_SIZE..]) {
                *out = value.re * norm;
            }
        }
    }

    /// Clear all signal history; the kernel stays installed
    pub fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.clear();
        }
        self.block_pos = 0;
        self.fdl_pos = 0;
    }

    /// Drop the kernel and all buffers
    pub fn release(&mut self) {
        self.impulse = None;
        self.channels = [ChannelState::new(0), ChannelState::new(0)];
        self.block_pos = 0;
        self.fdl_pos = 0;
    }
}
