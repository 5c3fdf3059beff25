use std::f32::consts::PI;
use std::sync::Arc;
use vela_audio::{
    ChainState, CompressorState, DelayState, Effect, EffectChain, EffectSlot, EqState,
    FilterState, ImpulseCache, ReverbPreset, ReverbState, StateSync,
};

fn stereo_sine(freq: f32, sample_rate: f32, start: usize, frames: usize, amp: f32) -> Vec<f32> {
    (start..start + frames)
        .flat_map(|i| {
            let s = amp * (2.0 * PI * freq * i as f32 / sample_rate).sin();
            [s, s]
        })
        .collect()
}

fn max_step(channel: impl Iterator<Item = f32>) -> f32 {
    let mut last: Option<f32> = None;
    let mut worst = 0.0f32;
    for s in channel {
        if let Some(prev) = last {
            worst = worst.max((s - prev).abs());
        }
        last = Some(s);
    }
    worst
}

#[test]
fn inert_chain_is_identity() {
    let sr = 48000.0;
    let mut chain = EffectChain::new(sr, Arc::new(ImpulseCache::new()));
    chain.set_order([
        EffectSlot::Eq,
        EffectSlot::Compressor,
        EffectSlot::Filter,
        EffectSlot::Delay,
        EffectSlot::Reverb,
    ]);
    chain.apply_state(&ChainState {
        eq: EqState {
            enabled: true,
            ..EqState::default()
        },
        compressor: CompressorState {
            enabled: true,
            threshold: -24.0,
            ratio: 4.0,
            makeup_gain: 0.0,
            ..CompressorState::default()
        },
        filter: FilterState {
            enabled: true,
            highpass: 20.0,
            lowpass: 20000.0,
            ..FilterState::default()
        },
        delay: DelayState {
            enabled: false,
            ..DelayState::default()
        },
        reverb: ReverbState {
            enabled: false,
            ..ReverbState::default()
        },
    });

    // -40 dB test tone stays under the compressor's knee; let enable ramps settle
    let mut warmup = stereo_sine(440.0, sr, 0, 48000, 0.01);
    chain.process(&mut warmup);

    let input = stereo_sine(440.0, sr, 48000, 4800, 0.01);
    let mut output = input.clone();
    chain.process(&mut output);

    for (out, inp) in output.iter().zip(&input) {
        assert!((out - inp).abs() < 1e-6, "{} vs {}", out, inp);
    }
    assert_eq!(chain.compressor().reduction_db(), 0.0);

    // Enabled units sit fully wet, disabled ones fully dry, with no residue
    let wet_units = [
        chain.eq().bypass(),
        chain.compressor().bypass(),
        chain.filter().bypass(),
    ];
    for bypass in wet_units {
        assert_eq!(bypass.wet_gain(), 1.0);
        assert_eq!(bypass.dry_gain(), 0.0);
    }
    for bypass in [chain.delay().bypass(), chain.reverb().bypass()] {
        assert_eq!(bypass.wet_gain(), 0.0);
        assert_eq!(bypass.dry_gain(), 1.0);
    }
}

#[test]
fn max_feedback_echoes_decay() {
    let sr = 48000.0;
    let mut chain = EffectChain::new(sr, Arc::new(ImpulseCache::new()));
    chain.apply_delay(&DelayState {
        enabled: true,
        time: 0.1,
        // Requested above the cap; must still decay
        feedback: 1.5,
        ping_pong: false,
        mix: 1.0,
    });
    assert_eq!(chain.delay().feedback(), 0.9);

    let mut silence = vec![0.0f32; 2 * 24000];
    chain.process(&mut silence);

    let echo_spacing = 4800;
    let mut samples = vec![0.0f32; 2 * echo_spacing * 10];
    samples[0] = 1.0;
    samples[1] = 1.0;
    chain.process(&mut samples);

    let peaks: Vec<f32> = (1..10)
        .map(|k| {
            let center = k * echo_spacing;
            (center - 8..center + 8)
                .map(|frame| samples[frame * 2].abs())
                .fold(0.0f32, f32::max)
        })
        .collect();

    assert!(peaks[0] > 0.9);
    for pair in peaks.windows(2) {
        assert!(pair[1] < pair[0], "echoes not decaying: {:?}", peaks);
    }
}

#[test]
fn ping_pong_toggling_mid_stream_is_smooth() {
    let sr = 48000.0;
    let mut chain = EffectChain::new(sr, Arc::new(ImpulseCache::new()));
    chain.apply_delay(&DelayState {
        enabled: true,
        time: 0.03,
        feedback: 0.7,
        ping_pong: false,
        mix: 0.5,
    });

    // Let the delay time glide down to its target first
    let mut silence = vec![0.0f32; 2 * 24000];
    chain.process(&mut silence);

    let mut output = Vec::new();
    for block in 0..40 {
        let mut samples = stereo_sine(330.0, sr, block * 1200, 1200, 0.3);
        // Left-only input makes the two topologies sound different
        for frame in samples.chunks_exact_mut(2) {
            frame[1] = 0.0;
        }
        chain.delay_mut().set_ping_pong(block % 2 == 1);
        chain.process(&mut samples);
        output.extend_from_slice(&samples);
    }

    assert!(output.iter().all(|s| s.is_finite()));
    let left = max_step(output.chunks_exact(2).map(|f| f[0]));
    let right = max_step(output.chunks_exact(2).map(|f| f[1]));
    assert!(left < 0.1, "left step {}", left);
    assert!(right < 0.1, "right step {}", right);

    // After each switch the wet path still delivers echoes where expected
    let echo = 1440;
    for ping_pong in [false, true, false, true] {
        chain.delay_mut().set_ping_pong(ping_pong);
        let mut silence = vec![0.0f32; 2 * 48000];
        chain.process(&mut silence);

        let mut samples = vec![0.0f32; 2 * 3 * echo];
        samples[0] = 1.0;
        chain.process(&mut samples);

        let first_l = samples[echo * 2];
        let (second_l, second_r) = (samples[2 * echo * 2], samples[2 * echo * 2 + 1]);
        // mix 0.5: dry and wet gains both settle at one half
        assert!((first_l - 0.5).abs() < 1e-3, "first echo {}", first_l);
        if ping_pong {
            assert!((second_r - 0.35).abs() < 1e-3, "bounce {}", second_r);
            assert!(second_l.abs() < 1e-3);
        } else {
            assert!((second_l - 0.35).abs() < 1e-3, "repeat {}", second_l);
            assert!(second_r.abs() < 1e-3);
        }
    }
}

#[test]
fn reverb_cache_is_shared_between_chains() {
    let cache = Arc::new(ImpulseCache::new());
    let mut a = EffectChain::new(16000.0, Arc::clone(&cache));
    let mut b = EffectChain::new(16000.0, Arc::clone(&cache));

    let ir_a = a.reverb_mut().load_preset(ReverbPreset::Plate);
    let ir_b = b.reverb_mut().load_preset(ReverbPreset::Plate);
    assert!(Arc::ptr_eq(&ir_a, &ir_b));
    assert_eq!(cache.synthesis_count(), 1);

    // A different rate is a different entry
    let mut c = EffectChain::new(8000.0, Arc::clone(&cache));
    let ir_c = c.reverb_mut().load_preset(ReverbPreset::Plate);
    assert!(!Arc::ptr_eq(&ir_a, &ir_c));
    assert_eq!(cache.synthesis_count(), 2);
}

#[test]
fn every_preset_is_normalized() {
    let cache = ImpulseCache::new();
    for preset in ReverbPreset::ALL {
        let ir = cache.get_or_synthesize(preset, 8000);
        assert_eq!(ir.len(), preset.ir_len(8000));
        for channel in [ir.left(), ir.right()] {
            let peak = channel.iter().fold(0.0f32, |m, s| m.max(s.abs()));
            assert!((peak - 0.5).abs() < 1e-6, "{} peak {}", preset, peak);
        }
    }
    assert_eq!(cache.len(), ReverbPreset::ALL.len());
}

#[test]
fn toggling_every_unit_keeps_settings() {
    let mut chain = EffectChain::new(16000.0, Arc::new(ImpulseCache::new()));
    let mut state = ChainState::default();
    state.eq.mid = -6.0;
    state.compressor.threshold = -30.0;
    state.filter.lowpass = 5000.0;
    state.delay.time = 0.5;
    state.reverb.preset = ReverbPreset::SmallRoom;
    state.reverb.pre_delay_ms = 12.0;
    chain.apply_state(&state);
    let before = chain.state();

    for slot in EffectSlot::ALL {
        chain.unit_mut(slot).set_enabled(true);
        chain.unit_mut(slot).set_enabled(false);
    }
    assert_eq!(chain.state(), before);
    assert_eq!(chain.reverb().state().preset, ReverbPreset::SmallRoom);
}
