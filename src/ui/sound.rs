/// Sound engine: procedural sound effects via rodio.
///
/// All fixed sounds are generated as in-memory WAV buffers at init time.
/// Playback is fire-and-forget (non-blocking) via rodio's Sink.
///
/// Compile without the "sound" feature to disable audio entirely
/// (the stub SoundEngine does nothing).

#[cfg(feature = "sound")]
mod inner {
    use std::io::Cursor;
    use std::sync::Arc;

    use rodio::{OutputStream, OutputStreamHandle, Sink};

    use super::{gen_tone, key_pitch, make_wav, SAMPLE_RATE};

    /// Pre-generated WAV buffers for each sound effect.
    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        sfx_rejuvenate: Arc<Vec<u8>>,
        sfx_catch: Arc<Vec<u8>>,
        sfx_miss: Arc<Vec<u8>>,
        sfx_rapid: Arc<Vec<u8>>,
        sfx_single: Arc<Vec<u8>>,
        sfx_correct: Arc<Vec<u8>>,
        sfx_wrong: Arc<Vec<u8>>,
        sfx_stage: Arc<Vec<u8>>,
        sfx_depleted: Arc<Vec<u8>>,
        sfx_tick: Arc<Vec<u8>>,
    }

    impl SoundEngine {
        pub fn new() -> Option<Self> {
            let (stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(e) => {
                    log::warn!("no audio output: {e}");
                    return None;
                }
            };
            log::debug!("sound engine at {SAMPLE_RATE} Hz");

            // ── Generate all sound buffers ──
            Some(SoundEngine {
                _stream: stream,
                handle,
                sfx_rejuvenate: Arc::new(make_wav(&super::gen_rejuvenate())),
                sfx_catch: Arc::new(make_wav(&super::gen_catch())),
                sfx_miss: Arc::new(make_wav(&super::gen_miss())),
                sfx_rapid: Arc::new(make_wav(&gen_tone(1320.0, 0.03, 0.2))),
                sfx_single: Arc::new(make_wav(&gen_tone(660.0, 0.05, 0.2))),
                sfx_correct: Arc::new(make_wav(&super::gen_correct())),
                sfx_wrong: Arc::new(make_wav(&super::gen_wrong())),
                sfx_stage: Arc::new(make_wav(&super::gen_stage_drop())),
                sfx_depleted: Arc::new(make_wav(&super::gen_depleted())),
                sfx_tick: Arc::new(make_wav(&gen_tone(880.0, 0.02, 0.12))),
            })
        }

        fn play(&self, buf: &Arc<Vec<u8>>) {
            self.play_bytes(buf.as_ref().clone());
        }

        fn play_bytes(&self, wav: Vec<u8>) {
            if let Ok(sink) = Sink::try_new(&self.handle) {
                if let Ok(src) = rodio::Decoder::new(Cursor::new(wav)) {
                    sink.append(src);
                    sink.detach(); // fire-and-forget
                }
            }
        }

        /// Simon instruction cue: each key has its own pitch.
        pub fn play_key(&self, key: char) {
            self.play_bytes(make_wav(&gen_tone(key_pitch(key), 0.12, 0.25)));
        }

        pub fn play_rejuvenate(&self) { self.play(&self.sfx_rejuvenate); }
        pub fn play_catch(&self) { self.play(&self.sfx_catch); }
        pub fn play_miss(&self) { self.play(&self.sfx_miss); }
        pub fn play_rapid(&self) { self.play(&self.sfx_rapid); }
        pub fn play_single(&self) { self.play(&self.sfx_single); }
        pub fn play_correct(&self) { self.play(&self.sfx_correct); }
        pub fn play_wrong(&self) { self.play(&self.sfx_wrong); }
        pub fn play_stage(&self) { self.play(&self.sfx_stage); }
        pub fn play_depleted(&self) { self.play(&self.sfx_depleted); }
        pub fn play_tick(&self) { self.play(&self.sfx_tick); }
    }
}

// ════════════════════════════════════════════════════════════
//  Waveform generators: mono f32 samples at SAMPLE_RATE
// ════════════════════════════════════════════════════════════

#[cfg_attr(not(feature = "sound"), allow(dead_code))]
const SAMPLE_RATE: u32 = 22050;

const TAU: f32 = std::f32::consts::TAU;

/// Pitch for a Simon key: letters spread over two octaves from A4.
#[cfg_attr(not(feature = "sound"), allow(dead_code))]
fn key_pitch(key: char) -> f32 {
    let semitone = (key.to_ascii_lowercase() as u32).saturating_sub('a' as u32).min(25) as f32;
    440.0 * 2f32.powf(semitone / 12.0)
}

/// Sine blip with a linear fade out.
#[cfg_attr(not(feature = "sound"), allow(dead_code))]
fn gen_tone(freq: f32, duration: f32, volume: f32) -> Vec<f32> {
    let n = (SAMPLE_RATE as f32 * duration) as usize;
    (0..n)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            let env = 1.0 - (i as f32 / n as f32);
            (t * freq * TAU).sin() * env * volume
        })
        .collect()
}

/// Notes played back to back; sine plus a soft octave for brightness.
#[cfg_attr(not(feature = "sound"), allow(dead_code))]
fn gen_notes(notes: &[f32], note_dur: f32, volume: f32) -> Vec<f32> {
    let mut samples = Vec::new();
    for &freq in notes {
        let n = (SAMPLE_RATE as f32 * note_dur) as usize;
        for i in 0..n {
            let t = i as f32 / SAMPLE_RATE as f32;
            let env = 1.0 - (i as f32 / n as f32) * 0.3;
            let wave = (t * freq * TAU).sin() * 0.7 + (t * freq * 2.0 * TAU).sin() * 0.3;
            samples.push(wave * env * volume);
        }
    }
    samples
}

/// Frequency sweep from `from` to `to` Hz.
#[cfg_attr(not(feature = "sound"), allow(dead_code))]
fn gen_sweep(from: f32, to: f32, duration: f32, volume: f32) -> Vec<f32> {
    let n = (SAMPLE_RATE as f32 * duration) as usize;
    let mut phase = 0.0_f32;
    (0..n)
        .map(|i| {
            let t = i as f32 / n as f32;
            let freq = from + (to - from) * t;
            phase += freq / SAMPLE_RATE as f32;
            (phase * TAU).sin() * (1.0 - t).powf(0.6) * volume
        })
        .collect()
}

/// Grid cell restored: quick rising chirp.
#[cfg_attr(not(feature = "sound"), allow(dead_code))]
fn gen_rejuvenate() -> Vec<f32> {
    gen_sweep(500.0, 1200.0, 0.08, 0.25)
}

/// Block caught: two-note chime G5 → C6.
#[cfg_attr(not(feature = "sound"), allow(dead_code))]
fn gen_catch() -> Vec<f32> {
    gen_notes(&[784.0, 1047.0], 0.06, 0.3)
}

/// Block lost: low noisy thud.
#[cfg_attr(not(feature = "sound"), allow(dead_code))]
fn gen_miss() -> Vec<f32> {
    let n = (SAMPLE_RATE as f32 * 0.14) as usize;
    let mut rng: u32 = 12345;
    (0..n)
        .map(|i| {
            let t = i as f32 / n as f32;
            let ti = i as f32 / SAMPLE_RATE as f32;
            let tone = (ti * (160.0 - t * 80.0) * TAU).sin();
            // Simple LCG noise
            rng = rng.wrapping_mul(1103515245).wrapping_add(12345);
            let noise = (rng as f32 / u32::MAX as f32) * 2.0 - 1.0;
            (tone * 0.6 + noise * 0.4) * (1.0 - t).powf(0.8) * 0.3
        })
        .collect()
}

/// Simon correct: ascending C5 → E5 → G5 → C6.
#[cfg_attr(not(feature = "sound"), allow(dead_code))]
fn gen_correct() -> Vec<f32> {
    gen_notes(&[523.0, 659.0, 784.0, 1047.0], 0.09, 0.3)
}

/// Simon wrong: falling A4 → F#4 → Eb4.
#[cfg_attr(not(feature = "sound"), allow(dead_code))]
fn gen_wrong() -> Vec<f32> {
    gen_notes(&[440.0, 370.0, 311.0], 0.12, 0.3)
}

/// Decay stage crossed: descending whistle.
#[cfg_attr(not(feature = "sound"), allow(dead_code))]
fn gen_stage_drop() -> Vec<f32> {
    gen_sweep(600.0, 200.0, 0.2, 0.25)
}

/// Decay reached zero: long sad fall with a fade.
#[cfg_attr(not(feature = "sound"), allow(dead_code))]
fn gen_depleted() -> Vec<f32> {
    let mut samples = gen_notes(&[440.0, 370.0, 311.0, 261.0, 196.0], 0.16, 0.3);
    let total = samples.len();
    let fade_len = total / 3;
    for (i, s) in samples.iter_mut().enumerate().skip(total - fade_len) {
        *s *= (total - i) as f32 / fade_len as f32;
    }
    samples
}

// ════════════════════════════════════════════════════════════
//  WAV encoder: 16-bit PCM in memory for rodio
// ════════════════════════════════════════════════════════════

#[cfg_attr(not(feature = "sound"), allow(dead_code))]
fn make_wav(samples: &[f32]) -> Vec<u8> {
    let num_channels: u16 = 1;
    let bits_per_sample: u16 = 16;
    let byte_rate = SAMPLE_RATE * (num_channels as u32) * (bits_per_sample as u32) / 8;
    let block_align = num_channels * bits_per_sample / 8;
    let data_size = samples.len() as u32 * 2; // 16-bit = 2 bytes per sample
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(44 + data_size as usize);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes());  // PCM format
    buf.extend_from_slice(&num_channels.to_le_bytes());
    buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());

    for &s in samples {
        let val = (s.clamp(-1.0, 1.0) * 32767.0) as i16;
        buf.extend_from_slice(&val.to_le_bytes());
    }

    buf
}

// ════════════════════════════════════════════════════════════
//  Public API (no-op stub without the sound feature)
// ════════════════════════════════════════════════════════════

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> { Some(SoundEngine) }
    pub fn play_key(&self, _key: char) {}
    pub fn play_rejuvenate(&self) {}
    pub fn play_catch(&self) {}
    pub fn play_miss(&self) {}
    pub fn play_rapid(&self) {}
    pub fn play_single(&self) {}
    pub fn play_correct(&self) {}
    pub fn play_wrong(&self) {}
    pub fn play_stage(&self) {}
    pub fn play_depleted(&self) {}
    pub fn play_tick(&self) {}
}
