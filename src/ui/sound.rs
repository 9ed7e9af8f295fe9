/// Sound engine: small FM-synth effects via rodio, one per game event.
///
/// Every effect is rendered into an in-memory WAV buffer at startup;
/// playback is fire-and-forget through a detached rodio `Sink`.
///
/// Without the "sound" feature the stub `SoundEngine` does nothing.

#[cfg(feature = "sound")]
mod inner {
    use std::f32::consts::TAU;
    use std::io::Cursor;
    use std::sync::Arc;

    use rodio::{OutputStream, OutputStreamHandle, Sink};

    const SAMPLE_RATE: u32 = 22050;

    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        sfx_gem: Arc<Vec<u8>>,
        sfx_ground: Arc<Vec<u8>>,
        sfx_push: Arc<Vec<u8>>,
        sfx_gameover: Arc<Vec<u8>>,
        sfx_won: Arc<Vec<u8>>,
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

            Some(SoundEngine {
                _stream: stream,
                handle,
                sfx_gem: Arc::new(make_wav(&gen_bling())),
                sfx_ground: Arc::new(make_wav(&gen_rock())),
                sfx_push: Arc::new(make_wav(&gen_push())),
                sfx_gameover: Arc::new(make_wav(&gen_gameover())),
                sfx_won: Arc::new(make_wav(&gen_fanfare())),
            })
        }

        fn play(&self, buf: &Arc<Vec<u8>>) {
            let sink = match Sink::try_new(&self.handle) {
                Ok(s) => s,
                Err(e) => {
                    log::debug!("sink unavailable: {e}");
                    return;
                }
            };
            if let Ok(src) = rodio::Decoder::new(Cursor::new(buf.as_ref().clone())) {
                sink.append(src);
                sink.detach(); // fire-and-forget
            }
        }

        pub fn play_gem(&self) { self.play(&self.sfx_gem); }
        pub fn play_ground(&self) { self.play(&self.sfx_ground); }
        pub fn play_push(&self) { self.play(&self.sfx_push); }
        pub fn play_gameover(&self) { self.play(&self.sfx_gameover); }
        pub fn play_won(&self) { self.play(&self.sfx_won); }
    }

    // ════════════════════════════════════════════════════════════
    //  Synthesis: all generators produce Vec<f32> mono samples
    // ════════════════════════════════════════════════════════════

    /// Frequency of a note name like `C6`, `D#3` or `A0` (A4 = 440 Hz).
    fn note_freq(note: &str) -> Option<f32> {
        const NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
        let (split, _) = note.char_indices().last()?;
        let (name, octave) = note.split_at(split);
        let octave: i32 = octave.parse().ok()?;
        let idx = NAMES.iter().position(|n| *n == name)? as i32;
        let midi = (octave + 1) * 12 + idx;
        Some(440.0 * 2f32.powf((midi - 69) as f32 / 12.0))
    }

    #[derive(Clone, Copy)]
    enum Wave {
        Sine,
        Saw,
    }

    fn osc(wave: Wave, phase: f32) -> f32 {
        match wave {
            Wave::Sine => (phase * TAU).sin(),
            Wave::Saw => 2.0 * (phase - phase.floor()) - 1.0,
        }
    }

    /// One FM voice: the modulator runs at `freq * ratio` and swings the
    /// carrier frequency by `freq * depth`.
    struct Voice {
        freq: f32,
        ratio: f32,
        depth: f32,
        carrier: Wave,
        modulator: Wave,
    }

    impl Voice {
        /// Render `duration` seconds, shaping amplitude with `env(t)` where
        /// `t` runs 0..1 over the note.
        fn render(&self, duration: f32, env: impl Fn(f32) -> f32) -> Vec<f32> {
            let n = (SAMPLE_RATE as f32 * duration) as usize;
            let dt = 1.0 / SAMPLE_RATE as f32;
            let mut carrier_phase = 0.0_f32;
            (0..n)
                .map(|i| {
                    let t = i as f32 * dt;
                    let m = osc(self.modulator, t * self.freq * self.ratio);
                    carrier_phase += (self.freq + m * self.freq * self.depth) * dt;
                    osc(self.carrier, carrier_phase) * env(i as f32 / n as f32)
                })
                .collect()
        }
    }

    /// One-pole low-pass, for the muffled rock sounds.
    fn low_pass(samples: &mut [f32], cutoff: f32) {
        let rc = 1.0 / (cutoff * TAU);
        let dt = 1.0 / SAMPLE_RATE as f32;
        let alpha = dt / (rc + dt);
        let mut prev = 0.0;
        for s in samples.iter_mut() {
            prev += alpha * (*s - prev);
            *s = prev;
        }
    }

    fn tone(note: &str, ratio: f32, depth: f32, carrier: Wave, modulator: Wave) -> Voice {
        Voice {
            freq: note_freq(note).unwrap_or(440.0),
            ratio,
            depth,
            carrier,
            modulator,
        }
    }

    /// Gem: bright bell on C6, fading over a quarter second.
    fn gen_bling() -> Vec<f32> {
        let mut s = tone("C6", 12.0, 4.0, Wave::Sine, Wave::Sine).render(0.25, |t| (1.0 - t) * 0.3);
        low_pass(&mut s, 800.0);
        s
    }

    /// Ground: low sawtooth thud.
    fn gen_rock() -> Vec<f32> {
        let mut s = tone("A0", 2.0, 2.0, Wave::Saw, Wave::Saw).render(0.25, |t| (1.0 - t) * 0.6);
        low_pass(&mut s, 350.0);
        s
    }

    /// Push: scrape that swells instead of fading.
    fn gen_push() -> Vec<f32> {
        let mut s = tone("C0", 2.0, 2.0, Wave::Saw, Wave::Sine).render(0.25, |t| (0.5 + t * 0.5) * 0.5);
        low_pass(&mut s, 350.0);
        s
    }

    /// Game over: four falling notes.
    fn gen_gameover() -> Vec<f32> {
        let mut samples = Vec::new();
        for note in ["D#3", "D3", "A#2", "G2"] {
            let voice = tone(note, 24.0, 4.0, Wave::Sine, Wave::Sine);
            samples.extend(voice.render(0.25, |t| (1.0 - t) * 0.3));
        }
        low_pass(&mut samples, 800.0);
        samples
    }

    /// Won: ascending fanfare with a held last note.
    fn gen_fanfare() -> Vec<f32> {
        let mut samples = Vec::new();
        for note in ["C5", "E5", "G5"] {
            let voice = tone(note, 2.0, 0.5, Wave::Sine, Wave::Sine);
            samples.extend(voice.render(0.1, |t| (1.0 - t * 0.3) * 0.3));
        }
        let last = tone("C6", 2.0, 0.5, Wave::Sine, Wave::Sine);
        samples.extend(last.render(0.35, |t| (1.0 - t) * 0.3));
        samples
    }

    // ════════════════════════════════════════════════════════════
    //  WAV encoder: 16-bit mono PCM
    // ════════════════════════════════════════════════════════════

    fn make_wav(samples: &[f32]) -> Vec<u8> {
        let channels: u16 = 1;
        let bits: u16 = 16;
        let block_align = channels * bits / 8;
        let byte_rate = SAMPLE_RATE * block_align as u32;
        let data_size = samples.len() as u32 * block_align as u32;

        let mut buf = Vec::with_capacity(44 + data_size as usize);
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&(36 + data_size).to_le_bytes());
        buf.extend_from_slice(b"WAVEfmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&channels.to_le_bytes());
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        buf.extend_from_slice(&byte_rate.to_le_bytes());
        buf.extend_from_slice(&block_align.to_le_bytes());
        buf.extend_from_slice(&bits.to_le_bytes());
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_size.to_le_bytes());

        for &s in samples {
            let val = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            buf.extend_from_slice(&val.to_le_bytes());
        }
        buf
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn note_frequencies() {
            assert!((note_freq("A4").unwrap() - 440.0).abs() < 0.01);
            assert!((note_freq("C6").unwrap() - 1046.5).abs() < 0.1);
            assert!((note_freq("A0").unwrap() - 27.5).abs() < 0.01);
            assert!((note_freq("D#3").unwrap() - 155.56).abs() < 0.05);
            assert_eq!(note_freq("H2"), None);
            assert_eq!(note_freq(""), None);
        }

        #[test]
        fn wav_header_matches_payload() {
            let wav = make_wav(&[0.0, 1.0, -1.0]);
            assert_eq!(&wav[0..4], b"RIFF");
            assert_eq!(&wav[8..16], b"WAVEfmt ");
            assert_eq!(wav.len(), 44 + 6);
            assert_eq!(u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]), 6);
            assert_eq!(i16::from_le_bytes([wav[46], wav[47]]), i16::MAX);
        }

        #[test]
        fn effects_stay_in_range() {
            for sfx in [gen_bling(), gen_rock(), gen_push(), gen_gameover(), gen_fanfare()] {
                assert!(!sfx.is_empty());
                assert!(sfx.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
            }
        }

        #[test]
        fn gameover_is_four_quarter_second_notes() {
            let n = (SAMPLE_RATE as f32 * 0.25) as usize;
            assert_eq!(gen_gameover().len(), 4 * n);
        }
    }
}

// ════════════════════════════════════════════════════════════
//  Public API: compiles to no-ops when sound feature is off
// ════════════════════════════════════════════════════════════

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> { Some(SoundEngine) }
    pub fn play_gem(&self) {}
    pub fn play_ground(&self) {}
    pub fn play_push(&self) {}
    pub fn play_gameover(&self) {}
    pub fn play_won(&self) {}
}
