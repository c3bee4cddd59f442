//! Serialized text-to-speech playback.
//!
//! One worker task owns the queue: it takes the next text, asks the speech
//! synthesizer for PCM audio, plays it on the shared output and waits for
//! playback to finish before touching the next item. Failures are logged and
//! skipped so one bad item never stalls the queue.
//!
//! Gemini TTS answers with raw PCM16LE, mono, 24 kHz, base64-encoded.

use std::{future::Future, io::Cursor, sync::Arc, time::Duration};

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::gemini::{Gemini, GeminiSettings};
use crate::keystore::KeyStore;

pub const SAMPLE_RATE: u32 = 24_000;

/// Decoded mono PCM audio.
#[derive(Clone, Debug, PartialEq)]
pub struct PcmClip {
  pub samples: Vec<i16>,
  pub sample_rate: u32,
}

impl PcmClip {
  /// Decode base64 little-endian 16-bit samples.
  pub fn decode_base64(data: &str) -> Result<Self, AppError> {
    let bytes = B64
      .decode(data.trim())
      .map_err(|e| AppError::Internal(format!("audio is not valid base64: {}", e)))?;
    if bytes.len() % 2 != 0 {
      return Err(AppError::Internal("PCM16 audio has an odd byte length".into()));
    }
    let samples = bytes.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])).collect();
    Ok(Self { samples, sample_rate: SAMPLE_RATE })
  }

  pub fn duration(&self) -> Duration {
    if self.sample_rate == 0 {
      return Duration::ZERO;
    }
    Duration::from_nanos(self.samples.len() as u64 * 1_000_000_000 / self.sample_rate as u64)
  }

  /// 16-bit mono WAV container around the samples.
  pub fn to_wav(&self) -> Result<Vec<u8>, AppError> {
    let spec = hound::WavSpec {
      channels: 1,
      sample_rate: self.sample_rate,
      bits_per_sample: 16,
      sample_format: hound::SampleFormat::Int,
    };
    let wav_err = |e: hound::Error| AppError::Internal(format!("WAV encoding failed: {}", e));

    let mut cursor = Cursor::new(Vec::new());
    {
      let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(wav_err)?;
      for s in &self.samples {
        writer.write_sample(*s).map_err(wav_err)?;
      }
      writer.finalize().map_err(wav_err)?;
    }
    Ok(cursor.into_inner())
  }
}

/// Turns text into base64 PCM. `Ok(None)` means the service gave no audio.
pub trait SpeechSynth {
  fn synthesize(&self, text: &str) -> impl Future<Output = Result<Option<String>, AppError>> + Send;
}

/// A playback sink. `play` resolves once the clip has finished.
pub trait AudioOutput {
  fn play(&self, clip: PcmClip) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Handle to the playback worker. Cheap to clone.
#[derive(Clone)]
pub struct AudioQueue {
  tx: mpsc::UnboundedSender<String>,
}

impl AudioQueue {
  /// Start the single worker. `open_output` runs on the first clip only; the
  /// output it returns is reused for every later clip.
  pub fn spawn<S, O, F>(synth: S, open_output: F) -> Self
  where
    S: SpeechSynth + Send + Sync + 'static,
    O: AudioOutput + Send + Sync + 'static,
    F: Fn() -> Result<O, AppError> + Send + Sync + 'static,
  {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run_worker(rx, synth, open_output));
    Self { tx }
  }

  /// Queue `text` for playback. Empty text is ignored. Never blocks.
  pub fn enqueue(&self, text: &str) -> bool {
    if text.trim().is_empty() {
      return false;
    }
    match self.tx.send(text.to_string()) {
      Ok(()) => true,
      Err(_) => {
        warn!(target: "audio", "Audio worker is gone; dropping text");
        false
      }
    }
  }
}

async fn run_worker<S, O, F>(mut rx: mpsc::UnboundedReceiver<String>, synth: S, open_output: F)
where
  S: SpeechSynth,
  O: AudioOutput,
  F: Fn() -> Result<O, AppError>,
{
  let mut output: Option<O> = None;
  while let Some(text) = rx.recv().await {
    if let Err(e) = play_one(&synth, &open_output, &mut output, &text).await {
      warn!(target: "audio", error = %e, text_len = text.len(), "Skipping audio item");
    }
  }
  debug!(target: "audio", "Audio queue closed");
}

async fn play_one<S, O, F>(synth: &S, open_output: &F, output: &mut Option<O>, text: &str) -> Result<(), AppError>
where
  S: SpeechSynth,
  O: AudioOutput,
  F: Fn() -> Result<O, AppError>,
{
  let Some(data) = synth.synthesize(text).await? else {
    debug!(target: "audio", "No audio returned");
    return Ok(());
  };
  let clip = PcmClip::decode_base64(&data)?;

  if output.is_none() {
    *output = Some(open_output()?);
    info!(target: "audio", "Audio output opened");
  }
  match output.as_ref() {
    Some(out) => out.play(clip).await,
    None => Ok(()),
  }
}

/// Speech through Gemini TTS with whatever key is currently saved.
#[derive(Clone)]
pub struct GeminiSpeech {
  pub settings: Arc<GeminiSettings>,
  pub http: reqwest::Client,
  pub keys: KeyStore,
}

impl SpeechSynth for GeminiSpeech {
  async fn synthesize(&self, text: &str) -> Result<Option<String>, AppError> {
    let key = self.keys.require().await?;
    Gemini::new(self.http.clone(), self.settings.clone(), key).synthesize_speech(text).await
  }
}

/// A finished WAV clip as pushed to WebSocket listeners.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioChunk {
  pub mime_type: String,
  /// Base64 WAV bytes.
  pub data: String,
  pub duration_ms: u64,
}

impl AudioChunk {
  pub fn from_clip(clip: &PcmClip) -> Result<Self, AppError> {
    Ok(Self {
      mime_type: "audio/wav".into(),
      data: B64.encode(clip.to_wav()?),
      duration_ms: clip.duration().as_millis() as u64,
    })
  }
}

/// Output that hands every clip to connected clients.
///
/// With `pace` set, `play` waits for the clip's duration so the next clip is
/// only sent once this one has finished on the client.
pub struct BroadcastOutput {
  tx: broadcast::Sender<AudioChunk>,
  pace: bool,
}

impl BroadcastOutput {
  pub fn new(tx: broadcast::Sender<AudioChunk>, pace: bool) -> Self {
    Self { tx, pace }
  }
}

impl AudioOutput for BroadcastOutput {
  async fn play(&self, clip: PcmClip) -> Result<(), AppError> {
    let duration = clip.duration();
    let chunk = AudioChunk::from_clip(&clip)?;
    match self.tx.send(chunk) {
      Ok(n) => debug!(target: "audio", listeners = n, ?duration, "Clip broadcast"),
      Err(_) => debug!(target: "audio", "Clip dropped: no listeners"),
    }
    if self.pace {
      tokio::time::sleep(duration).await;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Mutex;

  fn pcm_b64(samples: &[i16]) -> String {
    let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    B64.encode(bytes)
  }

  #[derive(Clone, Default)]
  struct Log(Arc<Mutex<Vec<String>>>);

  impl Log {
    fn push(&self, s: String) {
      self.0.lock().unwrap().push(s);
    }
    fn take(&self) -> Vec<String> {
      self.0.lock().unwrap().clone()
    }
  }

  /// Encodes the text length as the single sample; "boom" fails.
  struct FakeSynth {
    log: Log,
  }

  impl SpeechSynth for FakeSynth {
    async fn synthesize(&self, text: &str) -> Result<Option<String>, AppError> {
      self.log.push(format!("synth:{text}"));
      tokio::time::sleep(Duration::from_millis(5)).await;
      if text == "boom" {
        return Err(AppError::Service("tts down".into()));
      }
      Ok(Some(pcm_b64(&[text.len() as i16])))
    }
  }

  struct FakeOutput {
    log: Log,
  }

  impl AudioOutput for FakeOutput {
    async fn play(&self, clip: PcmClip) -> Result<(), AppError> {
      self.log.push(format!("start:{}", clip.samples[0]));
      tokio::time::sleep(Duration::from_millis(10)).await;
      self.log.push(format!("end:{}", clip.samples[0]));
      Ok(())
    }
  }

  async fn wait_for(log: &Log, n: usize) {
    for _ in 0..200 {
      if log.take().len() >= n {
        return;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
  }

  #[test]
  fn pcm_decodes_little_endian() {
    let clip = PcmClip::decode_base64(&pcm_b64(&[1, -2, 300])).unwrap();
    assert_eq!(clip.samples, vec![1, -2, 300]);
    assert_eq!(clip.sample_rate, SAMPLE_RATE);
    assert!(PcmClip::decode_base64(&B64.encode([1u8, 2, 3])).is_err());
    assert!(PcmClip::decode_base64("not base64!").is_err());
  }

  #[test]
  fn clip_duration_and_wav_header() {
    let clip = PcmClip { samples: vec![0; 12_000], sample_rate: SAMPLE_RATE };
    assert_eq!(clip.duration(), Duration::from_millis(500));
    let wav = clip.to_wav().unwrap();
    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(&wav[8..12], b"WAVE");
    assert!(wav.len() > 24_000);
  }

  #[tokio::test]
  async fn queue_plays_in_order_without_overlap_and_skips_failures() {
    let log = Log::default();
    let opened = Arc::new(Mutex::new(0));
    let out_log = log.clone();
    let opened_c = opened.clone();
    let queue = AudioQueue::spawn(FakeSynth { log: log.clone() }, move || {
      *opened_c.lock().unwrap() += 1;
      Ok(FakeOutput { log: out_log.clone() })
    });

    assert!(!queue.enqueue("   "));
    for t in ["a", "boom", "ccc"] {
      assert!(queue.enqueue(t));
    }
    wait_for(&log, 7).await;

    assert_eq!(
      log.take(),
      vec!["synth:a", "start:1", "end:1", "synth:boom", "synth:ccc", "start:3", "end:3"]
    );
    assert_eq!(*opened.lock().unwrap(), 1);
  }

  #[tokio::test]
  async fn output_open_failure_is_retried_on_next_clip() {
    let log = Log::default();
    let attempts = Arc::new(Mutex::new(0));
    let attempts_c = attempts.clone();
    let out_log = log.clone();
    let queue = AudioQueue::spawn(FakeSynth { log: log.clone() }, move || {
      let mut n = attempts_c.lock().unwrap();
      *n += 1;
      if *n == 1 {
        Err(AppError::Internal("no device".into()))
      } else {
        Ok(FakeOutput { log: out_log.clone() })
      }
    });
    queue.enqueue("x");
    queue.enqueue("yy");
    wait_for(&log, 4).await;
    assert_eq!(log.take(), vec!["synth:x", "synth:yy", "start:2", "end:2"]);
  }

  #[tokio::test]
  async fn broadcast_output_sends_wav_chunks() {
    let (tx, mut rx) = broadcast::channel(4);
    let out = BroadcastOutput::new(tx, false);
    out.play(PcmClip { samples: vec![0; 2_400], sample_rate: SAMPLE_RATE }).await.unwrap();
    let chunk = rx.recv().await.unwrap();
    assert_eq!(chunk.mime_type, "audio/wav");
    assert_eq!(chunk.duration_ms, 100);
    let wav = B64.decode(chunk.data).unwrap();
    assert_eq!(&wav[0..4], b"RIFF");
  }
}
