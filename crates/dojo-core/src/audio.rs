//! Sound cue playback seam.
//!
//! Engines fire cues and never wait on or inspect the result.

use serde::{Deserialize, Serialize};

/// Logical sound names the engines emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundCue {
    Coin,
    Purchase,
    HeartLost,
    HeartGain,
    HeartRegenerate,
    Streak,
}

impl SoundCue {
    pub fn as_str(&self) -> &'static str {
        match self {
            SoundCue::Coin => "coin",
            SoundCue::Purchase => "purchase",
            SoundCue::HeartLost => "heart_lost",
            SoundCue::HeartGain => "heart_gain",
            SoundCue::HeartRegenerate => "heart_regenerate",
            SoundCue::Streak => "streak",
        }
    }
}

/// Fire-and-forget audio output.
pub trait AudioPlayer: Send + Sync {
    fn play(&self, cue: SoundCue);
}

/// Discards every cue.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentAudio;

impl AudioPlayer for SilentAudio {
    fn play(&self, _cue: SoundCue) {}
}

/// Emits each cue as a debug-level trace event. Used by headless front ends.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAudio;

impl AudioPlayer for TracingAudio {
    fn play(&self, cue: SoundCue) {
        tracing::debug!(component = "AudioPlayer", cue = cue.as_str(), "play sound");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cue_names_match_serde() {
        for cue in [
            SoundCue::Coin,
            SoundCue::Purchase,
            SoundCue::HeartLost,
            SoundCue::HeartGain,
            SoundCue::HeartRegenerate,
            SoundCue::Streak,
        ] {
            let json = serde_json::to_string(&cue).unwrap();
            assert_eq!(json, format!("\"{}\"", cue.as_str()));
        }
    }
}
