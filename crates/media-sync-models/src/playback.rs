use serde::{Deserialize, Serialize};

/// Playback heuristics used to turn a resume position into watched state.
///
/// The defaults are tuned values and are kept configurable rather than derived.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PlaybackThresholds {
    /// A file watched past this percentage counts as watched
    #[serde(default = "default_watched_percent")]
    pub watched_percent: f32,
    /// For a file holding two episodes, the position (in percent of the file)
    /// where the second episode begins
    #[serde(default = "default_double_episode_split_percent")]
    pub double_episode_split_percent: f32,
}

fn default_watched_percent() -> f32 {
    80.0
}

fn default_double_episode_split_percent() -> f32 {
    50.0
}

impl Default for PlaybackThresholds {
    fn default() -> Self {
        Self {
            watched_percent: default_watched_percent(),
            double_episode_split_percent: default_double_episode_split_percent(),
        }
    }
}

impl PlaybackThresholds {
    pub fn counts_as_watched(&self, progress: f32) -> bool {
        progress >= self.watched_percent
    }

    /// Split the progress of a double-episode file into per-episode progress.
    ///
    /// The first episode covers `[0, split)` and the second `[split, 100]`;
    /// each half is rescaled to 0-100 so it can be judged on its own.
    pub fn split_double_episode(&self, progress: f32) -> (f32, f32) {
        let split = self.double_episode_split_percent.clamp(1.0, 99.0);
        let progress = progress.clamp(0.0, 100.0);
        if progress < split {
            (progress / split * 100.0, 0.0)
        } else {
            (100.0, (progress - split) / (100.0 - split) * 100.0)
        }
    }
}
