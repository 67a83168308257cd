use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use crate::models::{PlaybackState, PlayerView};
use crate::playlist::PlaylistStore;

/// Cursor home + clear to end of screen
pub const CLEAR_SCREEN: &str = "\x1b[H\x1b[J";

/// Shown under the player screen
pub const KEY_LEGEND: &str = "(space) play/pause  (n) next  (l) loop  (q) quit";

pub const PROMPT: &str = "> ";

const MAX_NAME_CHARS: usize = 60;

/// Renders every screen of the text UI into strings
pub struct StatusDisplay;

impl StatusDisplay {
    /// The full player screen, without the clear sequence
    pub fn render_player(view: &PlayerView, bar_width: usize, message: Option<&str>) -> String {
        let mut out = String::new();

        let _ = writeln!(
            out,
            "current track [{}/{}]: {}",
            view.track_number,
            view.track_count,
            Self::truncate(&view.track_name, MAX_NAME_CHARS)
        );
        let _ = writeln!(out, "volume: {}%", (view.gain * 100.0).round() as i32);
        let _ = writeln!(out, "{}", Self::track_loop_message(view.track_loop));
        let _ = writeln!(out, "{}", Self::loop_message(view.playlist_loop));
        out.push('\n');

        let _ = write!(
            out,
            "{} {} / {}",
            Self::create_progress_bar(view.progress, bar_width),
            view.position_formatted(),
            crate::models::format_seconds(view.duration as u64)
        );
        if view.state == PlaybackState::Paused {
            out.push_str("  (paused)");
        }
        out.push_str("\n\n");

        out.push_str(KEY_LEGEND);
        out.push('\n');

        if let Some(message) = message.filter(|m| !m.is_empty()) {
            out.push_str(message);
            out.push('\n');
        }
        out
    }

    /// `[####----]` with `width` cells between the brackets
    pub fn create_progress_bar(progress: f32, width: usize) -> String {
        let progress = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let filled = ((progress * width as f32) as usize).min(width);
        format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
    }

    /// `list` output
    pub fn render_playlist(playlist: &PlaylistStore, root: &Path, recursive: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "current directory: {} (recursive={})",
            root.display(),
            u8::from(recursive)
        );

        if playlist.is_empty() {
            out.push_str("current playlist is empty\n");
            return out;
        }

        for (i, track) in playlist.iter().enumerate() {
            let _ = writeln!(
                out,
                "{:>3}. {}  [{}]",
                i + 1,
                track.path.display(),
                track.duration_formatted()
            );
            let _ = writeln!(out, "     {}", Self::truncate(&track.name, MAX_NAME_CHARS));
        }

        let _ = writeln!(
            out,
            "{} tracks, {}",
            playlist.len(),
            Self::format_duration(Duration::from_secs_f64(playlist.total_duration()))
        );
        out
    }

    pub fn help_text() -> &'static str {
        "\
play n          play track number n
play            play the first track
list            list the tracks of the current directory
loop            toggle playlist looping
volume percent  set the volume (integer 0-199), command mode only
clear           clear the screen
help            show this help
about           show information about the player
quit            exit
"
    }

    pub fn about_text() -> String {
        format!(
            "\
wavplay {}

A terminal player for uncompressed PCM .wav files (8, 16 and 24-bit).

The player has two modes. In command mode you type commands such as
`list` or `play 3` followed by enter. Starting a track switches to player
mode, where single keys control playback:

  {}

Leaving player mode with (q) returns to command mode.
",
            env!("CARGO_PKG_VERSION"),
            KEY_LEGEND
        )
    }

    /// First screen of command mode
    pub fn banner(track_count: usize) -> String {
        format!(
            "wavplay {} - {} track{} found\n(help) for possible commands\n",
            env!("CARGO_PKG_VERSION"),
            track_count,
            if track_count == 1 { "" } else { "s" }
        )
    }

    pub fn loop_message(enabled: bool) -> String {
        format!("playlistloop: {}", Self::enabled(enabled))
    }

    pub fn track_loop_message(enabled: bool) -> String {
        format!("looptrack: {}", Self::enabled(enabled))
    }

    fn enabled(flag: bool) -> &'static str {
        if flag {
            "enabled"
        } else {
            "disabled"
        }
    }

    /// Format duration as MM:SS or HH:MM:SS for longer spans
    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{:02}:{:02}", minutes, seconds)
        }
    }

    /// Truncate to `max_chars` characters, marking the cut with `...`
    pub fn truncate(s: &str, max_chars: usize) -> String {
        if s.chars().count() <= max_chars || max_chars <= 3 {
            return s.to_string();
        }
        let kept: String = s.chars().take(max_chars - 3).collect();
        format!("{}...", kept)
    }
}
