//! Speech synthesis backends.

use crate::config::VoiceConfig;
use crate::speech::{AlertTone, Synthesizer};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Text-to-speech engines tried by [`CommandVoice::detect`], in order.
const TTS_PROGRAMS: &[&str] = &["espeak-ng", "espeak", "say"];

/// Speaking rate at `rate = 1.0`.
const BASE_WORDS_PER_MINUTE: f32 = 160.0;

/// Audio players tried for the alert tone, in order.
const PLAYERS: &[&str] = &["aplay", "paplay", "afplay"];

/// Speaks through an external text-to-speech program.
///
/// Each line spawns a detached process; failures are logged and dropped.
pub struct CommandVoice {
    program: PathBuf,
    player: Option<PathBuf>,
    settings: VoiceConfig,
}

impl CommandVoice {
    pub fn new(program: impl Into<PathBuf>, settings: VoiceConfig) -> Self {
        Self {
            program: program.into(),
            player: PLAYERS.iter().find_map(|p| find_program(p)),
            settings,
        }
    }

    /// Use the configured command, or the first engine found on `PATH`.
    pub fn detect(settings: &VoiceConfig) -> Option<Self> {
        let program = match &settings.command {
            Some(command) => find_program(command)?,
            None => TTS_PROGRAMS.iter().find_map(|p| find_program(p))?,
        };
        Some(Self::new(program, settings.clone()))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments for one spoken line.
    pub fn speech_args(&self, text: &str, locale: &str) -> Vec<String> {
        let name = self
            .program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let words_per_minute = (BASE_WORDS_PER_MINUTE * self.settings.rate).round() as u32;

        if name == "say" {
            vec![
                "-r".to_string(),
                words_per_minute.to_string(),
                text.to_string(),
            ]
        } else {
            let language = locale.split('-').next().unwrap_or(locale).to_lowercase();
            let pitch = (50.0 * self.settings.pitch).round().clamp(0.0, 99.0) as u32;
            let amplitude = (100.0 * self.settings.volume).round().clamp(0.0, 200.0) as u32;
            vec![
                "-v".to_string(),
                language,
                "-s".to_string(),
                words_per_minute.to_string(),
                "-p".to_string(),
                pitch.to_string(),
                "-a".to_string(),
                amplitude.to_string(),
                text.to_string(),
            ]
        }
    }
}

impl Synthesizer for CommandVoice {
    fn speak(&self, text: &str, locale: &str) {
        tracing::info!(locale, "Speaking: {text}");
        spawn_detached(&self.program, &self.speech_args(text, locale));
    }

    fn play_tone(&self, tone: &AlertTone) {
        let Some(player) = &self.player else {
            tracing::debug!("No audio player found; alert tone skipped");
            return;
        };

        let path = std::env::temp_dir().join(format!("vigia-alert-{}.wav", std::process::id()));
        if let Err(e) = std::fs::write(&path, tone.to_wav()) {
            tracing::warn!("Failed to write alert tone: {e}");
            return;
        }
        spawn_detached(player, &[path.to_string_lossy().to_string()]);
    }
}

/// Prints spoken lines to the console.
#[derive(Debug, Clone, Default)]
pub struct LogVoice;

impl Synthesizer for LogVoice {
    fn speak(&self, text: &str, locale: &str) {
        tracing::info!(locale, "Speaking: {text}");
        println!("  VIGIA [{locale}]: {text}");
    }

    fn play_tone(&self, tone: &AlertTone) {
        let frequencies: Vec<String> = tone
            .partials
            .iter()
            .map(|p| format!("{:.0}Hz", p.frequency))
            .collect();
        println!("  *** ALARMA *** ({})", frequencies.join(" / "));
    }
}

fn spawn_detached(program: &Path, args: &[String]) {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    match child {
        Ok(mut child) => {
            // Reap in the background so the process never blocks the caller.
            std::thread::spawn(move || {
                let _ = child.wait();
            });
        }
        Err(e) => tracing::warn!(program = %program.display(), "Failed to spawn: {e}"),
    }
}

/// Resolve a program name against `PATH`. Paths are checked directly.
fn find_program(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(name))
            .find(|path| path.is_file())
    })
}
