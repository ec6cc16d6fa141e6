//! Synthesis through the platform's speech command
//!
//! espeak-ng/espeak on Linux, `say` on macOS and System.Speech through
//! PowerShell on Windows. Text is always passed on stdin.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};

use tracing::{info, warn};

use super::{select_voice, EngineFactory, SynthesisEngine, VoiceSettings};
use crate::error::{Error, Result};

/// Windows speaks at roughly this many words per minute at rate 0
const WINDOWS_BASE_WPM: i64 = 170;

const POWERSHELL_LIST_VOICES: &str = "Add-Type -AssemblyName System.Speech; \
    (New-Object System.Speech.Synthesis.SpeechSynthesizer).GetInstalledVoices() | \
    ForEach-Object { $_.VoiceInfo.Name }";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackendKind {
    Espeak,
    Say,
    PowerShell,
}

#[derive(Debug, Clone)]
struct Backend {
    kind: BackendKind,
    program: PathBuf,
}

impl Backend {
    fn detect() -> Option<Self> {
        let candidates: &[(&str, BackendKind)] = if cfg!(target_os = "macos") {
            &[("say", BackendKind::Say)]
        } else if cfg!(windows) {
            &[("powershell", BackendKind::PowerShell)]
        } else {
            &[("espeak-ng", BackendKind::Espeak), ("espeak", BackendKind::Espeak)]
        };

        candidates.iter().find_map(|(name, kind)| {
            which::which(name).ok().map(|program| Self {
                kind: *kind,
                program,
            })
        })
    }

    fn list_voices(&self) -> Result<Vec<String>> {
        let mut command = Command::new(&self.program);
        match self.kind {
            BackendKind::Espeak => command.arg("--voices"),
            BackendKind::Say => command.args(["-v", "?"]),
            BackendKind::PowerShell => command.args(["-NoProfile", "-Command", POWERSHELL_LIST_VOICES]),
        };

        let output = command.stderr(Stdio::null()).output()?;
        if !output.status.success() {
            return Err(Error::Tts(format!("voice listing exited with {}", output.status)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(match self.kind {
            BackendKind::Espeak => parse_espeak_voices(&stdout),
            BackendKind::Say => parse_say_voices(&stdout),
            BackendKind::PowerShell => stdout
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }
}

/// Columns: Pty Language Age/Gender VoiceName File Other
fn parse_espeak_voices(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().nth(3))
        .map(str::to_string)
        .collect()
}

/// `Name   locale   # sample sentence`; names may contain single spaces
fn parse_say_voices(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split("  ").next())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// One fully resolved speech command
#[derive(Debug, Clone, PartialEq)]
struct Invocation {
    program: PathBuf,
    args: Vec<String>,
    input: String,
}

/// Speaks by running the detected backend once per utterance
struct CommandEngine {
    backend: Backend,
    voice: Option<String>,
    rate: u32,
    volume: f32,
}

impl CommandEngine {
    fn invocation(&self, text: &str) -> Invocation {
        let mut args = Vec::new();
        let mut input = text.to_string();

        match self.backend.kind {
            BackendKind::Espeak => {
                args.extend(["-s".to_string(), self.rate.to_string()]);
                let amplitude = (self.volume * 200.0).round() as u32;
                args.extend(["-a".to_string(), amplitude.to_string()]);
                if let Some(voice) = &self.voice {
                    args.extend(["-v".to_string(), voice.clone()]);
                }
                args.push("--stdin".to_string());
            }
            BackendKind::Say => {
                args.extend(["-r".to_string(), self.rate.to_string()]);
                if let Some(voice) = &self.voice {
                    args.extend(["-v".to_string(), voice.clone()]);
                }
                args.extend(["-f".to_string(), "-".to_string()]);
                input = format!("[[volm {:.2}]] {text}", self.volume);
            }
            BackendKind::PowerShell => {
                let rate = ((i64::from(self.rate) - WINDOWS_BASE_WPM) / 20).clamp(-10, 10);
                let volume = (self.volume * 100.0).round() as u32;
                let select = self
                    .voice
                    .as_ref()
                    .map(|v| format!("$s.SelectVoice('{}'); ", v.replace('\'', "''")))
                    .unwrap_or_default();
                let script = format!(
                    "Add-Type -AssemblyName System.Speech; \
                     $s = New-Object System.Speech.Synthesis.SpeechSynthesizer; \
                     {select}$s.Rate = {rate}; $s.Volume = {volume}; \
                     $s.Speak([Console]::In.ReadToEnd())"
                );
                args.extend(["-NoProfile".to_string(), "-Command".to_string(), script]);
            }
        }

        Invocation {
            program: self.backend.program.clone(),
            args,
            input,
        }
    }
}

impl SynthesisEngine for CommandEngine {
    fn say(&mut self, text: &str) -> Result<()> {
        let invocation = self.invocation(text);
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let status = feed_and_wait(&mut child, &invocation.input)?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::Tts(format!(
                "{} exited with {status}",
                invocation.program.display()
            )))
        }
    }
}

/// Write `input` to the child's stdin and wait for it to exit
///
/// The child is reaped even when the write fails.
fn feed_and_wait(child: &mut Child, input: &str) -> io::Result<ExitStatus> {
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(input.as_bytes()) {
            drop(stdin);
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }
    }
    child.wait()
}

/// Builds [`CommandEngine`]s for the current platform
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandEngineFactory;

impl EngineFactory for CommandEngineFactory {
    fn create(&self, settings: &VoiceSettings) -> Result<Box<dyn SynthesisEngine>> {
        let backend = Backend::detect()
            .ok_or_else(|| Error::Tts("no speech synthesizer found on PATH".to_string()))?;

        let voices = backend.list_voices().unwrap_or_else(|e| {
            warn!(error = %e, "could not list voices, using engine default");
            Vec::new()
        });
        let voice = select_voice(&voices, &settings.preferred_voices).map(str::to_string);

        info!(
            program = %backend.program.display(),
            voice = voice.as_deref().unwrap_or("default"),
            rate = settings.rate,
            "synthesis engine ready"
        );

        Ok(Box::new(CommandEngine {
            backend,
            voice,
            rate: settings.rate,
            volume: settings.volume,
        }))
    }
}
