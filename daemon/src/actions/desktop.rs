//! Default desktop implementation of the action providers

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use chrono::{Local, NaiveDateTime};
use tracing::{debug, info, warn};

use super::keys::{parse_combo, press_combo, press_repeated, volume_key};
use super::lookup::{default_search_dirs, resolve_target};
use super::system_info::SystemInfo;
use super::{ActionResult, PowerAction, SystemActions, VolumeAction};
use crate::config::ActionsConfig;
use crate::error::{Error, Result};

const WINDOWS_SCREENSHOT_SCRIPT: &str = "Add-Type -AssemblyName System.Windows.Forms,System.Drawing; \
    $b = [System.Windows.Forms.SystemInformation]::VirtualScreen; \
    $bmp = New-Object System.Drawing.Bitmap $b.Width, $b.Height; \
    $g = [System.Drawing.Graphics]::FromImage($bmp); \
    $g.CopyFromScreen($b.Left, $b.Top, 0, 0, $bmp.Size); \
    $bmp.Save($args[0], [System.Drawing.Imaging.ImageFormat]::Png)";

/// Starts external programs on behalf of the providers
pub trait Launcher: Send + Sync {
    /// Start a program without waiting for it
    fn spawn(&self, program: &str, args: &[String]) -> io::Result<()>;

    /// Run a program to completion; non-zero exit is an error
    fn run(&self, program: &str, args: &[String]) -> io::Result<()>;

    /// Open a URL in the default browser
    fn browse(&self, url: &str) -> io::Result<()>;
}

/// Launches real processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn spawn(&self, program: &str, args: &[String]) -> io::Result<()> {
        debug!(program, ?args, "spawning");
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(drop)
    }

    fn run(&self, program: &str, args: &[String]) -> io::Result<()> {
        debug!(program, ?args, "running");
        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("{program} exited with {status}")))
        }
    }
    fn browse(&self, url: &str) -> io::Result<()> {
        debug!(url, "opening browser");
        webbrowser::open(url)
    }
}

/// Platform command that opens a path with its default handler
fn open_command(target: &str) -> (String, Vec<String>) {
    if cfg!(windows) {
        (
            "cmd".to_string(),
            vec!["/C".to_string(), "start".to_string(), String::new(), target.to_string()],
        )
    } else if cfg!(target_os = "macos") {
        ("open".to_string(), vec![target.to_string()])
    } else {
        ("xdg-open".to_string(), vec![target.to_string()])
    }
}

/// Platform command for a power action with the given grace period
fn power_command(action: PowerAction, grace_secs: u32) -> (String, Vec<String>) {
    let args: Vec<String> = if cfg!(windows) {
        match action {
            PowerAction::Shutdown => vec!["/s".into(), "/t".into(), grace_secs.to_string()],
            PowerAction::Restart => vec!["/r".into(), "/t".into(), grace_secs.to_string()],
            PowerAction::Cancel => vec!["/a".into()],
        }
    } else {
        let minutes = format!("+{}", grace_secs.div_ceil(60));
        match action {
            PowerAction::Shutdown => vec!["-h".into(), minutes],
            PowerAction::Restart => vec!["-r".into(), minutes],
            PowerAction::Cancel if cfg!(target_os = "macos") => {
                return ("killall".to_string(), vec!["shutdown".to_string()]);
            }
            PowerAction::Cancel => vec!["-c".into()],
        }
    };
    ("shutdown".to_string(), args)
}

/// "1 minute", "2 minutes" or "45 seconds"
fn describe_grace(secs: u32) -> String {
    match secs {
        60 => "1 minute".to_string(),
        s if s % 60 == 0 => format!("{} minutes", s / 60),
        s => format!("{s} seconds"),
    }
}

/// `echo_screenshot_YYYYMMDD_HHMMSS.png`
pub(crate) fn screenshot_file_name(now: NaiveDateTime) -> String {
    format!("echo_screenshot_{}.png", now.format("%Y%m%d_%H%M%S"))
}

/// First available screen-capture tool writing to `path`
fn screenshot_command(path: &Path) -> Option<(String, Vec<String>)> {
    let out = path.to_string_lossy().into_owned();

    if cfg!(windows) {
        return Some((
            "powershell".to_string(),
            vec![
                "-NoProfile".to_string(),
                "-Command".to_string(),
                WINDOWS_SCREENSHOT_SCRIPT.to_string(),
                out,
            ],
        ));
    }
    if cfg!(target_os = "macos") {
        return Some(("screencapture".to_string(), vec!["-x".to_string(), out]));
    }

    let wayland = std::env::var_os("WAYLAND_DISPLAY").is_some();
    let candidates: Vec<(&str, Vec<String>)> = vec![
        ("grim", vec![out.clone()]),
        ("gnome-screenshot", vec!["-f".to_string(), out.clone()]),
        ("spectacle", vec!["-b".into(), "-n".into(), "-o".into(), out.clone()]),
        ("scrot", vec![out.clone()]),
        ("import", vec!["-window".into(), "root".into(), out]),
    ];

    candidates
        .into_iter()
        .filter(|(program, _)| wayland || *program != "grim")
        .find(|(program, _)| which::which(program).is_ok())
        .map(|(program, args)| (program.to_string(), args))
}

/// Action providers backed by the local desktop session
pub struct DesktopActions {
    launcher: Box<dyn Launcher>,
    working_dir: PathBuf,
    home: PathBuf,
    desktop: PathBuf,
    search_dirs: Vec<PathBuf>,
    volume_presses: u32,
    power_grace_secs: u32,
    list_limit: usize,
}

impl DesktopActions {
    /// Providers rooted at `home` and `working_dir`
    pub fn new(home: PathBuf, working_dir: PathBuf, cfg: &ActionsConfig) -> Self {
        let desktop = home.join("Desktop");
        let search_dirs = cfg
            .search_dirs
            .clone()
            .unwrap_or_else(|| default_search_dirs(&home));

        Self {
            launcher: Box::new(SystemLauncher),
            working_dir,
            home,
            desktop,
            search_dirs,
            volume_presses: cfg.volume_presses,
            power_grace_secs: cfg.power_grace_secs,
            list_limit: cfg.list_limit,
        }
    }

    /// Providers for the current user's session
    pub fn from_config(cfg: &ActionsConfig, working_dir: PathBuf) -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".to_string()))?;
        let mut actions = Self::new(home, working_dir, cfg);
        if let Some(desktop) = dirs::desktop_dir() {
            actions.desktop = desktop;
        }
        Ok(actions)
    }

    /// Replace the process launcher
    pub fn with_launcher(mut self, launcher: Box<dyn Launcher>) -> Self {
        self.launcher = launcher;
        self
    }

    fn open_path(&self, path: &Path) -> io::Result<()> {
        let (program, args) = open_command(&path.to_string_lossy());
        self.launcher.spawn(&program, &args)
    }

    fn resolve_dir(&self, dir: &Path) -> PathBuf {
        if let Ok(rest) = dir.strip_prefix("~") {
            self.home.join(rest)
        } else if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.working_dir.join(dir)
        }
    }
}

impl SystemActions for DesktopActions {
    fn open_target(&self, target: &str) -> ActionResult {
        let target = target.trim();
        let Some(path) = resolve_target(target, &self.working_dir, &self.home, &self.search_dirs)
        else {
            return ActionResult::failed(format!(
                "Couldn't find {target}. Please provide more details."
            ));
        };

        if let Err(e) = self.open_path(&path) {
            warn!(path = %path.display(), error = %e, "open failed");
            return ActionResult::failed(format!("Couldn't open {}", path.display()));
        }

        info!(target, path = %path.display(), "opened");
        let shown = path.display();
        let exact = self.resolve_dir(Path::new(target)) == path;
        if !exact {
            ActionResult::ok(format!("Opened: {shown}"))
        } else if path.is_dir() {
            ActionResult::ok(format!("Opened folder: {shown}"))
        } else {
            ActionResult::ok(format!("Opened file: {shown}"))
        }
    }

    fn open_url(&self, url: &str) -> ActionResult {
        match self.launcher.browse(url) {
            Ok(()) => ActionResult::ok(format!("Opening {url}")),
            Err(e) => {
                warn!(url, error = %e, "browser launch failed");
                ActionResult::failed(format!("Couldn't open {url}"))
            }
        }
    }

    fn system_info(&self) -> ActionResult {
        ActionResult::ok(SystemInfo::collect().report())
    }

    fn screenshot(&self) -> ActionResult {
        let path = self
            .desktop
            .join(screenshot_file_name(Local::now().naive_local()));

        let Some((program, args)) = screenshot_command(&path) else {
            warn!("no screenshot tool available");
            return ActionResult::failed("Couldn't take screenshot");
        };

        match self.launcher.run(&program, &args) {
            Ok(()) if path.exists() => {
                ActionResult::ok(format!("Screenshot saved to {}", path.display()))
            }
            Ok(()) => ActionResult::failed("Couldn't take screenshot"),
            Err(e) => {
                warn!(program, error = %e, "screenshot failed");
                ActionResult::failed("Couldn't take screenshot")
            }
        }
    }

    fn list_files(&self, dir: Option<&Path>) -> ActionResult {
        let dir = dir
            .map(|d| self.resolve_dir(d))
            .unwrap_or_else(|| self.working_dir.clone());

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                return ActionResult::failed(format!(
                    "Couldn't list files in {}: {e}",
                    dir.display()
                ))
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        if names.is_empty() {
            return ActionResult::ok(format!("No files in {}", dir.display()));
        }
        names.sort();

        let listing = names
            .iter()
            .take(self.list_limit)
            .enumerate()
            .map(|(i, name)| format!("{}. {name}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");
        ActionResult::ok(listing)
    }

    fn volume(&self, action: VolumeAction) -> ActionResult {
        let presses = match action {
            VolumeAction::Up | VolumeAction::Down => self.volume_presses,
            VolumeAction::ToggleMute | VolumeAction::Unmute => 1,
        };

        match press_repeated(volume_key(action), presses) {
            Ok(()) => ActionResult::ok(match action {
                VolumeAction::Up => "Volume increased",
                VolumeAction::Down => "Volume decreased",
                VolumeAction::ToggleMute | VolumeAction::Unmute => "Toggled mute",
            }),
            Err(e) => {
                warn!(?action, error = %e, "volume control failed");
                ActionResult::failed("Couldn't control volume")
            }
        }
    }

    fn power(&self, action: PowerAction) -> ActionResult {
        let (program, args) = power_command(action, self.power_grace_secs);
        if let Err(e) = self.launcher.spawn(&program, &args) {
            warn!(?action, error = %e, "power command failed");
            return ActionResult::failed("Couldn't control shutdown/restart");
        }

        let grace = describe_grace(self.power_grace_secs);
        ActionResult::ok(match action {
            PowerAction::Shutdown => format!("Shutting down in {grace}"),
            PowerAction::Restart => format!("Restarting in {grace}"),
            PowerAction::Cancel => "Canceled shutdown/restart".to_string(),
        })
    }

    fn create_file(&self, name: &str, content: &str) -> ActionResult {
        let path = self.working_dir.join(name);
        if path.exists() {
            return ActionResult::failed(format!("File {name} already exists"));
        }

        match fs::write(&path, content) {
            Ok(()) => ActionResult::ok(format!("Created file: {name}")),
            Err(e) => ActionResult::failed(format!("Couldn't create file {name}: {e}")),
        }
    }

    fn send_keystroke(&self, keys: &[String]) -> ActionResult {
        let combo = keys.join("+");
        let parsed = match parse_combo(keys) {
            Ok(parsed) => parsed,
            Err(unknown) => {
                return ActionResult::failed(format!(
                    "Couldn't send keystroke: unknown key {unknown}"
                ))
            }
        };

        match press_combo(&parsed) {
            Ok(()) => ActionResult::ok(format!("Sent keystroke: {combo}")),
            Err(e) => {
                warn!(combo, error = %e, "keystroke failed");
                ActionResult::failed("Couldn't send keystroke")
            }
        }
    }
}
