use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::error::{PixieError, Result};
use crate::interfaces::system::{Launcher, SystemKey};

#[cfg(target_os = "linux")]
const AUDIO_PLAYERS: &[&[&str]] = &[
    &["mpv", "--no-video", "--really-quiet"],
    &["ffplay", "-nodisp", "-autoexit", "-loglevel", "quiet"],
    &["mpg123", "-q"],
];
#[cfg(target_os = "macos")]
const AUDIO_PLAYERS: &[&[&str]] = &[&["afplay"]];
#[cfg(target_os = "windows")]
const AUDIO_PLAYERS: &[&[&str]] = &[&["ffplay", "-nodisp", "-autoexit", "-loglevel", "quiet"]];
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const AUDIO_PLAYERS: &[&[&str]] = &[];

/// Desktop actions through platform commands.
#[derive(Debug, Clone, Default)]
pub struct SystemLauncher {
    audio_player: Option<String>,
}

fn spawn_detached(program: &str, args: &[&str]) -> Result<()> {
    debug!(program, ?args, "Spawning");
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
        .map_err(|e| PixieError::Runtime(format!("Failed to start {program}: {e}")))
}

async fn run_to_completion(program: String, args: Vec<String>) -> Result<bool> {
    debug!(program = %program, ?args, "Running");
    let label = program.clone();
    tokio::task::spawn_blocking(move || {
        Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
    })
    .await
    .map_err(|e| PixieError::Runtime(e.to_string()))?
    .map(|status| status.success())
    .map_err(|e| PixieError::Runtime(format!("Failed to run {label}: {e}")))
}

static PROCESS_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9._+-]+$").unwrap());

/// Executable name for an application the way `open_app` launches it.
/// Names that are shorter than two characters or carry wildcard or pattern
/// characters are rejected.
pub fn process_name(app: &str) -> Result<String> {
    let name = app.trim().to_lowercase().replace(' ', "-");
    if !PROCESS_NAME_RE.is_match(&name) {
        return Err(PixieError::Runtime(format!(
            "Refusing to close '{}': not an exact application name",
            app.trim()
        )));
    }
    Ok(name)
}

fn owned(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| arg.to_string()).collect()
}

impl SystemLauncher {
    pub fn new(audio_player: Option<String>) -> Self {
        Self { audio_player }
    }

    fn open_target(target: &str) -> Result<()> {
        if target.trim().is_empty() {
            return Ok(());
        }
        #[cfg(target_os = "windows")]
        {
            spawn_detached("cmd", &["/C", "start", "", target])
        }
        #[cfg(target_os = "macos")]
        {
            spawn_detached("open", &[target])
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            spawn_detached("xdg-open", &[target])
        }
    }

    fn system_key_command(key: SystemKey) -> Vec<String> {
        #[cfg(target_os = "macos")]
        {
            let script = match key {
                SystemKey::Mute => "set volume output muted true",
                SystemKey::Unmute => "set volume output muted false",
                SystemKey::VolumeUp => {
                    "set volume output volume ((output volume of (get volume settings)) + 10)"
                }
                SystemKey::VolumeDown => {
                    "set volume output volume ((output volume of (get volume settings)) - 10)"
                }
            };
            owned(&["osascript", "-e", script])
        }
        #[cfg(target_os = "windows")]
        {
            let code = match key {
                SystemKey::Mute | SystemKey::Unmute => 173,
                SystemKey::VolumeDown => 174,
                SystemKey::VolumeUp => 175,
            };
            vec![
                "powershell".to_string(),
                "-NoProfile".to_string(),
                "-Command".to_string(),
                format!("(New-Object -ComObject WScript.Shell).SendKeys([char]{code})"),
            ]
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let tail: &[&str] = match key {
                SystemKey::Mute => &["set-sink-mute", "@DEFAULT_SINK@", "1"],
                SystemKey::Unmute => &["set-sink-mute", "@DEFAULT_SINK@", "0"],
                SystemKey::VolumeUp => &["set-sink-volume", "@DEFAULT_SINK@", "+10%"],
                SystemKey::VolumeDown => &["set-sink-volume", "@DEFAULT_SINK@", "-10%"],
            };
            let mut command = vec!["pactl".to_string()];
            command.extend(owned(tail));
            command
        }
    }

    fn player_commands(&self) -> Vec<Vec<String>> {
        match &self.audio_player {
            Some(player) => vec![player.split_whitespace().map(str::to_string).collect()],
            None => AUDIO_PLAYERS.iter().map(|cmd| owned(cmd)).collect(),
        }
    }
}

#[async_trait]
impl Launcher for SystemLauncher {
    async fn open_url(&self, url: &str) -> Result<()> {
        info!(url, "Opening URL");
        Self::open_target(url)
    }

    async fn open_app(&self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PixieError::Runtime("No application name given".to_string()));
        }
        info!(app = name, "Opening application");
        #[cfg(target_os = "macos")]
        {
            if run_to_completion("open".to_string(), owned(&["-a", name])).await? {
                return Ok(());
            }
            Err(PixieError::Runtime(format!("Application not found: {name}")))
        }
        #[cfg(target_os = "windows")]
        {
            spawn_detached("cmd", &["/C", "start", "", name])
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let binary = name.to_lowercase().replace(' ', "-");
            spawn_detached(&binary, &[])
        }
    }

    async fn close_app(&self, name: &str) -> Result<()> {
        let process = process_name(name)?;
        info!(app = %process, "Closing application");
        #[cfg(target_os = "windows")]
        let (program, args) = (
            "taskkill".to_string(),
            vec![
                "/IM".to_string(),
                format!("{process}.exe"),
                "/F".to_string(),
            ],
        );
        // Exact, case-insensitive match on the process name only.
        #[cfg(not(target_os = "windows"))]
        let (program, args) = (
            "pkill".to_string(),
            vec!["-x".to_string(), "-i".to_string(), regex::escape(&process)],
        );

        if run_to_completion(program, args).await? {
            Ok(())
        } else {
            Err(PixieError::Runtime(format!(
                "No running application named {process}"
            )))
        }
    }

    async fn open_file(&self, path: &Path) -> Result<()> {
        Self::open_target(&path.display().to_string())
    }

    async fn open_in_editor(&self, path: &Path) -> Result<()> {
        #[cfg(target_os = "windows")]
        {
            spawn_detached("notepad.exe", &[&path.display().to_string()])
        }
        #[cfg(target_os = "macos")]
        {
            spawn_detached("open", &["-t", &path.display().to_string()])
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            Self::open_target(&path.display().to_string())
        }
    }

    async fn system_key(&self, key: SystemKey) -> Result<()> {
        let mut command = Self::system_key_command(key);
        if command.is_empty() {
            return Err(PixieError::Runtime("Unsupported system key".to_string()));
        }
        let program = command.remove(0);
        if run_to_completion(program.clone(), command).await? {
            Ok(())
        } else {
            Err(PixieError::Runtime(format!("{program} reported failure for {key:?}")))
        }
    }

    /// Plays the file with the first player that runs successfully; waits for playback.
    async fn play_audio(&self, path: &Path) -> Result<()> {
        let target: PathBuf = path.to_path_buf();
        for mut command in self.player_commands() {
            if command.is_empty() {
                continue;
            }
            let program = command.remove(0);
            command.push(target.display().to_string());
            match run_to_completion(program.clone(), command).await {
                Ok(true) => return Ok(()),
                Ok(false) => debug!(player = %program, "Audio player exited with failure"),
                Err(err) => debug!(player = %program, error = %err, "Audio player unavailable"),
            }
        }
        Err(PixieError::Runtime(
            "No audio player available; set AudioPlayer in .env".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_player_overrides_defaults() {
        let launcher = SystemLauncher::new(Some("mpv --volume=80".to_string()));
        assert_eq!(
            launcher.player_commands(),
            vec![vec!["mpv".to_string(), "--volume=80".to_string()]]
        );
    }

    #[test]
    fn system_keys_map_to_commands() {
        for key in [
            SystemKey::Mute,
            SystemKey::Unmute,
            SystemKey::VolumeUp,
            SystemKey::VolumeDown,
        ] {
            assert!(!SystemLauncher::system_key_command(key).is_empty());
        }
    }

    #[test]
    fn close_targets_must_be_exact_names() {
        assert_eq!(process_name(" Google Chrome ").unwrap(), "google-chrome");
        assert_eq!(process_name("code").unwrap(), "code");
        assert_eq!(process_name("libreoffice7.6").unwrap(), "libreoffice7.6");
        for pattern in ["e", ".", "", "  ", ".*", "fire*", "a|b", "[ch]rome", "^x"] {
            assert!(process_name(pattern).is_err(), "{pattern:?} should be rejected");
        }
    }

    #[tokio::test]
    async fn single_letter_close_never_runs_pkill() {
        let err = SystemLauncher::default().close_app("e").await.unwrap_err();
        assert!(err.to_string().contains("not an exact application name"), "{err}");
    }

    #[tokio::test]
    async fn blank_targets_are_ignored() {
        let launcher = SystemLauncher::default();
        assert!(launcher.open_url("  ").await.is_ok());
        assert!(launcher.open_app(" ").await.is_err());
    }
}
