use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

const NOTEPAD: &str = "notepad.exe";
#[cfg(windows)]
const CALCULATOR: &str = "calc.exe";
#[cfg(not(windows))]
const CALCULATOR: &str = "gnome-calculator";

/// Media keys the dispatcher can ask the host to press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKey {
    VolumeUp,
    VolumeDown,
    Mute,
}

/// Host side effects, injected so the dispatch rules can be tested without
/// touching the OS.
pub trait SystemActions: Send + Sync {
    fn launch(&self, program: &str) -> Result<(), String>;
    fn open_url(&self, url: &str) -> Result<(), String>;
    fn type_text(&self, text: &str) -> Result<(), String>;
    fn press_media_key(&self, key: MediaKey) -> Result<(), String>;
    fn lock_session(&self) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy)]
enum Pattern {
    AnyOf(&'static [&'static str]),
    Prefix(&'static str),
}

impl Pattern {
    fn matches(&self, lower: &str) -> bool {
        match self {
            Pattern::AnyOf(needles) => needles.iter().any(|needle| lower.contains(needle)),
            Pattern::Prefix(prefix) => lower.starts_with(prefix),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Action {
    OpenNotepad,
    TypeText,
    OpenBrowser,
    OpenCalculator,
    Press(MediaKey),
    LockSession,
    RefuseShutdown,
}

/// Ordered rule table; the first matching rule wins.
const RULES: &[(Pattern, Action)] = &[
    (Pattern::AnyOf(&["open notepad"]), Action::OpenNotepad),
    (Pattern::Prefix("type "), Action::TypeText),
    (
        Pattern::AnyOf(&["open browser", "open google"]),
        Action::OpenBrowser,
    ),
    (
        Pattern::AnyOf(&["open calculator", "open calc"]),
        Action::OpenCalculator,
    ),
    (
        Pattern::AnyOf(&["volume up"]),
        Action::Press(MediaKey::VolumeUp),
    ),
    (
        Pattern::AnyOf(&["volume down"]),
        Action::Press(MediaKey::VolumeDown),
    ),
    (Pattern::AnyOf(&["mute"]), Action::Press(MediaKey::Mute)),
    (
        Pattern::AnyOf(&["lock pc", "lock workstation"]),
        Action::LockSession,
    ),
    (
        Pattern::AnyOf(&["shutdown pc", "turn off pc"]),
        Action::RefuseShutdown,
    ),
];

/// Maps message text to local side effects. Never contacts the upstream.
#[derive(Clone)]
pub struct CommandDispatcher {
    actions: Arc<dyn SystemActions>,
}

impl CommandDispatcher {
    pub fn new(actions: Arc<dyn SystemActions>) -> Self {
        Self { actions }
    }

    /// Returns the response text of the first matching rule, with the side
    /// effect already executed, or `None` when the message is not a local
    /// command. Failed side effects become descriptive response strings,
    /// never errors.
    pub fn dispatch(&self, message: &str) -> Option<String> {
        let lower = message.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        let (_, action) = RULES.iter().find(|(pattern, _)| pattern.matches(&lower))?;
        log::info!("local command matched: {action:?}");
        Some(self.run(*action, message))
    }

    fn run(&self, action: Action, message: &str) -> String {
        match action {
            Action::OpenNotepad => match self.actions.launch(NOTEPAD) {
                Ok(()) => "Opening Notepad...".to_string(),
                Err(err) => format!("Failed to open Notepad: {err}"),
            },
            Action::TypeText => {
                // The rule matched on the lower-cased prefix; take the text
                // after it from the original message to preserve casing.
                let text = message.trim().get("type ".len()..).unwrap_or("").trim();
                match self.actions.type_text(text) {
                    Ok(()) => format!("Typed: {text}"),
                    Err(err) => format!("Failed to type: {err}"),
                }
            }
            Action::OpenBrowser => match self.actions.open_url("https://www.google.com") {
                Ok(()) => "Opening browser...".to_string(),
                Err(err) => format!("Failed to open browser: {err}"),
            },
            Action::OpenCalculator => match self.actions.launch(CALCULATOR) {
                Ok(()) => "Opening Calculator...".to_string(),
                Err(err) => format!("Failed to open Calculator: {err}"),
            },
            Action::Press(key) => {
                let (done, verb) = match key {
                    MediaKey::VolumeUp => ("Volume increased.", "Volume"),
                    MediaKey::VolumeDown => ("Volume decreased.", "Volume"),
                    MediaKey::Mute => ("Muted.", "Mute"),
                };
                match self.actions.press_media_key(key) {
                    Ok(()) => done.to_string(),
                    Err(err) => format!("{verb} command failed: {err}"),
                }
            }
            Action::LockSession => match self.actions.lock_session() {
                Ok(()) => "Locking your PC...".to_string(),
                Err(err) => format!("Lock failed: {err}"),
            },
            // Destructive, refused outright. No side effect runs.
            Action::RefuseShutdown => "Shutdown command is disabled for safety.".to_string(),
        }
    }
}

/// Real executor: spawns host programs.
pub struct OsActions;

impl OsActions {
    fn spawn(program: &str, args: &[&str]) -> Result<(), String> {
        Command::new(program)
            .args(args)
            .spawn()
            .map(|_| ())
            .map_err(|err| err.to_string())
    }
}

impl SystemActions for OsActions {
    fn launch(&self, program: &str) -> Result<(), String> {
        Self::spawn(program, &[])
    }

    fn open_url(&self, url: &str) -> Result<(), String> {
        if cfg!(windows) {
            Self::spawn("cmd", &["/C", "start", url])
        } else {
            Self::spawn("xdg-open", &[url])
        }
    }

    fn type_text(&self, text: &str) -> Result<(), String> {
        // Bring an editor up first and give it time to take focus.
        let _ = Self::spawn(NOTEPAD, &[]);
        std::thread::sleep(Duration::from_millis(1200));
        if cfg!(windows) {
            let escaped = text.replace('\'', "''");
            Self::spawn(
                "powershell",
                &[
                    "-NoProfile",
                    "-Command",
                    &format!("(New-Object -ComObject wscript.shell).SendKeys('{escaped}')"),
                ],
            )
        } else {
            Self::spawn("xdotool", &["type", "--delay", "30", text])
        }
    }

    fn press_media_key(&self, key: MediaKey) -> Result<(), String> {
        if cfg!(windows) {
            let code = match key {
                MediaKey::VolumeUp => 175,
                MediaKey::VolumeDown => 174,
                MediaKey::Mute => 173,
            };
            Self::spawn(
                "powershell",
                &[
                    "-NoProfile",
                    "-Command",
                    &format!("(New-Object -ComObject wscript.shell).SendKeys([char]{code})"),
                ],
            )
        } else {
            let keysym = match key {
                MediaKey::VolumeUp => "XF86AudioRaiseVolume",
                MediaKey::VolumeDown => "XF86AudioLowerVolume",
                MediaKey::Mute => "XF86AudioMute",
            };
            Self::spawn("xdotool", &["key", keysym])
        }
    }

    fn lock_session(&self) -> Result<(), String> {
        if cfg!(windows) {
            Self::spawn("rundll32.exe", &["user32.dll,LockWorkStation"])
        } else {
            Self::spawn("loginctl", &["lock-session"])
        }
    }
}
