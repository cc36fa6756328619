//! Outbound commands.
//!
//! Wire format, one per line:
//! ```text
//! vm <verb> <parameters>
//! vm <verb> <parameters> resultId="<id>"
//! ```

use std::fmt;

use super::audio::MAX_VOLUME;

/// Prefix every command line starts with.
pub const PREFIX: &str = "vm";

// ---------------------------------------------------------------------------
// Verbs and parameters
// ---------------------------------------------------------------------------

pub const VERB_VOLUME: &str = "volume";
pub const VERB_MUTE: &str = "mute";
pub const VERB_SCREEN: &str = "screen";
pub const VERB_KEY: &str = "key";
pub const VERB_START: &str = "start";
pub const VERB_TASKS: &str = "tasks";
pub const VERB_PACKAGES: &str = "packages";
pub const VERB_USB: &str = "usb";
pub const VERB_SESSION: &str = "session";
pub const VERB_OTA: &str = "ota";

/// Query the current value (volume, mute, screen, ota).
pub const ARG_GET: &str = "-g";
/// Set a value; followed by the value.
pub const ARG_SET: &str = "-s";
/// Ask the board to push unsolicited volume changes.
pub const ARG_WATCH: &str = "-w";
pub const ARG_STEP_UP: &str = "-u";
pub const ARG_STEP_DOWN: &str = "-d";
pub const ARG_ON: &str = "-on";
pub const ARG_OFF: &str = "-off";
pub const ARG_PRESS: &str = "-p";
pub const ARG_LIST: &str = "-l";
pub const ARG_FOREGROUND: &str = "-f";
pub const ARG_REMOVE: &str = "-r";
pub const ARG_DUMP: &str = "-d";
pub const ARG_END: &str = "-e";

/// A request sent to the board. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    verb: String,
    parameters: String,
    result_id: Option<String>,
}

impl Command {
    /// A command with no `resultId`.
    pub fn new(verb: impl Into<String>, parameters: impl Into<String>) -> Self {
        Self { verb: verb.into(), parameters: parameters.into(), result_id: None }
    }

    /// Attach a correlation id the board echoes back as `resultId`.
    ///
    /// The protocol never allocates ids; callers that need precise
    /// correlation are responsible for keeping them unique.
    pub fn with_result_id(mut self, id: impl Into<String>) -> Self {
        self.result_id = Some(id.into());
        self
    }

    /// The verb following the `vm` prefix.
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Everything between the verb and the `resultId`, possibly empty.
    pub fn parameters(&self) -> &str {
        &self.parameters
    }

    /// The correlation id, if one was attached.
    pub fn result_id(&self) -> Option<&str> {
        self.result_id.as_deref()
    }

    /// Serialise to a single wire line (without delimiter).
    pub fn encode(&self) -> String {
        let mut line = format!("{PREFIX} {}", self.verb);
        if !self.parameters.is_empty() {
            line.push(' ');
            line.push_str(&self.parameters);
        }
        if let Some(id) = &self.result_id {
            line.push_str(&format!(" resultId=\"{id}\""));
        }
        line
    }

    // -----------------------------------------------------------------------
    // Builders
    // -----------------------------------------------------------------------

    /// `vm volume -g`: query the current level.
    pub fn volume_get() -> Self {
        Self::new(VERB_VOLUME, ARG_GET)
    }

    /// `level` above [`MAX_VOLUME`] is clamped.
    pub fn volume_set(level: u8) -> Self {
        Self::new(VERB_VOLUME, format!("{ARG_SET} {}", level.min(MAX_VOLUME)))
    }

    /// `vm volume -u`: one step louder.
    pub fn volume_step_up() -> Self {
        Self::new(VERB_VOLUME, ARG_STEP_UP)
    }

    /// `vm volume -d`: one step quieter.
    pub fn volume_step_down() -> Self {
        Self::new(VERB_VOLUME, ARG_STEP_DOWN)
    }

    /// `vm volume -w`: have the board push level changes with `sync` set.
    pub fn volume_watch() -> Self {
        Self::new(VERB_VOLUME, ARG_WATCH)
    }

    /// `vm mute -g`.
    pub fn mute_get() -> Self {
        Self::new(VERB_MUTE, ARG_GET)
    }

    /// `vm mute -s true|false`.
    pub fn mute_set(muted: bool) -> Self {
        Self::new(VERB_MUTE, format!("{ARG_SET} {muted}"))
    }

    /// `vm screen -g`: query display power.
    pub fn screen_get() -> Self {
        Self::new(VERB_SCREEN, ARG_GET)
    }

    /// `vm screen -on` or `vm screen -off`.
    pub fn screen_power(on: bool) -> Self {
        Self::new(VERB_SCREEN, if on { ARG_ON } else { ARG_OFF })
    }

    /// `vm key -p <code>`, with an Android key code.
    pub fn key_press(code: u32) -> Self {
        Self::new(VERB_KEY, format!("{ARG_PRESS} {code}"))
    }

    /// `vm start <package>/<activity>`.
    pub fn start_activity(package: &str, activity: &str) -> Self {
        Self::new(VERB_START, format!("{package}/{activity}"))
    }

    /// `vm tasks -l`: every running task.
    pub fn tasks_list() -> Self {
        Self::new(VERB_TASKS, ARG_LIST)
    }

    /// `vm tasks -f`: the task in front.
    pub fn tasks_foreground() -> Self {
        Self::new(VERB_TASKS, ARG_FOREGROUND)
    }

    /// `vm tasks -s <id>`: bring a task to the front.
    pub fn tasks_switch(task_id: i32) -> Self {
        Self::new(VERB_TASKS, format!("{ARG_SET} {task_id}"))
    }

    /// `vm tasks -r <id>`.
    pub fn tasks_remove(task_id: i32) -> Self {
        Self::new(VERB_TASKS, format!("{ARG_REMOVE} {task_id}"))
    }

    /// `vm packages -l`: installed packages, system ones included.
    pub fn packages_list() -> Self {
        Self::new(VERB_PACKAGES, ARG_LIST)
    }

    /// `vm usb -d`: attached USB devices.
    pub fn usb_dump() -> Self {
        Self::new(VERB_USB, ARG_DUMP)
    }

    /// `vm session -e`.
    pub fn session_end() -> Self {
        Self::new(VERB_SESSION, ARG_END)
    }

    /// `vm ota -g`: the configured update hosts.
    pub fn ota_get() -> Self {
        Self::new(VERB_OTA, ARG_GET)
    }

    /// Hosts are sent space-separated after `-s`.
    pub fn ota_set<S: AsRef<str>>(hosts: &[S]) -> Self {
        let joined: Vec<&str> = hosts.iter().map(AsRef::as_ref).collect();
        Self::new(VERB_OTA, format!("{ARG_SET} {}", joined.join(" ")))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
