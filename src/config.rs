use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};
use tracing::{info, warn};

use crate::registry::EnabledOrigins;

/// Which origins feed the slideshow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Local,
    Smb,
    Hybrid,
}

impl Mode {
    pub fn origins(self) -> EnabledOrigins {
        match self {
            Self::Local => EnabledOrigins::Local,
            Self::Smb => EnabledOrigins::Remote,
            Self::Hybrid => EnabledOrigins::Both,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Smb => "smb",
            Self::Hybrid => "hybrid",
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "smb" => Ok(Self::Smb),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!("unknown mode `{other}` (expected local, smb or hybrid)")),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the share session authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Anonymous,
    User {
        username: String,
        password: String,
        domain: String,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::User {
                username, domain, ..
            } => f
                .debug_struct("User")
                .field("username", username)
                .field("domain", domain)
                .field("password", &"***")
                .finish(),
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SmbConfig {
    pub server: String,
    pub share: String,
    pub folder: String,
    pub username: String,
    pub password: String,
    pub domain: String,
    /// Directory under which `<server>/<share>` is mounted by the OS.
    pub mount_root: PathBuf,
}

impl SmbConfig {
    /// An empty username means the share is opened anonymously.
    pub fn credentials(&self) -> Credentials {
        if self.username.is_empty() {
            Credentials::Anonymous
        } else {
            Credentials::User {
                username: self.username.clone(),
                password: self.password.clone(),
                domain: self.domain.clone(),
            }
        }
    }
}

impl Default for SmbConfig {
    fn default() -> Self {
        Self {
            server: "172.16.10.44".to_string(),
            share: "ZShare".to_string(),
            folder: "Display".to_string(),
            username: String::new(),
            password: String::new(),
            domain: String::new(),
            mount_root: PathBuf::from("/mnt"),
        }
    }
}

impl fmt::Debug for SmbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmbConfig")
            .field("server", &self.server)
            .field("share", &self.share)
            .field("folder", &self.folder)
            .field("credentials", &self.credentials())
            .field("mount_root", &self.mount_root)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    pub local_images_folder: PathBuf,
    /// Time each image stays on screen.
    #[serde(deserialize_with = "seconds")]
    pub slideshow_interval: Duration,
    /// Time between rescans of both origins.
    #[serde(deserialize_with = "seconds")]
    pub file_check_interval: Duration,
    pub mode: Mode,
    pub smb: SmbConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            local_images_folder: PathBuf::from("images"),
            slideshow_interval: Duration::from_secs(10),
            file_check_interval: Duration::from_secs(30),
            mode: Mode::default(),
            smb: SmbConfig::default(),
        }
    }
}

/// Longest interval the timers accept; anything above is treated as malformed.
const MAX_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

fn seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_secs)
}

impl Configuration {
    /// Load configuration from a YAML file. Never fails: a missing or broken
    /// file yields defaults and malformed keys fall back individually.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_yaml_str(&text),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "no configuration file; using defaults");
                Self::default()
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot read configuration; using defaults");
                Self::default()
            }
        }
    }

    pub fn from_yaml_str(text: &str) -> Self {
        let doc: Value = match serde_yaml::from_str(text) {
            Ok(doc) => doc,
            Err(err) => {
                warn!(error = %err, "configuration is not valid YAML; using defaults");
                return Self::default();
            }
        };
        let mut root = match doc {
            Value::Mapping(map) => map,
            Value::Null => return Self::default(),
            other => {
                warn!(kind = ?other, "configuration root is not a mapping; using defaults");
                return Self::default();
            }
        };

        let smb_key = Value::from("smb");
        if let Some(Value::Mapping(smb)) = root.get(&smb_key).cloned() {
            root.insert(smb_key, Value::Mapping(accepted_keys::<SmbConfig>(smb, "smb")));
        }
        let accepted = accepted_keys::<Self>(root, "root");
        serde_yaml::from_value(Value::Mapping(accepted)).unwrap_or_default()
    }

    /// Clamp values that would make the timers spin and reset ones too
    /// large for them to their defaults.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        self.slideshow_interval = checked_interval(
            "slideshow-interval",
            self.slideshow_interval,
            defaults.slideshow_interval,
        );
        self.file_check_interval = checked_interval(
            "file-check-interval",
            self.file_check_interval,
            defaults.file_check_interval,
        );
        self
    }

    pub fn origins(&self) -> EnabledOrigins {
        self.mode.origins()
    }

    /// Text shown when no origin contributed any image.
    pub fn placeholder_message(&self) -> String {
        let hint = match self.mode {
            Mode::Smb => format!(
                "SMB: {}/{}/{}",
                self.smb.server, self.smb.share, self.smb.folder
            ),
            Mode::Local => format!(
                "Place images in folder: {}",
                self.local_images_folder.display()
            ),
            Mode::Hybrid => format!(
                "SMB and local folder: {}",
                self.local_images_folder.display()
            ),
        };
        format!("No images\n\n{hint}")
    }
}

fn checked_interval(key: &str, value: Duration, default: Duration) -> Duration {
    if value.is_zero() {
        warn!(key, "interval of 0 is not usable; clamping to 1s");
        Duration::from_secs(1)
    } else if value > MAX_INTERVAL {
        warn!(key, secs = value.as_secs(), "interval out of range; using default");
        default
    } else {
        value
    }
}

/// Keep only the entries of `mapping` that deserialize cleanly into `T`,
/// warning about each one that is dropped.
fn accepted_keys<T>(mapping: Mapping, section: &str) -> Mapping
where
    T: DeserializeOwned,
{
    let mut accepted = Mapping::new();
    for (key, value) in mapping {
        let mut candidate = accepted.clone();
        candidate.insert(key.clone(), value);
        match serde_yaml::from_value::<T>(Value::Mapping(candidate.clone())) {
            Ok(_) => accepted = candidate,
            Err(err) => warn!(
                section,
                key = key.as_str().unwrap_or("?"),
                error = %err,
                "ignoring malformed configuration value; using default"
            ),
        }
    }
    accepted
}
