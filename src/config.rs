//! Command line and runtime configuration

use clap::Parser;

use crate::compositor::geometry::Size;
use crate::input::bindings::Bindings;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid output size {0:?}, expected WIDTHxHEIGHT")]
    InvalidSize(String),
    #[error("output size {0}x{1} must be positive")]
    EmptySize(i32, i32),
}

/// A small stacking Wayland compositor
#[derive(Parser, Debug, Clone)]
#[command(name = "kestrel", version, about, long_about = None)]
pub struct Args {
    /// Command run once the compositor is ready
    #[arg(short = 's', long = "startup-cmd", alias = "startup_cmd", value_name = "COMMAND")]
    pub startup_cmd: Option<String>,

    /// Wallpaper client
    #[arg(long, value_name = "COMMAND")]
    pub background: Option<String>,

    /// Status bar client
    #[arg(long, value_name = "COMMAND")]
    pub bar: Option<String>,

    /// Terminal launched with Alt+Return
    #[arg(long, value_name = "COMMAND", default_value = "foot")]
    pub terminal: String,

    /// Size of the virtual output
    #[arg(long, value_name = "WxH", default_value = "1920x1080")]
    pub output: String,

    /// XKB layout for keyboards; empty uses the system default
    #[arg(long, value_name = "LAYOUT", default_value = "")]
    pub xkb_layout: String,
}

/// Validated runtime configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub startup_cmd: Option<String>,
    pub background: Option<String>,
    pub bar: Option<String>,
    pub terminal: String,
    pub output_size: Size,
    pub xkb_layout: String,
}

impl Config {
    pub fn bindings(&self) -> Bindings {
        Bindings::defaults(&self.terminal)
    }

    /// Commands to launch at start-up, in order
    pub fn autostart(&self) -> impl Iterator<Item = &str> {
        [&self.startup_cmd, &self.background, &self.bar]
            .into_iter()
            .filter_map(|cmd| cmd.as_deref())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            startup_cmd: None,
            background: None,
            bar: None,
            terminal: "foot".to_string(),
            output_size: Size::new(1920, 1080),
            xkb_layout: String::new(),
        }
    }
}

impl TryFrom<Args> for Config {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        Ok(Self {
            output_size: parse_size(&args.output)?,
            startup_cmd: args.startup_cmd,
            background: args.background,
            bar: args.bar,
            terminal: args.terminal,
            xkb_layout: args.xkb_layout,
        })
    }
}

fn parse_size(s: &str) -> Result<Size, ConfigError> {
    let invalid = || ConfigError::InvalidSize(s.to_string());
    let (w, h) = s.split_once(['x', 'X']).ok_or_else(invalid)?;
    let width: i32 = w.trim().parse().map_err(|_| invalid())?;
    let height: i32 = h.trim().parse().map_err(|_| invalid())?;
    if width <= 0 || height <= 0 {
        return Err(ConfigError::EmptySize(width, height));
    }
    Ok(Size::new(width, height))
}
