use anstyle::{AnsiColor, Style};
use serde::Deserialize;
use std::env;
use std::fmt;

/// Environment variable selecting the verbosity of emitted log statements.
pub const LOG_LEVEL_ENV: &str = "SHELL_TRANS_LOG";

/// Severity of a message printed by the generated shell code.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Todo,
    #[serde(alias = "warn")]
    Warning,
}

impl LogLevel {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "todo" => Some(LogLevel::Todo),
            "warn" | "warning" => Some(LogLevel::Warning),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Todo => "TODO",
            LogLevel::Warning => "WARNING",
        }
    }

    fn default_style(self) -> Style {
        match self {
            LogLevel::Debug => Style::new()
                .fg_color(Some(AnsiColor::Green.into()))
                .italic(),
            LogLevel::Info => Style::new().fg_color(Some(AnsiColor::White.into())).bold(),
            LogLevel::Todo => Style::new()
                .fg_color(Some(AnsiColor::White.into()))
                .bold()
                .italic(),
            LogLevel::Warning => Style::new()
                .fg_color(Some(AnsiColor::Yellow.into()))
                .bold()
                .underline(),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Colors accepted in style overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl From<Color> for AnsiColor {
    fn from(color: Color) -> Self {
        match color {
            Color::Black => AnsiColor::Black,
            Color::Red => AnsiColor::Red,
            Color::Green => AnsiColor::Green,
            Color::Yellow => AnsiColor::Yellow,
            Color::Blue => AnsiColor::Blue,
            Color::Magenta => AnsiColor::Magenta,
            Color::Cyan => AnsiColor::Cyan,
            Color::White => AnsiColor::White,
        }
    }
}

/// Per-message adjustments layered over a level's default style.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StyleOverrides {
    pub color: Option<Color>,
    /// Apply `color` to the background instead of the foreground.
    #[serde(default)]
    pub background: bool,
    pub bold: Option<bool>,
    pub italics: Option<bool>,
    pub underline: Option<bool>,
}

impl StyleOverrides {
    fn apply(&self, base: Style) -> Style {
        let mut style = base;
        if let Some(color) = self.color {
            let color = AnsiColor::from(color).into();
            style = if self.background {
                style.fg_color(None).bg_color(Some(color))
            } else {
                style.fg_color(Some(color))
            };
        }

        let mut effects = style.get_effects();
        for (flag, effect) in [
            (self.bold, anstyle::Effects::BOLD),
            (self.italics, anstyle::Effects::ITALIC),
            (self.underline, anstyle::Effects::UNDERLINE),
        ] {
            match flag {
                Some(true) => effects = effects.insert(effect),
                Some(false) => effects = effects.remove(effect),
                None => {}
            }
        }
        style.effects(effects)
    }
}

/// How `log` statements are rendered for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSettings {
    /// Messages below this level are dropped at translation time.
    pub level: LogLevel,
    pub color: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            color: true,
        }
    }
}

impl LogSettings {
    /// Read `SHELL_TRANS_LOG` and `NO_COLOR`.
    pub fn from_env() -> Self {
        let level = match env::var(LOG_LEVEL_ENV) {
            Ok(name) => LogLevel::from_name(&name).unwrap_or_else(|| {
                tracing::warn!(
                    "Unknown log level name: {name:?} (env var ${LOG_LEVEL_ENV}), using {}",
                    LogLevel::default()
                );
                LogLevel::default()
            }),
            Err(_) => LogLevel::default(),
        };

        Self {
            level,
            color: env::var_os("NO_COLOR").is_none(),
        }
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.level
    }

    /// Render `LEVEL:` with ANSI styling when color is enabled.
    pub fn prefix(&self, level: LogLevel, overrides: Option<&StyleOverrides>) -> String {
        if !self.color {
            return format!("{}:", level.as_str());
        }

        let mut style = level.default_style();
        if let Some(overrides) = overrides {
            style = overrides.apply(style);
        }
        let colon = Style::new().bold();
        format!(
            "{}{}{}{}:{}",
            style.render(),
            level.as_str(),
            style.render_reset(),
            colon.render(),
            colon.render_reset()
        )
    }

    /// Full line printed by the generated code, prefix included.
    pub fn format_message(
        &self,
        level: LogLevel,
        message: &str,
        overrides: Option<&StyleOverrides>,
    ) -> String {
        format!("{} {}", self.prefix(level, overrides), message)
    }
}
