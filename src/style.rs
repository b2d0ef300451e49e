//! ANSI terminal color styling for CLI diagnostics (SPEC_FULL.md §4.13
//! "CLI surface" — `--color` flag). Mirrors the teacher's
//! `logicaffeine_language::style::Style` wrapper: plain escape-code
//! constants plus small helpers that always reset at the end.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(ColorMode::Auto),
            "always" => Some(ColorMode::Always),
            "never" => Some(ColorMode::Never),
            _ => Option::None,
        }
    }

    /// Whether escape codes should actually be written, given whether
    /// stdout/stderr is a terminal.
    pub fn enabled(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => is_tty,
        }
    }
}

pub struct Style;

impl Style {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BOLD: &'static str = "\x1b[1m";
    pub const RED: &'static str = "\x1b[31m";
    pub const GREEN: &'static str = "\x1b[32m";
    pub const YELLOW: &'static str = "\x1b[33m";
    pub const CYAN: &'static str = "\x1b[36m";

    pub fn red(s: &str, enabled: bool) -> String {
        Self::wrap(Self::RED, s, enabled)
    }

    pub fn green(s: &str, enabled: bool) -> String {
        Self::wrap(Self::GREEN, s, enabled)
    }

    pub fn yellow(s: &str, enabled: bool) -> String {
        Self::wrap(Self::YELLOW, s, enabled)
    }

    pub fn cyan(s: &str, enabled: bool) -> String {
        Self::wrap(Self::CYAN, s, enabled)
    }

    pub fn bold_red(s: &str, enabled: bool) -> String {
        if !enabled {
            return s.to_string();
        }
        format!("{}{}{}{}", Self::BOLD, Self::RED, s, Self::RESET)
    }

    fn wrap(code: &str, s: &str, enabled: bool) -> String {
        if !enabled {
            return s.to_string();
        }
        format!("{code}{s}{}", Self::RESET)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_mode_passes_text_through() {
        assert_eq!(Style::red("error", false), "error");
    }

    #[test]
    fn enabled_mode_wraps_with_escape_codes() {
        let out = Style::bold_red("Broken", true);
        assert!(out.contains("\x1b[1m"));
        assert!(out.contains("\x1b[31m"));
        assert!(out.contains("Broken"));
        assert!(out.ends_with(Style::RESET));
    }

    #[test]
    fn color_mode_parses_closed_set() {
        assert_eq!(ColorMode::parse("auto"), Some(ColorMode::Auto));
        assert_eq!(ColorMode::parse("always"), Some(ColorMode::Always));
        assert_eq!(ColorMode::parse("never"), Some(ColorMode::Never));
        assert_eq!(ColorMode::parse("rainbow"), Option::None);
    }

    #[test]
    fn auto_mode_follows_tty_flag() {
        assert!(ColorMode::Auto.enabled(true));
        assert!(!ColorMode::Auto.enabled(false));
        assert!(ColorMode::Always.enabled(false));
        assert!(!ColorMode::Never.enabled(true));
    }
}
