//! Terminal palettes and light/dark detection.

use crossterm::tty::IsTty;
use ratatui::style::{Color, Modifier, Style};
use std::env;
use std::io::{self, Write};
use std::time::Duration;
use vboxcli_core::StateTone;

pub const THEME_ENV: &str = "VBOXCLI_THEME";
const SHARED_THEME_ENV: &str = "CLITHEME";
const OSC_TIMEOUT: Duration = Duration::from_millis(120);
const LIGHT_LUMINANCE: f64 = 0.55;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThemeMode {
    Dark,
    Light,
}

impl ThemeMode {
    #[must_use]
    pub fn toggle(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dark" => Some(Self::Dark),
            "light" => Some(Self::Light),
            _ => None,
        }
    }

    fn from_env() -> Option<Self> {
        [THEME_ENV, SHARED_THEME_ENV]
            .into_iter()
            .find_map(|var| env::var(var).ok().as_deref().and_then(Self::parse))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorLevel {
    None,
    Ansi16,
    Ansi256,
    TrueColor,
}

impl ColorLevel {
    #[must_use]
    pub fn detect() -> Self {
        if env::var_os("NO_COLOR").is_some() || !io::stdout().is_tty() {
            return Self::None;
        }
        Self::from_terminal(
            &env::var("COLORTERM").unwrap_or_default(),
            &env::var("TERM").unwrap_or_default(),
        )
    }

    fn from_terminal(colorterm: &str, term: &str) -> Self {
        let colorterm = colorterm.to_ascii_lowercase();
        if colorterm.contains("truecolor") || colorterm.contains("24bit") {
            Self::TrueColor
        } else if term.contains("256color") {
            Self::Ansi256
        } else {
            Self::Ansi16
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThemeSettings {
    pub mode: ThemeMode,
    pub color_level: ColorLevel,
}

impl ThemeSettings {
    /// Environment only; never touches the terminal.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            mode: ThemeMode::from_env().unwrap_or(ThemeMode::Dark),
            color_level: ColorLevel::detect(),
        }
    }

    /// Environment first, then the terminal background. Call with the
    /// terminal in raw mode so the OSC reply is not echoed.
    #[must_use]
    pub fn resolve() -> Self {
        let color_level = ColorLevel::detect();
        let mode = ThemeMode::from_env()
            .or_else(|| (color_level != ColorLevel::None).then(detect_background).flatten())
            .unwrap_or(ThemeMode::Dark);
        Self { mode, color_level }
    }
}

/// Colour roles of the browser.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Theme {
    pub bg: Color,
    pub fg: Color,
    pub surface: Color,
    pub accent: Color,
    pub on_accent: Color,
    pub running: Color,
    pub paused: Color,
    pub stopped: Color,
    pub busy: Color,
    pub error: Color,
    pub muted: Color,
    pub border: Color,
    pub selection: Color,
    pub color_level: ColorLevel,
}

impl Default for Theme {
    fn default() -> Self {
        Self::for_mode(ThemeMode::Dark, ColorLevel::Ansi16)
    }
}

const MONOCHROME: Theme = Theme {
    bg: Color::Reset,
    fg: Color::Reset,
    surface: Color::Reset,
    accent: Color::Reset,
    on_accent: Color::Reset,
    running: Color::Reset,
    paused: Color::Reset,
    stopped: Color::Reset,
    busy: Color::Reset,
    error: Color::Reset,
    muted: Color::Reset,
    border: Color::Reset,
    selection: Color::Reset,
    color_level: ColorLevel::None,
};

const DARK_TRUECOLOR: Theme = Theme {
    bg: Color::Rgb(22, 24, 28),
    fg: Color::Rgb(224, 226, 230),
    surface: Color::Rgb(32, 35, 42),
    accent: Color::Rgb(97, 175, 239),
    on_accent: Color::Rgb(22, 24, 28),
    running: Color::Rgb(120, 220, 120),
    paused: Color::Rgb(236, 200, 100),
    stopped: Color::Rgb(150, 155, 165),
    busy: Color::Rgb(120, 200, 230),
    error: Color::Rgb(240, 95, 95),
    muted: Color::Rgb(110, 115, 128),
    border: Color::Rgb(70, 78, 95),
    selection: Color::Rgb(55, 62, 78),
    color_level: ColorLevel::TrueColor,
};

const DARK_ANSI256: Theme = Theme {
    bg: Color::Indexed(234),
    fg: Color::Indexed(253),
    surface: Color::Indexed(235),
    accent: Color::Indexed(75),
    on_accent: Color::Indexed(234),
    running: Color::Indexed(114),
    paused: Color::Indexed(221),
    stopped: Color::Indexed(246),
    busy: Color::Indexed(117),
    error: Color::Indexed(203),
    muted: Color::Indexed(242),
    border: Color::Indexed(239),
    selection: Color::Indexed(238),
    color_level: ColorLevel::Ansi256,
};

const DARK_ANSI16: Theme = Theme {
    bg: Color::Black,
    fg: Color::White,
    surface: Color::Black,
    accent: Color::LightBlue,
    on_accent: Color::Black,
    running: Color::LightGreen,
    paused: Color::Yellow,
    stopped: Color::Gray,
    busy: Color::LightCyan,
    error: Color::LightRed,
    muted: Color::DarkGray,
    border: Color::DarkGray,
    selection: Color::DarkGray,
    color_level: ColorLevel::Ansi16,
};

const LIGHT_TRUECOLOR: Theme = Theme {
    bg: Color::Rgb(250, 250, 248),
    fg: Color::Rgb(36, 38, 42),
    surface: Color::Rgb(242, 242, 238),
    accent: Color::Rgb(20, 100, 190),
    on_accent: Color::Rgb(250, 250, 248),
    running: Color::Rgb(20, 130, 40),
    paused: Color::Rgb(170, 120, 0),
    stopped: Color::Rgb(105, 108, 115),
    busy: Color::Rgb(0, 120, 160),
    error: Color::Rgb(190, 20, 20),
    muted: Color::Rgb(145, 148, 155),
    border: Color::Rgb(205, 205, 200),
    selection: Color::Rgb(220, 228, 240),
    color_level: ColorLevel::TrueColor,
};

const LIGHT_ANSI256: Theme = Theme {
    bg: Color::Indexed(231),
    fg: Color::Indexed(236),
    surface: Color::Indexed(255),
    accent: Color::Indexed(25),
    on_accent: Color::Indexed(231),
    running: Color::Indexed(28),
    paused: Color::Indexed(136),
    stopped: Color::Indexed(243),
    busy: Color::Indexed(31),
    error: Color::Indexed(160),
    muted: Color::Indexed(248),
    border: Color::Indexed(252),
    selection: Color::Indexed(153),
    color_level: ColorLevel::Ansi256,
};

const LIGHT_ANSI16: Theme = Theme {
    bg: Color::White,
    fg: Color::Black,
    surface: Color::White,
    accent: Color::Blue,
    on_accent: Color::White,
    running: Color::Green,
    paused: Color::Magenta,
    stopped: Color::DarkGray,
    busy: Color::Cyan,
    error: Color::Red,
    muted: Color::DarkGray,
    border: Color::Gray,
    selection: Color::Gray,
    color_level: ColorLevel::Ansi16,
};

impl Theme {
    #[must_use]
    pub fn for_mode(mode: ThemeMode, color_level: ColorLevel) -> Self {
        match (color_level, mode) {
            (ColorLevel::None, _) => MONOCHROME,
            (ColorLevel::Ansi16, ThemeMode::Dark) => DARK_ANSI16,
            (ColorLevel::Ansi16, ThemeMode::Light) => LIGHT_ANSI16,
            (ColorLevel::Ansi256, ThemeMode::Dark) => DARK_ANSI256,
            (ColorLevel::Ansi256, ThemeMode::Light) => LIGHT_ANSI256,
            (ColorLevel::TrueColor, ThemeMode::Dark) => DARK_TRUECOLOR,
            (ColorLevel::TrueColor, ThemeMode::Light) => LIGHT_TRUECOLOR,
        }
    }

    #[must_use]
    pub fn is_monochrome(&self) -> bool {
        self.color_level == ColorLevel::None
    }

    pub fn tone(&self, tone: StateTone) -> Color {
        match tone {
            StateTone::Off => self.stopped,
            StateTone::Run => self.running,
            StateTone::Pause => self.paused,
            StateTone::On => self.busy,
            StateTone::Error => self.error,
        }
    }

    /// Inverted badge used for key hints and titles.
    pub fn badge(&self) -> Style {
        if self.is_monochrome() {
            Style::default().add_modifier(Modifier::REVERSED | Modifier::BOLD)
        } else {
            Style::default()
                .fg(self.on_accent)
                .bg(self.accent)
                .add_modifier(Modifier::BOLD)
        }
    }

    pub fn selected(&self) -> Style {
        if self.is_monochrome() {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
                .bg(self.selection)
                .add_modifier(Modifier::BOLD)
        }
    }
}

fn detect_background() -> Option<ThemeMode> {
    if !io::stdin().is_tty() || !io::stdout().is_tty() {
        return None;
    }
    query_background(OSC_TIMEOUT)
        .as_deref()
        .and_then(parse_osc_rgb)
        .map(mode_for_rgb)
        .or_else(|| env::var("COLORFGBG").ok().as_deref().and_then(mode_from_colorfgbg))
}

fn mode_for_rgb((r, g, b): (u8, u8, u8)) -> ThemeMode {
    let luminance = (0.2126 * f64::from(r) + 0.7152 * f64::from(g) + 0.0722 * f64::from(b)) / 255.0;
    if luminance > LIGHT_LUMINANCE {
        ThemeMode::Light
    } else {
        ThemeMode::Dark
    }
}

/// `COLORFGBG` is `fg;bg` (sometimes `fg;default;bg`); ANSI 0-6 and 8 are dark.
fn mode_from_colorfgbg(value: &str) -> Option<ThemeMode> {
    let bg: u8 = value.rsplit(';').next()?.trim().parse().ok()?;
    Some(if bg <= 6 || bg == 8 {
        ThemeMode::Dark
    } else {
        ThemeMode::Light
    })
}

/// Reply to `OSC 11 ; ?`, e.g. `ESC ] 11 ; rgb:ffff/ffff/ffff BEL`.
fn parse_osc_rgb(reply: &str) -> Option<(u8, u8, u8)> {
    let start = reply.find("rgb:")? + 4;
    let body = &reply[start..];
    let end = body
        .find(|c: char| !c.is_ascii_hexdigit() && c != '/')
        .unwrap_or(body.len());

    let mut channels = body[..end].split('/').map(scale_channel);
    Some((channels.next()??, channels.next()??, channels.next()??))
}

/// 1 to 4 hex digits scaled to 0..=255.
fn scale_channel(hex: &str) -> Option<u8> {
    if hex.is_empty() || hex.len() > 4 {
        return None;
    }
    let value = u32::from_str_radix(hex, 16).ok()?;
    let max = (1u32 << (hex.len() * 4)) - 1;
    u8::try_from((value * 255 + max / 2) / max).ok()
}

#[cfg(unix)]
fn query_background(timeout: Duration) -> Option<String> {
    use nix::fcntl::{FcntlArg, OFlag, fcntl};
    use nix::unistd::read;
    use std::time::Instant;

    /// Puts stdin in non-blocking mode until dropped.
    struct NonBlocking {
        saved: OFlag,
    }

    impl NonBlocking {
        fn enable() -> Option<Self> {
            let saved = OFlag::from_bits_truncate(fcntl(io::stdin(), FcntlArg::F_GETFL).ok()?);
            fcntl(io::stdin(), FcntlArg::F_SETFL(saved | OFlag::O_NONBLOCK)).ok()?;
            Some(Self { saved })
        }
    }

    impl Drop for NonBlocking {
        fn drop(&mut self) {
            let _ = fcntl(io::stdin(), FcntlArg::F_SETFL(self.saved));
        }
    }

    let mut stdout = io::stdout();
    stdout.write_all(b"\x1b]11;?\x07").ok()?;
    stdout.flush().ok()?;

    let _guard = NonBlocking::enable()?;
    let deadline = Instant::now() + timeout;
    let mut reply = Vec::new();
    let mut chunk = [0u8; 64];

    while Instant::now() < deadline && reply.len() < 1024 {
        if let Ok(n) = read(io::stdin(), &mut chunk)
            && n > 0
        {
            reply.extend_from_slice(&chunk[..n]);
            let terminated =
                reply.contains(&0x07) || reply.windows(2).any(|pair| pair == b"\x1b\\");
            if terminated {
                break;
            }
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    (!reply.is_empty())
        .then(|| String::from_utf8(reply).ok())
        .flatten()
}

#[cfg(not(unix))]
fn query_background(_timeout: Duration) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_osc_rgb() {
        assert_eq!(
            parse_osc_rgb("\x1b]11;rgb:ffff/ffff/ffff\x07"),
            Some((255, 255, 255))
        );
        assert_eq!(parse_osc_rgb("\x1b]11;rgb:1e/1e/2e\x1b\\"), Some((30, 30, 46)));
        assert_eq!(parse_osc_rgb("rgb:12/34"), None);
        assert_eq!(parse_osc_rgb("garbage"), None);
    }

    #[test]
    fn test_mode_for_rgb() {
        assert_eq!(mode_for_rgb((255, 255, 255)), ThemeMode::Light);
        assert_eq!(mode_for_rgb((30, 30, 46)), ThemeMode::Dark);
    }

    #[test]
    fn test_mode_from_colorfgbg() {
        assert_eq!(mode_from_colorfgbg("15;0"), Some(ThemeMode::Dark));
        assert_eq!(mode_from_colorfgbg("0;default;15"), Some(ThemeMode::Light));
        assert_eq!(mode_from_colorfgbg("15;default"), None);
    }

    #[test]
    fn test_color_level_from_terminal() {
        assert_eq!(ColorLevel::from_terminal("truecolor", "xterm"), ColorLevel::TrueColor);
        assert_eq!(ColorLevel::from_terminal("", "xterm-256color"), ColorLevel::Ansi256);
        assert_eq!(ColorLevel::from_terminal("", "vt100"), ColorLevel::Ansi16);
    }

    #[test]
    fn test_theme_mode_parse_and_toggle() {
        assert_eq!(ThemeMode::parse(" Light "), Some(ThemeMode::Light));
        assert_eq!(ThemeMode::parse("solarized"), None);
        assert_eq!(ThemeMode::Dark.toggle(), ThemeMode::Light);
    }

    #[test]
    fn test_monochrome_tones_reset() {
        let theme = Theme::for_mode(ThemeMode::Light, ColorLevel::None);
        assert!(theme.is_monochrome());
        assert_eq!(theme.tone(StateTone::Run), Color::Reset);
        assert_eq!(
            Theme::for_mode(ThemeMode::Dark, ColorLevel::Ansi16).tone(StateTone::Error),
            Color::LightRed
        );
    }
}
