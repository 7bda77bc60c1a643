use iced::color;
use iced::theme::Palette;
use iced::{Color, Theme};

use crate::settings::Appearance;

pub fn resolve_theme(appearance: Appearance, high_contrast: bool) -> Theme {
    let is_dark = match appearance {
        Appearance::Dark => true,
        Appearance::Light => false,
        Appearance::System => system_prefers_dark(),
    };

    let palette = match (is_dark, high_contrast) {
        (true, false) => Palette {
            background: color!(0x11, 0x18, 0x27),
            text: color!(0xe5, 0xe7, 0xeb),
            primary: color!(0x16, 0xa3, 0x4a),
            success: color!(0x22, 0xc5, 0x5e),
            warning: color!(0xf5, 0x9e, 0x0b),
            danger: color!(0xdc, 0x26, 0x26),
        },
        (false, false) => Palette {
            background: color!(0xf9, 0xfa, 0xfb),
            text: color!(0x11, 0x18, 0x27),
            primary: color!(0x16, 0xa3, 0x4a),
            success: color!(0x15, 0x80, 0x3d),
            warning: color!(0xd9, 0x77, 0x06),
            danger: color!(0xdc, 0x26, 0x26),
        },
        (true, true) => Palette {
            background: color!(0x00, 0x00, 0x00),
            text: color!(0xff, 0xff, 0xff),
            primary: color!(0x4a, 0xde, 0x80),
            success: color!(0x4a, 0xde, 0x80),
            warning: color!(0xfa, 0xcc, 0x15),
            danger: color!(0xf8, 0x71, 0x71),
        },
        (false, true) => Palette {
            background: color!(0xff, 0xff, 0xff),
            text: color!(0x00, 0x00, 0x00),
            primary: color!(0x14, 0x53, 0x2d),
            success: color!(0x14, 0x53, 0x2d),
            warning: color!(0x92, 0x40, 0x0e),
            danger: color!(0x99, 0x1b, 0x1b),
        },
    };

    Theme::custom("Face Tracking", palette)
}

/// Secondary text color.
pub fn muted_color(theme: &Theme) -> Color {
    Color {
        a: 0.6,
        ..theme.palette().text
    }
}

pub fn overlay_color() -> Color {
    Color::from_rgba(0.0, 0.0, 0.0, 0.5)
}

fn system_prefers_dark() -> bool {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("defaults")
            .args(["read", "-g", "AppleInterfaceStyle"])
            .output()
            .map(|o| {
                String::from_utf8_lossy(&o.stdout)
                    .trim()
                    .eq_ignore_ascii_case("dark")
            })
            .unwrap_or(true)
    }
    #[cfg(target_os = "windows")]
    {
        // AppsUseLightTheme is 0x0 in dark mode.
        std::process::Command::new("reg")
            .args([
                "query",
                r"HKCU\Software\Microsoft\Windows\CurrentVersion\Themes\Personalize",
                "/v",
                "AppsUseLightTheme",
            ])
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).contains("0x0"))
            .unwrap_or(true)
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        true
    }
}
