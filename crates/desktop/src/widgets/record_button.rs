use std::time::Duration;

use iced::border::Border;
use iced::widget::{button, text};
use iced::{Color, Element, Shadow, Theme, Vector};
use iced_anim::transition::Easing;
use iced_anim::AnimationBuilder;

const IDLE_COLOR: Color = Color::from_rgb(0.086, 0.639, 0.290);
const RECORDING_COLOR: Color = Color::from_rgb(0.863, 0.149, 0.149);
const DISABLED_COLOR: Color = Color::from_rgb(0.420, 0.447, 0.502);
const CORNER_RADIUS: f32 = 10.0;
const PRESS_DARKEN: f32 = 0.08;
const ANIMATION_DURATION: Duration = Duration::from_millis(300);

/// "Start Recording"/"Stop Recording" toggle whose color fades between
/// green and red. `on_press: None` renders it disabled.
pub fn record_button<'a, Message: Clone + 'a>(
    recording: bool,
    on_press: Option<Message>,
    font_size: f32,
) -> Element<'a, Message> {
    let target = if recording { 1.0_f32 } else { 0.0 };
    let label = if recording {
        "Stop Recording"
    } else {
        "Start Recording"
    };

    AnimationBuilder::new(target, move |t: f32| {
        let t = t.clamp(0.0, 1.0);
        let base = mix(IDLE_COLOR, RECORDING_COLOR, t);
        let mut btn = button(text(label).size(font_size))
            .padding([12, 24])
            .style(move |_theme: &Theme, status: button::Status| styled(base, status));
        if let Some(message) = on_press.clone() {
            btn = btn.on_press(message);
        }
        btn.into()
    })
    .animation(Easing::EASE_OUT.with_duration(ANIMATION_DURATION))
    .into()
}

fn styled(base: Color, status: button::Status) -> button::Style {
    let background = match status {
        button::Status::Disabled => DISABLED_COLOR,
        button::Status::Pressed => darken(base, PRESS_DARKEN),
        button::Status::Hovered => darken(base, PRESS_DARKEN / 2.0),
        button::Status::Active => base,
    };
    button::Style {
        background: Some(background.into()),
        text_color: Color::WHITE,
        border: Border {
            radius: CORNER_RADIUS.into(),
            ..Border::default()
        },
        shadow: Shadow {
            color: Color { a: 0.3, ..background },
            offset: Vector::new(0.0, 3.0),
            blur_radius: 10.0,
        },
        ..button::Style::default()
    }
}

fn mix(a: Color, b: Color, t: f32) -> Color {
    Color {
        r: a.r + (b.r - a.r) * t,
        g: a.g + (b.g - a.g) * t,
        b: a.b + (b.b - a.b) * t,
        a: 1.0,
    }
}

fn darken(color: Color, amount: f32) -> Color {
    Color {
        r: (color.r - amount).max(0.0),
        g: (color.g - amount).max(0.0),
        b: (color.b - amount).max(0.0),
        a: color.a,
    }
}
