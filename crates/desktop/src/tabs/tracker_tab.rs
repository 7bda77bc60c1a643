use iced::border::Border;
use iced::widget::{button, column, container, image, row, stack, text, Space};
use iced::{Alignment, Color, ContentFit, Element, Length, Theme};

use facetrack_core::shared::constants::{CAPTURE_HEIGHT, CAPTURE_WIDTH};

use crate::app::{scaled, App, Message, Notice, Phase};
use crate::theme::{muted_color, overlay_color};
use crate::widgets::record_button::record_button;

pub fn view(app: &App) -> Element<'_, Message> {
    let fs = app.settings.font_scale;
    let theme = app.theme();

    if let Phase::Error(ref message) = app.phase {
        return error_state(fs, message, &theme);
    }

    let toggle = app.recording_toggle();

    let mut content = column![
        text("Face Tracking App").size(scaled(22.0, fs)),
        Space::new().height(12),
        video_area(app, fs),
        Space::new().height(16),
        container(record_button(app.recording, toggle, scaled(15.0, fs))).center_x(Length::Fill),
    ]
    .spacing(0)
    .align_x(Alignment::Center);

    if let Some(ref notice) = app.notice {
        content = content.push(Space::new().height(16));
        content = content.push(notice_banner(fs, notice, &theme));
    }

    content.into()
}

fn video_area(app: &App, fs: f32) -> Element<'_, Message> {
    let video: Element<'_, Message> = match app.frame {
        Some(ref handle) => image(handle.clone())
            .content_fit(ContentFit::Contain)
            .width(Length::Fill)
            .into(),
        None => container(Space::new())
            .width(Length::Fill)
            .height(CAPTURE_HEIGHT as f32 * 0.75)
            .style(|_theme: &Theme| container::Style {
                background: Some(Color::BLACK.into()),
                ..container::Style::default()
            })
            .into(),
    };

    let status = match app.phase {
        Phase::LoadingModels => Some("Loading Models..."),
        Phase::StartingCamera if app.frame.is_none() => Some("Starting Camera..."),
        _ => None,
    };

    let layered: Element<'_, Message> = match status {
        Some(label) => stack![video, loading_overlay(label, fs)].into(),
        None => video,
    };
    let framed = container(layered)
        .max_width(CAPTURE_WIDTH as f32)
        .style(|_theme: &Theme| container::Style {
            border: Border {
                radius: 8.0.into(),
                ..Border::default()
            },
            ..container::Style::default()
        });

    container(framed).center_x(Length::Fill).into()
}

fn loading_overlay<'a>(label: &'a str, fs: f32) -> Element<'a, Message> {
    container(text(label).size(scaled(16.0, fs)).color(Color::WHITE))
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .style(|_theme: &Theme| container::Style {
            background: Some(overlay_color().into()),
            ..container::Style::default()
        })
        .into()
}

fn notice_banner<'a>(fs: f32, notice: &'a Notice, theme: &Theme) -> Element<'a, Message> {
    let palette = theme.extended_palette();
    let accent = if notice.is_error {
        palette.danger.base.color
    } else {
        palette.success.base.color
    };

    let mut actions = row![].spacing(8).align_y(Alignment::Center);
    if let Some(ref path) = notice.path {
        actions = actions.push(
            button(text("Show in Folder").size(scaled(12.0, fs)))
                .on_press(Message::ShowInFolder(path.clone()))
                .style(button::secondary)
                .padding([4, 10]),
        );
    }
    actions = actions.push(
        button(text("\u{2715}").size(scaled(12.0, fs)))
            .on_press(Message::DismissNotice)
            .style(button::text)
            .padding([4, 8]),
    );

    container(
        row![
            text(&notice.message).size(scaled(13.0, fs)).width(Length::Fill),
            actions,
        ]
        .spacing(12)
        .align_y(Alignment::Center),
    )
    .padding([10, 14])
    .width(Length::Fill)
    .style(move |_theme: &Theme| container::Style {
        background: Some(Color { a: 0.12, ..accent }.into()),
        border: Border {
            color: accent,
            width: 1.0,
            radius: 6.0.into(),
        },
        ..container::Style::default()
    })
    .into()
}

fn error_state<'a>(fs: f32, message: &'a str, theme: &Theme) -> Element<'a, Message> {
    let muted = muted_color(theme);
    column![
        text("Face Tracking App").size(scaled(22.0, fs)),
        Space::new().height(24),
        text(message)
            .size(scaled(14.0, fs))
            .color(theme.extended_palette().danger.base.color),
        Space::new().height(8),
        text("Check the camera connection and model files, then try again.")
            .size(scaled(12.0, fs))
            .color(muted),
        Space::new().height(16),
        button(text("Try Again").size(scaled(14.0, fs)))
            .on_press(Message::TryAgain)
            .padding([8, 20]),
    ]
    .align_x(Alignment::Center)
    .width(Length::Fill)
    .into()
}
