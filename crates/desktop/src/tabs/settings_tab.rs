use iced::widget::{button, checkbox, column, pick_list, row, slider, text, text_input, Space};
use iced::{Alignment, Element, Length};

use crate::app::{scaled, Message};
use crate::settings::{Appearance, Settings};

pub fn view(settings: &Settings) -> Element<'_, Message> {
    let fs = settings.font_scale;
    let recordings_dir = settings.recordings_dir().display().to_string();

    column![
        text("Camera").size(scaled(16.0, fs)),
        Space::new().height(8),
        text_input(
            "Default device",
            settings.camera_device.as_deref().unwrap_or_default()
        )
        .on_input(Message::CameraDeviceChanged)
        .size(scaled(13.0, fs)),
        Space::new().height(8),
        checkbox(settings.draw_landmarks)
            .label("Draw facial landmarks")
            .on_toggle(Message::DrawLandmarksChanged)
            .text_size(scaled(13.0, fs)),
        Space::new().height(20),
        text("Recordings").size(scaled(16.0, fs)),
        Space::new().height(8),
        row![
            text(recordings_dir)
                .size(scaled(13.0, fs))
                .width(Length::Fill),
            button(text("Change...").size(scaled(12.0, fs)))
                .on_press(Message::SelectRecordingsDir)
                .style(button::secondary)
                .padding([4, 10]),
        ]
        .spacing(12)
        .align_y(Alignment::Center),
        Space::new().height(20),
        text("Models").size(scaled(16.0, fs)),
        Space::new().height(8),
        text_input(
            "Asset origin (URL or directory)",
            settings.asset_origin.as_deref().unwrap_or_default()
        )
        .on_input(Message::AssetOriginChanged)
        .size(scaled(13.0, fs)),
        Space::new().height(8),
        button(text("Restart Session").size(scaled(13.0, fs)))
            .on_press(Message::TryAgain)
            .padding([6, 14]),
        Space::new().height(20),
        text("Appearance").size(scaled(16.0, fs)),
        Space::new().height(8),
        row![
            text("Mode").size(scaled(13.0, fs)),
            pick_list(Appearance::ALL, Some(settings.appearance), |a| {
                Message::AppearanceChanged(a)
            })
            .text_size(scaled(13.0, fs)),
        ]
        .spacing(12)
        .align_y(Alignment::Center),
        Space::new().height(8),
        checkbox(settings.high_contrast)
            .label("High contrast")
            .on_toggle(Message::HighContrastChanged)
            .text_size(scaled(13.0, fs)),
        Space::new().height(8),
        row![
            text("Font size").size(scaled(13.0, fs)),
            slider(0.8..=1.5, settings.font_scale, Message::FontScaleChanged).step(0.05),
            text(format!("{:.0}%", settings.font_scale * 100.0)).size(scaled(13.0, fs)),
        ]
        .spacing(12)
        .align_y(Alignment::Center),
    ]
    .spacing(0)
    .into()
}
