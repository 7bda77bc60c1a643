use std::path::Path;

use iced::widget::{button, column, row, text, Space};
use iced::{Alignment, Element, Length};

use facetrack_core::recording::domain::recording_record::RecordingRecord;

use crate::app::{scaled, Message};

pub fn view<'a>(history: &'a [RecordingRecord], dir: &Path, fs: f32) -> Element<'a, Message> {
    let header = row![
        text("Recent Recordings")
            .size(scaled(16.0, fs))
            .width(Length::Fill),
        button(text("Open Folder").size(scaled(12.0, fs)))
            .on_press(Message::ShowInFolder(dir.to_path_buf()))
            .style(button::secondary)
            .padding([4, 10]),
    ]
    .align_y(Alignment::Center);

    if history.is_empty() {
        return column![
            header,
            Space::new().height(16),
            text("No recordings yet. Start one from the Tracker tab.").size(scaled(13.0, fs)),
        ]
        .into();
    }

    let mut list = column![header, Space::new().height(4)].spacing(10);
    // History is stored oldest first.
    for record in history.iter().rev() {
        list = list.push(
            row![
                column![
                    text(&record.filename).size(scaled(13.0, fs)),
                    text(saved_label(record)).size(scaled(11.0, fs)),
                ]
                .spacing(2)
                .width(Length::Fill),
                text(format_size(record.size)).size(scaled(12.0, fs)),
            ]
            .spacing(12)
            .align_y(Alignment::Center),
        );
    }
    list.into()
}

fn saved_label(record: &RecordingRecord) -> String {
    match record.saved_at() {
        Some(at) => at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => "unknown date".to_string(),
    }
}

fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let bytes = bytes as f64;
    if bytes >= KB * KB {
        format!("{:.1} MB", bytes / (KB * KB))
    } else if bytes >= KB {
        format!("{:.0} KB", bytes / KB)
    } else {
        format!("{bytes} B")
    }
}
