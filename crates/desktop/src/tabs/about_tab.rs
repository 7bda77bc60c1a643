use iced::widget::{column, text, Space};
use iced::Element;

use facetrack_core::models::domain::model_bundle::ModelPaths;
use facetrack_core::models::infrastructure::execution_provider::preferred_provider_label;
use facetrack_core::shared::runtime_config::RuntimeMode;

use crate::app::{scaled, Message};

pub fn view(paths: &ModelPaths, mode: RuntimeMode, fs: f32) -> Element<'_, Message> {
    let version = env!("CARGO_PKG_VERSION");

    let mut content = column![
        text("Face Tracking").size(scaled(22.0, fs)),
        Space::new().height(4),
        text(format!("Version {version}")).size(scaled(13.0, fs)),
        Space::new().height(12),
        text(
            "Detects faces in the live camera feed, outlines them, \
             and records the annotated video to a WebM file."
        )
        .size(scaled(13.0, fs)),
        Space::new().height(20),
        text("Runtime").size(scaled(16.0, fs)),
        Space::new().height(6),
        text(format!("Mode: {mode}")).size(scaled(12.0, fs)),
        text(format!("Inference: {}", preferred_provider_label())).size(scaled(12.0, fs)),
        Space::new().height(20),
        text("Model paths").size(scaled(16.0, fs)),
        Space::new().height(6),
        text(format!("Base: {}", paths.base)).size(scaled(12.0, fs)),
    ]
    .spacing(2);

    for (bundle, location) in &paths.manifests {
        content = content.push(text(format!("{bundle}: {location}")).size(scaled(12.0, fs)));
    }
    content.into()
}
