use std::path::PathBuf;
use std::time::Duration;

use crossbeam_channel::TryRecvError;
use iced::widget::{button, column, container, image, row, scrollable, text};
use iced::{Element, Length, Subscription, Task, Theme};

use facetrack_core::models::domain::model_bundle::{model_paths, ModelPaths};
use facetrack_core::recording::domain::recording_history::RecordingHistory;
use facetrack_core::recording::domain::recording_record::RecordingRecord;
use facetrack_core::recording::infrastructure::json_key_value_store::JsonKeyValueStore;
use facetrack_core::recording::infrastructure::local_storage_history::LocalStorageHistory;
use facetrack_core::shared::runtime_config::RuntimeMode;

use crate::settings::{Appearance, Settings};
use crate::tabs;
use crate::theme;
use crate::workers::session_worker::{self, SessionHandle, SessionParams, WorkerCommand, WorkerEvent};

const POLL_INTERVAL: Duration = Duration::from_millis(15);
const STORAGE_FALLBACK: &str = "facetrack-storage.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Tracker,
    Recordings,
    Settings,
    About,
}

impl Tab {
    const ALL: &[Tab] = &[Tab::Tracker, Tab::Recordings, Tab::Settings, Tab::About];

    fn label(self) -> &'static str {
        match self {
            Tab::Tracker => "Tracker",
            Tab::Recordings => "Recordings",
            Tab::Settings => "Settings",
            Tab::About => "About",
        }
    }
}

/// Where the tracking session is in its setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    LoadingModels,
    StartingCamera,
    Live,
    Error(String),
}

impl Phase {
    pub fn models_loaded(&self) -> bool {
        matches!(self, Phase::StartingCamera | Phase::Live)
    }
}

/// Dismissible outcome of a recording.
#[derive(Debug, Clone)]
pub struct Notice {
    pub message: String,
    pub path: Option<PathBuf>,
    pub is_error: bool,
}

#[derive(Debug, Clone)]
pub enum Message {
    TabSelected(Tab),
    Poll,
    ToggleRecording,
    DismissNotice,
    ShowInFolder(PathBuf),
    TryAgain,
    CameraDeviceChanged(String),
    AssetOriginChanged(String),
    DrawLandmarksChanged(bool),
    SelectRecordingsDir,
    RecordingsDirSelected(Option<PathBuf>),
    AppearanceChanged(Appearance),
    HighContrastChanged(bool),
    FontScaleChanged(f32),
    PollSystemTheme,
}

pub struct App {
    active_tab: Tab,
    pub settings: Settings,
    pub phase: Phase,
    session: Option<SessionHandle>,
    pub frame: Option<image::Handle>,
    pub recording: bool,
    pub notice: Option<Notice>,
    pub history: Vec<RecordingRecord>,
    pub model_paths: ModelPaths,
    pub mode: RuntimeMode,
}

impl App {
    pub fn new() -> (Self, Task<Message>) {
        let mut app = Self::with_settings(Settings::load());
        app.reload_history();
        app.start_session();
        (app, Task::none())
    }

    /// Idle app with no session running.
    fn with_settings(settings: Settings) -> Self {
        let config = settings.runtime_config();
        Self {
            active_tab: Tab::Tracker,
            phase: Phase::LoadingModels,
            session: None,
            frame: None,
            recording: false,
            notice: None,
            history: Vec::new(),
            model_paths: model_paths(&config.model_location()),
            mode: config.mode,
            settings,
        }
    }

    fn storage_path() -> PathBuf {
        JsonKeyValueStore::default_path().unwrap_or_else(|| PathBuf::from(STORAGE_FALLBACK))
    }

    /// Tears down any running session and starts over from model loading.
    fn start_session(&mut self) {
        let params = self.reset_session();
        self.session = Some(session_worker::spawn(params));
    }

    /// Drops the current session, resets the tracker to `LoadingModels` and
    /// returns the parameters for the next one.
    fn reset_session(&mut self) -> SessionParams {
        self.session = None;
        self.frame = None;
        self.recording = false;
        self.phase = Phase::LoadingModels;

        let config = self.settings.runtime_config();
        let base = config.model_location();
        log::info!("Starting session ({} mode), models from {base}", config.mode);
        self.model_paths = model_paths(&base);
        self.mode = config.mode;
        SessionParams {
            model_base: base,
            device: self
                .settings
                .camera_device
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            recordings_dir: self.settings.recordings_dir(),
            storage_path: Self::storage_path(),
            draw_landmarks: self.settings.draw_landmarks,
        }
    }

    /// Press action of the record button; `None` keeps it disabled.
    pub fn recording_toggle(&self) -> Option<Message> {
        self.phase
            .models_loaded()
            .then_some(Message::ToggleRecording)
    }

    fn reload_history(&mut self) {
        let history = LocalStorageHistory::new(JsonKeyValueStore::new(Self::storage_path()));
        self.history = history.records().unwrap_or_else(|e| {
            log::warn!("Could not read recording history: {e}");
            Vec::new()
        });
    }

    fn poll_session(&mut self) {
        let mut events = Vec::new();
        let mut latest_frame = None;
        if let Some(session) = &self.session {
            loop {
                match session.events.try_recv() {
                    Ok(event) => events.push(event),
                    Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
                }
            }
            while let Ok(frame) = session.frames.try_recv() {
                latest_frame = Some(frame);
            }
        }
        for event in events {
            self.apply(event);
        }
        if let Some(frame) = latest_frame {
            self.frame = Some(image::Handle::from_rgba(
                frame.width(),
                frame.height(),
                frame.to_rgba(),
            ));
        }
    }

    fn apply(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::ModelsLoaded => self.phase = Phase::StartingCamera,
            WorkerEvent::CameraStarted { width, height } => {
                log::info!("Camera live at {width}x{height}");
                self.phase = Phase::Live;
            }
            WorkerEvent::RecordingStarted => self.recording = true,
            WorkerEvent::RecordingSaved {
                path,
                record,
                message,
            } => {
                log::info!("Saved {} ({} bytes)", record.filename, record.size);
                self.recording = false;
                self.notice = Some(Notice {
                    message: message.to_string(),
                    path: Some(path),
                    is_error: false,
                });
                self.reload_history();
            }
            WorkerEvent::RecordingFailed(message) => {
                self.recording = false;
                self.notice = Some(Notice {
                    message,
                    path: None,
                    is_error: true,
                });
            }
            WorkerEvent::Failed(message) => {
                self.session = None;
                self.recording = false;
                self.phase = Phase::Error(message);
            }
        }
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::TabSelected(tab) => {
                self.active_tab = tab;
            }
            Message::Poll => self.poll_session(),
            Message::ToggleRecording => {
                if let Some(session) = &self.session {
                    session.send(if self.recording {
                        WorkerCommand::StopRecording
                    } else {
                        WorkerCommand::StartRecording
                    });
                }
            }
            Message::DismissNotice => self.notice = None,
            Message::ShowInFolder(path) => {
                let folder = if path.is_dir() {
                    path
                } else {
                    path.parent().map(|p| p.to_path_buf()).unwrap_or(path)
                };
                if let Err(e) = open::that(&folder) {
                    log::warn!("Could not open {}: {e}", folder.display());
                }
            }
            Message::TryAgain => self.start_session(),
            Message::CameraDeviceChanged(device) => {
                self.settings.camera_device = (!device.is_empty()).then_some(device);
                self.settings.save();
            }
            Message::AssetOriginChanged(origin) => {
                self.settings.asset_origin = (!origin.is_empty()).then_some(origin);
                self.settings.save();
            }
            Message::DrawLandmarksChanged(enabled) => {
                self.settings.draw_landmarks = enabled;
                self.settings.save();
            }
            Message::SelectRecordingsDir => {
                let start_dir = self.settings.recordings_dir();
                return Task::perform(
                    async move {
                        rfd::AsyncFileDialog::new()
                            .set_title("Choose recordings folder")
                            .set_directory(start_dir)
                            .pick_folder()
                            .await
                            .map(|h| h.path().to_path_buf())
                    },
                    Message::RecordingsDirSelected,
                );
            }
            Message::RecordingsDirSelected(Some(dir)) => {
                self.settings.recordings_dir = Some(dir);
                self.settings.save();
            }
            Message::RecordingsDirSelected(None) => {}
            Message::AppearanceChanged(appearance) => {
                self.settings.appearance = appearance;
                self.settings.save();
            }
            Message::HighContrastChanged(enabled) => {
                self.settings.high_contrast = enabled;
                self.settings.save();
            }
            Message::FontScaleChanged(scale) => {
                self.settings.font_scale = scale;
                self.settings.save();
            }
            Message::PollSystemTheme => {
                // theme() resolves the system setting on every render.
            }
        }
        Task::none()
    }

    pub fn view(&self) -> Element<'_, Message> {
        let fs = self.settings.font_scale;

        let tab_bar = row(Tab::ALL
            .iter()
            .map(|&tab| -> Element<'_, Message> {
                let btn = button(text(tab.label()).size(scaled(13.0, fs)))
                    .on_press(Message::TabSelected(tab))
                    .padding([6, 14]);
                if tab == self.active_tab {
                    btn.style(button::primary).into()
                } else {
                    btn.style(button::text).into()
                }
            })
            .collect::<Vec<_>>())
        .spacing(2);

        let content: Element<'_, Message> = match self.active_tab {
            Tab::Tracker => tabs::tracker_tab::view(self),
            Tab::Recordings => {
                tabs::recordings_tab::view(&self.history, &self.settings.recordings_dir(), fs)
            }
            Tab::Settings => tabs::settings_tab::view(&self.settings),
            Tab::About => tabs::about_tab::view(&self.model_paths, self.mode, fs),
        };

        let tab_content = container(scrollable(content).height(Length::Fill))
            .padding(16)
            .height(Length::Fill);

        column![tab_bar, tab_content]
            .spacing(0)
            .height(Length::Fill)
            .into()
    }

    pub fn theme(&self) -> Theme {
        theme::resolve_theme(self.settings.appearance, self.settings.high_contrast)
    }

    pub fn subscription(&self) -> Subscription<Message> {
        let poll = if self.session.is_some() {
            iced::time::every(POLL_INTERVAL).map(|_| Message::Poll)
        } else {
            Subscription::none()
        };
        let theme = if self.settings.appearance == Appearance::System {
            iced::time::every(Duration::from_secs(2)).map(|_| Message::PollSystemTheme)
        } else {
            Subscription::none()
        };
        Subscription::batch([poll, theme])
    }
}

/// Scale a base font size by the user's font_scale setting.
pub fn scaled(base: f32, font_scale: f32) -> f32 {
    (base * font_scale).round()
}
