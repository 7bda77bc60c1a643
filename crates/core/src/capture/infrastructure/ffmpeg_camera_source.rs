use std::thread;
use std::time::Duration;

use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::error::EAGAIN;
use ffmpeg_next::util::frame::video::Video as VideoFrame;

use crate::capture::domain::camera_source::{CameraSource, CaptureError, CaptureRequest};
use crate::shared::frame::Frame;

/// Platform capture backend: libavdevice input format plus default device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureBackend {
    pub format: &'static str,
    pub default_device: Option<&'static str>,
}

pub fn platform_backend() -> CaptureBackend {
    if cfg!(target_os = "macos") {
        CaptureBackend {
            format: "avfoundation",
            default_device: Some("0"),
        }
    } else if cfg!(target_os = "windows") {
        // dshow has no numeric default; the device name must be configured.
        CaptureBackend {
            format: "dshow",
            default_device: None,
        }
    } else {
        CaptureBackend {
            format: "v4l2",
            default_device: Some("/dev/video0"),
        }
    }
}

/// Device path in the form the backend expects.
pub fn device_url(backend: &CaptureBackend, device: Option<&str>) -> Result<String, CaptureError> {
    let device = device
        .or(backend.default_device)
        .ok_or_else(|| CaptureError::DeviceUnavailable("no camera device configured".to_string()))?;
    if backend.format == "dshow" && !device.starts_with("video=") {
        Ok(format!("video={device}"))
    } else {
        Ok(device.to_string())
    }
}

// POSIX errno values, shared by the Windows CRT.
const EPERM: i32 = 1;
const EACCES: i32 = 13;

/// Maps an ffmpeg open failure onto the capture error taxonomy.
pub fn classify_open_error(err: &ffmpeg_next::Error) -> CaptureError {
    match err {
        ffmpeg_next::Error::Other { errno } if matches!(*errno, EPERM | EACCES) => {
            CaptureError::PermissionDenied
        }
        other => CaptureError::DeviceUnavailable(other.to_string()),
    }
}

/// Consecutive `EAGAIN` reads tolerated before the device counts as gone.
const MAX_READ_RETRIES: u32 = 50;
const READ_RETRY_DELAY: Duration = Duration::from_millis(10);

/// What a single demuxer read produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PacketRead {
    Packet,
    Again,
    EndOfStream,
}

/// Maps the result of `Packet::read` onto the capture flow. Anything other
/// than end of stream or a transient `EAGAIN` means the device is lost.
pub fn classify_read(result: Result<(), ffmpeg_next::Error>) -> Result<PacketRead, CaptureError> {
    match result {
        Ok(()) => Ok(PacketRead::Packet),
        Err(ffmpeg_next::Error::Eof) => Ok(PacketRead::EndOfStream),
        Err(ffmpeg_next::Error::Other { errno: EAGAIN }) => Ok(PacketRead::Again),
        Err(e) => Err(CaptureError::DeviceUnavailable(format!("camera read failed: {e}"))),
    }
}

struct OpenCamera {
    input: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: Option<scaling::Context>,
    stream_index: usize,
    width: u32,
    height: u32,
    flushing: bool,
}

/// Webcam capture through libavdevice (`v4l2`, `avfoundation` or `dshow`).
///
/// Frames are decoded and converted to RGB24.
pub struct FfmpegCameraSource {
    backend: CaptureBackend,
    camera: Option<OpenCamera>,
    sequence: u64,
}

// Safety: FfmpegCameraSource is owned by a single worker thread.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegCameraSource {}

impl FfmpegCameraSource {
    pub fn new() -> Self {
        Self {
            backend: platform_backend(),
            camera: None,
            sequence: 0,
        }
    }

    pub fn with_backend(backend: CaptureBackend) -> Self {
        Self {
            backend,
            camera: None,
            sequence: 0,
        }
    }

    fn find_input_format(&self) -> Result<ffmpeg_next::format::format::Input, CaptureError> {
        ffmpeg_next::device::input::video()
            .find(|fmt| fmt.name() == self.backend.format)
            .ok_or_else(|| {
                CaptureError::DeviceUnavailable(format!(
                    "capture input format '{}' not available",
                    self.backend.format
                ))
            })
    }
}

impl Default for FfmpegCameraSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraSource for FfmpegCameraSource {
    fn open(&mut self, request: &CaptureRequest) -> Result<(u32, u32), CaptureError> {
        ffmpeg_next::init().map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;
        ffmpeg_next::device::register_all();

        let format = self.find_input_format()?;
        let url = device_url(&self.backend, request.device.as_deref())?;

        let mut options = ffmpeg_next::Dictionary::new();
        options.set("video_size", &format!("{}x{}", request.width, request.height));
        options.set("framerate", "30");

        log::info!("Opening camera {url} via {}", self.backend.format);
        let input = ffmpeg_next::format::open_with(
            &url,
            &ffmpeg_next::format::Format::Input(format),
            options,
        )
        .map_err(|e| classify_open_error(&e))?
        .input();

        let stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| CaptureError::DeviceUnavailable("no video stream".to_string()))?;
        let stream_index = stream.index();
        let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .and_then(|ctx| ctx.decoder().video())
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

        let (width, height) = (decoder.width(), decoder.height());
        self.camera = Some(OpenCamera {
            input,
            decoder,
            scaler: None,
            stream_index,
            width,
            height,
            flushing: false,
        });
        self.sequence = 0;
        Ok((width, height))
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let Some(camera) = self.camera.as_mut() else {
            return Err("camera not opened".into());
        };

        loop {
            if let Some(pixels) = camera.try_receive()? {
                self.sequence += 1;
                return Ok(Some(Frame::new(
                    pixels,
                    camera.width,
                    camera.height,
                    self.sequence,
                )));
            }
            if camera.flushing {
                return Ok(None);
            }

            match camera.read_packet()? {
                None => {
                    let _ = camera.decoder.send_eof();
                    camera.flushing = true;
                }
                Some(packet) if packet.stream() == camera.stream_index => {
                    if let Err(e) = camera.decoder.send_packet(&packet) {
                        log::debug!("Dropping undecodable camera packet: {e}");
                    }
                }
                Some(_) => {}
            }
        }
    }

    fn stop(&mut self) {
        if self.camera.take().is_some() {
            log::info!("Camera released");
        }
    }
}

impl OpenCamera {
    /// Next demuxed packet, `None` at end of stream.
    fn read_packet(&mut self) -> Result<Option<ffmpeg_next::Packet>, CaptureError> {
        let mut retries = 0;
        loop {
            let mut packet = ffmpeg_next::Packet::empty();
            match classify_read(packet.read(&mut self.input))? {
                PacketRead::Packet => return Ok(Some(packet)),
                PacketRead::EndOfStream => return Ok(None),
                PacketRead::Again if retries < MAX_READ_RETRIES => {
                    retries += 1;
                    thread::sleep(READ_RETRY_DELAY);
                }
                PacketRead::Again => {
                    return Err(CaptureError::DeviceUnavailable(format!(
                        "camera returned no data after {MAX_READ_RETRIES} retries"
                    )))
                }
            }
        }
    }

    fn try_receive(&mut self) -> Result<Option<Vec<u8>>, ffmpeg_next::Error> {
        let mut decoded = VideoFrame::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        // The pixel format of some devices is only known after the first frame.
        if self.scaler.is_none() {
            self.scaler = Some(scaling::Context::get(
                decoded.format(),
                decoded.width(),
                decoded.height(),
                Pixel::RGB24,
                self.width,
                self.height,
                scaling::Flags::BILINEAR,
            )?);
        }
        let mut rgb = VideoFrame::empty();
        if let Some(scaler) = self.scaler.as_mut() {
            scaler.run(&decoded, &mut rgb)?;
        }
        Ok(Some(packed_rgb(&rgb, self.width, self.height)))
    }
}

/// Copies an RGB24 frame into a tightly packed buffer, dropping row padding.
fn packed_rgb(rgb: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb.stride(0);
    let data = rgb.data(0);
    let row_len = width as usize * 3;
    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_len]);
    }
    pixels
}
