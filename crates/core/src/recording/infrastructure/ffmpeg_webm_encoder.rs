use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video as VideoFrame;
use ffmpeg_next::{codec, encoder, Dictionary, Rational};

use crate::recording::domain::media_encoder::{
    EncodedChunk, EncoderSettings, MediaEncoder, VideoCodec,
};
use crate::shared::frame::Frame;

const CONTAINER: &str = "webm";
const OUTPUT_NAME: &str = "recording.webm";

/// Encoder candidates in preference order.
const CODEC_CANDIDATES: &[(&str, codec::Id, VideoCodec)] = &[
    ("libvpx-vp9", codec::Id::VP9, VideoCodec::Vp9),
    ("libvpx", codec::Id::VP8, VideoCodec::Vp8),
];

/// Picks the first available VP9 encoder, falling back to VP8.
pub fn find_codec() -> Option<(ffmpeg_next::Codec, VideoCodec)> {
    CODEC_CANDIDATES.iter().find_map(|&(name, id, kind)| {
        encoder::find_by_name(name)
            .or_else(|| encoder::find(id))
            .map(|c| (c, kind))
    })
}

struct OpenRecording {
    octx: ffmpeg_next::format::context::Output,
    encoder: ffmpeg_next::codec::encoder::video::Encoder,
    scaler: Option<(scaling::Context, u32, u32)>,
    path: PathBuf,
    // Keeps the scratch directory alive until the recording is finished.
    _dir: tempfile::TempDir,
    emitted: u64,
    time_base: Rational,
}

/// VP9/WebM encoder built on ffmpeg-next.
///
/// The muxer runs in live mode into a scratch file and never seeks back, so
/// the bytes appended after each packet can be handed out as chunks and
/// their concatenation is exactly the container file.
pub struct FfmpegWebmEncoder {
    settings: Option<EncoderSettings>,
    open: Option<OpenRecording>,
}

// Safety: FfmpegWebmEncoder is owned by a single worker thread.
// The raw pointers inside ffmpeg types are never shared.
unsafe impl Send for FfmpegWebmEncoder {}

impl FfmpegWebmEncoder {
    pub fn new() -> Self {
        Self {
            settings: None,
            open: None,
        }
    }
}

impl Default for FfmpegWebmEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenRecording {
    fn drain(&mut self) -> Result<Option<EncodedChunk>, Box<dyn std::error::Error>> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.emitted))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        if bytes.is_empty() {
            return Ok(None);
        }
        self.emitted += bytes.len() as u64;
        Ok(Some(EncodedChunk(bytes)))
    }

    fn write_packets(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let stream_tb = self.octx.stream(0).ok_or("webm stream missing")?.time_base();
        let mut packet = ffmpeg_next::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(0);
            packet.rescale_ts(self.time_base, stream_tb);
            packet.write_interleaved(&mut self.octx)?;
        }
        Ok(())
    }
}

impl MediaEncoder for FfmpegWebmEncoder {
    fn start(&mut self, settings: &EncoderSettings) -> Result<(), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        self.open = None;

        let (codec, kind) = find_codec().ok_or("no VP9 or VP8 encoder available")?;
        if kind != settings.codec {
            log::warn!("{} unavailable, recording as {kind}", settings.codec);
        }

        let dir = tempfile::Builder::new().prefix("facetrack-rec").tempdir()?;
        let path = dir.path().join(OUTPUT_NAME);
        let mut octx = ffmpeg_next::format::output_as(&path, CONTAINER)?;
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let mut ost = octx.add_stream(Some(codec))?;
        let mut encoder_ctx = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;
        let fps = settings.fps.max(1) as i32;
        let time_base = Rational(1, fps);
        encoder_ctx.set_width(settings.width);
        encoder_ctx.set_height(settings.height);
        encoder_ctx.set_format(Pixel::YUV420P);
        encoder_ctx.set_time_base(time_base);
        encoder_ctx.set_frame_rate(Some(Rational(fps, 1)));
        if global_header {
            encoder_ctx.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let mut options = Dictionary::new();
        options.set("deadline", "realtime");
        options.set("cpu-used", "8");
        let encoder = encoder_ctx.open_with(options)?;
        ost.set_parameters(&encoder);
        ost.set_time_base(time_base);

        let mut mux_options = Dictionary::new();
        mux_options.set("live", "1");
        mux_options.set("flush_packets", "1");
        octx.write_header_with(mux_options)?;

        self.open = Some(OpenRecording {
            octx,
            encoder,
            scaler: None,
            path,
            _dir: dir,
            emitted: 0,
            time_base,
        });
        self.settings = Some(settings.clone());
        Ok(())
    }

    fn encode(
        &mut self,
        frame: &Frame,
        pts: i64,
    ) -> Result<Vec<EncodedChunk>, Box<dyn std::error::Error>> {
        let settings = self.settings.as_ref().ok_or("FfmpegWebmEncoder: not started")?;
        let rec = self.open.as_mut().ok_or("FfmpegWebmEncoder: not started")?;

        let (fw, fh) = (frame.width(), frame.height());
        if fw == 0 || fh == 0 {
            return Err("cannot record an empty frame".into());
        }
        if !matches!(rec.scaler, Some((_, w, h)) if (w, h) == (fw, fh)) {
            let ctx = scaling::Context::get(
                Pixel::RGB24,
                fw,
                fh,
                Pixel::YUV420P,
                settings.width,
                settings.height,
                scaling::Flags::BILINEAR,
            )?;
            rec.scaler = Some((ctx, fw, fh));
        }

        let mut rgb = VideoFrame::new(Pixel::RGB24, fw, fh);
        let stride = rgb.stride(0);
        let row_len = fw as usize * 3;
        let dst = rgb.data_mut(0);
        for (row, src) in frame.data().chunks_exact(row_len).enumerate() {
            dst[row * stride..row * stride + row_len].copy_from_slice(src);
        }

        let mut yuv = VideoFrame::empty();
        if let Some((scaler, _, _)) = rec.scaler.as_mut() {
            scaler.run(&rgb, &mut yuv)?;
        }
        yuv.set_pts(Some(pts));

        rec.encoder.send_frame(&yuv)?;
        rec.write_packets()?;
        Ok(rec.drain()?.into_iter().collect())
    }

    fn finish(&mut self) -> Result<Vec<EncodedChunk>, Box<dyn std::error::Error>> {
        let mut rec = self.open.take().ok_or("FfmpegWebmEncoder: not started")?;
        self.settings = None;
        rec.encoder.send_eof()?;
        rec.write_packets()?;
        rec.octx.write_trailer()?;
        let chunk = rec.drain()?;
        Ok(chunk.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_without_start_is_error() {
        let mut encoder = FfmpegWebmEncoder::new();
        assert!(encoder.finish().is_err());
        assert!(encoder.encode(&Frame::blank(4, 4), 0).is_err());
    }

    #[test]
    #[ignore] // requires an ffmpeg build with libvpx
    fn test_chunks_form_a_webm_file() {
        let mut encoder = FfmpegWebmEncoder::new();
        encoder.start(&EncoderSettings::new(64, 48)).unwrap();
        let mut bytes = Vec::new();
        for pts in 0..10 {
            for chunk in encoder.encode(&Frame::blank(64, 48), pts).unwrap() {
                bytes.extend(chunk.0);
            }
        }
        for chunk in encoder.finish().unwrap() {
            bytes.extend(chunk.0);
        }
        // EBML magic.
        assert_eq!(&bytes[..4], &[0x1A, 0x45, 0xDF, 0xA3]);
    }
}
