pub mod ffmpeg_reader;
pub mod ffmpeg_writer;
pub mod headless_display;
pub mod recording_display;
