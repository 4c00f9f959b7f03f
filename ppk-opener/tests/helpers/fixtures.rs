//! In-memory archive and audio fixtures

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hound::{WavSpec, WavWriter};
use std::f32::consts::PI;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;

pub enum ZipEntry<'a> {
    File(&'a str, &'a [u8]),
    Dir(&'a str),
}

/// Build a ZIP archive with entries in the given order
pub fn build_zip(entries: &[ZipEntry<'_>]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    for entry in entries {
        match entry {
            ZipEntry::File(name, data) => {
                writer.start_file(*name, options).unwrap();
                writer.write_all(data).unwrap();
            }
            ZipEntry::Dir(name) => {
                writer.add_directory(*name, options).unwrap();
            }
        }
    }

    writer.finish().unwrap().into_inner()
}

/// 16-bit stereo sine tone as WAV bytes
pub fn sine_wav_bytes(sample_rate: u32, duration_ms: u64) -> Vec<u8> {
    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
        let frames = sample_rate as u64 * duration_ms / 1000;
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let sample = ((2.0 * PI * 440.0 * t).sin() * 0.5 * i16::MAX as f32) as i16;
            writer.write_sample(sample).unwrap();
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Open-box response body carrying `archive` as its payload
pub fn token_response_body(archive: &[u8]) -> String {
    serde_json::json!({
        "data": STANDARD.encode(archive),
        "result": 0,
        "errorNumber": 0
    })
    .to_string()
}
