use std::f64::consts::PI;
use std::path::PathBuf;

use mef3_rs::red::RED_NAN;
use mef3_rs::{Error, MefReader, MefWriter, Result};
use tempfile::TempDir;

fn session_path(dir: &TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

fn sine(n: usize, amplitude: f64, period: f64) -> Vec<f64> {
    (0..n)
        .map(|i| amplitude * (2.0 * PI * i as f64 / period).sin())
        .collect()
}

#[test]
fn write_read_single_channel() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let path = session_path(&dir, "test_session.mefd");
    let start_time = 1_000_000_000_000i64;
    let data = sine(1000, 100.0, 100.0);

    {
        let mut writer = MefWriter::new(&path, true)?;
        writer.set_block_len(100);
        writer.set_data_units("mV");
        writer.set_subject_name("Test Subject");
        writer.set_session_description("unit test session");
        writer.write_data("test_channel", &data, start_time, 1000.0, None, false)?;
        writer.close()?;
    }

    let reader = MefReader::open(&path)?;
    assert!(reader.is_valid());
    assert_eq!(reader.session_name(), "test_session");
    assert_eq!(reader.channels(), ["test_channel"]);

    let info = reader.get_channel_info("test_channel")?;
    assert_eq!(info.number_of_samples, 1000);
    assert!((info.sampling_frequency - 1000.0).abs() < 1e-6);
    assert_eq!(info.units, "mV");
    assert_eq!(info.start_time, start_time);

    let read_back = reader.get_data("test_channel", None, None)?;
    assert_eq!(read_back.len(), 1000);

    // Quantization error is bounded by the units conversion factor.
    let tolerance = info.units_conversion_factor;
    for (written, read) in data.iter().zip(read_back.iter()) {
        assert!(
            (written - read).abs() <= tolerance,
            "sample error {} above tolerance {tolerance}",
            (written - read).abs()
        );
    }
    Ok(())
}

#[test]
fn multi_channel_independence() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let path = session_path(&dir, "multi_channel.mefd");
    let start_time = 2_000_000_000_000i64;
    // Widely different amplitudes exercise per-channel quantization scales.
    let amplitudes = [1.0, 100.0, 10_000.0];

    {
        let mut writer = MefWriter::new(&path, true)?;
        writer.set_block_len(50);
        for (i, &amplitude) in amplitudes.iter().enumerate() {
            let data = sine(500, amplitude, 50.0);
            writer.write_data(
                &format!("channel_{}", i + 1),
                &data,
                start_time,
                500.0,
                None,
                false,
            )?;
        }
        writer.close()?;
    }

    let reader = MefReader::open(&path)?;
    assert_eq!(
        reader.channels(),
        ["channel_1", "channel_2", "channel_3"]
    );

    for (i, &amplitude) in amplitudes.iter().enumerate() {
        let name = format!("channel_{}", i + 1);
        let expected = sine(500, amplitude, 50.0);
        let read_back = reader.get_data(&name, None, None)?;
        assert_eq!(read_back.len(), 500, "{name} sample count");
        let tolerance = reader.get_numeric_property("units_conversion_factor", Some(&name))?;
        for (written, read) in expected.iter().zip(read_back.iter()) {
            assert!((written - read).abs() <= tolerance, "{name} reconstruction");
        }
    }
    Ok(())
}

#[test]
fn property_access() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let path = session_path(&dir, "properties.mefd");

    {
        let mut writer = MefWriter::new(&path, true)?;
        writer.set_data_units("uV");
        writer.set_block_len(100);
        writer.set_gmt_offset(-5);
        let data = vec![50.0f64; 200];
        writer.write_data("prop_ch", &data, 3_000_000_000_000, 200.0, None, false)?;
        writer.close()?;
    }

    let reader = MefReader::open(&path)?;
    let fsamp = reader.get_numeric_property("fsamp", Some("prop_ch"))?;
    assert!((fsamp - 200.0).abs() < 1e-6);
    assert!(
        (reader.get_numeric_property("sampling_frequency", Some("prop_ch"))? - 200.0).abs()
            < 1e-6
    );
    assert_eq!(
        reader.get_numeric_property("num_samples", Some("prop_ch"))?,
        200.0
    );
    assert_eq!(reader.get_string_property("unit", Some("prop_ch"))?, "uV");
    assert_eq!(reader.get_string_property("units", Some("prop_ch"))?, "uV");
    assert_eq!(
        reader.get_string_property("channel_name", Some("prop_ch"))?,
        "prop_ch"
    );
    assert_eq!(
        reader.get_string_property("session_name", None)?,
        "properties"
    );
    assert!(reader.get_numeric_property("duration", None)? >= 0.0);
    assert_eq!(reader.get_subject_metadata("prop_ch")?.gmt_offset, -5);

    assert!(matches!(
        reader.get_numeric_property("no_such_property", Some("prop_ch")),
        Err(Error::UnknownProperty(_))
    ));
    assert!(matches!(
        reader.get_string_property("bogus", None),
        Err(Error::UnknownProperty(_))
    ));
    assert!(matches!(
        reader.get_numeric_property("fsamp", Some("missing_channel")),
        Err(Error::ChannelNotFound(_))
    ));
    Ok(())
}

#[test]
fn forced_segments_and_raw_round_trip() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let path = session_path(&dir, "segments.mefd");
    let start_time = 5_000_000_000_000i64;
    let first: Vec<i32> = (0..250).map(|i| i * 3 - 400).collect();
    let second: Vec<i32> = (0..250).map(|i| 1000 - i * 7).collect();

    {
        let mut writer = MefWriter::new(&path, true)?;
        writer.set_block_len(100);
        writer.write_raw_data("raw_ch", &first, start_time, 1000.0, false)?;
        // Contiguous in time, but the caller forces a segment boundary.
        writer.write_raw_data("raw_ch", &second, start_time + 250_000, 1000.0, true)?;
        writer.close()?;
    }

    let reader = MefReader::open(&path)?;
    let segments = reader.get_segments("raw_ch")?;
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].segment_number, 0);
    assert_eq!(segments[1].segment_number, 1);
    assert_eq!(segments[0].number_of_samples, 250);
    assert_eq!(segments[1].number_of_samples, 250);
    assert_eq!(segments[1].start_sample, 250);

    // The full range splices across the segment boundary.
    let all = reader.get_raw_data("raw_ch", 0, 500)?;
    let mut expected = first.clone();
    expected.extend_from_slice(&second);
    assert_eq!(all, expected);

    // A window straddling the boundary still lines up.
    let window = reader.get_raw_data("raw_ch", 200, 300)?;
    assert_eq!(window, expected[200..300]);
    Ok(())
}

#[test]
fn discontinuity_starts_a_new_segment() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let path = session_path(&dir, "gap.mefd");
    let start_time = 7_000_000_000_000i64;
    let data = vec![10.0f64; 300];

    {
        let mut writer = MefWriter::new(&path, true)?;
        writer.set_block_len(100);
        writer.write_data("gap_ch", &data, start_time, 1000.0, None, false)?;
        // Contiguous continuation stays in the same segment.
        writer.write_data("gap_ch", &data, start_time + 300_000, 1000.0, None, false)?;
        // A ten-second hole exceeds the 2 * block_len / f threshold.
        writer.write_data(
            "gap_ch",
            &data,
            start_time + 10_000_000_000,
            1000.0,
            None,
            false,
        )?;
        writer.close()?;
    }

    let reader = MefReader::open(&path)?;
    let segments = reader.get_segments("gap_ch")?;
    assert_eq!(segments.len(), 2);
    assert_eq!(reader.get_channel_info("gap_ch")?.number_of_samples, 900);
    Ok(())
}

#[test]
fn nan_samples_round_trip() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let path = session_path(&dir, "nan.mefd");
    let start_time = 9_000_000_000_000i64;
    let mut data = sine(400, 10.0, 40.0);
    data[7] = f64::NAN;
    data[250] = f64::NAN;

    {
        let mut writer = MefWriter::new(&path, true)?;
        writer.set_block_len(128);
        writer.write_data("nan_ch", &data, start_time, 256.0, None, false)?;
        writer.close()?;
    }

    let reader = MefReader::open(&path)?;
    let raw = reader.get_raw_data("nan_ch", 0, 400)?;
    assert_eq!(raw[7], RED_NAN);
    assert_eq!(raw[250], RED_NAN);

    let values = reader.get_data("nan_ch", None, None)?;
    assert_eq!(values.len(), 400);
    assert!(values[7].is_nan());
    assert!(values[250].is_nan());
    assert!(!values[8].is_nan());
    Ok(())
}

#[test]
fn time_windows_select_the_right_samples() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let path = session_path(&dir, "windows.mefd");
    let start_time = 4_000_000_000_000i64;
    let data: Vec<i32> = (0..1000).collect();

    {
        let mut writer = MefWriter::new(&path, true)?;
        writer.set_block_len(100);
        writer.write_raw_data("win_ch", &data, start_time, 1000.0, false)?;
        writer.close()?;
    }

    let reader = MefReader::open(&path)?;
    // One sample per millisecond; the window bounds are inclusive.
    let window = reader.get_data(
        "win_ch",
        Some(start_time + 100_000),
        Some(start_time + 199_000),
    )?;
    assert_eq!(window.len(), 100);
    assert_eq!(window[0], 100.0);
    assert_eq!(window[99], 199.0);

    // Ranges past the end clamp instead of failing.
    let tail = reader.get_data("win_ch", Some(start_time + 990_000), Some(i64::MAX - 1))?;
    assert_eq!(tail.len(), 10);
    Ok(())
}

#[test]
fn password_validation() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let path = session_path(&dir, "protected.mefd");

    {
        let mut writer = MefWriter::with_passwords(&path, true, Some("correct horse"), None)?;
        writer.set_block_len(100);
        let data = sine(300, 5.0, 30.0);
        writer.write_data("secure_ch", &data, 1_000_000_000, 100.0, None, false)?;
        writer.close()?;
    }

    assert!(matches!(
        MefReader::open_with_password(&path, Some("battery staple")),
        Err(Error::WrongPassword)
    ));

    let reader = MefReader::open_with_password(&path, Some("correct horse"))?;
    assert!(reader.is_valid());
    assert_eq!(reader.get_data("secure_ch", None, None)?.len(), 300);
    Ok(())
}

#[test]
fn encrypted_blocks_require_the_password() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let path = session_path(&dir, "encrypted.mefd");
    let data: Vec<i32> = (0..500).map(|i| (i * 13) % 2000 - 1000).collect();

    {
        let mut writer = MefWriter::with_passwords(&path, true, Some("s3cret"), None)?;
        writer.set_block_len(100);
        writer.set_encryption_level(1);
        writer.write_raw_data("enc_ch", &data, 1_000_000_000, 250.0, false)?;
        writer.close()?;
    }

    let reader = MefReader::open_with_password(&path, Some("s3cret"))?;
    assert_eq!(reader.get_raw_data("enc_ch", 0, 500)?, data);

    // Without any password the blocks cannot be decrypted.
    let no_password = MefReader::open(&path)?;
    assert!(matches!(
        no_password.get_raw_data("enc_ch", 0, 500),
        Err(Error::WrongPassword)
    ));
    Ok(())
}

#[test]
fn closed_writer_rejects_writes() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let path = session_path(&dir, "closed.mefd");

    let mut writer = MefWriter::new(&path, true)?;
    writer.write_raw_data("ch", &[1, 2, 3], 0, 100.0, false)?;
    writer.close()?;
    writer.close()?; // idempotent

    assert!(matches!(
        writer.write_raw_data("ch", &[4, 5, 6], 1_000_000, 100.0, false),
        Err(Error::WriterClosed)
    ));
    Ok(())
}

#[test]
fn sampling_frequency_mismatch_is_rejected() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let path = session_path(&dir, "freq.mefd");

    let mut writer = MefWriter::new(&path, true)?;
    writer.write_raw_data("ch", &[1, 2, 3], 0, 100.0, false)?;
    assert!(matches!(
        writer.write_raw_data("ch", &[4, 5, 6], 1_000_000, 200.0, false),
        Err(Error::SamplingFrequencyMismatch { .. })
    ));
    Ok(())
}

#[test]
fn invalid_session_paths_are_rejected() {
    let dir = TempDir::new().unwrap();

    assert!(matches!(
        MefReader::open(dir.path().join("does_not_exist.mefd")),
        Err(Error::InvalidPath(_))
    ));

    // A directory without the .mefd suffix is not a session.
    let plain = dir.path().join("plain_dir");
    std::fs::create_dir(&plain).unwrap();
    assert!(matches!(
        MefReader::open(&plain),
        Err(Error::InvalidPath(_))
    ));
}

#[test]
fn empty_session_is_invalid() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let path = session_path(&dir, "empty.mefd");
    std::fs::create_dir(&path).unwrap();

    let reader = MefReader::open(&path)?;
    assert!(!reader.is_valid());
    assert!(reader.channels().is_empty());
    Ok(())
}

#[test]
fn overwrite_replaces_an_existing_session() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let path = session_path(&dir, "overwrite.mefd");

    {
        let mut writer = MefWriter::new(&path, true)?;
        writer.write_raw_data("old_ch", &[1, 2, 3], 0, 100.0, false)?;
        writer.close()?;
    }
    {
        let mut writer = MefWriter::new(&path, true)?;
        writer.write_raw_data("new_ch", &[4, 5, 6], 0, 100.0, false)?;
        writer.close()?;
    }

    let reader = MefReader::open(&path)?;
    assert_eq!(reader.channels(), ["new_ch"]);
    Ok(())
}

#[test]
fn dropped_writer_finalizes_segments() -> Result<()> {
    let dir = TempDir::new().unwrap();
    let path = session_path(&dir, "dropped.mefd");

    {
        let mut writer = MefWriter::new(&path, true)?;
        writer.write_raw_data("drop_ch", &[9, 8, 7, 6], 0, 100.0, false)?;
        // No close(): Drop must finalize.
    }

    let reader = MefReader::open(&path)?;
    assert_eq!(reader.get_raw_data("drop_ch", 0, 4)?, [9, 8, 7, 6]);
    Ok(())
}
