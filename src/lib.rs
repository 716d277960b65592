#![forbid(unsafe_code)]

//! # mef3-rs
//!
//! A Rust library for reading and writing MEF 3.0 (Multiscale
//! Electrophysiology Format) sessions.
//!
//! MEF 3.0 is a directory-structured, block-compressed, optionally encrypted
//! container for long multi-channel time-series recordings, used primarily
//! for electrophysiology at sample rates from tens of hertz to 100 kHz over
//! hours to days. A session is a `.mefd` directory of channels (`.timd`),
//! each a sequence of segments (`.segd`) holding a data, index and metadata
//! file.
//!
//! ## Features
//!
//! - **100% safe Rust** - `#![forbid(unsafe_code)]`
//! - **Reading**: enumerate a session tree and serve time- or sample-range
//!   queries, decompressing only the overlapping blocks
//! - **Writing**: quantize floating-point samples, detect discontinuities,
//!   emit RED-compressed blocks and finalize byte-exact metadata
//! - **RED codec**: the lossless differential codec used by every MEF 3.0
//!   implementation, with CRC-32 integrity and optional AES-128 payload
//!   encryption
//!
//! ## Quick Start
//!
//! ### Writing a session
//!
//! ```no_run
//! use mef3_rs::{MefWriter, Result};
//!
//! fn main() -> Result<()> {
//!     let mut writer = MefWriter::new("recording.mefd", true)?;
//!     writer.set_block_len(1000);
//!     writer.set_data_units("uV");
//!
//!     let samples: Vec<f64> = (0..5000)
//!         .map(|i| 100.0 * (2.0 * std::f64::consts::PI * i as f64 / 100.0).sin())
//!         .collect();
//!     // 1 kHz, starting 2021-09-01 00:00:00 UTC
//!     writer.write_data("eeg_01", &samples, 1_630_454_400_000_000, 1000.0, None, false)?;
//!     writer.close()
//! }
//! ```
//!
//! ### Reading it back
//!
//! ```no_run
//! use mef3_rs::{MefReader, Result};
//!
//! fn main() -> Result<()> {
//!     let reader = MefReader::open("recording.mefd")?;
//!     for name in reader.channels() {
//!         let fsamp = reader.get_numeric_property("fsamp", Some(name.as_str()))?;
//!         let data = reader.get_data(&name, None, None)?;
//!         println!("{name}: {} samples at {fsamp} Hz", data.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`blocks`] | Packed on-disk structures with fixed byte offsets |
//! | [`red`] | RED block compression and decompression |
//! | [`crc`] | CRC-32 (Koopman) checksums |
//! | [`crypt`] | AES-128 keys and SHA-256 password validation |
//! | [`session`] | Session directory layout and naming |
//! | [`writer`] | Session creation via [`MefWriter`] |
//! | [`reader`] | Session access via [`MefReader`] |
//! | [`channel`] | Public channel and segment summaries |
//! | [`error`] | Error types and the [`Result`] alias |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `serde` | No | `Serialize`/`Deserialize` derives on the info types |
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`], an alias for
//! `core::result::Result<T, Error>`. The [`Error`] enum covers I/O errors,
//! format violations, codec failures and password mismatches. Destructors
//! never panic; dropping a [`MefWriter`] closes it best-effort.

pub mod blocks;
pub mod channel;
pub mod crc;
pub mod crypt;
pub mod error;
pub mod reader;
pub mod red;
pub mod session;
pub mod writer;

// Re-export commonly used types at the crate root
pub use channel::{ChannelInfo, SegmentInfo};
pub use error::{Error, Result};
pub use reader::MefReader;
pub use writer::MefWriter;
