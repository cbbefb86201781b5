use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::align::BeatLabel;
use crate::dataset::DatasetRecord;

/// Bytes reserved per data record for TALs when labels are sparse.
const MIN_ANNOTATION_SAMPLES: usize = 57;

/// Write a space-padded ASCII field of exact width.
fn write_field<W: Write>(out: &mut W, value: &str, width: usize) -> Result<()> {
    let mut buf = value.as_bytes().to_vec();
    buf.resize(width, b' '); // right-pad with spaces
    buf.truncate(width); // ensure exact width
    out.write_all(&buf)?;
    Ok(())
}

/// Convert a physical value to a 16-bit digital value.
fn physical_to_digital(value: f64, phys_min: f64, phys_max: f64) -> i16 {
    let dig_min: f64 = -32768.0;
    let dig_max: f64 = 32767.0;
    if !value.is_finite() {
        return 0;
    }
    let scaled = dig_min + (value - phys_min) / (phys_max - phys_min) * (dig_max - dig_min);
    scaled.round().clamp(dig_min, dig_max) as i16
}

/// Onset in seconds without trailing zeros, e.g. "0.25" or "12".
fn format_onset(seconds: f64) -> String {
    format!("{:.6}", seconds)
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// TAL bytes for one data record: the time-keeping TAL followed by one TAL
/// per label. Not padded.
fn make_annotation_bytes(onset_seconds: usize, labels: &[&BeatLabel]) -> Vec<u8> {
    let mut bytes = format!("+{}\x14\x14\x00", onset_seconds).into_bytes();
    for label in labels {
        let tal = format!(
            "+{}\x14{}/{}\x14\x00",
            format_onset(label.time),
            label.beat.code(),
            label.rhythm.code()
        );
        bytes.extend(tal.into_bytes());
    }
    bytes
}

/// Write a dataset record as an EDF+ file with its beat labels as annotations.
pub fn write_edf(path: &Path, record: &DatasetRecord, sample_rate: f64) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    write_edf_to(&mut out, record, sample_rate)?;
    out.flush()?;
    log::info!(
        "wrote record {} ({} labels) to {}",
        record.record,
        record.labels.len(),
        path.display()
    );
    Ok(())
}

/// Write an EDF+C stream for `record` sampled at `sample_rate` Hz.
pub fn write_edf_to<W: Write>(out: &mut W, record: &DatasetRecord, sample_rate: f64) -> Result<()> {
    if sample_rate <= 0.0 || sample_rate.fract() != 0.0 {
        bail!("EDF export needs a whole-number sample rate, got {sample_rate}");
    }
    let signal = &record.signal;
    let record_duration: usize = 1; // 1 second per data record
    let samples_per_record = sample_rate as usize * record_duration;
    let n_records = signal.len().div_ceil(samples_per_record).max(1);
    let n_signals: usize = 2; // ECG + Annotations
    let header_bytes = 256 + n_signals * 256;

    // Labels grouped by the data record holding their onset.
    let mut per_record: Vec<Vec<&BeatLabel>> = vec![Vec::new(); n_records];
    for label in &record.labels {
        let index = (label.time / record_duration as f64) as usize;
        per_record[index.min(n_records - 1)].push(label);
    }
    let tals: Vec<Vec<u8>> = per_record
        .iter()
        .enumerate()
        .map(|(rec, labels)| make_annotation_bytes(rec * record_duration, labels))
        .collect();
    let longest = tals.iter().map(Vec::len).max().unwrap_or(0);
    let annotation_samples = longest.div_ceil(2).max(MIN_ANNOTATION_SAMPLES);

    // Physical range with margin
    let finite = || signal.iter().copied().filter(|v| v.is_finite());
    let phys_min = finite().fold(f64::INFINITY, f64::min).min(0.0) - 0.1;
    let phys_max = finite().fold(f64::NEG_INFINITY, f64::max).max(0.0) + 0.1;

    // === Main header (256 bytes) ===
    write_field(out, "0", 8)?; // version
    write_field(out, &format!("X X X {}", record.record), 80)?; // patient ID (EDF+)
    write_field(out, &format!("Startdate X X X MIT-BIH_{}", record.record), 80)?; // recording ID
    write_field(out, "01.01.85", 8)?; // start date
    write_field(out, "00.00.00", 8)?; // start time
    write_field(out, &header_bytes.to_string(), 8)?; // header size
    write_field(out, "EDF+C", 44)?; // reserved (EDF+ continuous)
    write_field(out, &n_records.to_string(), 8)?; // num data records
    write_field(out, &record_duration.to_string(), 8)?; // record duration
    write_field(out, &n_signals.to_string(), 4)?; // num signals

    // === Signal headers (interleaved: all labels, then all transducers, etc.) ===

    // Labels (16 bytes each)
    write_field(out, &format!("ECG {}", record.channel_label), 16)?;
    write_field(out, "EDF Annotations", 16)?;

    // Transducer type (80 bytes each)
    write_field(out, "transducer type not recorded", 80)?;
    write_field(out, "", 80)?;

    // Physical dimension (8 bytes each)
    write_field(out, &record.units, 8)?;
    write_field(out, "", 8)?;

    // Physical minimum (8 bytes each)
    write_field(out, &format_edf_num(phys_min), 8)?;
    write_field(out, "-1", 8)?;

    // Physical maximum (8 bytes each)
    write_field(out, &format_edf_num(phys_max), 8)?;
    write_field(out, "1", 8)?;

    // Digital minimum (8 bytes each)
    write_field(out, "-32768", 8)?;
    write_field(out, "-32768", 8)?;

    // Digital maximum (8 bytes each)
    write_field(out, "32767", 8)?;
    write_field(out, "32767", 8)?;

    // Prefiltering (80 bytes each)
    write_field(out, "prefiltering not recorded", 80)?;
    write_field(out, "", 80)?;

    // Number of samples per data record (8 bytes each)
    write_field(out, &samples_per_record.to_string(), 8)?;
    write_field(out, &annotation_samples.to_string(), 8)?;

    // Reserved (32 bytes each)
    write_field(out, "", 32)?;
    write_field(out, "", 32)?;

    // === Data records ===
    for (rec, mut tal) in tals.into_iter().enumerate() {
        let start = rec * samples_per_record;
        for i in 0..samples_per_record {
            let value = signal.get(start + i).copied().unwrap_or(0.0);
            let digital = physical_to_digital(value, phys_min, phys_max);
            out.write_all(&digital.to_le_bytes())?;
        }

        tal.resize(annotation_samples * 2, 0); // null-pad to fill annotation channel
        out.write_all(&tal)?;
    }

    Ok(())
}

/// Format a floating point number for an EDF header field (max 8 chars).
fn format_edf_num(val: f64) -> String {
    // Try full precision, progressively reduce if too long
    for precision in (0..=6).rev() {
        let s = format!("{:.prec$}", val, prec = precision);
        if s.len() <= 8 {
            return s;
        }
    }
    format!("{:.0}", val)
}
