use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::align::RawAnnotationEvent;

// Pseudo-annotation codes in the MIT annotation format.
const SKIP: u16 = 59;
const NUM: u16 = 60;
const SUB: u16 = 61;
const CHN: u16 = 62;
const AUX: u16 = 63;

/// Default gain in adu per physical unit when the header leaves it at 0.
const DEFAULT_GAIN: f64 = 200.0;

/// Widest ADC resolution accepted from a header, in bits.
const MAX_ADC_RESOLUTION: u32 = 32;

/// Standard WFDB mnemonics, indexed by annotation code.
const SYMBOLS: [&str; 42] = [
    "", "N", "L", "R", "a", "V", "F", "J", "A", "S", "E", "j", "/", "Q", "~", "", "|", "", "s",
    "T", "*", "D", "\"", "=", "p", "B", "^", "t", "+", "u", "?", "!", "[", "]", "e", "n", "@",
    "x", "f", "(", ")", "r",
];

/// Mnemonic for an annotation code; unassigned codes have none.
pub fn symbol_for_code(code: u16) -> &'static str {
    SYMBOLS.get(code as usize).copied().unwrap_or("")
}

/// Per-channel description from a WFDB header signal line.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    pub file_name: String,
    pub format: u16,
    /// Description field, e.g. "MLII".
    pub label: String,
    pub units: String,
    /// adu per physical unit.
    pub gain: f64,
    pub baseline: i32,
    pub adc_resolution: u32,
}

impl ChannelInfo {
    pub fn digital_max(&self) -> i64 {
        (1i64 << self.adc_resolution) - 1
    }

    pub fn digital_min(&self) -> i64 {
        0
    }

    pub fn physical_max(&self) -> f64 {
        (self.digital_max() - self.baseline as i64) as f64 / self.gain
    }

    pub fn physical_min(&self) -> f64 {
        (self.digital_min() - self.baseline as i64) as f64 / self.gain
    }

    fn to_physical(&self, digital: i32) -> f64 {
        (digital - self.baseline) as f64 / self.gain
    }
}

/// Parsed `.hea` file.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordHeader {
    pub name: String,
    pub sample_rate: f64,
    /// Samples per channel, when the header states it.
    pub n_samples: Option<usize>,
    pub channels: Vec<ChannelInfo>,
}

/// Everything the dataset builder needs from one record.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    pub record_id: String,
    pub sample_rate: f64,
    pub channels: Vec<ChannelInfo>,
    /// Physical samples, one vector per channel.
    pub signals: Vec<Vec<f64>>,
    pub annotations: Vec<RawAnnotationEvent>,
}

pub trait RecordSource {
    fn fetch(&self, record_id: &str) -> Result<SourceRecord>;
}

/// A local copy of a WFDB database, e.g. the unpacked `mitdb` directory.
#[derive(Debug, Clone)]
pub struct WfdbDirectory {
    root: PathBuf,
    annotator: String,
}

impl WfdbDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            annotator: "atr".to_string(),
        }
    }

    pub fn with_annotator(mut self, annotator: &str) -> Self {
        self.annotator = annotator.to_string();
        self
    }

    fn path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }
}

impl RecordSource for WfdbDirectory {
    fn fetch(&self, record_id: &str) -> Result<SourceRecord> {
        let header_path = self.path(&format!("{record_id}.hea"));
        let text = read_text(&header_path)?;
        let header = parse_header(&text)
            .with_context(|| format!("parsing {}", header_path.display()))?;
        log::debug!(
            "record {}: {} signals at {} Hz",
            header.name,
            header.channels.len(),
            header.sample_rate
        );

        let file_name = match header.channels.first() {
            Some(ch) => ch.file_name.clone(),
            None => bail!("record {record_id} has no signals"),
        };
        let dat_path = self.path(&file_name);
        let bytes = std::fs::read(&dat_path)
            .with_context(|| format!("reading {}", dat_path.display()))?;
        let signals = decode_signals(&bytes, &header)
            .with_context(|| format!("decoding {}", dat_path.display()))?;

        let ann_path = self.path(&format!("{record_id}.{}", self.annotator));
        let ann_bytes = std::fs::read(&ann_path)
            .with_context(|| format!("reading {}", ann_path.display()))?;
        let annotations = parse_annotations(&ann_bytes)
            .with_context(|| format!("parsing {}", ann_path.display()))?;

        Ok(SourceRecord {
            record_id: record_id.to_string(),
            sample_rate: header.sample_rate,
            channels: header.channels,
            signals,
            annotations,
        })
    }
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

/// Leading numeric part of a header field such as "360/1000" or "212+0".
fn numeric_prefix(field: &str) -> &str {
    let end = field
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == 'e'))
        .unwrap_or(field.len());
    &field[..end]
}

/// Parse the record line and signal lines of a `.hea` file.
pub fn parse_header(text: &str) -> Result<RecordHeader> {
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'));

    let record_line = lines.next().ok_or_else(|| anyhow!("empty header"))?;
    let fields: Vec<&str> = record_line.split_whitespace().collect();
    if fields.len() < 2 {
        bail!("record line too short: {record_line:?}");
    }
    let name = fields[0].to_string();
    let n_signals: usize = fields[1]
        .parse()
        .with_context(|| format!("bad signal count {:?}", fields[1]))?;
    let sample_rate: f64 = match fields.get(2) {
        Some(f) => numeric_prefix(f)
            .parse()
            .with_context(|| format!("bad sampling frequency {f:?}"))?,
        None => 250.0,
    };
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        bail!("sampling frequency must be positive, got {sample_rate}");
    }
    let n_samples = match fields.get(3) {
        Some(f) => Some(
            f.parse()
                .with_context(|| format!("bad sample count {f:?}"))?,
        ),
        None => None,
    };

    let channels = lines
        .take(n_signals)
        .map(parse_signal_line)
        .collect::<Result<Vec<_>>>()?;
    if channels.len() != n_signals {
        bail!(
            "header declares {} signals but has {} signal lines",
            n_signals,
            channels.len()
        );
    }

    Ok(RecordHeader {
        name,
        sample_rate,
        n_samples,
        channels,
    })
}

fn parse_signal_line(line: &str) -> Result<ChannelInfo> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 2 {
        bail!("signal line too short: {line:?}");
    }
    let file_name = fields[0].to_string();
    let format: u16 = numeric_prefix(fields[1])
        .parse()
        .with_context(|| format!("bad format {:?}", fields[1]))?;

    // gain[(baseline)][/units]
    let (mut gain, mut baseline, mut units) = (0.0, None, "mV".to_string());
    if let Some(spec) = fields.get(2) {
        let (value, unit) = match spec.split_once('/') {
            Some((v, u)) => (v, Some(u)),
            None => (*spec, None),
        };
        if let Some(u) = unit {
            units = u.to_string();
        }
        let (g, b) = match value.split_once('(') {
            Some((g, b)) => (g, Some(b.trim_end_matches(')'))),
            None => (value, None),
        };
        gain = g.parse().with_context(|| format!("bad gain {spec:?}"))?;
        if let Some(b) = b {
            baseline = Some(b.parse().with_context(|| format!("bad baseline {spec:?}"))?);
        }
    }
    if gain == 0.0 {
        gain = DEFAULT_GAIN;
    }

    let default_resolution = if format == 212 { 12 } else { 16 };
    let adc_resolution = match fields.get(3) {
        Some(f) => match f
            .parse::<u32>()
            .with_context(|| format!("bad ADC resolution {f:?}"))?
        {
            0 => default_resolution,
            r => r,
        },
        None => default_resolution,
    };
    if adc_resolution > MAX_ADC_RESOLUTION {
        bail!("ADC resolution of {adc_resolution} bits is out of range");
    }
    let adc_zero: i32 = match fields.get(4) {
        Some(f) => f.parse().with_context(|| format!("bad ADC zero {f:?}"))?,
        None => 0,
    };
    let label = fields.get(8..).map(|d| d.join(" ")).unwrap_or_default();

    Ok(ChannelInfo {
        file_name,
        format,
        label,
        units,
        gain,
        baseline: baseline.unwrap_or(adc_zero),
        adc_resolution,
    })
}

/// Decode an interleaved signal file into physical units, one vector per channel.
pub fn decode_signals(bytes: &[u8], header: &RecordHeader) -> Result<Vec<Vec<f64>>> {
    let channels = &header.channels;
    let Some(first) = channels.first() else {
        return Ok(Vec::new());
    };
    if channels
        .iter()
        .any(|c| c.file_name != first.file_name || c.format != first.format)
    {
        bail!("signals split across files or formats are not supported");
    }

    let (raw, invalid) = match first.format {
        212 => (unpack_212(bytes), -2048),
        16 => (unpack_16(bytes), i16::MIN as i32),
        other => bail!("unsupported signal format {other}"),
    };

    let nsig = channels.len();
    let mut frames = raw.len() / nsig;
    if let Some(n) = header.n_samples {
        if n > frames {
            bail!("header declares {n} samples but file holds {frames}");
        }
        frames = n;
    }

    let mut signals = vec![Vec::with_capacity(frames); nsig];
    for frame in raw.chunks_exact(nsig).take(frames) {
        for ((value, ch), out) in frame.iter().zip(channels).zip(signals.iter_mut()) {
            out.push(if *value == invalid {
                f64::NAN
            } else {
                ch.to_physical(*value)
            });
        }
    }
    Ok(signals)
}

/// Format 212: two 12-bit two's-complement samples in every three bytes.
fn unpack_212(bytes: &[u8]) -> Vec<i32> {
    let sign_extend = |v: i32| if v > 2047 { v - 4096 } else { v };
    let mut out = Vec::with_capacity(bytes.len() * 2 / 3);
    for chunk in bytes.chunks_exact(3) {
        let (b0, b1, b2) = (chunk[0] as i32, chunk[1] as i32, chunk[2] as i32);
        out.push(sign_extend(b0 | ((b1 & 0x0F) << 8)));
        out.push(sign_extend(b2 | ((b1 & 0xF0) << 4)));
    }
    out
}

/// Format 16: little-endian 16-bit samples.
fn unpack_16(bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]) as i32)
        .collect()
}

fn read_word(bytes: &[u8], pos: usize) -> Result<u16> {
    match bytes.get(pos..pos + 2) {
        Some(w) => Ok(u16::from_le_bytes([w[0], w[1]])),
        None => bail!("truncated annotation file at byte {pos}"),
    }
}

/// Parse a MIT-format annotation file into chronological events.
pub fn parse_annotations(bytes: &[u8]) -> Result<Vec<RawAnnotationEvent>> {
    let mut events: Vec<RawAnnotationEvent> = Vec::new();
    let mut sample: i64 = 0;
    let mut pos = 0;

    while pos + 1 < bytes.len() {
        let word = read_word(bytes, pos)?;
        pos += 2;
        let code = word >> 10;
        let value = word & 0x3FF;

        match code {
            0 if value == 0 => break,
            SKIP => {
                let high = read_word(bytes, pos)? as u32;
                let low = read_word(bytes, pos + 2)? as u32;
                sample += ((high << 16) | low) as i32 as i64;
                pos += 4;
            }
            NUM | SUB | CHN => {}
            AUX => {
                let len = value as usize;
                let note = bytes
                    .get(pos..pos + len)
                    .ok_or_else(|| anyhow!("truncated aux note at byte {pos}"))?;
                let event = events
                    .last_mut()
                    .ok_or_else(|| anyhow!("aux note before any annotation"))?;
                event.aux_note = String::from_utf8_lossy(note).into_owned();
                pos += len + (len & 1);
            }
            _ => {
                sample += value as i64;
                let index = u64::try_from(sample)
                    .map_err(|_| anyhow!("negative annotation time {sample}"))?;
                events.push(RawAnnotationEvent::new(index, symbol_for_code(code), ""));
            }
        }
    }

    Ok(events)
}
