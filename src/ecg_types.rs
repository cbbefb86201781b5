
/// AAMI heartbeat class derived from a WFDB beat symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BeatType {
    /// N: normal and bundle branch block beats, escape beats.
    Normal,
    /// S: supraventricular ectopic beats.
    Supraventricular,
    /// V: ventricular ectopic beats.
    Ventricular,
    /// F: fusion of ventricular and normal.
    Fusion,
    /// Q: paced, fusion of paced and normal, unclassifiable.
    Unknown,
    /// Anything that is not a beat (rhythm markers, noise, artifacts).
    Other,
}

const BEAT_SYMBOLS: &[(&str, BeatType)] = &[
    ("N", BeatType::Normal),
    ("L", BeatType::Normal),
    ("R", BeatType::Normal),
    ("e", BeatType::Normal),
    ("j", BeatType::Normal),
    ("A", BeatType::Supraventricular),
    ("a", BeatType::Supraventricular),
    ("J", BeatType::Supraventricular),
    ("S", BeatType::Supraventricular),
    ("V", BeatType::Ventricular),
    ("E", BeatType::Ventricular),
    ("F", BeatType::Fusion),
    ("/", BeatType::Unknown),
    ("f", BeatType::Unknown),
    ("Q", BeatType::Unknown),
];

impl BeatType {
    pub const FALLBACK: BeatType = BeatType::Other;

    pub const ALL: [BeatType; 6] = [
        BeatType::Normal,
        BeatType::Supraventricular,
        BeatType::Ventricular,
        BeatType::Fusion,
        BeatType::Unknown,
        BeatType::Other,
    ];

    /// Map a WFDB annotation symbol to its AAMI class. Never fails.
    pub fn from_symbol(symbol: &str) -> BeatType {
        match BEAT_SYMBOLS.iter().find(|(s, _)| *s == symbol) {
            Some(&(_, beat)) => beat,
            None => {
                log::debug!("unmapped beat symbol {:?}, using {:?}", symbol, Self::FALLBACK);
                Self::FALLBACK
            }
        }
    }

    /// Single-letter AAMI code used in persisted files.
    pub fn code(self) -> &'static str {
        match self {
            BeatType::Normal => "N",
            BeatType::Supraventricular => "S",
            BeatType::Ventricular => "V",
            BeatType::Fusion => "F",
            BeatType::Unknown => "Q",
            BeatType::Other => "O",
        }
    }

    /// Inverse of [`BeatType::code`].
    pub fn from_code(code: &str) -> Option<BeatType> {
        Self::ALL.into_iter().find(|b| b.code() == code)
    }
}

/// Sustained rhythm in effect when a beat was annotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeartRhythm {
    Normal,
    AtrialBigeminy,
    AtrialFibrillation,
    AtrialFlutter,
    VentricularBigeminy,
    SecondDegreeBlock,
    Idioventricular,
    Nodal,
    Paced,
    PreExcitation,
    SinusBradycardia,
    SupraventricularTachyarrhythmia,
    VentricularTrigeminy,
    VentricularFlutter,
    VentricularTachycardia,
    Other,
}

// Rhythm codes as they appear after the "(" marker in MIT-BIH aux notes.
const RHYTHM_CODES: &[(&str, HeartRhythm)] = &[
    ("N", HeartRhythm::Normal),
    ("AB", HeartRhythm::AtrialBigeminy),
    ("AFIB", HeartRhythm::AtrialFibrillation),
    ("AFL", HeartRhythm::AtrialFlutter),
    ("B", HeartRhythm::VentricularBigeminy),
    ("BII", HeartRhythm::SecondDegreeBlock),
    ("IVR", HeartRhythm::Idioventricular),
    ("NOD", HeartRhythm::Nodal),
    ("P", HeartRhythm::Paced),
    ("PREX", HeartRhythm::PreExcitation),
    ("SBR", HeartRhythm::SinusBradycardia),
    ("SVTA", HeartRhythm::SupraventricularTachyarrhythmia),
    ("T", HeartRhythm::VentricularTrigeminy),
    ("VFL", HeartRhythm::VentricularFlutter),
    ("VT", HeartRhythm::VentricularTachycardia),
];

impl HeartRhythm {
    pub const FALLBACK: HeartRhythm = HeartRhythm::Other;

    /// Map a rhythm code (without the leading "(") to a rhythm. Never fails.
    pub fn from_rhythm_code(code: &str) -> HeartRhythm {
        match RHYTHM_CODES.iter().find(|(c, _)| *c == code) {
            Some(&(_, rhythm)) => rhythm,
            None => {
                log::debug!("unmapped rhythm code {:?}, using {:?}", code, Self::FALLBACK);
                Self::FALLBACK
            }
        }
    }

    /// Short code used in persisted files; the inverse of `from_code`.
    pub fn code(self) -> &'static str {
        RHYTHM_CODES
            .iter()
            .find(|(_, r)| *r == self)
            .map(|&(c, _)| c)
            .unwrap_or("OTHER")
    }

    /// Inverse of [`HeartRhythm::code`].
    pub fn from_code(code: &str) -> Option<HeartRhythm> {
        if code == HeartRhythm::Other.code() {
            return Some(HeartRhythm::Other);
        }
        RHYTHM_CODES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|&(_, r)| r)
    }
}
