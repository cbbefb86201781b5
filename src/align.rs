
use crate::ecg_types::{BeatType, HeartRhythm};

/// Marker that opens a rhythm change in an auxiliary note, e.g. "(AFIB".
const RHYTHM_MARKER: char = '(';

/// One annotation as stored in the source database.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAnnotationEvent {
    /// Sample index at the source sample rate.
    pub sample: u64,
    /// Annotation mnemonic; empty for events that carry no beat.
    pub symbol: String,
    /// Free text; may hold NUL characters straight from the file.
    pub aux_note: String,
}

impl RawAnnotationEvent {
    /// Event at `sample` with the given mnemonic and raw aux note.
    pub fn new(sample: u64, symbol: &str, aux_note: &str) -> Self {
        Self {
            sample,
            symbol: symbol.to_string(),
            aux_note: aux_note.to_string(),
        }
    }
}

/// A beat annotation with the rhythm active when it occurred.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatLabel {
    /// Seconds from the start of the record.
    pub time: f64,
    pub beat: BeatType,
    pub rhythm: HeartRhythm,
}

/// Rhythm in effect while walking one record's annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RhythmContext {
    pub current: HeartRhythm,
}

impl Default for RhythmContext {
    fn default() -> Self {
        Self {
            current: HeartRhythm::Normal,
        }
    }
}

impl RhythmContext {
    /// Apply an auxiliary note. Notes that don't open with the rhythm
    /// marker leave the context unchanged.
    pub fn observe(self, aux_note: &str) -> Self {
        match rhythm_change(aux_note) {
            Some(code) => Self {
                current: HeartRhythm::from_rhythm_code(code),
            },
            None => self,
        }
    }
}

/// Rhythm code carried by an auxiliary note, with NULs stripped.
pub fn rhythm_change(aux_note: &str) -> Option<&str> {
    aux_note.trim_matches('\0').strip_prefix(RHYTHM_MARKER)
}

/// Turn a chronological annotation stream into beat labels.
///
/// The rhythm context is folded through the stream. An event's own rhythm
/// change is applied before its label is emitted, and events with an empty
/// symbol only update the context.
pub fn align_annotations(events: &[RawAnnotationEvent], sample_rate: f64) -> Vec<BeatLabel> {
    let (_, labels) = events.iter().fold(
        (RhythmContext::default(), Vec::with_capacity(events.len())),
        |(context, mut labels), event| {
            let context = context.observe(&event.aux_note);
            if !event.symbol.is_empty() {
                labels.push(BeatLabel {
                    time: event.sample as f64 / sample_rate,
                    beat: BeatType::from_symbol(&event.symbol),
                    rhythm: context.current,
                });
            }
            (context, labels)
        },
    );
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rhythm_change_applies_to_later_beats_only() {
        let events = vec![
            RawAnnotationEvent::new(0, "N", ""),
            RawAnnotationEvent::new(1, "", "(AFIB\0"),
            RawAnnotationEvent::new(2, "N", ""),
        ];
        let labels = align_annotations(&events, 1.0);
        assert_eq!(
            labels,
            vec![
                BeatLabel {
                    time: 0.0,
                    beat: BeatType::Normal,
                    rhythm: HeartRhythm::Normal
                },
                BeatLabel {
                    time: 2.0,
                    beat: BeatType::Normal,
                    rhythm: HeartRhythm::AtrialFibrillation
                },
            ]
        );
    }

    #[test]
    fn same_event_sees_its_own_rhythm_change() {
        let events = vec![
            RawAnnotationEvent::new(360, "+", "(VT"),
            RawAnnotationEvent::new(400, "V", ""),
        ];
        let labels = align_annotations(&events, 360.0);
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].rhythm, HeartRhythm::VentricularTachycardia);
        assert_eq!(labels[0].beat, BeatType::Other);
        assert_eq!(labels[0].time, 1.0);
        assert_eq!(labels[1].rhythm, HeartRhythm::VentricularTachycardia);
        assert_eq!(labels[1].beat, BeatType::Ventricular);
    }

    #[test]
    fn empty_symbol_never_emits() {
        let events = vec![
            RawAnnotationEvent::new(5, "", ""),
            RawAnnotationEvent::new(6, "", "(N"),
            RawAnnotationEvent::new(7, "", "noise"),
            RawAnnotationEvent::new(8, "", "\0\0"),
        ];
        assert!(align_annotations(&events, 360.0).is_empty());
    }

    #[test]
    fn non_marker_notes_keep_context() {
        let events = vec![
            RawAnnotationEvent::new(0, "", "(B"),
            RawAnnotationEvent::new(1, "N", "PVC run"),
            RawAnnotationEvent::new(2, "N", "\0"),
            RawAnnotationEvent::new(3, "A", "(XYZ"),
            RawAnnotationEvent::new(4, "N", "(N\0"),
        ];
        let rhythms: Vec<_> = align_annotations(&events, 1.0)
            .into_iter()
            .map(|l| l.rhythm)
            .collect();
        assert_eq!(
            rhythms,
            vec![
                HeartRhythm::VentricularBigeminy,
                HeartRhythm::VentricularBigeminy,
                HeartRhythm::Other,
                HeartRhythm::Normal,
            ]
        );
    }

    #[test]
    fn duplicate_samples_keep_encounter_order() {
        let events = vec![
            RawAnnotationEvent::new(10, "N", ""),
            RawAnnotationEvent::new(10, "V", "(SVTA"),
        ];
        let labels = align_annotations(&events, 10.0);
        assert_eq!(labels[0].beat, BeatType::Normal);
        assert_eq!(labels[0].rhythm, HeartRhythm::Normal);
        assert_eq!(labels[1].beat, BeatType::Ventricular);
        assert_eq!(labels[1].rhythm, HeartRhythm::SupraventricularTachyarrhythmia);
        assert_eq!(labels[0].time, labels[1].time);
    }

    #[test]
    fn marker_parsing_strips_nuls() {
        assert_eq!(rhythm_change("(AFIB\0"), Some("AFIB"));
        assert_eq!(rhythm_change("\0(AFL"), Some("AFL"));
        assert_eq!(rhythm_change("("), Some(""));
        assert_eq!(rhythm_change(""), None);
        assert_eq!(rhythm_change("TS"), None);
    }
}
