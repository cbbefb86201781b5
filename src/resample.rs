use rustfft::{num_complex::Complex, FftPlanner};

use crate::error::DatasetError;

/// Resample `signal` from `old_rate` to `new_rate`.
///
/// The signal is first zero-padded to a whole number of seconds so the
/// output length is `ceil(len / old_rate) * new_rate`. The padded buffer is
/// then resampled in the frequency domain. Equal rates still go through the
/// pad and FFT path.
pub fn resample_signal(
    signal: &[f64],
    old_rate: f64,
    new_rate: f64,
) -> Result<Vec<f64>, DatasetError> {
    check_rate(old_rate)?;
    check_rate(new_rate)?;
    if signal.is_empty() {
        return Err(DatasetError::EmptySignal);
    }

    let padded_secs = (signal.len() as f64 / old_rate).ceil();
    let padded = zero_pad(signal, (padded_secs * old_rate) as usize);
    let target_len = (padded_secs * new_rate) as usize;

    log::debug!(
        "resampling {} samples ({} padded) at {} Hz to {} samples at {} Hz",
        signal.len(),
        padded.len(),
        old_rate,
        target_len,
        new_rate
    );

    Ok(fft_resample(&padded, target_len))
}

fn check_rate(rate: f64) -> Result<(), DatasetError> {
    if rate.is_finite() && rate > 0.0 {
        Ok(())
    } else {
        Err(DatasetError::InvalidRate(rate))
    }
}

/// Copy `signal` into a zero-filled buffer of `len` samples.
pub fn zero_pad(signal: &[f64], len: usize) -> Vec<f64> {
    let mut padded = vec![0.0; len.max(signal.len())];
    padded[..signal.len()].copy_from_slice(signal);
    padded
}

/// Band-limited resampling of a real signal to exactly `num` samples.
///
/// Keeps the lowest `min(n, num)` frequency bins. When the shorter length is
/// even the Nyquist bin is doubled (downsampling) or halved (upsampling) so
/// the result matches the usual real-input Fourier resampling.
pub fn fft_resample(x: &[f64], num: usize) -> Vec<f64> {
    let n = x.len();
    if n == 0 || num == 0 {
        return vec![0.0; num];
    }

    let mut planner = FftPlanner::<f64>::new();

    let mut spectrum: Vec<Complex<f64>> = x.iter().map(|&v| Complex::new(v, 0.0)).collect();
    planner.plan_fft_forward(n).process(&mut spectrum);

    // Positive-frequency half of the output spectrum, bins 0..=num/2.
    let kept = n.min(num);
    let nyq = kept / 2 + 1;
    let mut half = vec![Complex::new(0.0, 0.0); num / 2 + 1];
    half[..nyq].copy_from_slice(&spectrum[..nyq]);

    if kept % 2 == 0 {
        if num < n {
            half[kept / 2] *= 2.0;
        } else if n < num {
            half[kept / 2] *= 0.5;
        }
    }

    // Rebuild the Hermitian spectrum; the imaginary parts of the DC and
    // Nyquist bins only affect the discarded imaginary output.
    let mut full = vec![Complex::new(0.0, 0.0); num];
    full[..half.len()].copy_from_slice(&half);
    for k in 1..(num + 1) / 2 {
        full[num - k] = half[k].conj();
    }

    planner.plan_fft_inverse(num).process(&mut full);

    // rustfft leaves the inverse unnormalised: 1/num, times the num/n gain.
    let scale = 1.0 / n as f64;
    full.iter().map(|c| c.re * scale).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(len: usize, rate: f64, freq: f64) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / rate).sin())
            .collect()
    }

    #[test]
    fn output_length_is_whole_seconds_at_new_rate() {
        let cases = [
            (1000, 360.0, 150.0),
            (720, 360.0, 150.0),
            (1, 360.0, 150.0),
            (361, 360.0, 360.0),
            (250, 100.0, 300.0),
        ];
        for (len, old, new) in cases {
            let out = resample_signal(&vec![0.5; len], old, new).unwrap();
            let expected = ((len as f64 / old).ceil() * new) as usize;
            assert_eq!(out.len(), expected, "len={} {}->{}", len, old, new);
        }
    }

    #[test]
    fn zero_pad_preserves_prefix_and_zeros_tail() {
        let signal = vec![1.5, -2.25, f64::MIN_POSITIVE, 3.0];
        let padded = zero_pad(&signal, 10);
        assert_eq!(padded.len(), 10);
        for (a, b) in signal.iter().zip(&padded) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
        assert!(padded[4..].iter().all(|&v| v.to_bits() == 0.0f64.to_bits()));
    }

    #[test]
    fn same_rate_still_pads() {
        // 1.5 s at 4 Hz -> 2 s, so two trailing zero-derived samples appear.
        let signal = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let out = resample_signal(&signal, 4.0, 4.0).unwrap();
        assert_eq!(out.len(), 8);
        for (i, &v) in signal.iter().enumerate() {
            assert!((out[i] - v).abs() < 1e-9, "index {}: {}", i, out[i]);
        }
        assert!(out[6].abs() < 1e-9 && out[7].abs() < 1e-9);
    }

    #[test]
    fn downsampled_sine_keeps_shape() {
        // 3 Hz sine over exactly 2 s: band-limited, so resampling is exact.
        let input = sine(720, 360.0, 3.0);
        let out = resample_signal(&input, 360.0, 150.0).unwrap();
        let expected = sine(300, 150.0, 3.0);
        for (a, b) in out.iter().zip(&expected) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn upsampled_sine_keeps_shape() {
        let input = sine(200, 100.0, 5.0);
        let out = resample_signal(&input, 100.0, 250.0).unwrap();
        assert_eq!(out.len(), 500);
        let expected = sine(500, 250.0, 5.0);
        for (a, b) in out.iter().zip(&expected) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn dc_level_survives() {
        let out = fft_resample(&[2.0; 36], 15);
        assert!(out.iter().all(|v| (v - 2.0).abs() < 1e-9));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            resample_signal(&[], 360.0, 150.0),
            Err(DatasetError::EmptySignal)
        ));
        assert!(matches!(
            resample_signal(&[1.0], 0.0, 150.0),
            Err(DatasetError::InvalidRate(_))
        ));
        assert!(matches!(
            resample_signal(&[1.0], 360.0, -1.0),
            Err(DatasetError::InvalidRate(_))
        ));
        assert!(resample_signal(&[1.0], f64::NAN, 150.0).is_err());
    }
}
