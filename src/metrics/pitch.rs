use crate::error::EvalError;

pub const VOICING_FLOOR_HZ: f64 = 80.0;
const CENT_REFERENCE_HZ: f64 = 440.0;

/// Cents relative to A4 (440 Hz). Only defined for positive frequencies.
pub fn cents(freq_hz: f64) -> f64 {
    1200.0 * (freq_hz / CENT_REFERENCE_HZ).log2()
}

/// True where the reference frame is at or above the voicing floor.
pub fn voicing_mask(reference_hz: &[f64], voicing_floor_hz: f64) -> Vec<bool> {
    reference_hz
        .iter()
        .map(|&f| f >= voicing_floor_hz)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchError {
    pub abs_error_sum: f64,
    pub valid_frames: usize,
    /// Voiced reference frames dropped because the estimate was not positive.
    pub unvoiced_estimate_frames: usize,
}

impl PitchError {
    /// NaN when no frame was valid.
    pub fn mean(&self) -> f64 {
        if self.valid_frames == 0 {
            f64::NAN
        } else {
            self.abs_error_sum / self.valid_frames as f64
        }
    }
}

/// Absolute cent error over the frames the voicing mask keeps.
///
/// Tracks must already be aligned. A frame counts when the reference is at or
/// above `voicing_floor_hz` and the estimate is a positive finite frequency;
/// no other frame touches the sum or the count.
pub fn pitch_error(
    reference_hz: &[f64],
    estimate_hz: &[f64],
    voicing_floor_hz: f64,
) -> Result<PitchError, EvalError> {
    if reference_hz.len() != estimate_hz.len() {
        return Err(EvalError::shape_mismatch(
            "pitch error",
            reference_hz.len(),
            estimate_hz.len(),
        ));
    }
    if voicing_floor_hz.is_nan() || voicing_floor_hz <= 0.0 {
        return Err(EvalError::invalid_input(format!(
            "voicing floor must be positive, got {voicing_floor_hz}"
        )));
    }

    let mask = voicing_mask(reference_hz, voicing_floor_hz);
    let mut result = PitchError {
        abs_error_sum: 0.0,
        valid_frames: 0,
        unvoiced_estimate_frames: 0,
    };
    for ((&voiced, &reference), &estimate) in mask.iter().zip(reference_hz).zip(estimate_hz) {
        if !voiced {
            continue;
        }
        if !estimate.is_finite() || estimate <= 0.0 {
            result.unvoiced_estimate_frames += 1;
            continue;
        }
        result.abs_error_sum += (cents(estimate) - cents(reference)).abs();
        result.valid_frames += 1;
    }
    Ok(result)
}

/// `(mean_abs_cent_error, valid_frame_count)`; the mean is NaN when the count is 0.
pub fn f0_error(
    reference_hz: &[f64],
    estimate_hz: &[f64],
    voicing_floor_hz: f64,
) -> Result<(f64, usize), EvalError> {
    let error = pitch_error(reference_hz, estimate_hz, voicing_floor_hz)?;
    Ok((error.mean(), error.valid_frames))
}
