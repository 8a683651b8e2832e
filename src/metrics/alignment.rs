use crate::error::EvalError;

/// Truncates both sequences to the shorter length, keeping the leading prefix
/// of each. No re-centering and no interpolation.
pub fn align<'a, 'b, A, B>(a: &'a [A], b: &'b [B]) -> (&'a [A], &'b [B]) {
    let len = a.len().min(b.len());
    (&a[..len], &b[..len])
}

/// [`align`], failing with `EmptyOverlap` when nothing is left to compare.
pub fn align_nonempty<'a, 'b, A, B>(
    context: &'static str,
    a: &'a [A],
    b: &'b [B],
) -> Result<(&'a [A], &'b [B]), EvalError> {
    let (a, b) = align(a, b);
    if a.is_empty() {
        return Err(EvalError::EmptyOverlap { context });
    }
    Ok((a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_keeps_common_prefix() {
        let a: Vec<i32> = (0..10).collect();
        let b: Vec<i32> = (100..107).collect();
        let (a_aligned, b_aligned) = align(&a, &b);
        assert_eq!(a_aligned.len(), 7);
        assert_eq!(b_aligned.len(), 7);
        assert_eq!(a_aligned, &a[..7]);
        assert_eq!(b_aligned, &b[..]);
    }

    #[test]
    fn align_is_symmetric_in_truncation() {
        let a = [1.0f32, 2.0, 3.0];
        let b = [9.0f64, 8.0, 7.0, 6.0, 5.0];
        let (x, y) = align(&b, &a);
        assert_eq!(x, &[9.0, 8.0, 7.0]);
        assert_eq!(y, &a[..]);
    }

    #[test]
    fn align_nonempty_rejects_zero_overlap() {
        let a: [f32; 0] = [];
        let b = [1.0f32];
        assert!(matches!(
            align_nonempty("waveform", &a, &b),
            Err(EvalError::EmptyOverlap { context: "waveform" })
        ));
        assert!(align_nonempty("waveform", &b, &b).is_ok());
    }
}
