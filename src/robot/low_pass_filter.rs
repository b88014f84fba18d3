// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains functions for filtering signals with a low-pass filter.

use crate::utils::Vector7;

/// Smoothing constant used for the joint velocity filter of the impedance controller.
/// A value close to one tracks the measured velocity closely and only removes little noise.
pub static VELOCITY_FILTER_ALPHA: f64 = 0.99;

/// Applies a first-order low-pass filter in its exponential smoothing form
/// ![y_f = (1 - \alpha) y_{last} + \alpha y](https://latex.codecogs.com/png.latex?y_f=(1-\alpha)y_{last}+\alpha&space;y)
///
/// # Arguments
/// * `alpha` - Weight of the new sample in \[0, 1\]
/// * `y` - Current value of the signal to be filtered
/// * `y_last` - Filtered value of the previous time step
/// # Panics
/// This function panics if:
/// * y is infinite or NaN.
/// * y_last is infinite or NaN.
/// * alpha is outside of \[0, 1\].
/// # Return
/// Filtered value.
pub fn exponential_smoothing(alpha: f64, y: f64, y_last: f64) -> f64 {
    assert!((0.0..=1.0).contains(&alpha));
    assert!(y.is_finite() && y_last.is_finite());
    // y_last + alpha * (y - y_last) keeps a settled signal exactly constant
    y_last + alpha * (y - y_last)
}

/// Applies [`exponential_smoothing`] to every joint.
/// # Panics
/// See [`exponential_smoothing`].
pub fn joint_exponential_smoothing(alpha: f64, y: &Vector7, y_last: &Vector7) -> Vector7 {
    y.zip_map(y_last, |y, y_last| exponential_smoothing(alpha, y, y_last))
}

#[cfg(test)]
mod tests {
    use crate::robot::low_pass_filter::{
        exponential_smoothing, joint_exponential_smoothing, VELOCITY_FILTER_ALPHA,
    };
    use crate::utils::Vector7;

    #[test]
    fn smoothing_test() {
        assert!((exponential_smoothing(0.99, 1.0, 0.0) - 0.99).abs() < 1e-12);
        assert!((exponential_smoothing(0.5, 1.0, 0.0) - 0.5).abs() < 1e-12);
        assert!((exponential_smoothing(0.99, 0.0, 1.0) - 0.01).abs() < 1e-12);
        assert_eq!(exponential_smoothing(0.0, 5.0, 1.0), 1.0);
        assert_eq!(exponential_smoothing(1.0, 5.0, 1.0), 5.0);
    }

    #[test]
    fn settled_signal_stays_constant() {
        let input = Vector7::from_row_slice(&[0.3, -0.7, 1e-3, 2.5, -1.1, 0.0, 0.123456789]);
        let mut filtered = Vector7::zeros();
        for _ in 0..20 {
            filtered = joint_exponential_smoothing(VELOCITY_FILTER_ALPHA, &input, &filtered);
        }
        assert!((filtered - input).amax() < 1e-12);
        let settled = input;
        let next = joint_exponential_smoothing(VELOCITY_FILTER_ALPHA, &input, &settled);
        assert_eq!(next, settled);
    }

    #[test]
    #[should_panic]
    fn rejects_nan() {
        exponential_smoothing(0.99, f64::NAN, 0.0);
    }
}
