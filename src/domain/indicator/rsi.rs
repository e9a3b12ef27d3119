//! RSI (Relative Strength Index).
//!
//! Average gain and loss use Wilder smoothing (alpha = 1/n) seeded with the
//! first close-to-close change:
//! - avg = prev_avg + (current - prev_avg) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Bar 0 is NaN (no price change yet).

use crate::domain::indicator_helpers::wilder_smooth;

pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < 2 {
        return vec![f64::NAN; closes.len()];
    }

    let mut gains = Vec::with_capacity(closes.len());
    let mut losses = Vec::with_capacity(closes.len());
    gains.push(f64::NAN);
    losses.push(f64::NAN);
    for w in closes.windows(2) {
        let change = w[1] - w[0];
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    let avg_gain = wilder_smooth(&gains, period);
    let avg_loss = wilder_smooth(&losses, period);

    avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(&g, &l)| {
            if g.is_nan() || l.is_nan() {
                f64::NAN
            } else if l == 0.0 {
                100.0
            } else {
                100.0 - (100.0 / (1.0 + g / l))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_empty_and_single() {
        assert!(calculate_rsi(&[], 14).is_empty());
        let single = calculate_rsi(&[100.0], 14);
        assert_eq!(single.len(), 1);
        assert!(single[0].is_nan());
    }

    #[test]
    fn rsi_first_bar_nan_then_defined() {
        let series = calculate_rsi(&[100.0, 101.0, 100.5], 14);
        assert!(series[0].is_nan());
        assert!(!series[1].is_nan());
        assert!(!series[2].is_nan());
    }

    #[test]
    fn rsi_all_gains_no_losses() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let series = calculate_rsi(&closes, 14);
        assert!((series[19] - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_all_losses_no_gains() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let series = calculate_rsi(&closes, 14);
        assert!(series[19].abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_flat_prices_are_100() {
        let series = calculate_rsi(&[50.0; 5], 14);
        assert!((series[4] - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rsi_wilder_smoothing_by_hand() {
        // changes: +2, -1, +1
        let series = calculate_rsi(&[10.0, 12.0, 11.0, 12.0], 2);
        let gain = [2.0, 0.5 * 0.0 + 0.5 * 2.0, 0.5 * 1.0 + 0.5 * 1.0];
        let loss = [0.0, 0.5 * 1.0 + 0.5 * 0.0, 0.5 * 0.0 + 0.5 * 0.5];
        assert!((series[1] - 100.0).abs() < 1e-12);
        let expected_2 = 100.0 - 100.0 / (1.0 + gain[1] / loss[1]);
        let expected_3 = 100.0 - 100.0 / (1.0 + gain[2] / loss[2]);
        assert!((series[2] - expected_2).abs() < 1e-12);
        assert!((series[3] - expected_3).abs() < 1e-12);
    }

    #[test]
    fn rsi_in_range() {
        let closes: Vec<f64> = (1..=40)
            .map(|i| 100.0 + (i as f64 % 7.0 - 3.0) * 2.0)
            .collect();
        for rsi in calculate_rsi(&closes, 14).into_iter().skip(1) {
            assert!((0.0..=100.0).contains(&rsi), "RSI {} out of range", rsi);
        }
    }
}
