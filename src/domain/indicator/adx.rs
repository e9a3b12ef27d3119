//! ADX (Average Directional Index) with +DI / -DI.
//!
//! up = high[i] - high[i-1], down = low[i-1] - low[i]
//! +DM = up if up > down and up > 0, else 0
//! -DM = down if down > up and down > 0, else 0
//! ±DI = Wilder(±DM, n) / Wilder(TR, n) × 100
//! DX = |+DI - -DI| / (+DI + -DI) × 100   (0 when both DI are 0)
//! ADX = EMA(DX, n)
//!
//! Bar 0 is NaN (no previous bar to measure movement against).

use super::atr::true_range;
use super::ema::calculate_ema;
use crate::domain::indicator_helpers::wilder_smooth;
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, PartialEq)]
pub struct AdxSeries {
    pub adx: Vec<f64>,
    pub plus_di: Vec<f64>,
    pub minus_di: Vec<f64>,
}

pub fn calculate_adx(bars: &[Bar], period: usize) -> AdxSeries {
    let n = bars.len();
    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];
    let mut tr = true_range(bars);
    if n > 0 {
        tr[0] = f64::NAN;
    }

    for i in 1..n {
        let up = bars[i].high - bars[i - 1].high;
        let down = bars[i - 1].low - bars[i].low;
        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
    }

    let smooth_plus = wilder_smooth(&plus_dm, period);
    let smooth_minus = wilder_smooth(&minus_dm, period);
    let smooth_tr = wilder_smooth(&tr, period);

    let directional = |dm: &[f64]| -> Vec<f64> {
        dm.iter()
            .zip(&smooth_tr)
            .map(|(&d, &t)| {
                if d.is_nan() || t.is_nan() {
                    f64::NAN
                } else if t == 0.0 {
                    0.0
                } else {
                    d / t * 100.0
                }
            })
            .collect()
    };
    let plus_di = directional(&smooth_plus);
    let minus_di = directional(&smooth_minus);

    let dx: Vec<f64> = plus_di
        .iter()
        .zip(&minus_di)
        .map(|(&p, &m)| {
            let sum = p + m;
            if sum.is_nan() {
                f64::NAN
            } else if sum == 0.0 {
                0.0
            } else {
                (p - m).abs() / sum * 100.0
            }
        })
        .collect();

    AdxSeries {
        adx: calculate_ema(&dx, period),
        plus_di,
        minus_di,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn make_bars(highs_lows: &[(f64, f64)]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        highs_lows
            .iter()
            .enumerate()
            .map(|(i, &(high, low))| Bar {
                timestamp: start + Duration::days(i as i64),
                open: (high + low) / 2.0,
                high,
                low,
                close: (high + low) / 2.0,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn first_bar_is_nan() {
        let bars = make_bars(&[(10.0, 9.0), (11.0, 10.0)]);
        let series = calculate_adx(&bars, 14);
        assert!(series.adx[0].is_nan());
        assert!(series.plus_di[0].is_nan());
        assert!(!series.adx[1].is_nan());
    }

    #[test]
    fn steady_uptrend_has_only_positive_movement() {
        let hl: Vec<(f64, f64)> = (0..30).map(|i| (101.0 + i as f64, 99.0 + i as f64)).collect();
        let series = calculate_adx(&make_bars(&hl), 14);
        assert!(series.plus_di[29] > 0.0);
        assert!(series.minus_di[29].abs() < 1e-12);
        assert!((series.adx[29] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn flat_market_has_zero_adx() {
        let hl = vec![(101.0, 99.0); 20];
        let series = calculate_adx(&make_bars(&hl), 14);
        assert!(series.adx[19].abs() < 1e-12);
    }

    #[test]
    fn adx_bounded() {
        let hl: Vec<(f64, f64)> = (0..60)
            .map(|i| {
                let mid = 100.0 + (i as f64 * 0.7).sin() * 5.0;
                (mid + 1.0, mid - 1.0)
            })
            .collect();
        let series = calculate_adx(&make_bars(&hl), 14);
        for v in series.adx.iter().skip(1) {
            assert!((0.0..=100.0).contains(v));
        }
    }
}
