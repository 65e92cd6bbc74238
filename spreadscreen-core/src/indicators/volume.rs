//! Volume measures used by the event and volatility-expansion checks.

use crate::domain::PriceSeries;

use super::{finite, require_len, require_period, IndicatorError};

/// Mean of the `period` volumes *before* the last bar.
///
/// Today's volume is excluded so it can be compared against the average.
pub fn average_volume(series: &PriceSeries, period: usize) -> Result<f64, IndicatorError> {
    require_period("average_volume", period)?;
    require_len("average_volume", series.len(), period + 1)?;
    let volumes = series.volumes();
    let end = volumes.len() - 1;
    let window = &volumes[end - period..end];
    finite("average_volume", window.iter().sum::<f64>() / period as f64)
}

/// Whether volume on recent down days is rising.
///
/// Takes the last `sample` down days (close below the previous close). The
/// two most recent are averaged and compared with the average of the
/// earlier ones (or the single earlier one when only two exist). Fewer than
/// two down days means no trend. Needs `min_history` bars.
pub fn down_day_volume_rising(
    series: &PriceSeries,
    sample: usize,
    min_history: usize,
) -> Result<bool, IndicatorError> {
    require_period("down_day_volume", sample)?;
    require_len("down_day_volume", series.len(), min_history.max(2))?;
    let bars = series.bars();
    let down_volumes: Vec<f64> = bars
        .windows(2)
        .filter(|pair| pair[1].is_down_from(pair[0].close))
        .map(|pair| pair[1].volume as f64)
        .collect();
    let recent_down = &down_volumes[down_volumes.len().saturating_sub(sample)..];
    if recent_down.len() < 2 {
        return Ok(false);
    }
    let split = recent_down.len() - 2;
    let recent_avg = (recent_down[split] + recent_down[split + 1]) / 2.0;
    let earlier_avg = if split == 0 {
        recent_down[0]
    } else {
        recent_down[..split].iter().sum::<f64>() / split as f64
    };
    Ok(recent_avg > earlier_avg)
}
