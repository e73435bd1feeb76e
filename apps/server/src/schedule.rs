// --- Thermal load profile over the day ---
// Points are (hour_of_day, offset from the base load in %).
// Hour_of_day is a float from 0.0 (midnight) to 24.0 (midnight next day).
// A repeated hour makes a step.

const LOAD_OFFSETS: &[(f64, f64)] = &[
    (0.0, -10.0),  // Night load
    (8.0, -10.0),
    (8.0, 20.0),   // Business hours start
    (18.0, 20.0),
    (18.0, -10.0), // Back to night load
    (24.0, -10.0),
];

// Standard deviation of the load noise, same convention.
const LOAD_NOISE: &[(f64, f64)] = &[
    (0.0, 3.0),
    (8.0, 3.0),
    (8.0, 5.0),
    (18.0, 5.0),
    (18.0, 3.0),
    (24.0, 3.0),
];

pub fn linear(val_start: f64, val_end: f64, x_start: f64, x_end: f64, x_target: f64) -> f64 {
    if x_end == x_start {
        return val_start;
    }
    let progress = ((x_target - x_start) / (x_end - x_start)).clamp(0.0, 1.0);
    val_end * progress + val_start * (1.0 - progress)
}

/// Value of a piecewise-linear daily schedule at `hour`. Before the first
/// point the first value holds, after the last point the last one does.
/// An empty schedule yields 0.
pub fn interpolate(intervals: &[(f64, f64)], hour: f64) -> f64 {
    let (first, last) = match (intervals.first(), intervals.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return 0.0,
    };
    if hour <= first.0 {
        return first.1;
    }
    for pair in intervals.windows(2) {
        let (prev, curr) = (pair[0], pair[1]);
        if hour < curr.0 {
            return linear(prev.1, curr.1, prev.0, curr.0, hour);
        }
    }
    last.1
}

pub fn load_offset(hour: f64) -> f64 {
    interpolate(LOAD_OFFSETS, hour)
}

pub fn load_noise(hour: f64) -> f64 {
    interpolate(LOAD_NOISE, hour)
}
