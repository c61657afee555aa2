//! Elevation enrichment of route lines.

use geo::LineString;
use thiserror::Error;

/// Errors reported by an [`ElevationSource`].
#[derive(Debug, Error)]
#[error("elevation lookup failed: {message}")]
pub struct ElevationError {
    message: String,
}

impl ElevationError {
    /// Wrap a source-specific failure description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Attaches elevations to the vertices of a line.
pub trait ElevationSource {
    /// One sample per vertex of `line`, in metres; `None` where the source
    /// has no data. An empty vector means the source has nothing to offer.
    fn attach(&self, line: &LineString) -> Result<Vec<Option<f64>>, ElevationError>;
}

/// Source without elevation data; routes keep an unknown climb.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoElevation;

impl ElevationSource for NoElevation {
    fn attach(&self, _line: &LineString) -> Result<Vec<Option<f64>>, ElevationError> {
        Ok(Vec::new())
    }
}

/// Total ascent and descent over consecutive known samples.
///
/// Returns `None` when fewer than two samples are known.
///
/// # Examples
/// ```
/// use traildb_core::climb;
///
/// let samples = [Some(100.0), Some(150.0), None, Some(120.0)];
/// assert_eq!(climb(&samples), Some((50.0, 30.0)));
/// ```
#[must_use]
pub fn climb(samples: &[Option<f64>]) -> Option<(f64, f64)> {
    let known: Vec<f64> = samples.iter().flatten().copied().collect();
    if known.len() < 2 {
        return None;
    }
    let (ascent, descent) = known
        .windows(2)
        .filter_map(|pair| match pair {
            [from, to] => Some(to - from),
            _ => None,
        })
        .fold((0.0, 0.0), |(up, down), delta| {
            if delta > 0.0 {
                (up + delta, down)
            } else {
                (up, down - delta)
            }
        });
    Some((ascent, descent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[], None)]
    #[case(&[Some(10.0)], None)]
    #[case(&[None, None], None)]
    #[case(&[Some(10.0), Some(10.0)], Some((0.0, 0.0)))]
    #[case(&[Some(10.0), Some(30.0), Some(5.0), Some(25.0)], Some((40.0, 25.0)))]
    fn sums_deltas(#[case] samples: &[Option<f64>], #[case] expected: Option<(f64, f64)>) {
        assert_eq!(climb(samples), expected);
    }

    #[rstest]
    fn no_elevation_yields_no_climb() {
        let line = LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]);
        let samples = NoElevation.attach(&line).expect("no-op source");
        assert_eq!(climb(&samples), None);
    }
}
