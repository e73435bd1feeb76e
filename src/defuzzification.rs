use crate::membership::{LinguisticVariable, TermDegrees};

/// Centroid of the clipped-and-unioned output set, sampled over the output
/// universe.
///
/// Each term's shape is clipped at its aggregated activation (min), the
/// clipped shapes are unioned pointwise (max), and the weighted mean of the
/// samples is returned. When nothing is active the output universe midpoint is
/// returned instead.
pub fn centroid(activations: &TermDegrees, output: &LinguisticVariable) -> f64 {
    let mut weighted = 0.0;
    let mut total = 0.0;

    for x in output.universe() {
        let membership = output
            .terms()
            .zip(activations.iter())
            .filter(|(_, (_, activation))| *activation > 0.0)
            .map(|((_, shape), (_, activation))| shape.degree(x).min(activation))
            .fold(0.0, f64::max);
        weighted += x * membership;
        total += membership;
    }

    if total == 0.0 {
        return output.midpoint();
    }
    weighted / total
}
