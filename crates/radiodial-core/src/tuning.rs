//! Gaussian tuning model and dial state.

use crate::catalog::Station;

/// Volume of `station` heard with the dial at `dial`, in `[0, station.strength]`.
///
/// Stations are independent: several may be non-zero at the same position.
#[inline]
pub fn volume(dial: f32, station: &Station) -> f32 {
    let offset = dial - station.position;
    let falloff = (-(offset * offset) / (2.0 * station.sigma * station.sigma)).exp();
    (station.strength * falloff).clamp(0.0, 1.0)
}

/// Volumes for every station, in catalog order.
pub fn volumes<'a>(dial: f32, stations: impl IntoIterator<Item = &'a Station>) -> Vec<f32> {
    stations.into_iter().map(|s| volume(dial, s)).collect()
}

/// Dial position, clamped to `[0, max]`.
///
/// Written only through [`DialState::set`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DialState {
    position: f32,
    max: f32,
}

impl DialState {
    pub fn new(position: f32, max: f32) -> Self {
        let mut dial = Self { position: 0.0, max };
        dial.set(position);
        dial
    }

    /// Returns false (and keeps the old value) for non-finite input.
    pub fn set(&mut self, position: f32) -> bool {
        if !position.is_finite() {
            return false;
        }
        self.position = position.clamp(0.0, self.max);
        true
    }

    #[inline]
    pub fn position(&self) -> f32 {
        self.position
    }

    #[inline]
    pub fn max(&self) -> f32 {
        self.max
    }
}
