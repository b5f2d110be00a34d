//! Longitude/latitude "projection".

use crate::transform::Projector;

/// Identity projection, shifted by the prime meridian.
#[derive(Debug, Clone)]
pub struct Geographic {
    prime_meridian: f64,
}

impl Geographic {
    pub fn new(prime_meridian: f64) -> Self {
        Self { prime_meridian }
    }
}

impl Projector for Geographic {
    fn forward(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        if !(-90.0..=90.0).contains(&lat) {
            return None;
        }
        Some((lon - self.prime_meridian, lat))
    }

    fn inverse(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        if !(-90.0..=90.0).contains(&y) {
            return None;
        }
        Some((x + self.prime_meridian, y))
    }
}
