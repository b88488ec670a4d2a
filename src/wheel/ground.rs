// ==============================================================================
// ground.rs - VESSEL LANDED / SPLASHED AGGREGATION
// ------------------------------------------------------------------------------
// The dominant surface is the first grounded wheel's surface. The landed
// state is only recomputed when that surface's identity changes, so wheels
// alternating contact on the same collider do not churn the flag.
// ==============================================================================

use serde::Serialize;
use tracing::debug;

use crate::wheel::types::ContactSurface;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LandedState {
    pub landed: bool,
    pub splashed: bool,
    pub biome: Option<String>,
    /// Standing on another moving body rather than terrain.
    pub on_body: bool,
}

impl LandedState {
    fn from_surface(surface: Option<&ContactSurface>) -> Self {
        match surface {
            Some(ContactSurface::Body { landed, splashed, .. }) => Self {
                landed: *landed,
                splashed: *splashed,
                biome: None,
                on_body: true,
            },
            Some(ContactSurface::Terrain { biome, water, .. }) => Self {
                landed: !*water,
                splashed: *water,
                biome: biome.clone(),
                on_body: false,
            },
            None => Self::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GroundContactAggregator {
    previous_key: Option<(u8, u64)>,
    previous: LandedState,
    recomputes: u64,
}

impl GroundContactAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &LandedState {
        &self.previous
    }

    pub fn landed(&self) -> bool {
        self.previous.landed
    }

    /// Times the landed state was actually re-derived.
    pub fn recompute_count(&self) -> u64 {
        self.recomputes
    }

    /// Fold one tick of wheel contacts: `(grounded, surface)` per wheel.
    pub fn update<'a, I>(&mut self, contacts: I) -> &LandedState
    where
        I: IntoIterator<Item = (bool, Option<&'a ContactSurface>)>,
    {
        let dominant = contacts
            .into_iter()
            .find_map(|(grounded, surface)| if grounded { surface } else { None });
        let key = dominant.map(ContactSurface::key);

        if key != self.previous_key {
            let next = LandedState::from_surface(dominant);
            if next != self.previous {
                debug!(
                    landed = next.landed,
                    splashed = next.splashed,
                    biome = ?next.biome,
                    "landed state changed"
                );
            }
            self.previous = next;
            self.previous_key = key;
            self.recomputes += 1;
        }
        &self.previous
    }

    /// Forget hysteresis; the next update recomputes from scratch.
    pub fn reset(&mut self) {
        self.previous_key = None;
        self.previous = LandedState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terrain(id: u64) -> ContactSurface {
        ContactSurface::Terrain { id, biome: Some("Flats".into()), water: false }
    }

    #[test]
    fn terrain_is_landed_with_biome() {
        let mut agg = GroundContactAggregator::new();
        let t = terrain(1);
        let s = agg.update([(true, Some(&t))]);
        assert!(s.landed);
        assert_eq!(s.biome.as_deref(), Some("Flats"));
    }

    #[test]
    fn body_surface_uses_its_own_state() {
        let mut agg = GroundContactAggregator::new();
        let b = ContactSurface::Body { id: 3, landed: false, splashed: true };
        let s = agg.update([(true, Some(&b))]);
        assert!(!s.landed);
        assert!(s.splashed);
        assert!(s.on_body);
    }

    #[test]
    fn no_contact_is_not_landed() {
        let mut agg = GroundContactAggregator::new();
        let t = terrain(1);
        agg.update([(true, Some(&t))]);
        assert!(!agg.update([(false, None)]).landed);
    }
}
