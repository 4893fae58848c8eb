//! Pet entity: the decaying creature at the center of the simulation.
//!
//! A pet carries three stats (hunger, happiness, cleanliness), each bounded
//! to `[0, 100]`. Handlers never write a stat directly -- every mutation
//! goes through the helpers here, which clamp the result and refresh
//! `last_updated`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decay::decay_stat;
use crate::ids::{PetId, PoopId, SessionId};

/// Lower bound of every pet stat.
pub const STAT_MIN: Decimal = Decimal::ZERO;

/// Upper bound of every pet stat.
pub const STAT_MAX: Decimal = Decimal::ONE_HUNDRED;

/// Fraction of a food's value that also raises happiness when feeding.
const HAPPINESS_PER_FOOD: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Clamp a stat value into `[STAT_MIN, STAT_MAX]`.
pub fn clamp_stat(value: Decimal) -> Decimal {
    value.clamp(STAT_MIN, STAT_MAX)
}

/// A poop dropped by a pet at a client-reported position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poop {
    /// Unique identifier of this poop.
    pub id: PoopId,
    /// The pet that produced it.
    pub pet_id: PetId,
    /// Horizontal position in the room scene.
    pub position_x: Decimal,
    /// Vertical position in the room scene.
    pub position_y: Decimal,
}

/// Per-species decay rates, expressed per hour of wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecayRates {
    /// Hunger lost per hour.
    pub hunger_per_hour: Decimal,
    /// Happiness lost per hour.
    pub happiness_per_hour: Decimal,
    /// Cleanliness lost per hour.
    pub cleanliness_per_hour: Decimal,
}

/// A pet owned by a player in the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pet {
    /// Unique identifier of this pet.
    pub id: PetId,
    /// Session of the owning player.
    pub owner_id: SessionId,
    /// Species key, resolved against the reference catalog.
    pub pet_type: String,
    /// Hunger satisfaction, `[0, 100]` (0 = starving).
    pub hunger: Decimal,
    /// Happiness, `[0, 100]`.
    pub happiness: Decimal,
    /// Cleanliness, `[0, 100]`.
    pub cleanliness: Decimal,
    /// Timestamp of the last stat mutation; the decay baseline.
    pub last_updated: DateTime<Utc>,
    /// Poops currently on the floor around this pet.
    pub poops: Vec<Poop>,
}

impl Pet {
    /// Create a pet with full stats.
    pub fn new(id: PetId, owner_id: SessionId, pet_type: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            owner_id,
            pet_type: pet_type.into(),
            hunger: STAT_MAX,
            happiness: STAT_MAX,
            cleanliness: STAT_MAX,
            last_updated: now,
            poops: Vec::new(),
        }
    }

    /// Feed the pet: hunger rises by `food_value` (capped at 100) and
    /// happiness by half of it.
    pub fn feed(&mut self, food_value: Decimal, now: DateTime<Utc>) {
        self.hunger = clamp_stat(self.hunger.saturating_add(food_value));
        let happiness_gain = food_value
            .checked_mul(HAPPINESS_PER_FOOD)
            .unwrap_or(Decimal::ZERO);
        self.happiness = clamp_stat(self.happiness.saturating_add(happiness_gain));
        self.last_updated = now;
    }

    /// Play with the pet: happiness rises, hunger drops by the play cost.
    pub fn play(&mut self, happiness_value: Decimal, hunger_cost: Decimal, now: DateTime<Utc>) {
        self.happiness = clamp_stat(self.happiness.saturating_add(happiness_value));
        self.hunger = clamp_stat(self.hunger.saturating_sub(hunger_cost));
        self.last_updated = now;
    }

    /// Clean the pet: cleanliness returns to full and the floor is cleared.
    pub fn clean(&mut self, now: DateTime<Utc>) {
        self.cleanliness = STAT_MAX;
        self.poops.clear();
        self.last_updated = now;
    }

    /// Drop a poop at the given position, bounded by `max_poops`.
    ///
    /// Returns the new poop's id, or `None` if the floor is already full
    /// (the oldest poops are kept; the new one is discarded).
    pub fn add_poop(
        &mut self,
        position_x: Decimal,
        position_y: Decimal,
        max_poops: usize,
    ) -> Option<PoopId> {
        if self.poops.len() >= max_poops {
            return None;
        }
        let id = PoopId::new();
        self.poops.push(Poop {
            id,
            pet_id: self.id,
            position_x,
            position_y,
        });
        Some(id)
    }

    /// Apply time-based decay to all three stats independently.
    ///
    /// Only runs when at least `threshold_ms` has elapsed since
    /// `last_updated`; returns whether any stat changed.
    pub fn apply_decay(&mut self, rates: &DecayRates, threshold_ms: i64, now: DateTime<Utc>) -> bool {
        let elapsed_ms = now
            .signed_duration_since(self.last_updated)
            .num_milliseconds();
        if elapsed_ms < threshold_ms {
            return false;
        }

        let baseline = self.last_updated;
        self.hunger = decay_stat(self.hunger, baseline, rates.hunger_per_hour, now).value;
        self.happiness = decay_stat(self.happiness, baseline, rates.happiness_per_hour, now).value;
        self.cleanliness =
            decay_stat(self.cleanliness, baseline, rates.cleanliness_per_hour, now).value;
        self.last_updated = now;
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    fn make_pet() -> Pet {
        Pet::new(PetId::new(), SessionId::new("s1"), "cat", Utc::now())
    }

    fn rates(n: i64) -> DecayRates {
        DecayRates {
            hunger_per_hour: dec(n),
            happiness_per_hour: dec(n),
            cleanliness_per_hour: dec(n),
        }
    }

    #[test]
    fn feed_caps_hunger_at_hundred() {
        let mut pet = make_pet();
        pet.hunger = dec(80);
        pet.happiness = dec(40);
        let now = Utc::now();
        pet.feed(dec(25), now);
        // 80 + 25 caps at 100
        assert_eq!(pet.hunger, dec(100));
        // happiness gains food_value * 0.5
        assert_eq!(pet.happiness, Decimal::new(525, 1));
        assert_eq!(pet.last_updated, now);
    }

    #[test]
    fn play_raises_happiness_and_costs_hunger() {
        let mut pet = make_pet();
        pet.happiness = dec(50);
        pet.hunger = dec(50);
        pet.play(dec(20), dec(5), Utc::now());
        assert_eq!(pet.happiness, dec(70));
        assert_eq!(pet.hunger, dec(45));
    }

    #[test]
    fn clean_restores_cleanliness_and_clears_poops() {
        let mut pet = make_pet();
        pet.cleanliness = dec(10);
        let _ = pet.add_poop(dec(1), dec(2), 10);
        let _ = pet.add_poop(dec(3), dec(4), 10);
        pet.clean(Utc::now());
        assert_eq!(pet.cleanliness, STAT_MAX);
        assert!(pet.poops.is_empty());
    }

    #[test]
    fn add_poop_respects_cap() {
        let mut pet = make_pet();
        assert!(pet.add_poop(dec(0), dec(0), 2).is_some());
        assert!(pet.add_poop(dec(1), dec(1), 2).is_some());
        assert!(pet.add_poop(dec(2), dec(2), 2).is_none());
        assert_eq!(pet.poops.len(), 2);
    }

    #[test]
    fn decay_below_threshold_is_skipped() {
        let mut pet = make_pet();
        let now = pet.last_updated + Duration::seconds(30);
        let changed = pet.apply_decay(&rates(5), 60_000, now);
        assert!(!changed);
        assert_eq!(pet.hunger, dec(100));
    }

    #[test]
    fn decay_one_hour_matches_rate() {
        let mut pet = make_pet();
        let start = pet.last_updated;
        let now = start + Duration::milliseconds(3_600_000);
        let changed = pet.apply_decay(&rates(5), 60_000, now);
        assert!(changed);
        assert_eq!(pet.hunger, dec(95));
        assert_eq!(pet.happiness, dec(95));
        assert_eq!(pet.cleanliness, dec(95));
        assert_eq!(pet.last_updated, now);
    }

    #[test]
    fn stats_never_leave_range_under_mixed_operations() {
        let mut pet = make_pet();
        let mut now = Utc::now();
        for i in 0..200i64 {
            now += Duration::minutes(90);
            let _ = pet.apply_decay(&rates(7), 60_000, now);
            if i.checked_rem(3) == Some(0) {
                pet.feed(dec(40), now);
            }
            if i.checked_rem(5) == Some(0) {
                pet.play(dec(60), dec(10), now);
            }
            for stat in [pet.hunger, pet.happiness, pet.cleanliness] {
                assert!(stat >= STAT_MIN && stat <= STAT_MAX);
            }
        }
    }
}
