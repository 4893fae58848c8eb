//! Reference-catalog row types: read-mostly configuration loaded once from
//! durable storage and cached for the lifetime of the host.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::pet::DecayRates;

/// A purchasable pet species.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetSpecies {
    /// Species key (matches `Pet::pet_type`).
    pub species_id: String,
    /// Display name.
    pub name: String,
    /// Purchase price in tokens.
    pub price: Decimal,
    /// Hunger lost per hour.
    pub hunger_decay_per_hour: Decimal,
    /// Happiness lost per hour.
    pub happiness_decay_per_hour: Decimal,
    /// Cleanliness lost per hour.
    pub cleanliness_decay_per_hour: Decimal,
}

impl PetSpecies {
    /// The species' decay rates in the form the tick consumes.
    pub const fn decay_rates(&self) -> DecayRates {
        DecayRates {
            hunger_per_hour: self.hunger_decay_per_hour,
            happiness_per_hour: self.happiness_decay_per_hour,
            cleanliness_per_hour: self.cleanliness_decay_per_hour,
        }
    }
}

/// A purchasable store item (food, toys, cosmetics).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreItem {
    /// Item category (e.g. `food`, `toy`).
    pub item_type: String,
    /// Item identifier within its category.
    pub item_id: String,
    /// Display name.
    pub name: String,
    /// Purchase price in tokens.
    pub price: Decimal,
    /// Hunger restored when this item is fed to a pet (food items only).
    pub food_value: Option<Decimal>,
}

/// Gameplay defaults loaded alongside the catalogs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultInfo {
    /// Tokens granted to a wallet the first time it is seen.
    pub starting_tokens: Decimal,
    /// Hunger restored by the basic (item-less) feed action.
    pub default_food_value: Decimal,
    /// Happiness granted by one play session.
    pub play_happiness_value: Decimal,
    /// Hunger spent by one play session.
    pub play_hunger_cost: Decimal,
    /// Tokens granted by the daily reward claim.
    pub daily_reward_amount: Decimal,
    /// Minimum elapsed milliseconds before the tick decays a pet.
    pub update_threshold_ms: i64,
    /// Maximum pets a single player may own.
    pub max_pets_per_player: u32,
    /// Maximum poops kept on the floor per pet.
    pub max_poops_per_pet: u32,
}

impl Default for DefaultInfo {
    fn default() -> Self {
        Self {
            starting_tokens: Decimal::from(100u32),
            default_food_value: Decimal::from(25u32),
            play_happiness_value: Decimal::from(20u32),
            play_hunger_cost: Decimal::from(5u32),
            daily_reward_amount: Decimal::from(50u32),
            update_threshold_ms: 60_000,
            max_pets_per_player: 10,
            max_poops_per_pet: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn species_rates_map_through() {
        let species = PetSpecies {
            species_id: String::from("cat"),
            name: String::from("Cat"),
            price: Decimal::from(50u32),
            hunger_decay_per_hour: Decimal::from(5u32),
            happiness_decay_per_hour: Decimal::from(3u32),
            cleanliness_decay_per_hour: Decimal::from(2u32),
        };
        let rates = species.decay_rates();
        assert_eq!(rates.hunger_per_hour, Decimal::from(5u32));
        assert_eq!(rates.cleanliness_per_hour, Decimal::from(2u32));
    }

    #[test]
    fn default_info_roundtrips_serde() {
        let info = DefaultInfo::default();
        let json = serde_json::to_string(&info).ok();
        assert!(json.is_some());
        let back: Result<DefaultInfo, _> = serde_json::from_str(json.as_deref().unwrap_or(""));
        assert_eq!(back.ok(), Some(info));
    }
}
