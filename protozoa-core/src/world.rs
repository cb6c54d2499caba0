//! Contracts for the food and pH subsystems the simulation acts on, with the
//! dense grid implementations used by default.

use crate::grid::cell_index;
use protozoa_types::{Point, WorldConfig};
use std::fmt;

/// Per-cell food store. Amounts are clamped to the configured per-cell bounds
/// and every mutation reports the amount actually applied.
pub trait FoodService: fmt::Debug + Send + Sync {
    fn food_at(&self, point: Point) -> Option<u32>;

    /// Returns how much food was actually added.
    fn add_food(&mut self, point: Point, amount: u32) -> u32;

    /// Returns how much food was actually removed.
    fn remove_food(&mut self, point: Point, amount: u32) -> u32;

    fn item_count(&self) -> usize;
}

/// Per-cell pH levels, bounded by the configured minimum and maximum.
pub trait Environment: fmt::Debug + Send + Sync {
    fn ph_at(&self, point: Point) -> f32;

    fn change_ph(&mut self, point: Point, delta: f32);
}

#[derive(Debug, Clone)]
pub struct FoodGrid {
    width: i32,
    height: i32,
    min_value: u32,
    max_value: u32,
    cells: Vec<u32>,
    items: usize,
}

impl FoodGrid {
    pub fn new(config: &WorldConfig) -> Self {
        Self {
            width: config.grid_units_wide as i32,
            height: config.grid_units_high as i32,
            min_value: config.min_food_value,
            max_value: config.max_food_value,
            cells: vec![0; config.world_capacity()],
            items: 0,
        }
    }

    fn index(&self, point: Point) -> usize {
        cell_index(point, self.width, self.height)
    }
}

impl FoodService for FoodGrid {
    fn food_at(&self, point: Point) -> Option<u32> {
        let value = self.cells[self.index(point)];
        (value > 0).then_some(value)
    }

    fn add_food(&mut self, point: Point, amount: u32) -> u32 {
        if amount == 0 {
            return 0;
        }
        let idx = self.index(point);
        let existing = self.cells[idx];
        let updated = existing.saturating_add(amount).min(self.max_value);
        if existing == 0 && updated > 0 {
            self.items += 1;
        }
        self.cells[idx] = updated;
        updated.saturating_sub(existing)
    }

    fn remove_food(&mut self, point: Point, amount: u32) -> u32 {
        if amount == 0 {
            return 0;
        }
        let idx = self.index(point);
        let existing = self.cells[idx];
        if existing == 0 {
            return 0;
        }
        let removed = amount.min(existing);
        let remaining = existing - removed;
        // Leftovers below the minimum item value are cleared.
        if remaining < self.min_value || remaining == 0 {
            self.cells[idx] = 0;
            self.items -= 1;
        } else {
            self.cells[idx] = remaining;
        }
        removed
    }

    fn item_count(&self) -> usize {
        self.items
    }
}

/// Uniform pH field. Diffusion between cells is handled elsewhere; this grid only
/// stores and clamps values.
#[derive(Debug, Clone)]
pub struct PhGrid {
    width: i32,
    height: i32,
    min_ph: f32,
    max_ph: f32,
    values: Vec<f32>,
}

impl PhGrid {
    pub fn new(config: &WorldConfig) -> Self {
        Self {
            width: config.grid_units_wide as i32,
            height: config.grid_units_high as i32,
            min_ph: config.min_ph,
            max_ph: config.max_ph,
            values: vec![config.initial_ph; config.world_capacity()],
        }
    }
}

impl Environment for PhGrid {
    fn ph_at(&self, point: Point) -> f32 {
        self.values[cell_index(point, self.width, self.height)]
    }

    fn change_ph(&mut self, point: Point, delta: f32) {
        let idx = cell_index(point, self.width, self.height);
        self.values[idx] = (self.values[idx] + delta).clamp(self.min_ph, self.max_ph);
    }
}
