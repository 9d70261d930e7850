use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Position in the continuous 2-D world.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn dist(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Where a food item currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FoodStatus {
    /// Lying in the world, can be sensed.
    Available,
    /// Carried by the agent.
    Picked,
    /// Consumed; never considered again.
    Eaten,
    /// Inside the shelter bin.
    Stored,
}

/// A food item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Food {
    pub pos: Point,
    pub id: u64,
    pub nutrition: f64,
    pub status: FoodStatus,
}

impl Food {
    pub fn new(pos: Point, id: u64, nutrition: f64) -> Self {
        Self {
            pos,
            id,
            nutrition,
            status: FoodStatus::Available,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == FoodStatus::Available
    }
}

/// Storage bin that also provides shelter from the weather.
///
/// Stored food is kept in deposit order and handed back oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShelterBin {
    pos: Point,
    radius: f64,
    contents: VecDeque<Food>,
}

impl ShelterBin {
    pub fn new(pos: Point, radius: f64) -> Self {
        Self {
            pos,
            radius,
            contents: VecDeque::new(),
        }
    }

    pub fn pos(&self) -> Point {
        self.pos
    }

    /// Store `food`, moving it to the bin's position.
    pub fn deposit(&mut self, mut food: Food) {
        food.status = FoodStatus::Stored;
        food.pos = self.pos;
        self.contents.push_back(food);
    }

    /// Take out the oldest stored food, if any.
    ///
    /// The returned food is no longer marked as stored; the caller decides
    /// whether it is carried or eaten.
    pub fn retrieve(&mut self) -> Option<Food> {
        let mut food = self.contents.pop_front()?;
        food.status = FoodStatus::Picked;
        Some(food)
    }

    pub fn count(&self) -> usize {
        self.contents.len()
    }

    /// Whether `pos` lies strictly within the containment radius.
    pub fn is_inside(&self, pos: Point) -> bool {
        self.pos.dist(pos) < self.radius
    }
}
