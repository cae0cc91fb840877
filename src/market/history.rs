use std::collections::VecDeque;

use serde::Serialize;

use crate::types::PricePoint;

/// Time-ascending price samples, oldest evicted first
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct PriceHistory {
    #[serde(skip)]
    capacity: usize,
    points: VecDeque<PricePoint>,
}

impl PriceHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity + 1),
        }
    }

    pub fn push(&mut self, point: PricePoint) {
        self.points.push_back(point);
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PricePoint> {
        self.points.iter()
    }

    pub fn to_vec(&self) -> Vec<PricePoint> {
        self.points.iter().cloned().collect()
    }
}
