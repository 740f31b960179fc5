//! Player colour assignment.
//!
//! Colours are handed out first-free from a fixed list. Released colours go
//! to the back of the queue. Once every colour is taken they are reused in
//! round-robin order.

use log::debug;
use std::collections::{HashMap, VecDeque};

pub const PLAYER_COLORS: [&str; 8] = [
    "#FF6B6B", // red
    "#4ECDC4", // cyan
    "#45B7D1", // blue
    "#FFA07A", // orange
    "#98D8C8", // mint
    "#F7DC6F", // yellow
    "#BB8FCE", // purple
    "#85C1E2", // sky blue
];

#[derive(Debug)]
pub struct ColorPalette {
    available: VecDeque<&'static str>,
    assigned: HashMap<String, &'static str>,
    next_reuse: usize,
}

impl ColorPalette {
    pub fn new() -> Self {
        Self {
            available: PLAYER_COLORS.iter().copied().collect(),
            assigned: HashMap::new(),
            next_reuse: 0,
        }
    }

    /// Hands out the next free colour. Once all are taken colours are reused round robin.
    pub fn assign(&mut self, player: &str) -> String {
        let color = match self.available.pop_front() {
            Some(color) => color,
            None => {
                let color = PLAYER_COLORS[self.next_reuse % PLAYER_COLORS.len()];
                self.next_reuse += 1;
                color
            }
        };
        self.assigned.insert(player.to_string(), color);
        debug!(
            "Assigned colour {} to {} ({} free)",
            color,
            player,
            self.available.len()
        );
        color.to_string()
    }

    /// Returns a player's colour to the pool unless someone else still wears it.
    pub fn release(&mut self, player: &str) {
        if let Some(color) = self.assigned.remove(player) {
            let still_used = self.assigned.values().any(|c| *c == color);
            if !still_used && !self.available.contains(&color) {
                self.available.push_back(color);
            }
        }
    }

    /// Number of colours nobody is using.
    pub fn available(&self) -> usize {
        self.available.len()
    }
}

impl Default for ColorPalette {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_free_colour() {
        let mut palette = ColorPalette::new();
        assert_eq!(palette.assign("a"), PLAYER_COLORS[0]);
        assert_eq!(palette.assign("b"), PLAYER_COLORS[1]);
        assert_eq!(palette.available(), 6);
    }

    #[test]
    fn test_released_colour_goes_to_back() {
        let mut palette = ColorPalette::new();
        palette.assign("a");
        palette.assign("b");
        palette.release("a");
        assert_eq!(palette.assign("c"), PLAYER_COLORS[2]);
        for _ in 3..PLAYER_COLORS.len() {
            palette.assign(&format!("p{}", palette.available()));
        }
        assert_eq!(palette.assign("late"), PLAYER_COLORS[0]);
    }

    #[test]
    fn test_concurrent_players_get_distinct_colours() {
        let mut palette = ColorPalette::new();
        let colours: Vec<String> = (0..PLAYER_COLORS.len())
            .map(|i| palette.assign(&format!("p{i}")))
            .collect();
        let mut unique = colours.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), colours.len());
    }

    #[test]
    fn test_round_robin_when_exhausted() {
        let mut palette = ColorPalette::new();
        for i in 0..PLAYER_COLORS.len() {
            palette.assign(&format!("p{i}"));
        }
        assert_eq!(palette.assign("x"), PLAYER_COLORS[0]);
        assert_eq!(palette.assign("y"), PLAYER_COLORS[1]);
    }

    #[test]
    fn test_release_unknown_is_noop() {
        let mut palette = ColorPalette::new();
        palette.release("ghost");
        assert_eq!(palette.available(), PLAYER_COLORS.len());
    }
}
