//! Cell occupancy codes and a builder for engine adapters

use serde::{Deserialize, Serialize};

use crate::observation::GridMap;
use crate::reward::Position;

/// What occupies a grid cell, in encoding priority order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    Free,
    Player,
    Blocked,
    SolidBrick,
    Powerup,
    Bomb,
    Explosion,
}

impl CellKind {
    /// Normalized code written into the map
    pub fn value(&self) -> f32 {
        match self {
            CellKind::Free => 0.0,
            CellKind::Player => 0.25,
            CellKind::Blocked => 0.5,
            CellKind::SolidBrick => 0.75,
            CellKind::Powerup => 1.0,
            CellKind::Bomb => -0.5,
            CellKind::Explosion => -1.0,
        }
    }
}

/// Builds a [`GridMap`] from logical cells, optionally upsampled.
///
/// Each logical cell becomes an `expand x expand` block. The player marker
/// is written last, as a single cell, so it survives upsampling.
#[derive(Debug, Clone)]
pub struct GridMapBuilder {
    height: usize,
    width: usize,
    expand: usize,
    cells: Vec<CellKind>,
    player: Option<Position>,
}

impl GridMapBuilder {
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            expand: 1,
            cells: vec![CellKind::Free; height * width],
            player: None,
        }
    }

    /// Upsample every logical cell into an `expand x expand` block
    pub fn expand(mut self, expand: usize) -> Self {
        self.expand = expand.max(1);
        self
    }

    /// Set a logical cell; out-of-bounds writes are ignored
    pub fn set(&mut self, row: usize, col: usize, kind: CellKind) {
        if row < self.height && col < self.width {
            self.cells[row * self.width + col] = kind;
        }
    }

    /// Mark the player at a logical position
    pub fn player(&mut self, pos: Position) {
        self.player = Some(pos);
    }

    pub fn build(&self) -> GridMap {
        let e = self.expand;
        let (h, w) = (self.height * e, self.width * e);
        let mut data = vec![0.0f32; h * w];

        for row in 0..self.height {
            for col in 0..self.width {
                let value = self.cells[row * self.width + col].value();
                for i in 0..e {
                    let start = (row * e + i) * w + col * e;
                    data[start..start + e].fill(value);
                }
            }
        }

        if let Some(pos) = self.player {
            if pos.row >= 0 && pos.col >= 0 {
                let (r, c) = (pos.row as usize * e, pos.col as usize * e);
                if r < h && c < w {
                    data[r * w + c] = CellKind::Player.value();
                }
            }
        }

        GridMap::new(h, w, data)
    }
}
