//! Deterministic sandbox engine
//!
//! A small stand-in for the real game: an open grid with fixed pillars,
//! powerups along the top row and hazards along the bottom row. Ordnance
//! detonates after a short fuse and kills the agent if it is caught in the
//! blast. Useful for smoke tests and for running the trainer without the
//! full game.

use std::io::Write;

use bman_rl_core::{BmanError, CellKind, GridMap, GridMapBuilder, Intent, Position, Result};

use crate::engine::{GameEngine, RenderSurface};

/// Moves before placed ordnance detonates
pub const FUSE: u32 = 3;

/// Ordnance the agent can hold at once
pub const MAX_ORDNANCE: u32 = 2;

/// Blast reach along rows and columns
pub const BLAST_RADIUS: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tile {
    Floor,
    Pillar,
    Powerup,
    Hazard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Bomb {
    pos: Position,
    fuse: u32,
}

#[derive(Debug, Clone)]
struct SandboxState {
    tiles: Vec<Tile>,
    agent: Position,
    score: f64,
    dead: bool,
    ordnance: u32,
    bombs: Vec<Bomb>,
}

impl SandboxState {
    fn empty(height: usize, width: usize) -> Self {
        Self {
            tiles: vec![Tile::Floor; height * width],
            agent: Position::default(),
            score: 0.0,
            dead: false,
            ordnance: MAX_ORDNANCE,
            bombs: Vec::new(),
        }
    }
}

/// Sandbox engine
#[derive(Debug, Clone)]
pub struct SandboxEngine {
    height: usize,
    width: usize,
    expand: usize,
    initial: SandboxState,
    state: SandboxState,
    ticks: u64,
}

impl SandboxEngine {
    /// Create an engine with an empty level; call `new_level` before use
    pub fn new(height: usize, width: usize) -> Self {
        let empty = SandboxState::empty(height, width);
        Self {
            height,
            width,
            expand: 1,
            initial: empty.clone(),
            state: empty,
            ticks: 0,
        }
    }

    /// Upsample each logical cell of the emitted map
    pub fn with_expand(mut self, expand: usize) -> Self {
        self.expand = expand.max(1);
        self
    }

    /// Number of intents applied since construction
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Text rendering of the current state
    pub fn render_text(&self) -> String {
        let mut out = String::with_capacity((self.width + 1) * self.height);
        for row in 0..self.height {
            for col in 0..self.width {
                let pos = Position::new(row as i32, col as i32);
                let ch = if pos == self.state.agent {
                    if self.state.dead { 'X' } else { '@' }
                } else if self.state.bombs.iter().any(|b| b.pos == pos) {
                    'o'
                } else {
                    match self.state.tiles[row * self.width + col] {
                        Tile::Floor => '.',
                        Tile::Pillar => '#',
                        Tile::Powerup => '*',
                        Tile::Hazard => '~',
                    }
                };
                out.push(ch);
            }
            out.push('\n');
        }
        out
    }

    fn in_bounds(&self, pos: Position) -> bool {
        pos.row >= 0
            && pos.col >= 0
            && (pos.row as usize) < self.height
            && (pos.col as usize) < self.width
    }

    fn index(&self, pos: Position) -> usize {
        pos.row as usize * self.width + pos.col as usize
    }

    fn detonate(&mut self, bomb: Bomb) {
        let agent = self.state.agent;
        let dr = (agent.row - bomb.pos.row).abs();
        let dc = (agent.col - bomb.pos.col).abs();
        if (dr == 0 && dc <= BLAST_RADIUS) || (dc == 0 && dr <= BLAST_RADIUS) {
            self.state.dead = true;
        }
        self.state.ordnance = (self.state.ordnance + 1).min(MAX_ORDNANCE);
    }
}

impl GameEngine for SandboxEngine {
    type Surface = AsciiSurface;

    fn new_level(&mut self, difficulty: u32) {
        let mut state = SandboxState::empty(self.height, self.width);
        for row in 0..self.height {
            for col in 0..self.width {
                let tile = if row % 2 == 1 && col % 2 == 1 {
                    Tile::Pillar
                } else if row == 0 && col > 0 && col % 2 == 0 {
                    Tile::Powerup
                } else if row + 1 == self.height && row > 0 && (col as u32) < difficulty {
                    Tile::Hazard
                } else {
                    Tile::Floor
                };
                state.tiles[row * self.width + col] = tile;
            }
        }
        self.initial = state.clone();
        self.state = state;
    }

    fn reset(&mut self) {
        self.state = self.initial.clone();
    }

    fn get_map(&self) -> GridMap {
        let mut builder = GridMapBuilder::new(self.height, self.width).expand(self.expand);
        for row in 0..self.height {
            for col in 0..self.width {
                let kind = match self.state.tiles[row * self.width + col] {
                    Tile::Floor => CellKind::Free,
                    Tile::Pillar => CellKind::Blocked,
                    Tile::Powerup => CellKind::Powerup,
                    Tile::Hazard => CellKind::Explosion,
                };
                builder.set(row, col, kind);
            }
        }
        for bomb in &self.state.bombs {
            builder.set(bomb.pos.row as usize, bomb.pos.col as usize, CellKind::Bomb);
        }
        builder.player(self.state.agent);
        builder.build()
    }

    fn move_agent(&mut self, intent: Intent) {
        if self.state.dead {
            return;
        }
        self.ticks += 1;

        if let Some(dir) = intent.direction {
            let (dr, dc) = dir.delta();
            let target = Position::new(self.state.agent.row + dr, self.state.agent.col + dc);
            let blocked = !self.in_bounds(target)
                || self.state.tiles[self.index(target)] == Tile::Pillar
                || self.state.bombs.iter().any(|b| b.pos == target);
            if !blocked {
                self.state.agent = target;
                let idx = self.index(target);
                match self.state.tiles[idx] {
                    Tile::Powerup => {
                        self.state.score += 1.0;
                        self.state.tiles[idx] = Tile::Floor;
                    }
                    Tile::Hazard => self.state.dead = true,
                    _ => {}
                }
            }
        }

        if intent.place_ordnance
            && self.state.ordnance > 0
            && !self.state.bombs.iter().any(|b| b.pos == self.state.agent)
        {
            self.state.bombs.push(Bomb {
                pos: self.state.agent,
                fuse: FUSE,
            });
            self.state.ordnance -= 1;
        }

        let mut bombs = std::mem::take(&mut self.state.bombs);
        for bomb in bombs.iter_mut() {
            bomb.fuse = if intent.use_special { 0 } else { bomb.fuse.saturating_sub(1) };
        }
        let (expired, live): (Vec<Bomb>, Vec<Bomb>) = bombs.into_iter().partition(|b| b.fuse == 0);
        self.state.bombs = live;
        for bomb in expired {
            self.detonate(bomb);
        }
    }

    fn get_score(&self, agent_id: usize) -> f64 {
        if agent_id == 0 { self.state.score } else { 0.0 }
    }

    fn pos(&self) -> Position {
        self.state.agent
    }

    fn player_is_dead(&self) -> bool {
        self.state.dead
    }

    fn ordnance_available(&self) -> Option<u32> {
        Some(self.state.ordnance)
    }

    fn open_surface(&self) -> Result<Self::Surface> {
        Ok(AsciiSurface::stderr())
    }
}

/// Text surface that writes one frame per draw
pub struct AsciiSurface {
    out: Box<dyn Write + Send>,
    frames: u64,
}

impl AsciiSurface {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out, frames: 0 }
    }

    /// Surface on stderr, leaving stdout to the caller's own output
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Frames drawn so far
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl RenderSurface<SandboxEngine> for AsciiSurface {
    fn draw(&mut self, engine: &SandboxEngine) -> Result<()> {
        self.frames += 1;
        writeln!(
            self.out,
            "frame {} score {}\n{}",
            self.frames,
            engine.get_score(0),
            engine.render_text()
        )
        .map_err(|e| BmanError::Render(format!("Write failed: {}", e)))?;
        self.out
            .flush()
            .map_err(|e| BmanError::Render(format!("Flush failed: {}", e)))
    }
}
