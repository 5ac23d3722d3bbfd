//! Game engine and display contracts

use bman_rl_core::{GridMap, Intent, Position, Result};

/// Trait for game engines driven by an episode controller
///
/// The engine owns all game state: level layout, agents, ordnance and
/// scoring. The controller only reads snapshots and dispatches intents.
pub trait GameEngine: Send + 'static {
    /// Display surface used for human rendering
    type Surface: RenderSurface<Self> + Send;

    /// Build a fresh level at the given difficulty
    fn new_level(&mut self, difficulty: u32);

    /// Restore the current level and agent to their initial state
    fn reset(&mut self);

    /// Snapshot of the normalized map
    fn get_map(&self) -> GridMap;

    /// Apply one agent intent and advance the simulation
    fn move_agent(&mut self, intent: Intent);

    /// Cumulative score for an agent
    fn get_score(&self, agent_id: usize) -> f64;

    /// Position of the controlled agent
    fn pos(&self) -> Position;

    /// Whether the controlled agent has died
    fn player_is_dead(&self) -> bool;

    /// Ordnance the controlled agent can still place, if the engine tracks it
    fn ordnance_available(&self) -> Option<u32> {
        None
    }

    /// Create a display surface for this engine
    fn open_surface(&self) -> Result<Self::Surface>;
}

/// A visible surface that can draw engine state
pub trait RenderSurface<E: ?Sized> {
    /// Draw the current engine state
    fn draw(&mut self, engine: &E) -> Result<()>;

    /// Release any windowing resources
    fn close(&mut self) {}
}
