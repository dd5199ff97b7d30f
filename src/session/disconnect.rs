//! Peer departure detection.

use super::document::GameState;
use tracing::{info, instrument};

/// Watches the player count across observed versions of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisconnectMonitor {
    previous_player_count: Option<usize>,
}

impl DisconnectMonitor {
    /// Creates a monitor that has not seen any version yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a version. Returns true when the count fell from two to fewer
    /// while the game is still playing, i.e. the peer left mid-game.
    #[instrument(skip(self))]
    pub fn observe(&mut self, player_count: usize, state: GameState) -> bool {
        let previous = self.previous_player_count.replace(player_count);
        let departed = previous == Some(2) && player_count < 2 && state == GameState::Playing;
        if departed {
            info!(player_count, "Peer departed mid-game");
        }
        departed
    }

    /// Count seen in the last observed version.
    pub fn previous_player_count(&self) -> Option<usize> {
        self.previous_player_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_from_two_while_playing() {
        let mut monitor = DisconnectMonitor::new();
        assert!(!monitor.observe(2, GameState::Playing));
        assert!(monitor.observe(1, GameState::Playing));
        assert_eq!(monitor.previous_player_count(), Some(1));
    }

    #[test]
    fn test_drop_after_finish_is_not_a_departure() {
        let mut monitor = DisconnectMonitor::new();
        monitor.observe(2, GameState::Playing);
        assert!(!monitor.observe(1, GameState::Finished));
    }

    #[test]
    fn test_first_observation_never_fires() {
        let mut monitor = DisconnectMonitor::new();
        assert!(!monitor.observe(1, GameState::Playing));
        assert!(!monitor.observe(2, GameState::Playing));
        assert!(!monitor.observe(2, GameState::Playing));
    }
}
