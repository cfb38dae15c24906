//! The trait seam between the experience store and a concrete game.

use crate::moves::{Move, Side};

/// A mutable game position with make/unmake move discipline.
///
/// The store traverses positions by making a move, descending, and unmaking
/// it on the way back out. Implementations must guarantee that
/// `unmake_move` exactly reverses the matching `make_move`, including side
/// to move and any captured material.
pub trait Position {
    /// Opaque state needed to reverse one move.
    type Undo;

    fn side_to_move(&self) -> Side;

    /// All legal moves in the current position. Empty when the game is over.
    fn legal_moves(&self) -> Vec<Move>;

    fn make_move(&mut self, mv: Move) -> Self::Undo;

    fn unmake_move(&mut self, mv: Move, undo: Self::Undo);

    /// Whether the current position is a forced draw. Games without draws
    /// keep the default.
    fn is_draw(&self) -> bool {
        false
    }

    /// Best-effort legality check used before trusting a stored move.
    fn is_legal(&self, mv: Move) -> bool {
        self.legal_moves().iter().any(|m| m.same_squares(mv))
    }
}
