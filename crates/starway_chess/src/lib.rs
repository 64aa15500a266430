pub mod attacks;
pub mod bitboard;
pub mod movegen;
pub mod moves;
pub mod perft;
pub mod position;

pub use bitboard::{Color, Piece};
pub use movegen::{legal_moves, MoveList};
pub use moves::Move;
pub use position::Position;
