//! Agent operators: relocate a point of control and act on the cell under it.

pub mod modify;
pub mod move_modify;
pub mod movement;

pub use modify::Modify;
pub use move_modify::MoveModify;
pub use movement::Move;
