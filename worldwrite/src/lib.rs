pub mod block;
pub mod coords;
pub mod memory;
pub mod nbt;
pub mod proplist;
pub mod settings;
pub mod side_effect;
mod util;
pub mod wna;
