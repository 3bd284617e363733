// defs.rs
// Shared game dimensions and type aliases for the Mingo game.

/// Identifier of a player seat on the card server.
pub type SlotId = usize;
/// Identifier of a generated bingo card. Slot N plays card N.
pub type CardNumber = usize;
/// Index into the imported playlist track table.
pub type TrackIndex = usize;

pub struct GridStruct {
    pub cells_per_row: usize,
    pub rows_per_card: usize,
}

pub const GRIDCONFIG: GridStruct = GridStruct {
    cells_per_row: 5, // cells in a card row
    rows_per_card: 5, // rows in a card
};

pub const CELLS_PER_CARD: usize = GRIDCONFIG.cells_per_row * GRIDCONFIG.rows_per_card;
pub const TITLES_PER_CARD: usize = CELLS_PER_CARD - 1;
// The center cell of the grid is the free cell.
pub const FREE_CELL_INDEX: usize = CELLS_PER_CARD / 2;

/// Maximum simultaneous player sessions on the card server.
pub const MAX_PLAYERS: usize = 10;

/// Cell content pushed when a card is unloaded.
pub const EMPTY_CELL: &str = "-";
