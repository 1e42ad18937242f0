//! Conway's rule and the toroidal neighbourhood arithmetic.

/// Cells are stored one byte each.
pub type Cell = u8;

pub const DEAD: Cell = 0;
pub const ALIVE: Cell = 1;

/// Next state of a cell given its current state and the number of ALIVE
/// neighbours among the eight around it.
///
/// 1. A cell is born if it has exactly 3 neighbours;
/// 2. a live cell with 2 or 3 neighbours survives;
/// 3. every other cell is dead at the next step.
#[inline]
pub fn set_cell(former_cell: Cell, neighbors: u32) -> Cell {
    if neighbors == 3 || (neighbors == 2 && former_cell == ALIVE) {
        ALIVE
    } else {
        DEAD
    }
}

/// Index before `i` on a ring of `len` slots.
#[inline]
pub const fn wrap_prev(i: usize, len: usize) -> usize {
    (i + len - 1) % len
}

/// Index after `i` on a ring of `len` slots.
#[inline]
pub const fn wrap_next(i: usize, len: usize) -> usize {
    (i + 1) % len
}

/// Sum of the three cells of `row` centred on `col`, columns wrapping around.
#[inline]
pub fn row_triplet(row: &[Cell], col: usize) -> u32 {
    let ncols = row.len();
    u32::from(row[wrap_prev(col, ncols)])
        + u32::from(row[col])
        + u32::from(row[wrap_next(col, ncols)])
}

/// Evolve one row of cells.
///
/// `above`, `row` and `below` are full rows of the current generation; the
/// result for every column of `row` is written into `out`. Columns wrap, so on
/// a one-column board the "left" and "right" neighbours are the cell's own
/// column, exactly as the modulo arithmetic dictates.
pub fn evolve_row(above: &[Cell], row: &[Cell], below: &[Cell], out: &mut [Cell]) {
    let ncols = row.len();
    for col in 0..ncols {
        let left = wrap_prev(col, ncols);
        let right = wrap_next(col, ncols);
        let neighbors = row_triplet(above, col)
            + row_triplet(below, col)
            + u32::from(row[left])
            + u32::from(row[right]);
        out[col] = set_cell(row[col], neighbors);
    }
}
