//! Partitioned chunk model: one rank's band of rows plus two ghost rows.
//!
//! Local row 0 mirrors the last row of the previous rank, local row
//! `nrows + 1` mirrors the first row of the next rank, and rows `1..=nrows`
//! are the rank's own cells.

use rayon::prelude::*;

use crate::board_io;
use crate::error::{LifeError, Result};
use crate::grid::alloc_cells;
use crate::partition::Bounds;
use crate::rules::{evolve_row, Cell, ALIVE, DEAD};
use crate::utils::UniformRng;

#[derive(Debug, Clone)]
pub struct Chunk {
    bounds: Bounds,
    ncols: usize,
    slice: Vec<Cell>,
    next_slice: Vec<Cell>,
}

impl Chunk {
    /// Allocate `(nrows + 2) x ncols` cells for both buffers, all DEAD.
    pub fn allocate(bounds: Bounds, ncols: usize) -> Result<Self> {
        let len = bounds
            .nrows
            .checked_add(2)
            .and_then(|rows| rows.checked_mul(ncols))
            .ok_or(LifeError::Allocation { cells: usize::MAX })?;
        Ok(Self {
            bounds,
            ncols,
            slice: alloc_cells(len)?,
            next_slice: alloc_cells(len)?,
        })
    }

    pub const fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Number of own rows, ghosts excluded.
    pub const fn nrows(&self) -> usize {
        self.bounds.nrows
    }

    pub const fn ncols(&self) -> usize {
        self.ncols
    }

    pub const fn rank(&self) -> usize {
        self.bounds.rank
    }

    pub const fn workers(&self) -> usize {
        self.bounds.workers
    }

    /// Local row `i`, `0` and `nrows + 1` being the ghosts.
    pub fn row(&self, i: usize) -> &[Cell] {
        &self.slice[i * self.ncols..(i + 1) * self.ncols]
    }

    /// The rank's own rows, row-major, ghosts excluded.
    pub fn own_rows(&self) -> &[Cell] {
        &self.slice[self.ncols..(self.nrows() + 1) * self.ncols]
    }

    pub fn population(&self) -> usize {
        self.own_rows().iter().filter(|&&c| c == ALIVE).count()
    }

    pub fn fill_dead(&mut self) {
        self.slice.fill(DEAD);
        self.next_slice.fill(DEAD);
    }

    /// Local slots a global row has to be copied into: its own slot, the top
    /// ghost, the bottom ghost, or several of them at once on tiny partitions.
    fn slots_of(&self, global_row: usize) -> impl Iterator<Item = usize> {
        let b = self.bounds;
        let own = b.owns(global_row).then(|| global_row - b.from + 1);
        let top = (global_row == b.top_ghost()).then_some(0);
        let bottom = (global_row == b.bottom_ghost()).then_some(b.nrows + 1);
        own.into_iter().chain(top).chain(bottom)
    }

    /// Last global row that lands anywhere in this chunk.
    fn last_needed_row(&self) -> usize {
        let b = self.bounds;
        b.to.max(b.top_ghost()).max(b.bottom_ghost())
    }

    fn copy_into_slots(&mut self, global_row: usize, values: &[Cell]) {
        let ncols = self.ncols;
        let slots: Vec<usize> = self.slots_of(global_row).collect();
        for slot in slots {
            self.slice[slot * ncols..(slot + 1) * ncols].copy_from_slice(values);
        }
    }

    /// Random fill that agrees with [`crate::grid::Grid::fill_random`] on
    /// every row this chunk holds.
    ///
    /// The global row-major stream of draws is replayed from the same seed;
    /// draws for rows held elsewhere are consumed and thrown away. The replay
    /// stops after the last row this chunk needs.
    pub fn fill_random(&mut self, seed: u64, prob: f64) {
        let mut rng = UniformRng::new(seed);
        let mut values = vec![DEAD; self.ncols];

        for i in 0..=self.last_needed_row() {
            for v in values.iter_mut() {
                *v = if rng.next_f64() < prob { ALIVE } else { DEAD };
            }
            self.copy_into_slots(i, &values);
        }
    }

    /// Fill from the rows of an input file, keeping only the rows this chunk
    /// holds. Every rank reads the same lines, so the whole file is checked
    /// before anything is copied.
    pub fn fill_from_lines(&mut self, lines: &[String]) -> Result<()> {
        board_io::check_shape(lines, self.bounds.global_nrows, self.ncols)?;

        let mut values = vec![DEAD; self.ncols];
        for (i, line) in lines.iter().enumerate().take(self.last_needed_row() + 1) {
            board_io::decode_row(line, &mut values);
            self.copy_into_slots(i, &values);
        }
        Ok(())
    }

    /// Compute the next generation of the own rows and swap buffers.
    ///
    /// Rows do not wrap locally: the neighbours above the first row and below
    /// the last one come from the ghost rows. Columns wrap.
    pub fn evolve(&mut self, parallel: bool) {
        let ncols = self.ncols;
        let nrows = self.nrows();
        let slice = &self.slice;
        let row = |i: usize| &slice[i * ncols..(i + 1) * ncols];
        let own = &mut self.next_slice[ncols..(nrows + 1) * ncols];

        if parallel {
            own.par_chunks_mut(ncols)
                .enumerate()
                .for_each(|(k, out)| evolve_row(row(k), row(k + 1), row(k + 2), out));
        } else {
            for (k, out) in own.chunks_mut(ncols).enumerate() {
                evolve_row(row(k), row(k + 1), row(k + 2), out);
            }
        }

        std::mem::swap(&mut self.slice, &mut self.next_slice);
    }

    /// First own row (to send up) and the bottom ghost slot (to receive into).
    pub(crate) fn first_row_and_bottom_ghost(&mut self) -> (&[Cell], &mut [Cell]) {
        let ncols = self.ncols;
        let (head, tail) = self.slice.split_at_mut((self.bounds.nrows + 1) * ncols);
        (&head[ncols..2 * ncols], &mut tail[..ncols])
    }

    /// Last own row (to send down) and the top ghost slot (to receive into).
    pub(crate) fn last_row_and_top_ghost(&mut self) -> (&[Cell], &mut [Cell]) {
        let ncols = self.ncols;
        let nrows = self.bounds.nrows;
        let (head, tail) = self.slice.split_at_mut(ncols);
        (&tail[(nrows - 1) * ncols..nrows * ncols], head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::partition::compute_bounds;

    fn chunk(global_nrows: usize, ncols: usize, workers: usize, rank: usize) -> Chunk {
        Chunk::allocate(compute_bounds(global_nrows, workers, rank).unwrap(), ncols).unwrap()
    }

    #[test]
    fn buffers_include_ghost_rows() {
        let c = chunk(10, 4, 3, 2);
        assert_eq!(c.nrows(), 4);
        assert_eq!(c.slice.len(), 6 * 4);
        assert_eq!(c.own_rows().len(), 16);
    }

    #[test]
    fn fill_dead_clears_ghosts_too() {
        let mut c = chunk(8, 3, 2, 1);
        c.fill_random(4, 1.0);
        c.next_slice.fill(ALIVE);
        c.fill_dead();
        assert!(c.slice.iter().all(|&x| x == DEAD));
        assert!(c.next_slice.iter().all(|&x| x == DEAD));
    }

    #[test]
    fn oversized_chunks_are_allocation_errors() {
        let bounds = compute_bounds(usize::MAX / 2, 1, 0).unwrap();
        assert!(matches!(
            Chunk::allocate(bounds, 4),
            Err(LifeError::Allocation { .. })
        ));
    }

    #[test]
    fn random_fill_matches_the_global_board_with_ghosts() {
        let (nrows, ncols, seed, prob) = (9, 5, 11, 0.5);
        let mut grid = Grid::allocate(nrows, ncols).unwrap();
        grid.fill_random(seed, prob);

        for rank in 0..3 {
            let mut c = chunk(nrows, ncols, 3, rank);
            c.fill_random(seed, prob);
            let b = *c.bounds();
            assert_eq!(c.row(0), grid.row(b.top_ghost()));
            assert_eq!(c.row(b.nrows + 1), grid.row(b.bottom_ghost()));
            for local in 1..=b.nrows {
                assert_eq!(c.row(local), grid.row(b.from + local - 1));
            }
        }
    }

    #[test]
    fn single_worker_ghosts_wrap_onto_itself() {
        let mut c = chunk(4, 3, 1, 0);
        c.fill_from_lines(&["X..".into(), "...".into(), "...".into(), "..X".into()])
            .unwrap();
        assert_eq!(c.row(0), &[DEAD, DEAD, ALIVE]);
        assert_eq!(c.row(5), &[ALIVE, DEAD, DEAD]);
    }

    #[test]
    fn one_row_neighbour_fills_both_ghosts() {
        // 3 rows over 2 workers: rank 0 owns row 0, rank 1 owns rows 1-2 and
        // sees row 0 above and below.
        let mut c = chunk(3, 2, 2, 1);
        c.fill_from_lines(&["XX".into(), "..".into(), "..".into()]).unwrap();
        assert_eq!(c.row(0), &[ALIVE, ALIVE]);
        assert_eq!(c.row(3), &[ALIVE, ALIVE]);
    }

    #[test]
    fn malformed_lines_are_rejected() {
        let mut c = chunk(3, 2, 2, 0);
        assert!(c.fill_from_lines(&["XX".into(), "..".into()]).is_err());
        assert!(c.fill_from_lines(&["XX".into(), "...".into(), "..".into()]).is_err());
    }

    #[test]
    fn parallel_evolve_matches_serial() {
        let mut a = chunk(20, 13, 2, 1);
        a.fill_random(3, 0.4);
        let mut b = a.clone();
        a.evolve(false);
        b.evolve(true);
        assert_eq!(a.own_rows(), b.own_rows());
    }

    #[test]
    fn exchange_views_point_at_the_right_rows() {
        let mut c = chunk(6, 2, 2, 0);
        c.fill_from_lines(&[
            "X.".into(),
            ".X".into(),
            "XX".into(),
            "..".into(),
            "..".into(),
            "..".into(),
        ])
        .unwrap();
        {
            let (send, recv) = c.first_row_and_bottom_ghost();
            assert_eq!(send, &[ALIVE, DEAD]);
            recv.copy_from_slice(&[ALIVE, ALIVE]);
        }
        {
            let (send, recv) = c.last_row_and_top_ghost();
            assert_eq!(send, &[ALIVE, ALIVE]);
            recv.copy_from_slice(&[DEAD, ALIVE]);
        }
        assert_eq!(c.row(4), &[ALIVE, ALIVE]);
        assert_eq!(c.row(0), &[DEAD, ALIVE]);
    }
}
