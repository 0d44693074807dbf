//! Moore neighborhood queries with an invariant boundary value.

use crate::constants::MOORE_NEIGHBORS;
use crate::grid::{Cell, Grid, Position};

/// Row/column offsets in output order: up-left, up, up-right, left, right,
/// down-left, down, down-right.
pub const NEIGHBOR_OFFSETS: [(isize, isize); MOORE_NEIGHBORS] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

#[inline]
fn read(grid: &Grid, pos: Position, dr: isize, dc: isize, invariant: Cell) -> Cell {
    grid.get_signed(pos.row as isize + dr, pos.col as isize + dc)
        .unwrap_or(invariant)
}

/// The 8 neighbors of `pos`, with `invariant` standing in for cells outside the grid.
pub fn neighborhood(grid: &Grid, pos: Position, invariant: Cell) -> [Cell; MOORE_NEIGHBORS] {
    let mut out = [invariant; MOORE_NEIGHBORS];
    for (slot, &(dr, dc)) in out.iter_mut().zip(NEIGHBOR_OFFSETS.iter()) {
        *slot = read(grid, pos, dr, dc, invariant);
    }
    out
}

/// Square window of side `2 * radius + 1` centered on `pos`.
///
/// Equivalent to padding the grid by `radius` cells of `invariant` on every side and
/// slicing the window there. Radius 1 uses [`neighborhood`]; larger radii grow the
/// `radius - 1` window by one ring.
pub fn moore(radius: usize, pos: Position, grid: &Grid, invariant: Cell) -> Grid {
    match radius {
        0 => Grid::from_raw(1, 1, vec![read(grid, pos, 0, 0, invariant)]),
        1 => {
            let n = neighborhood(grid, pos, invariant);
            let center = read(grid, pos, 0, 0, invariant);
            Grid::from_raw(
                3,
                3,
                vec![n[0], n[1], n[2], n[3], center, n[4], n[5], n[6], n[7]],
            )
        }
        _ => grow_ring(moore(radius - 1, pos, grid, invariant), radius, pos, grid, invariant),
    }
}

fn grow_ring(inner: Grid, radius: usize, pos: Position, grid: &Grid, invariant: Cell) -> Grid {
    let side = 2 * radius + 1;
    debug_assert_eq!(inner.shape(), (side - 2, side - 2));
    let mut data = vec![invariant; side * side];

    let inner_side = inner.cols();
    for (r, row) in inner.data().chunks(inner_side).enumerate() {
        let start = (r + 1) * side + 1;
        data[start..start + inner_side].copy_from_slice(row);
    }

    let r = radius as isize;
    for (i, dc) in (-r..=r).enumerate() {
        data[i] = read(grid, pos, -r, dc, invariant);
        data[(side - 1) * side + i] = read(grid, pos, r, dc, invariant);
    }
    for (i, dr) in (-r + 1..r).enumerate() {
        let row = (i + 1) * side;
        data[row] = read(grid, pos, dr, -r, invariant);
        data[row + side - 1] = read(grid, pos, dr, r, invariant);
    }
    Grid::from_raw(side, side, data)
}
