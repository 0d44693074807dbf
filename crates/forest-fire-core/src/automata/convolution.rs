//! "Same"-size 2-D convolution with a constant fill value outside the grid.

use super::encoding::Kernel;
use crate::grid::{Cell, Grid};

/// True convolution (kernel flipped) of `grid` with a 3x3 `kernel`.
///
/// Output has the grid's shape; cells outside the grid read as `fill`. Because the
/// kernel is flipped, `kernel[r][c]` weighs the neighbor at offset `(1 - r, 1 - c)`.
pub fn convolve_same(grid: &Grid, kernel: &Kernel, fill: Cell) -> Vec<i64> {
    let (rows, cols) = grid.shape();
    let mut out = vec![0i64; rows * cols];
    for row in 0..rows {
        for col in 0..cols {
            let mut sum = 0i64;
            for (kr, kernel_row) in kernel.iter().enumerate() {
                for (kc, &weight) in kernel_row.iter().enumerate() {
                    if weight == 0 {
                        continue;
                    }
                    let value = grid
                        .get_signed(
                            row as isize + 1 - kr as isize,
                            col as isize + 1 - kc as isize,
                        )
                        .unwrap_or(fill);
                    sum += weight * i64::from(value);
                }
            }
            out[row * cols + col] = sum;
        }
    }
    out
}
