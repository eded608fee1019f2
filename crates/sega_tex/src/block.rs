//! Storage-order iteration for tiled and linear layouts.
//!
//! Tiled formats store the image as a grid of fixed-size blocks, blocks in
//! raster order and pixels in raster order inside each block. Encoders and
//! decoders both walk the same position sequence, which makes the pair
//! inverse by construction.

use crate::error::{Error, Result};

/// Pixel coordinates in stored order for a block-tiled image.
pub(crate) fn tiled_positions(
    width: u32,
    height: u32,
    tile_w: u32,
    tile_h: u32,
) -> impl Iterator<Item = (u32, u32)> {
    (0..height / tile_h).flat_map(move |tile_y| {
        (0..width / tile_w).flat_map(move |tile_x| {
            (0..tile_h).flat_map(move |in_y| {
                (0..tile_w).map(move |in_x| (tile_x * tile_w + in_x, tile_y * tile_h + in_y))
            })
        })
    })
}

/// Pixel coordinates in stored order for a row-major image.
pub(crate) fn linear_positions(width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    (0..height).flat_map(move |y| (0..width).map(move |x| (x, y)))
}

/// Validate dimensions against a tiled layout's rules.
pub(crate) fn check_tiled(
    width: u32,
    height: u32,
    tile_w: u32,
    tile_h: u32,
    square: bool,
) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidArgument("dimensions must be non-zero".into()));
    }
    if square && width != height {
        return Err(Error::InvalidArgument(format!(
            "{width}x{height} is not square"
        )));
    }
    if width % tile_w != 0 || height % tile_h != 0 {
        return Err(Error::InvalidArgument(format!(
            "{width}x{height} is not a multiple of the {tile_w}x{tile_h} block"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn tiled_order_visits_blocks_then_pixels() {
        let positions: Vec<_> = tiled_positions(4, 4, 2, 2).collect();
        assert_eq!(
            positions,
            vec![
                (0, 0),
                (1, 0),
                (0, 1),
                (1, 1),
                (2, 0),
                (3, 0),
                (2, 1),
                (3, 1),
                (0, 2),
                (1, 2),
                (0, 3),
                (1, 3),
                (2, 2),
                (3, 2),
                (2, 3),
                (3, 3),
            ]
        );
    }

    #[test]
    fn every_pixel_is_visited_once() {
        let mut seen = vec![false; 64];
        for (x, y) in tiled_positions(8, 8, 4, 4) {
            let at = (y * 8 + x) as usize;
            assert!(!seen[at]);
            seen[at] = true;
        }
        assert!(seen.iter().all(|&v| v));
    }

    #[test]
    fn linear_order_is_row_major() {
        let positions: Vec<_> = linear_positions(3, 2).collect();
        assert_eq!(
            positions,
            vec![(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]
        );
    }

    #[test]
    fn check_tiled_rules() {
        assert!(check_tiled(8, 8, 4, 4, true).is_ok());
        assert!(check_tiled(8, 4, 4, 4, true).is_err());
        assert!(check_tiled(8, 4, 4, 4, false).is_ok());
        assert!(check_tiled(6, 4, 4, 4, false).is_err());
        assert!(check_tiled(0, 4, 4, 4, false).is_err());
    }
}
