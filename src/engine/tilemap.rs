use crate::engine::geometry::{Point, Rectangle, Size, Solid};
use anyhow::{anyhow, Result};

/// Fixed grid of tiles laid out from the origin, row major
#[derive(Debug, Clone, PartialEq)]
pub struct TileMap<T> {
    columns: usize,
    rows: usize,
    tile: Size,
    tiles: Vec<T>,
}

impl<T: Clone> TileMap<T> {
    pub fn new(columns: usize, rows: usize, tile: Size, fill: T) -> Result<Self> {
        if columns == 0 || rows == 0 {
            return Err(anyhow!("TileMap needs at least one tile, got {}x{}", columns, rows));
        }
        if tile.width <= 0.0 || tile.height <= 0.0 {
            return Err(anyhow!("TileMap tile size must be positive : {:?}", tile));
        }
        Ok(TileMap {
            columns,
            rows,
            tile,
            tiles: vec![fill; columns * rows],
        })
    }
}

impl<T> TileMap<T> {
    /// Build from text rows, one char per tile.
    ///
    /// ```text
    /// "##  ##"   short rows are padded with to_tile(' ')
    /// "#"
    /// ```
    pub fn parse<S, F>(layout: &[S], tile: Size, to_tile: F) -> Result<Self>
    where
        S: AsRef<str>,
        F: Fn(char) -> T,
    {
        let columns = layout
            .iter()
            .map(|row| row.as_ref().chars().count())
            .max()
            .unwrap_or(0);
        if columns == 0 {
            return Err(anyhow!("TileMap layout is empty"));
        }
        if tile.width <= 0.0 || tile.height <= 0.0 {
            return Err(anyhow!("TileMap tile size must be positive : {:?}", tile));
        }
        let tiles = layout
            .iter()
            .flat_map(|row| {
                let row = row.as_ref();
                let padding = columns - row.chars().count();
                row.chars().chain(std::iter::repeat(' ').take(padding))
            })
            .map(&to_tile)
            .collect();
        Ok(TileMap {
            columns,
            rows: layout.len(),
            tile,
            tiles,
        })
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn tile_size(&self) -> Size {
        self.tile
    }

    fn index(&self, column: usize, row: usize) -> Option<usize> {
        (column < self.columns && row < self.rows).then(|| row * self.columns + column)
    }

    pub fn get(&self, column: usize, row: usize) -> Option<&T> {
        self.index(column, row).map(|index| &self.tiles[index])
    }

    pub fn set(&mut self, column: usize, row: usize, value: T) -> Result<()> {
        let index = self.index(column, row).ok_or_else(|| {
            anyhow!(
                "Tile ({}, {}) outside {}x{} map",
                column,
                row,
                self.columns,
                self.rows
            )
        })?;
        self.tiles[index] = value;
        Ok(())
    }

    /// Grid cell under a world point
    pub fn tile_at(&self, point: Point) -> Option<(usize, usize)> {
        if point.x < 0.0 || point.y < 0.0 {
            return None;
        }
        let column = (point.x / self.tile.width) as usize;
        let row = (point.y / self.tile.height) as usize;
        self.index(column, row).map(|_| (column, row))
    }

    pub fn bounds_of(&self, column: usize, row: usize) -> Result<Rectangle> {
        Rectangle::new(
            column as f64 * self.tile.width,
            row as f64 * self.tile.height,
            self.tile.width,
            self.tile.height,
        )
    }

    /// `(column, row, tile)` row by row
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> + '_ {
        self.tiles
            .iter()
            .enumerate()
            .map(move |(index, tile)| (index % self.columns, index / self.columns, tile))
    }

    /// Hard solids for every tile matching `is_solid`
    pub fn solids<F>(&self, is_solid: F) -> Result<Vec<(usize, usize, Solid)>>
    where
        F: Fn(&T) -> bool,
    {
        self.iter()
            .filter(|(_, _, tile)| is_solid(tile))
            .map(|(column, row, _)| Ok((column, row, Solid::hard(self.bounds_of(column, row)?))))
            .collect()
    }
}
