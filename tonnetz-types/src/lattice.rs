//! The Tonnetz shape graph: cells (pitch classes at lattice vertices) and
//! triads (the triangles between them).
//!
//! Rows zig-zag: odd vertex rows sit half a step to the right of even ones.
//! Moving right along a row climbs a fifth, moving up-right a major third,
//! so every upward triangle is a major triad and every downward one minor.
//! Shapes are created once here and never change their pitch content.

use serde::{Deserialize, Serialize};

use crate::pitch::PitchClass;
use crate::ShapeId;

pub const DEFAULT_ROWS: usize = 5;
pub const DEFAULT_COLUMNS: usize = 14;

const FIFTH: i32 = 7;
const MAJOR_THIRD: i32 = 4;
const MINOR_THIRD: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Cell,
    Triad,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub id: ShapeId,
    pub pitch: PitchClass,
    /// Vertex row
    pub row: usize,
    /// Vertex index within the row
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triad {
    pub id: ShapeId,
    pub cells: [ShapeId; 3],
    /// Distinct pitch classes of the three cells, sorted.
    pub notes: Vec<PitchClass>,
    pub row: usize,
    pub column: usize,
    pub pointing_up: bool,
}

impl Triad {
    /// True when every note of this triad is in `notes`.
    pub fn is_within(&self, notes: &[PitchClass]) -> bool {
        self.notes.iter().all(|n| notes.contains(n))
    }

    pub fn shared_notes(&self, other: &Triad) -> usize {
        self.notes.iter().filter(|n| other.notes.contains(n)).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Cell(Cell),
    Triad(Triad),
}

impl Shape {
    pub fn id(&self) -> ShapeId {
        match self {
            Shape::Cell(c) => c.id,
            Shape::Triad(t) => t.id,
        }
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Cell(_) => ShapeKind::Cell,
            Shape::Triad(_) => ShapeKind::Triad,
        }
    }

    pub fn notes(&self) -> Vec<PitchClass> {
        match self {
            Shape::Cell(c) => vec![c.pitch],
            Shape::Triad(t) => t.notes.clone(),
        }
    }
}

/// Navigation direction across the triad grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

impl Direction {
    pub fn name(&self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    pub fn parse(s: &str) -> Option<Direction> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "l" => Some(Direction::Left),
            "right" | "r" => Some(Direction::Right),
            "up" | "u" => Some(Direction::Up),
            "down" | "d" => Some(Direction::Down),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Lattice {
    rows: usize,
    columns: usize,
    vertex_columns: usize,
    /// Indexed by `ShapeId`: triads first, then cells.
    shapes: Vec<Shape>,
}

impl Lattice {
    /// Build a grid of `rows` triangle rows with `columns` triangles each.
    pub fn new(rows: usize, columns: usize) -> Self {
        let rows = rows.max(1);
        let columns = columns.max(1);
        let vertex_columns = (columns + 1) / 2 + 1;

        let center = raw_pitch(rows / 2, vertex_columns / 2);
        let triad_count = rows * columns;
        let cell_id = |row: usize, column: usize| -> ShapeId {
            ShapeId::new((triad_count + row * vertex_columns + column) as u32)
        };
        let pitch_at = |row: usize, column: usize| -> PitchClass {
            PitchClass::from_midi(raw_pitch(row, column) - center)
        };

        let mut shapes = Vec::with_capacity(triad_count + (rows + 1) * vertex_columns);

        for row in 0..rows {
            for column in 0..columns {
                let j = column / 2;
                let (vertices, pointing_up) = match (row % 2 == 0, column % 2 == 0) {
                    (true, true) => ([(row, j), (row, j + 1), (row + 1, j)], false),
                    (true, false) => ([(row, j + 1), (row + 1, j), (row + 1, j + 1)], true),
                    (false, true) => ([(row, j), (row + 1, j), (row + 1, j + 1)], true),
                    (false, false) => ([(row, j), (row, j + 1), (row + 1, j + 1)], false),
                };

                let mut notes: Vec<PitchClass> =
                    vertices.iter().map(|&(r, c)| pitch_at(r, c)).collect();
                notes.sort();
                notes.dedup();

                shapes.push(Shape::Triad(Triad {
                    id: ShapeId::new((row * columns + column) as u32),
                    cells: vertices.map(|(r, c)| cell_id(r, c)),
                    notes,
                    row,
                    column,
                    pointing_up,
                }));
            }
        }

        for row in 0..=rows {
            for column in 0..vertex_columns {
                shapes.push(Shape::Cell(Cell {
                    id: cell_id(row, column),
                    pitch: pitch_at(row, column),
                    row,
                    column,
                }));
            }
        }

        Self {
            rows,
            columns,
            vertex_columns,
            shapes,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn vertex_columns(&self) -> usize {
        self.vertex_columns
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(id.get() as usize)
    }

    pub fn triad(&self, id: ShapeId) -> Option<&Triad> {
        match self.shape(id)? {
            Shape::Triad(t) => Some(t),
            Shape::Cell(_) => None,
        }
    }

    pub fn cell(&self, id: ShapeId) -> Option<&Cell> {
        match self.shape(id)? {
            Shape::Cell(c) => Some(c),
            Shape::Triad(_) => None,
        }
    }

    pub fn triads(&self) -> impl Iterator<Item = &Triad> {
        self.shapes.iter().filter_map(|s| match s {
            Shape::Triad(t) => Some(t),
            Shape::Cell(_) => None,
        })
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.shapes.iter().filter_map(|s| match s {
            Shape::Cell(c) => Some(c),
            Shape::Triad(_) => None,
        })
    }

    pub fn triad_at(&self, row: usize, column: usize) -> Option<ShapeId> {
        if row < self.rows && column < self.columns {
            Some(ShapeId::new((row * self.columns + column) as u32))
        } else {
            None
        }
    }

    /// Every cell carrying `pitch`. Pitch classes repeat across the lattice.
    pub fn cells_with_pitch(&self, pitch: PitchClass) -> Vec<ShapeId> {
        self.cells().filter(|c| c.pitch == pitch).map(|c| c.id).collect()
    }

    /// Triads whose whole note set lies inside `notes`.
    pub fn triads_within(&self, notes: &[PitchClass]) -> Vec<ShapeId> {
        self.triads().filter(|t| t.is_within(notes)).map(|t| t.id).collect()
    }

    /// The grid neighbour in `direction`, wrapping at the edges.
    pub fn neighbor(&self, id: ShapeId, direction: Direction) -> Option<ShapeId> {
        let triad = self.triad(id)?;
        let (row, column) = (triad.row, triad.column);
        let (row, column) = match direction {
            Direction::Left => (row, (column + self.columns - 1) % self.columns),
            Direction::Right => (row, (column + 1) % self.columns),
            Direction::Up => ((row + self.rows - 1) % self.rows, column),
            Direction::Down => ((row + 1) % self.rows, column),
        };
        self.triad_at(row, column)
    }

    /// Neighbour in `direction` if it keeps at least two notes of the source.
    pub fn step(&self, id: ShapeId, direction: Direction) -> Option<ShapeId> {
        let from = self.triad(id)?;
        let to_id = self.neighbor(id, direction)?;
        let to = self.triad(to_id)?;
        if to_id != id && from.shared_notes(to) >= 2 {
            Some(to_id)
        } else {
            None
        }
    }
}

impl Default for Lattice {
    fn default() -> Self {
        Self::new(DEFAULT_ROWS, DEFAULT_COLUMNS)
    }
}

/// Unreduced pitch of a vertex: a fifth per column, and alternately a minor
/// third up and a major third down per row.
fn raw_pitch(row: usize, column: usize) -> i32 {
    let row = row as i32;
    FIFTH * column as i32 + MINOR_THIRD * ((row + 1) / 2) - MAJOR_THIRD * (row / 2)
}
