use protozoa_types::{Direction, Point};

pub(crate) fn rotate_left(direction: Direction) -> Direction {
    match direction {
        Direction::North => Direction::West,
        Direction::West => Direction::South,
        Direction::South => Direction::East,
        Direction::East => Direction::North,
    }
}

pub(crate) fn rotate_right(direction: Direction) -> Direction {
    match direction {
        Direction::North => Direction::East,
        Direction::East => Direction::South,
        Direction::South => Direction::West,
        Direction::West => Direction::North,
    }
}

/// Adjacent cell in `direction`, wrapping around the grid edges.
pub(crate) fn neighbor(point: Point, direction: Direction, width: i32, height: i32) -> Point {
    let (dx, dy) = match direction {
        Direction::North => (0, -1),
        Direction::East => (1, 0),
        Direction::South => (0, 1),
        Direction::West => (-1, 0),
    };
    wrap_position(Point::new(point.x + dx, point.y + dy), width, height)
}

pub(crate) fn wrap_position(point: Point, width: i32, height: i32) -> Point {
    Point::new(point.x.rem_euclid(width), point.y.rem_euclid(height))
}

pub(crate) fn cell_index(point: Point, width: i32, height: i32) -> usize {
    let wrapped = wrap_position(point, width, height);
    wrapped.y as usize * width as usize + wrapped.x as usize
}
