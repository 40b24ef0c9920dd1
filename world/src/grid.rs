//! Static terrain grid and route expansion used by the world crate.
//!
//! The grid and every route waypoint sequence are computed once when a
//! battle is set up and never mutate during a run, so concurrently
//! running simulations may share them read-only.

use gatefall_core::{DeployClass, GridPos, LevelData, RouteId, RouteSpec, SetupError, TileSpec};

/// Dense row-major terrain grid plus the expanded enemy routes.
#[derive(Clone, Debug)]
pub(crate) struct TerrainGrid {
    rows: u32,
    cols: u32,
    tiles: Vec<TileSpec>,
    routes: Vec<Vec<GridPos>>,
}

impl TerrainGrid {
    /// Builds the grid from level data, expanding every route into its
    /// waypoint sequence and validating that no waypoint leaves the
    /// grid.
    pub(crate) fn build(level: &LevelData) -> Result<Self, SetupError> {
        let rows = level.rows();
        let cols = level.cols();

        let mut tiles = Vec::with_capacity(rows as usize * cols as usize);
        for row in &level.tiles {
            tiles.extend(row.iter().copied());
        }

        let mut routes = Vec::with_capacity(level.routes.len());
        for (index, spec) in level.routes.iter().enumerate() {
            let route_id = RouteId::new(index as u32);
            let waypoints = expand_route(spec);
            for waypoint in &waypoints {
                if waypoint.row() >= rows || waypoint.col() >= cols {
                    return Err(SetupError::RouteOutOfBounds {
                        route: route_id,
                        rows,
                        cols,
                    });
                }
            }
            routes.push(waypoints);
        }

        Ok(Self {
            rows,
            cols,
            tiles,
            routes,
        })
    }

    /// Terrain and deployability of the provided tile, if it exists.
    pub(crate) fn tile(&self, pos: GridPos) -> Option<TileSpec> {
        self.index(pos).map(|index| self.tiles[index])
    }

    /// Deployability of the provided tile; out-of-grid positions admit
    /// nothing.
    #[allow(dead_code)]
    pub(crate) fn deploy_class(&self, pos: GridPos) -> DeployClass {
        self.tile(pos).map_or(DeployClass::None, |tile| tile.deploy)
    }

    /// Waypoint sequence of the provided route.
    pub(crate) fn route(&self, route: RouteId) -> Option<&[GridPos]> {
        self.routes
            .get(route.get() as usize)
            .map(Vec::as_slice)
    }

    /// Number of routes carved into the level.
    pub(crate) fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Grid dimensions as `(rows, cols)`.
    pub(crate) fn dimensions(&self) -> (u32, u32) {
        (self.rows, self.cols)
    }

    fn index(&self, pos: GridPos) -> Option<usize> {
        if pos.row() < self.rows && pos.col() < self.cols {
            let row = usize::try_from(pos.row()).ok()?;
            let col = usize::try_from(pos.col()).ok()?;
            let width = usize::try_from(self.cols).ok()?;
            Some(row * width + col)
        } else {
            None
        }
    }
}

/// Expands a route spec into the full waypoint sequence: start, every
/// checkpoint leg, then the end leg.
fn expand_route(spec: &RouteSpec) -> Vec<GridPos> {
    let mut path = vec![spec.start];
    let mut current = spec.start;

    for &checkpoint in spec.checkpoints.iter().chain(std::iter::once(&spec.end)) {
        if spec.allow_diagonal {
            line_leg(current, checkpoint, &mut path);
        } else {
            axis_leg(current, checkpoint, &mut path);
        }
        current = checkpoint;
    }

    path
}

/// Steps one tile at a time, resolving the row difference before the
/// column difference.
fn axis_leg(from: GridPos, to: GridPos, path: &mut Vec<GridPos>) {
    let mut current = from;
    while current != to {
        let next = if current.row() < to.row() {
            GridPos::new(current.row() + 1, current.col())
        } else if current.row() > to.row() {
            GridPos::new(current.row() - 1, current.col())
        } else if current.col() < to.col() {
            GridPos::new(current.row(), current.col() + 1)
        } else {
            GridPos::new(current.row(), current.col() - 1)
        };
        path.push(next);
        current = next;
    }
}

/// Traces the tiles crossed by a straight leg with Bresenham's line
/// algorithm, excluding the starting tile.
fn line_leg(from: GridPos, to: GridPos, path: &mut Vec<GridPos>) {
    let (mut x, mut y) = (i64::from(from.col()), i64::from(from.row()));
    let (x1, y1) = (i64::from(to.col()), i64::from(to.row()));

    let dx = (x1 - x).abs();
    let dy = (y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx - dy;

    loop {
        if (x, y) != (i64::from(from.col()), i64::from(from.row())) {
            path.push(GridPos::new(y as u32, x as u32));
        }

        if x == x1 && y == y1 {
            break;
        }

        let doubled = 2 * err;
        if doubled > -dy {
            err -= dy;
            x += sx;
        }
        if doubled < dx {
            err += dx;
            y += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{expand_route, TerrainGrid};
    use gatefall_core::{
        DeployClass, GridPos, LevelData, LevelOptions, RouteId, RouteSpec, SetupError, TileKind,
        TileSpec,
    };

    fn road() -> TileSpec {
        TileSpec {
            kind: TileKind::Road,
            deploy: DeployClass::Melee,
        }
    }

    fn level_with_route(spec: RouteSpec) -> LevelData {
        LevelData {
            name: "grid-test".to_owned(),
            tiles: vec![vec![road(); 6]; 4],
            routes: vec![spec],
            waves: Vec::new(),
            options: LevelOptions::default(),
        }
    }

    fn route(start: (u32, u32), end: (u32, u32), diagonal: bool) -> RouteSpec {
        RouteSpec {
            start: GridPos::new(start.0, start.1),
            end: GridPos::new(end.0, end.1),
            checkpoints: Vec::new(),
            allow_diagonal: diagonal,
        }
    }

    #[test]
    fn axis_route_resolves_rows_before_columns() {
        let expanded = expand_route(&route((0, 0), (2, 2), false));
        assert_eq!(
            expanded,
            vec![
                GridPos::new(0, 0),
                GridPos::new(1, 0),
                GridPos::new(2, 0),
                GridPos::new(2, 1),
                GridPos::new(2, 2),
            ]
        );
    }

    #[test]
    fn checkpoints_chain_between_start_and_end() {
        let mut spec = route((0, 0), (0, 4), false);
        spec.checkpoints = vec![GridPos::new(2, 0)];
        let expanded = expand_route(&spec);

        assert_eq!(expanded.first(), Some(&GridPos::new(0, 0)));
        assert!(expanded.contains(&GridPos::new(2, 0)));
        assert_eq!(expanded.last(), Some(&GridPos::new(0, 4)));
        // Down to the checkpoint, back up, then across.
        assert_eq!(expanded.len(), 1 + 2 + 2 + 4);
    }

    #[test]
    fn diagonal_route_traces_the_bresenham_line() {
        let expanded = expand_route(&route((0, 0), (3, 3), true));
        assert_eq!(
            expanded,
            vec![
                GridPos::new(0, 0),
                GridPos::new(1, 1),
                GridPos::new(2, 2),
                GridPos::new(3, 3),
            ]
        );
    }

    #[test]
    fn degenerate_route_is_a_single_waypoint() {
        let expanded = expand_route(&route((1, 1), (1, 1), false));
        assert_eq!(expanded, vec![GridPos::new(1, 1)]);
    }

    #[test]
    fn build_rejects_routes_leaving_the_grid() {
        let level = level_with_route(route((0, 0), (0, 9), false));
        let error = TerrainGrid::build(&level).expect_err("route exceeds grid");
        assert_eq!(
            error,
            SetupError::RouteOutOfBounds {
                route: RouteId::new(0),
                rows: 4,
                cols: 6,
            }
        );
    }

    #[test]
    fn tile_lookup_reports_bounds() {
        let level = level_with_route(route((0, 0), (0, 1), false));
        let grid = TerrainGrid::build(&level).expect("grid builds");

        assert!(grid.tile(GridPos::new(3, 5)).is_some());
        assert!(grid.tile(GridPos::new(4, 0)).is_none());
        assert_eq!(grid.deploy_class(GridPos::new(0, 0)), DeployClass::Melee);
        assert_eq!(grid.deploy_class(GridPos::new(9, 9)), DeployClass::None);
        assert_eq!(grid.dimensions(), (4, 6));
        assert_eq!(grid.route_count(), 1);
        assert_eq!(grid.route(RouteId::new(0)).map(<[GridPos]>::len), Some(2));
    }
}
