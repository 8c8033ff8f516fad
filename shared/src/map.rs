//! The map oracle: walkable grid, spawn regions and the precomputed
//! all-pairs routing table enemies chase players with.
//!
//! Everything here is built once at load time and read-only afterwards.
//! Data errors (unknown map, ragged rows, missing spawns) surface as
//! `MapError` before a session starts; nothing in here can fail during
//! steady-state simulation.

use crate::physics::{Aabb, Vec2};
use crate::rng::GameRng;
use std::collections::VecDeque;
use thiserror::Error;

/// Side length of one tile in meters.
pub const TILE_SIZE: f32 = 1.0;

/// Routing distance sentinel for tile pairs with no walkable path.
pub const UNREACHABLE: u16 = u16::MAX;

const MIN_DIMENSION: usize = 4;

#[derive(Debug, Error)]
pub enum MapError {
    #[error("unknown map '{0}'")]
    Unknown(String),
    #[error("map '{name}' is {width}x{height} tiles, smaller than the {min}x{min} minimum")]
    TooSmall {
        name: String,
        width: usize,
        height: usize,
        min: usize,
    },
    #[error("map '{name}' is malformed: {reason}")]
    Malformed { name: String, reason: String },
}

/// A rectangle entities can spawn inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnRegion {
    pub min: Vec2,
    pub max: Vec2,
}

impl SpawnRegion {
    /// A uniformly random point inside the region, drawn from the
    /// simulation's deterministic generator.
    pub fn random_point(&self, rng: &mut GameRng) -> Vec2 {
        Vec2::new(
            rng.range_f32(self.min.x, self.max.x),
            rng.range_f32(self.min.y, self.max.y),
        )
    }
}

/// All-pairs shortest paths over the 4-connected walkable grid,
/// precomputed by one BFS per target tile.
#[derive(Debug, Clone)]
pub struct RoutingTable {
    tiles: usize,
    /// `next[from * tiles + to]`: the neighbor to step onto, or
    /// `UNREACHABLE` when no path exists.
    next: Vec<u16>,
    /// `dist[from * tiles + to]` in tile steps.
    dist: Vec<u16>,
}

impl RoutingTable {
    fn compute(width: usize, height: usize, walkable: &[bool]) -> Self {
        let tiles = width * height;
        let mut next = vec![UNREACHABLE; tiles * tiles];
        let mut dist = vec![UNREACHABLE; tiles * tiles];

        // Fixed N/S/W/E neighbor order keeps hop selection deterministic.
        let neighbors = |tile: usize| {
            let (col, row) = (tile % width, tile / width);
            let mut out = [usize::MAX; 4];
            let mut n = 0;
            if row > 0 {
                out[n] = tile - width;
                n += 1;
            }
            if row + 1 < height {
                out[n] = tile + width;
                n += 1;
            }
            if col > 0 {
                out[n] = tile - 1;
                n += 1;
            }
            if col + 1 < width {
                out[n] = tile + 1;
                n += 1;
            }
            (out, n)
        };

        let mut queue = VecDeque::new();
        let mut to_target = vec![UNREACHABLE; tiles];

        for target in 0..tiles {
            if !walkable[target] {
                continue;
            }

            to_target.fill(UNREACHABLE);
            to_target[target] = 0;
            queue.clear();
            queue.push_back(target);
            while let Some(tile) = queue.pop_front() {
                let (adjacent, count) = neighbors(tile);
                for &n in &adjacent[..count] {
                    if walkable[n] && to_target[n] == UNREACHABLE {
                        to_target[n] = to_target[tile] + 1;
                        queue.push_back(n);
                    }
                }
            }

            for from in 0..tiles {
                if to_target[from] == UNREACHABLE {
                    continue;
                }
                dist[from * tiles + target] = to_target[from];
                if from == target {
                    next[from * tiles + target] = from as u16;
                    continue;
                }
                let (adjacent, count) = neighbors(from);
                for &n in &adjacent[..count] {
                    if walkable[n] && to_target[n] == to_target[from] - 1 {
                        next[from * tiles + target] = n as u16;
                        break;
                    }
                }
            }
        }

        Self { tiles, next, dist }
    }

    /// Shortest-path length in tile steps, or `UNREACHABLE`.
    pub fn distance(&self, from: usize, to: usize) -> u16 {
        self.dist[from * self.tiles + to]
    }

    /// The tile to step onto next on a shortest path from `from` to
    /// `to`. Returns `to` itself when already there, None when
    /// unreachable.
    pub fn next_hop(&self, from: usize, to: usize) -> Option<usize> {
        let hop = self.next[from * self.tiles + to];
        if hop == UNREACHABLE {
            None
        } else {
            Some(hop as usize)
        }
    }
}

/// One loaded level: tile grid, spawn regions and routing oracle.
#[derive(Debug, Clone)]
pub struct TileMap {
    pub name: String,
    pub width: usize,
    pub height: usize,
    walkable: Vec<bool>,
    pub player_spawns: Vec<SpawnRegion>,
    pub enemy_spawns: Vec<SpawnRegion>,
    pub routing: RoutingTable,
}

const ARENA: &[&str] = &[
    "####################",
    "#........##........#",
    "#.PP......#......E.#",
    "#.PP......#........#",
    "#..................#",
    "#.....####.........#",
    "#.....####.........#",
    "#..................#",
    "#.........#......E.#",
    "#.PP......#........#",
    "#.........#......E.#",
    "####################",
];

const GAUNTLET: &[&str] = &[
    "################",
    "#PP....##....E.#",
    "#PP....##....E.#",
    "#..............#",
    "#............E.#",
    "################",
];

impl TileMap {
    /// Loads a built-in map by name.
    pub fn load(name: &str) -> Result<TileMap, MapError> {
        match name {
            "arena" => Self::from_ascii("arena", ARENA),
            "gauntlet" => Self::from_ascii("gauntlet", GAUNTLET),
            other => Err(MapError::Unknown(other.to_string())),
        }
    }

    /// Parses a layer of tile rows: `#` wall, `.` floor, `P` player
    /// spawn, `E` enemy spawn (spawn tiles are walkable).
    pub fn from_ascii(name: &str, rows: &[&str]) -> Result<TileMap, MapError> {
        let malformed = |reason: String| MapError::Malformed {
            name: name.to_string(),
            reason,
        };

        if rows.is_empty() {
            return Err(malformed("no tile rows".to_string()));
        }
        let height = rows.len();
        let width = rows[0].len();
        for (row, line) in rows.iter().enumerate() {
            if line.len() != width {
                return Err(malformed(format!(
                    "row {} is {} tiles wide, expected {}",
                    row,
                    line.len(),
                    width
                )));
            }
        }
        if width < MIN_DIMENSION || height < MIN_DIMENSION {
            return Err(MapError::TooSmall {
                name: name.to_string(),
                width,
                height,
                min: MIN_DIMENSION,
            });
        }
        if width * height >= UNREACHABLE as usize {
            return Err(malformed(format!(
                "{} tiles exceed the routing table's limit",
                width * height
            )));
        }

        let mut walkable = Vec::with_capacity(width * height);
        let mut player_spawns = Vec::new();
        let mut enemy_spawns = Vec::new();

        for (row, line) in rows.iter().enumerate() {
            for (col, tile) in line.chars().enumerate() {
                let region = SpawnRegion {
                    min: Vec2::new(col as f32 * TILE_SIZE, row as f32 * TILE_SIZE),
                    max: Vec2::new((col + 1) as f32 * TILE_SIZE, (row + 1) as f32 * TILE_SIZE),
                };
                match tile {
                    '#' => walkable.push(false),
                    '.' => walkable.push(true),
                    'P' => {
                        walkable.push(true);
                        player_spawns.push(region);
                    }
                    'E' => {
                        walkable.push(true);
                        enemy_spawns.push(region);
                    }
                    other => {
                        return Err(malformed(format!(
                            "unexpected tile '{}' at column {}, row {}",
                            other, col, row
                        )))
                    }
                }
            }
        }

        if player_spawns.is_empty() {
            return Err(malformed("no player spawn tiles".to_string()));
        }
        if enemy_spawns.is_empty() {
            return Err(malformed("no enemy spawn tiles".to_string()));
        }

        let routing = RoutingTable::compute(width, height, &walkable);

        Ok(TileMap {
            name: name.to_string(),
            width,
            height,
            walkable,
            player_spawns,
            enemy_spawns,
            routing,
        })
    }

    pub fn is_walkable(&self, col: usize, row: usize) -> bool {
        self.walkable[row * self.width + col]
    }

    /// The tile containing `position`, clamped to the grid.
    pub fn tile_at(&self, position: Vec2) -> usize {
        let col = ((position.x / TILE_SIZE) as isize).clamp(0, self.width as isize - 1) as usize;
        let row = ((position.y / TILE_SIZE) as isize).clamp(0, self.height as isize - 1) as usize;
        row * self.width + col
    }

    pub fn tile_center(&self, tile: usize) -> Vec2 {
        let (col, row) = (tile % self.width, tile / self.width);
        Vec2::new(
            (col as f32 + 0.5) * TILE_SIZE,
            (row as f32 + 0.5) * TILE_SIZE,
        )
    }

    /// The whole playfield rectangle.
    pub fn bounds(&self) -> Aabb {
        Aabb::new(
            Vec2::ZERO,
            Vec2::new(
                self.width as f32 * TILE_SIZE,
                self.height as f32 * TILE_SIZE,
            ),
        )
    }

    /// One collision rectangle per wall tile.
    pub fn wall_tiles(&self) -> impl Iterator<Item = Aabb> + '_ {
        (0..self.walkable.len()).filter(|t| !self.walkable[*t]).map(|tile| {
            let (col, row) = (tile % self.width, tile / self.width);
            Aabb::new(
                Vec2::new(col as f32 * TILE_SIZE, row as f32 * TILE_SIZE),
                Vec2::new((col + 1) as f32 * TILE_SIZE, (row + 1) as f32 * TILE_SIZE),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_maps_load() {
        let arena = TileMap::load("arena").unwrap();
        assert_eq!(arena.width, 20);
        assert_eq!(arena.height, 12);
        assert!(!arena.player_spawns.is_empty());
        assert!(!arena.enemy_spawns.is_empty());

        assert!(TileMap::load("gauntlet").is_ok());
    }

    #[test]
    fn test_unknown_map_name() {
        match TileMap::load("atlantis") {
            Err(MapError::Unknown(name)) => assert_eq!(name, "atlantis"),
            other => panic!("expected Unknown error, got {:?}", other.map(|m| m.name)),
        }
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let result = TileMap::from_ascii("bad", &["#####", "#P.E#", "####", "#####"]);
        assert!(matches!(result, Err(MapError::Malformed { .. })));
    }

    #[test]
    fn test_too_small_rejected() {
        let result = TileMap::from_ascii("tiny", &["###", "#P#", "###"]);
        assert!(matches!(result, Err(MapError::TooSmall { .. })));
    }

    #[test]
    fn test_unexpected_tile_rejected() {
        let result = TileMap::from_ascii("bad", &["#####", "#P?E#", "#...#", "#####"]);
        assert!(matches!(result, Err(MapError::Malformed { .. })));
    }

    #[test]
    fn test_missing_spawns_rejected() {
        let no_players = TileMap::from_ascii("bad", &["#####", "#..E#", "#...#", "#####"]);
        assert!(matches!(no_players, Err(MapError::Malformed { .. })));

        let no_enemies = TileMap::from_ascii("bad", &["#####", "#P..#", "#...#", "#####"]);
        assert!(matches!(no_enemies, Err(MapError::Malformed { .. })));
    }

    #[test]
    fn test_routing_steps_closer() {
        let map = TileMap::from_ascii(
            "route",
            &[
                "########",
                "#P.....#",
                "#.####.#",
                "#......#",
                "#....E.#",
                "########",
            ],
        )
        .unwrap();

        let from = map.tile_at(Vec2::new(1.5, 1.5));
        let to = map.tile_at(Vec2::new(5.5, 4.5));
        let total = map.routing.distance(from, to);
        assert_ne!(total, UNREACHABLE);

        // Walking the table hop by hop reaches the target in exactly
        // `total` steps, shrinking the remaining distance each time.
        let mut tile = from;
        for step in 0..total {
            assert_eq!(map.routing.distance(tile, to), total - step);
            tile = map.routing.next_hop(tile, to).unwrap();
        }
        assert_eq!(tile, to);
    }

    #[test]
    fn test_routing_detects_unreachable() {
        let map = TileMap::from_ascii(
            "split",
            &[
                "########",
                "#P.#..E#",
                "#..#...#",
                "#..#...#",
                "########",
            ],
        )
        .unwrap();

        let from = map.tile_at(Vec2::new(1.5, 1.5));
        let to = map.tile_at(Vec2::new(6.5, 1.5));
        assert_eq!(map.routing.distance(from, to), UNREACHABLE);
        assert_eq!(map.routing.next_hop(from, to), None);
    }

    #[test]
    fn test_tile_math() {
        let map = TileMap::load("gauntlet").unwrap();
        let tile = map.tile_at(Vec2::new(3.7, 2.2));
        assert_eq!(tile, 2 * 16 + 3);
        assert_eq!(map.tile_center(tile), Vec2::new(3.5, 2.5));

        // Out-of-bounds positions clamp onto the grid.
        let clamped = map.tile_at(Vec2::new(-5.0, 100.0));
        assert_eq!(clamped, (map.height - 1) * 16);
    }

    #[test]
    fn test_spawn_points_fall_inside_region() {
        let map = TileMap::load("arena").unwrap();
        let region = map.player_spawns[0];
        let mut rng = GameRng::new(1);
        for _ in 0..100 {
            let p = region.random_point(&mut rng);
            assert!(p.x >= region.min.x && p.x < region.max.x);
            assert!(p.y >= region.min.y && p.y < region.max.y);
        }
    }
}
