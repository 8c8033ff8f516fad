//! Macroquad rendering of the predicted world: tile geometry, entities,
//! and a small netcode status readout.

use macroquad::prelude::*;
use shared::{EntityId, Tick, TileMap, WorldState};

/// Pixels per world meter.
const SCALE: f32 = 48.0;
const MARGIN: f32 = 24.0;

#[derive(Debug, Clone, Copy)]
pub struct HudStats {
    pub tick: Tick,
    pub truth_ms: u64,
    pub fake_ping_ms: u64,
    pub window_len: usize,
}

pub struct Renderer;

impl Renderer {
    pub fn new() -> Self {
        Renderer
    }

    pub fn render(&mut self, map: &TileMap, world: &WorldState, my_id: EntityId, stats: HudStats) {
        clear_background(Color::from_rgba(24, 24, 28, 255));

        self.draw_map(map);

        for enemy in world.enemies.values() {
            let (x, y) = to_screen(enemy.core.position.x, enemy.core.position.y);
            let side = 0.7 * SCALE;
            draw_rectangle(
                x - side / 2.0,
                y - side / 2.0,
                side,
                side,
                Color::from_rgba(200, 60, 60, 255),
            );
            self.draw_health_bar(
                x,
                y - side / 2.0 - 6.0,
                enemy.core.health,
                enemy.core.max_health,
            );
        }

        for player in world.players.values() {
            let is_me = player.core.id == my_id;
            let color = if !player.core.is_alive() {
                Color::from_rgba(90, 90, 90, 255)
            } else if is_me {
                GREEN
            } else {
                Color::from_rgba(80, 140, 255, 255)
            };

            let (x, y) = to_screen(player.core.position.x, player.core.position.y);
            let side = 0.8 * SCALE;
            draw_rectangle(x - side / 2.0, y - side / 2.0, side, side, color);
            draw_rectangle_lines(x - side / 2.0, y - side / 2.0, side, side, 2.0, WHITE);

            // Facing indicator.
            let fx = x + player.core.facing.x * side;
            let fy = y + player.core.facing.y * side;
            draw_line(x, y, fx, fy, 2.0, YELLOW);

            self.draw_health_bar(
                x,
                y - side / 2.0 - 6.0,
                player.core.health,
                player.core.max_health,
            );
            draw_text(&player.name, x - side / 2.0, y + side, 16.0, WHITE);

            if is_me {
                let score = format!("score {}", player.score);
                draw_text(&score, 10.0, 20.0, 20.0, WHITE);
            }
        }

        self.draw_hud(stats, world);
    }

    fn draw_map(&self, map: &TileMap) {
        for wall in map.wall_tiles() {
            let (x, y) = to_screen(wall.min.x, wall.min.y);
            draw_rectangle(
                x,
                y,
                (wall.max.x - wall.min.x) * SCALE,
                (wall.max.y - wall.min.y) * SCALE,
                Color::from_rgba(70, 70, 80, 255),
            );
        }
    }

    fn draw_health_bar(&self, cx: f32, y: f32, health: i32, max_health: i32) {
        let width = 0.8 * SCALE;
        let fraction = (health.max(0) as f32 / max_health.max(1) as f32).clamp(0.0, 1.0);
        draw_rectangle(
            cx - width / 2.0,
            y,
            width,
            4.0,
            Color::from_rgba(60, 60, 60, 255),
        );
        draw_rectangle(cx - width / 2.0, y, width * fraction, 4.0, GREEN);
    }

    fn draw_hud(&self, stats: HudStats, world: &WorldState) {
        let line = format!(
            "tick {}  wave {}  window {}  truth {}ms (+{}ms fake)",
            stats.tick, world.wave, stats.window_len, stats.truth_ms, stats.fake_ping_ms
        );
        draw_text(&line, 10.0, 40.0, 16.0, GRAY);
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

fn to_screen(x: f32, y: f32) -> (f32, f32) {
    (MARGIN + x * SCALE, MARGIN + y * SCALE)
}
