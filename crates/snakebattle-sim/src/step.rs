//! The fixed-tick simulation step.
//!
//! One call to [`GameState::step`] advances a room by exactly one tick:
//!
//! ```text
//! resolve input → move → projectiles → recharge → food → eliminations
//! ```
//!
//! Shots are resolved at tick time, not when the command arrives, so the
//! result doesn't depend on which client's packet reached the server first.

use rand::Rng;
use tracing::{debug, trace};

use crate::{GameState, Outcome, Position, Projectile, Side, SimConfig};

impl GameState {
    /// Advances the game by one tick.
    ///
    /// Returns the outcome if this tick ended the game. A game that is
    /// already over is left untouched.
    pub fn step<R: Rng>(
        &mut self,
        config: &SimConfig,
        rng: &mut R,
    ) -> Option<Outcome> {
        if self.game_over {
            return None;
        }
        self.tick += 1;

        self.resolve_input();
        self.move_snakes();
        self.advance_projectiles(config);
        self.recharge(config);
        self.collect_food(config, rng);
        self.check_eliminations(config)
    }

    /// Applies queued direction changes and fires queued shots from the
    /// pre-move head.
    fn resolve_input(&mut self) {
        for (index, snake) in self.snakes.iter_mut().enumerate() {
            let input = std::mem::take(&mut snake.pending);
            if !snake.alive {
                continue;
            }
            if let Some(direction) = input.direction {
                snake.direction = direction;
            }
            if input.shoot && snake.charge > 0 {
                snake.charge -= 1;
                self.projectiles.push(Projectile {
                    position: snake.head(),
                    velocity: snake.direction,
                    owner: Side::from_index(index),
                });
                trace!(side = index + 1, charge = snake.charge, "shot fired");
            }
        }
    }

    fn move_snakes(&mut self) {
        for snake in self.snakes.iter_mut().filter(|s| s.alive) {
            if snake.stunned > 0 {
                snake.stunned -= 1;
                continue;
            }
            let head = snake.head().step(snake.direction);
            snake.body.push_front(head);
            snake.body.pop_back();
        }
    }

    /// Moves every projectile, then drops the ones that hit an opposing
    /// snake (stunning it) or left the board.
    fn advance_projectiles(&mut self, config: &SimConfig) {
        let in_flight = std::mem::take(&mut self.projectiles);
        let mut kept = Vec::with_capacity(in_flight.len());

        for mut projectile in in_flight {
            projectile.position = projectile.position.step(projectile.velocity);

            let target = self.snakes.iter_mut().enumerate().find(|(index, snake)| {
                snake.alive
                    && Side::from_index(*index) != projectile.owner
                    && snake
                        .body
                        .iter()
                        .any(|segment| segment.within_one_cell(projectile.position))
            });
            if let Some((index, snake)) = target {
                snake.stunned = config.stun_ticks;
                debug!(side = index + 1, at = %projectile.position, "snake stunned");
                continue;
            }

            if projectile.position.in_bounds(config.board_size) {
                kept.push(projectile);
            }
        }

        self.projectiles = kept;
    }

    fn recharge(&mut self, config: &SimConfig) {
        for snake in self.snakes.iter_mut().filter(|s| s.alive) {
            if snake.charge < config.max_charge {
                snake.charge += 1;
            }
        }
    }

    fn collect_food<R: Rng>(&mut self, config: &SimConfig, rng: &mut R) {
        for index in 0..self.snakes.len() {
            let snake = &mut self.snakes[index];
            if !snake.alive || snake.head() != self.food {
                continue;
            }
            snake.score += 1;
            if let Some(tail) = snake.body.back().copied() {
                snake.body.push_back(tail);
            }
            debug!(side = index + 1, score = snake.score, "food eaten");
            self.relocate_food(config, rng);
        }
    }

    /// Moves the food to a uniformly random cell not covered by any living
    /// snake. Stays put if the board is full.
    fn relocate_food<R: Rng>(&mut self, config: &SimConfig, rng: &mut R) {
        let size = config.board_size;
        let free: Vec<Position> = (0..size)
            .flat_map(|y| (0..size).map(move |x| Position::new(x, y)))
            .filter(|cell| {
                !self.snakes.iter().any(|s| s.alive && s.occupies(*cell))
            })
            .collect();

        if free.is_empty() {
            return;
        }
        self.food = free[rng.random_range(0..free.len())];
    }

    /// Eliminates snakes that left the board or ran into themselves (and,
    /// when enabled, into the opponent). All checks see the same
    /// post-movement board, so simultaneous eliminations are possible.
    fn check_eliminations(&mut self, config: &SimConfig) -> Option<Outcome> {
        let eliminated: Vec<bool> = self
            .snakes
            .iter()
            .enumerate()
            .map(|(index, snake)| {
                if !snake.alive {
                    return false;
                }
                let head = snake.head();
                let hit_opponent = config.opponent_collision
                    && self
                        .snakes
                        .iter()
                        .enumerate()
                        .any(|(other, s)| other != index && s.alive && s.occupies(head));
                !head.in_bounds(config.board_size) || snake.bites_itself() || hit_opponent
            })
            .collect();

        if !eliminated.iter().any(|e| *e) {
            return None;
        }
        for (snake, out) in self.snakes.iter_mut().zip(&eliminated) {
            if *out {
                snake.alive = false;
            }
        }

        let outcome = if self.is_single_player() {
            Outcome::GameOver
        } else {
            match (eliminated[0], eliminated[1]) {
                (true, true) => Outcome::Draw,
                (true, false) => Outcome::Winner(Side::Two),
                _ => Outcome::Winner(Side::One),
            }
        };
        self.finish(outcome);
        debug!(tick = self.tick, %outcome, "game over");
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::{Direction, SideInput};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn body(cells: &[(i32, i32)]) -> VecDeque<Position> {
        cells.iter().map(|&(x, y)| Position::new(x, y)).collect()
    }

    fn shoot() -> SideInput {
        SideInput { direction: None, shoot: true }
    }

    #[test]
    fn test_first_tick_moves_head_one_cell() {
        let config = SimConfig::default();
        let mut state = GameState::new(&config, true);

        let outcome = state.step(&config, &mut rng());

        assert!(outcome.is_none());
        let snake = &state.snakes[0];
        assert_eq!(snake.head(), Position::new(6, 5));
        assert_eq!(snake.body.len(), 3);
        assert_eq!(snake.score, 0);
        assert_eq!(snake.stunned, 0);
        assert_eq!(state.food, Position::new(10, 10));
        assert_eq!(state.tick, 1);
    }

    #[test]
    fn test_queued_direction_applies_on_next_tick() {
        let config = SimConfig::default();
        let mut state = GameState::new(&config, true);
        state.queue_input(
            Side::One,
            SideInput { direction: Some(Direction::Down), shoot: false },
        );

        state.step(&config, &mut rng());

        assert_eq!(state.snakes[0].direction, Direction::Down);
        assert_eq!(state.snakes[0].head(), Position::new(5, 6));
    }

    #[test]
    fn test_food_pickup_grows_and_relocates() {
        let config = SimConfig::default();
        let mut state = GameState::new(&config, true);
        state.food = Position::new(6, 5);

        state.step(&config, &mut rng());

        let snake = &state.snakes[0];
        assert_eq!(snake.score, 1);
        assert_eq!(snake.body.len(), 4);
        assert!(!snake.occupies(state.food), "food must land on a free cell");
        assert!(state.food.in_bounds(config.board_size));
    }

    #[test]
    fn test_length_tracks_score_over_many_ticks() {
        let config = SimConfig::default();
        let mut state = GameState::new(&config, true);
        let mut r = rng();
        // Drop food directly ahead a few times while steering in a square.
        let turns = [Direction::Down, Direction::Right, Direction::Up, Direction::Right];
        for (i, turn) in turns.iter().cycle().take(12).enumerate() {
            if i % 3 == 0 {
                let snake = &state.snakes[0];
                state.food = snake.head().step(*turn);
            }
            state.queue_input(Side::One, SideInput { direction: Some(*turn), shoot: false });
            state.step(&config, &mut r);
            if state.game_over {
                break;
            }
            let snake = &state.snakes[0];
            assert_eq!(snake.body.len(), snake.score as usize + config.initial_length);
        }
    }

    #[test]
    fn test_wall_collision_ends_single_player() {
        let config = SimConfig::default();
        let mut state = GameState::new(&config, true);
        state.snakes[0].body = body(&[(24, 3), (23, 3), (22, 3)]);

        let outcome = state.step(&config, &mut rng());

        assert_eq!(outcome, Some(Outcome::GameOver));
        assert!(state.game_over);
        assert_eq!(state.winner, Some(Outcome::GameOver));
        assert!(!state.snakes[0].alive);
    }

    #[test]
    fn test_self_collision_ends_game_same_tick() {
        let config = SimConfig::default();
        let mut state = GameState::new(&config, false);
        // A hook shape: moving up runs into (6, 4).
        state.snakes[0].body = body(&[(6, 5), (7, 5), (7, 4), (6, 4), (5, 4)]);
        state.snakes[0].score = 2;
        state.snakes[0].direction = Direction::Up;

        let outcome = state.step(&config, &mut rng());

        assert_eq!(outcome, Some(Outcome::Winner(Side::Two)));
        assert_eq!(state.winner.map(Outcome::label), Some("Player 2"));
    }

    #[test]
    fn test_reversing_into_body_is_terminal() {
        let config = SimConfig::default();
        let mut state = GameState::new(&config, false);
        state.queue_input(
            Side::Two,
            SideInput { direction: Some(Direction::Right), shoot: false },
        );

        let outcome = state.step(&config, &mut rng());

        assert_eq!(outcome, Some(Outcome::Winner(Side::One)));
    }

    #[test]
    fn test_simultaneous_elimination_is_a_draw() {
        let config = SimConfig::default();
        let mut state = GameState::new(&config, false);
        state.snakes[0].body = body(&[(24, 0), (23, 0), (22, 0)]);
        state.snakes[1].body = body(&[(0, 24), (1, 24), (2, 24)]);

        let outcome = state.step(&config, &mut rng());

        assert_eq!(outcome, Some(Outcome::Draw));
        assert!(state.snakes.iter().all(|s| !s.alive));
    }

    #[test]
    fn test_head_on_collision_is_draw_when_enabled() {
        let config = SimConfig { opponent_collision: true, ..SimConfig::default() };
        let mut state = GameState::new(&config, false);
        state.snakes[0].body = body(&[(10, 12), (9, 12), (8, 12)]);
        state.snakes[1].body = body(&[(12, 12), (13, 12), (14, 12)]);

        // Both heads land on (11, 12).
        let outcome = state.step(&config, &mut rng());

        assert_eq!(outcome, Some(Outcome::Draw));
    }

    #[test]
    fn test_body_collision_loses_when_enabled() {
        let config = SimConfig { opponent_collision: true, ..SimConfig::default() };
        let mut state = GameState::new(&config, false);
        state.snakes[0].body = body(&[(10, 11), (9, 11), (8, 11)]);
        state.snakes[0].direction = Direction::Down;
        state.snakes[1].body = body(&[(9, 12), (10, 12), (11, 12)]);
        state.snakes[1].direction = Direction::Down;

        let outcome = state.step(&config, &mut rng());

        assert_eq!(outcome, Some(Outcome::Winner(Side::Two)));
    }

    #[test]
    fn test_snakes_pass_through_each_other_by_default() {
        let config = SimConfig::default();
        let mut state = GameState::new(&config, false);
        state.snakes[0].body = body(&[(10, 12), (9, 12), (8, 12)]);
        state.snakes[1].body = body(&[(12, 12), (13, 12), (14, 12)]);

        assert!(state.step(&config, &mut rng()).is_none());
    }

    #[test]
    fn test_finished_game_does_not_step() {
        let config = SimConfig::default();
        let mut state = GameState::new(&config, true);
        state.finish(Outcome::GameOver);
        let before = state.clone();

        assert!(state.step(&config, &mut rng()).is_none());
        assert_eq!(state, before);
    }

    #[test]
    fn test_shot_spawns_at_head_and_uses_charge() {
        let config = SimConfig::default();
        let mut state = GameState::new(&config, false);
        state.snakes[0].charge = 2;
        state.queue_input(Side::One, shoot());

        state.step(&config, &mut rng());

        assert_eq!(state.projectiles.len(), 1);
        let p = state.projectiles[0];
        assert_eq!(p.owner, Side::One);
        assert_eq!(p.velocity, Direction::Right);
        // Spawned at (5, 5) and advanced once.
        assert_eq!(p.position, Position::new(6, 5));
        // 2 - 1 for the shot + 1 recharge.
        assert_eq!(state.snakes[0].charge, 2);
        assert_eq!(state.snakes[0].stunned, 0, "own shot never stuns the shooter");
    }

    #[test]
    fn test_shot_without_charge_is_ignored() {
        let config = SimConfig::default();
        let mut state = GameState::new(&config, false);
        state.snakes[0].charge = 0;
        state.queue_input(Side::One, shoot());

        state.step(&config, &mut rng());

        assert!(state.projectiles.is_empty());
        assert_eq!(state.snakes[0].charge, 1);
    }

    #[test]
    fn test_projectile_hit_stuns_opponent_and_is_removed() {
        let config = SimConfig::default();
        let mut state = GameState::new(&config, false);
        state.projectiles.push(Projectile {
            position: Position::new(20, 18),
            velocity: Direction::Down,
            owner: Side::One,
        });
        // Snake two sits still so the hit lands on a known cell.
        state.snakes[1].stunned = 1;

        state.step(&config, &mut rng());

        // (20, 19) is not part of snake two; advance again to (20, 20).
        assert_eq!(state.projectiles.len(), 1);
        state.step(&config, &mut rng());

        assert!(state.projectiles.is_empty());
        assert_eq!(state.snakes[1].stunned, config.stun_ticks);
    }

    #[test]
    fn test_stunned_snake_does_not_move() {
        let config = SimConfig::default();
        let mut state = GameState::new(&config, false);
        state.snakes[1].stunned = 2;
        let head = state.snakes[1].head();

        state.step(&config, &mut rng());
        assert_eq!(state.snakes[1].head(), head);
        assert_eq!(state.snakes[1].stunned, 1);

        state.step(&config, &mut rng());
        state.step(&config, &mut rng());
        assert_eq!(state.snakes[1].head(), head.step(Direction::Left));
    }

    #[test]
    fn test_projectile_removed_when_leaving_board() {
        let config = SimConfig::default();
        let mut state = GameState::new(&config, false);
        state.projectiles.push(Projectile {
            position: Position::new(0, 0),
            velocity: Direction::Up,
            owner: Side::Two,
        });

        state.step(&config, &mut rng());

        assert!(state.projectiles.is_empty());
    }

    #[test]
    fn test_projectiles_stay_in_bounds_every_tick() {
        let config = SimConfig::default();
        let mut state = GameState::new(&config, false);
        let mut r = rng();
        for tick in 0..40 {
            if tick % 4 == 0 {
                state.queue_input(Side::One, shoot());
            }
            state.step(&config, &mut r);
            if state.game_over {
                break;
            }
            assert!(
                state
                    .projectiles
                    .iter()
                    .all(|p| p.position.in_bounds(config.board_size))
            );
        }
    }

    #[test]
    fn test_charge_never_exceeds_max() {
        let config = SimConfig::default();
        let mut state = GameState::new(&config, true);
        // Keep the snake alive by circling.
        let turns = [Direction::Down, Direction::Left, Direction::Up, Direction::Right];
        for i in 0..40 {
            let turn = turns[(i / 2) % 4];
            state.queue_input(Side::One, SideInput { direction: Some(turn), shoot: false });
            state.step(&config, &mut rng());
            assert!(state.snakes[0].charge <= config.max_charge);
        }
        assert_eq!(state.snakes[0].charge, config.max_charge);
    }
}
