//! Player and enemy token bookkeeping on [`CharacterData`].
//!
//! Enemies are lettered A..Z from the shared counter, wrapping after Z.
//! Removing the most recent enemy gives its letter back; clearing all enemies
//! restarts at A.

#[cfg(test)]
#[path = "tokens_test.rs"]
mod tokens_test;

use mapview::camera::Point;
use wire::{CharacterData, EnemyToken, PlayerToken};

const ALPHABET: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Hit radius when no grid is calibrated.
const UNGRIDDED_TOLERANCE_PX: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Player,
    Enemy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenRef {
    pub kind: TokenKind,
    pub index: usize,
}

/// Letter for the enemy numbered `counter`.
#[must_use]
pub fn enemy_letter(counter: u32) -> String {
    let idx = (counter % 26) as usize;
    char::from(ALPHABET[idx]).to_string()
}

/// How close a click must land to a token to hit it: a quarter cell, or a
/// few pixels without a grid.
#[must_use]
pub fn hit_tolerance(cell_size: Option<f64>) -> f64 {
    cell_size.map_or(UNGRIDDED_TOLERANCE_PX, |s| s / 4.0)
}

pub fn add_player(data: &mut CharacterData, at: Point) {
    data.characters.players.push(PlayerToken { x: at.x, y: at.y });
}

/// Place an enemy and return its letter.
pub fn add_enemy(data: &mut CharacterData, at: Point) -> String {
    let letter = enemy_letter(data.enemy_letter_counter);
    data.enemy_letter_counter = data.enemy_letter_counter.wrapping_add(1);
    data.characters.enemies.push(EnemyToken { x: at.x, y: at.y, letter: letter.clone() });
    letter
}

/// First token within `tolerance` of `at`; players are checked first.
#[must_use]
pub fn find_at(data: &CharacterData, at: Point, tolerance: f64) -> Option<TokenRef> {
    let near = |x: f64, y: f64| (x - at.x).abs() < tolerance && (y - at.y).abs() < tolerance;
    if let Some(index) = data.characters.players.iter().position(|p| near(p.x, p.y)) {
        return Some(TokenRef { kind: TokenKind::Player, index });
    }
    data.characters
        .enemies
        .iter()
        .position(|e| near(e.x, e.y))
        .map(|index| TokenRef { kind: TokenKind::Enemy, index })
}

/// Move the referenced token. `false` when the reference is stale.
pub fn move_token(data: &mut CharacterData, token: TokenRef, to: Point) -> bool {
    let slot = match token.kind {
        TokenKind::Player => data.characters.players.get_mut(token.index).map(|p| (&mut p.x, &mut p.y)),
        TokenKind::Enemy => data.characters.enemies.get_mut(token.index).map(|e| (&mut e.x, &mut e.y)),
    };
    let Some((x, y)) = slot else {
        return false;
    };
    *x = to.x;
    *y = to.y;
    true
}

/// Remove the token under `at`, if any.
pub fn remove_at(data: &mut CharacterData, at: Point, tolerance: f64) -> Option<TokenRef> {
    let hit = find_at(data, at, tolerance)?;
    match hit.kind {
        TokenKind::Player => {
            data.characters.players.remove(hit.index);
        }
        TokenKind::Enemy => {
            data.characters.enemies.remove(hit.index);
        }
    }
    Some(hit)
}

/// Remove the most recently placed token of `kind`.
pub fn remove_last(data: &mut CharacterData, kind: TokenKind) -> bool {
    match kind {
        TokenKind::Player => data.characters.players.pop().is_some(),
        TokenKind::Enemy => {
            let removed = data.characters.enemies.pop().is_some();
            if removed {
                data.enemy_letter_counter = data.enemy_letter_counter.saturating_sub(1);
            }
            removed
        }
    }
}

pub fn remove_all(data: &mut CharacterData, kind: TokenKind) {
    match kind {
        TokenKind::Player => data.characters.players.clear(),
        TokenKind::Enemy => {
            data.characters.enemies.clear();
            data.enemy_letter_counter = 0;
        }
    }
}
