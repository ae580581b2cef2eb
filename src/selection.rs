//! Reviewer candidate selection.
//!
//! The store filters candidates; the random draw happens here so that the
//! choice is uniform regardless of the engine's `RANDOM()` behaviour.

use crate::models::{User, MAX_REVIEWERS};
use rand::seq::SliceRandom;
use rand::Rng;

/// Whether `candidate` may review a pull request written by `author`.
pub fn is_eligible(candidate: &User, author: &User) -> bool {
    candidate.team_id == author.team_id && candidate.is_active && candidate.id != author.id
}

/// Ids of every member of `team` eligible to review for `author`.
pub fn eligible_ids(author: &User, team: &[User]) -> Vec<String> {
    team.iter()
        .filter(|c| is_eligible(c, author))
        .map(|c| c.id.clone())
        .collect()
}

/// Choose up to [`MAX_REVIEWERS`] ids uniformly at random without replacement.
pub fn pick_reviewers(candidate_ids: &[String]) -> Vec<String> {
    pick_reviewers_with(&mut rand::thread_rng(), candidate_ids)
}

pub fn pick_reviewers_with<R: Rng + ?Sized>(rng: &mut R, candidate_ids: &[String]) -> Vec<String> {
    candidate_ids
        .choose_multiple(rng, MAX_REVIEWERS)
        .cloned()
        .collect()
}

/// Choose a single id uniformly at random.
pub fn pick_one(candidate_ids: &[String]) -> Option<String> {
    pick_one_with(&mut rand::thread_rng(), candidate_ids)
}

pub fn pick_one_with<R: Rng + ?Sized>(rng: &mut R, candidate_ids: &[String]) -> Option<String> {
    candidate_ids.choose(rng).cloned()
}
