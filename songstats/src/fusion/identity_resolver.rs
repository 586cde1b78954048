//! Identity Resolver
//!
//! Matches a free-text (artist, title) query to one of a source's search
//! candidates, or declines to.
//!
//! # Scoring
//! Both sides are normalized (see [`normalize`](super::normalize::normalize)),
//! then scored by the first rule that applies:
//!
//! | Rule                                                   | Score |
//! |--------------------------------------------------------|-------|
//! | title and artist equal                                 | 1.0   |
//! | artist equal, one title contains the other (by token)  | 0.8   |
//! | otherwise `0.7 × (0.6 × title_overlap + 0.4 × artist_overlap)` | 0.0–0.7 |
//!
//! Token overlap counts query tokens matched by a distinct candidate token
//! (equal, or normalized Levenshtein ≥ 0.9) over the larger token count.
//!
//! # Selection
//! The best score wins, ties in score broken by provider rank. The result is
//! withheld as ambiguous when the best score is below the confidence
//! threshold. Candidates scoring within `tie_epsilon` of the best are tied:
//! under `Reject` a tie with a different external id is ambiguous, under
//! `ProviderRank` the tied candidate the provider ranked first wins.
//! Search endpoints routinely return covers, remixes and same-title songs by
//! other artists; a withheld match keeps those out of the table.

use super::normalize::{contains_tokens, normalize, tokens};
use crate::types::{CandidateMatch, CanonicalIdentity, SongQuery, Source};
use songstats_common::config::{ResolverConfig, TieBreak};
use std::cmp::Ordering;
use tracing::debug;

/// Score of an exact normalized match
pub const EXACT_MATCH_SCORE: f64 = 1.0;
/// Score of a title-containment match with equal artists
pub const TITLE_CONTAINS_SCORE: f64 = 0.8;
/// Ceiling of the token-overlap rule
pub const TOKEN_OVERLAP_MAX: f64 = 0.7;

const TITLE_WEIGHT: f64 = 0.6;
const ARTIST_WEIGHT: f64 = 0.4;
const TOKEN_SIMILARITY: f64 = 0.9;

/// Resolution policy for one source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverPolicy {
    /// Scores below this are withheld (0.0-1.0)
    pub confidence_threshold: f64,
    /// Distinct candidates within this distance of the best score tie
    pub tie_epsilon: f64,
    pub tie_break: TieBreak,
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            tie_epsilon: 0.02,
            tie_break: TieBreak::Reject,
        }
    }
}

impl ResolverPolicy {
    pub fn from_config(config: &ResolverConfig, tie_break: TieBreak) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold.clamp(0.0, 1.0),
            tie_epsilon: config.tie_epsilon.clamp(0.0, 1.0),
            tie_break,
        }
    }
}

/// Why a resolution was withheld
#[derive(Debug, Clone, PartialEq)]
pub enum AmbiguityReason {
    /// Best score under the confidence threshold
    BelowThreshold,
    /// Another distinct candidate scored alike
    Tie { runner_up: String },
}

/// Resolver output
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Confident, unique match
    Matched(CanonicalIdentity),
    /// Source returned no candidates
    NoMatch,
    /// Candidates exist but none can be chosen safely
    Ambiguous {
        best: CanonicalIdentity,
        reason: AmbiguityReason,
    },
}

/// Identity Resolver
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    policy: ResolverPolicy,
}

impl IdentityResolver {
    pub fn new(policy: ResolverPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ResolverPolicy {
        &self.policy
    }

    /// Resolve `query` against `candidates` returned by `source`
    pub fn resolve(
        &self,
        source: Source,
        query: &SongQuery,
        candidates: &[CandidateMatch],
    ) -> Resolution {
        if candidates.is_empty() {
            return Resolution::NoMatch;
        }

        let query_title = normalize(&query.title);
        let query_artist = normalize(&query.artist);

        let mut scored: Vec<(f64, &CandidateMatch)> = candidates
            .iter()
            .map(|c| {
                let score = score_normalized(
                    &query_title,
                    &query_artist,
                    &normalize(&c.title),
                    &normalize(&c.artist),
                );
                (score, c)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then(a.1.provider_rank.cmp(&b.1.provider_rank))
        });

        let (best_score, best) = scored[0];
        let identity_of = |score: f64, c: &CandidateMatch| CanonicalIdentity {
            source,
            external_id: c.external_id.clone(),
            match_confidence: score,
            matched_title: c.title.clone(),
            matched_artist: c.artist.clone(),
        };

        debug!(
            source = %source,
            row = query.row_index,
            candidates = candidates.len(),
            best_id = %best.external_id,
            best_score,
            "Scored candidates"
        );

        if best_score < self.policy.confidence_threshold {
            return Resolution::Ambiguous {
                best: identity_of(best_score, best),
                reason: AmbiguityReason::BelowThreshold,
            };
        }

        let within_epsilon =
            |score: f64| best_score - score <= self.policy.tie_epsilon + f64::EPSILON;

        match self.policy.tie_break {
            TieBreak::Reject => {
                let tie = scored
                    .iter()
                    .skip(1)
                    .find(|(score, c)| c.external_id != best.external_id && within_epsilon(*score));
                if let Some((_, runner_up)) = tie {
                    return Resolution::Ambiguous {
                        best: identity_of(best_score, best),
                        reason: AmbiguityReason::Tie {
                            runner_up: runner_up.external_id.clone(),
                        },
                    };
                }
                Resolution::Matched(identity_of(best_score, best))
            }
            TieBreak::ProviderRank => {
                // Best-ranked candidate among those tied with the top score
                let (score, chosen) = scored
                    .iter()
                    .filter(|(score, _)| {
                        within_epsilon(*score) && *score >= self.policy.confidence_threshold
                    })
                    .min_by_key(|(_, c)| c.provider_rank)
                    .copied()
                    .unwrap_or((best_score, best));
                Resolution::Matched(identity_of(score, chosen))
            }
        }
    }
}

/// Score a candidate against a query (raw strings)
pub fn match_score(query_title: &str, query_artist: &str, title: &str, artist: &str) -> f64 {
    score_normalized(
        &normalize(query_title),
        &normalize(query_artist),
        &normalize(title),
        &normalize(artist),
    )
}

fn score_normalized(query_title: &str, query_artist: &str, title: &str, artist: &str) -> f64 {
    if query_title.is_empty() || title.is_empty() {
        return 0.0;
    }

    if query_title == title && query_artist == artist {
        return EXACT_MATCH_SCORE;
    }

    if query_artist == artist
        && (contains_tokens(title, query_title) || contains_tokens(query_title, title))
    {
        return TITLE_CONTAINS_SCORE;
    }

    TOKEN_OVERLAP_MAX
        * (TITLE_WEIGHT * token_overlap(query_title, title)
            + ARTIST_WEIGHT * token_overlap(query_artist, artist))
}

/// Share of tokens matched between two normalized strings (0.0-1.0)
fn token_overlap(a: &str, b: &str) -> f64 {
    let a_tokens = tokens(a);
    let b_tokens = tokens(b);
    if a_tokens.is_empty() || b_tokens.is_empty() {
        return 0.0;
    }

    let mut used = vec![false; b_tokens.len()];
    let mut matched = 0usize;
    for token in &a_tokens {
        let hit = b_tokens
            .iter()
            .enumerate()
            .find(|(i, other)| !used[*i] && tokens_match(token, other))
            .map(|(i, _)| i);
        if let Some(i) = hit {
            used[i] = true;
            matched += 1;
        }
    }

    matched as f64 / a_tokens.len().max(b_tokens.len()) as f64
}

fn tokens_match(a: &str, b: &str) -> bool {
    a == b || strsim::normalized_levenshtein(a, b) >= TOKEN_SIMILARITY
}

// ============================================================================
// Tests
// ============================================================================
