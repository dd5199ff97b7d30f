//! Answer-to-move rule.
//!
//! Before each move the participant translates a vocabulary word. A correct
//! answer lets the move through; a wrong one forfeits the turn. Once every
//! word has been answered correctly the gate stays open.

use derive_more::{Display, Error};
use derive_new::new;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, instrument};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// One prompt: a word and its accepted translations.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Challenge {
    /// Stable identifier within its pool.
    pub id: usize,
    /// Word to translate.
    pub word: String,
    /// Accepted answers.
    pub answers: Vec<String>,
}

impl Challenge {
    /// True if `answer` matches one of the accepted answers after
    /// [`normalize_answer`].
    pub fn accepts(&self, answer: &str) -> bool {
        let submitted = normalize_answer(answer);
        self.answers
            .iter()
            .any(|accepted| normalize_answer(accepted) == submitted)
    }
}

/// Challenge loading error.
#[derive(Debug, Clone, Display, Error)]
#[display("Challenge error: {} at {}:{}", message, file, line)]
pub struct ChallengeError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ChallengeError {
    /// Creates a new challenge error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VocabularyEntry {
    word: String,
    answers: Vec<String>,
    #[serde(default)]
    answered_correctly: bool,
}

/// Fixed set of challenges, in presentation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChallengePool {
    challenges: Vec<Challenge>,
    answered: BTreeSet<usize>,
}

impl ChallengePool {
    /// Creates a pool with nothing answered yet.
    pub fn new(challenges: Vec<Challenge>) -> Self {
        Self {
            challenges,
            answered: BTreeSet::new(),
        }
    }

    /// Parses a vocabulary list: `[{"word": ..., "answers": [...]}]`.
    /// Entries flagged `answeredCorrectly` start out answered.
    #[instrument(skip(json))]
    pub fn from_json(json: &str) -> Result<Self, ChallengeError> {
        let entries: Vec<VocabularyEntry> = serde_json::from_str(json)
            .map_err(|e| ChallengeError::new(format!("Failed to parse vocabulary: {}", e)))?;

        let mut pool = Self::default();
        for (id, entry) in entries.into_iter().enumerate() {
            if entry.word.trim().is_empty() {
                return Err(ChallengeError::new(format!("Entry {} has an empty word", id)));
            }
            if entry.answers.iter().all(|a| normalize_answer(a).is_empty()) {
                return Err(ChallengeError::new(format!(
                    "Entry {} ('{}') has no usable answer",
                    id, entry.word
                )));
            }
            if entry.answered_correctly {
                pool.answered.insert(id);
            }
            pool.challenges
                .push(Challenge::new(id, entry.word, entry.answers));
        }
        info!(
            challenges = pool.challenges.len(),
            answered = pool.answered.len(),
            "Vocabulary loaded"
        );
        Ok(pool)
    }

    /// Reads a vocabulary file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ChallengeError> {
        debug!("Loading vocabulary from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ChallengeError::new(format!("Failed to read vocabulary file: {}", e)))?;
        Self::from_json(&content)
    }

    /// Randomizes presentation order.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.challenges.shuffle(rng);
    }

    /// Challenges in presentation order.
    pub fn challenges(&self) -> &[Challenge] {
        &self.challenges
    }

    /// Number of challenges.
    pub fn len(&self) -> usize {
        self.challenges.len()
    }

    /// True if the pool has no challenges.
    pub fn is_empty(&self) -> bool {
        self.challenges.is_empty()
    }
}

/// Per-client progress through a pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChallengeState {
    /// Position of the next challenge to present.
    pub cursor: usize,
    /// Identifiers answered correctly so far.
    pub answered: BTreeSet<usize>,
}

/// Decision on a submitted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVerdict {
    /// Nothing left to ask; the move goes through.
    PassThrough,
    /// Correct answer; the move goes through.
    Accepted,
    /// Wrong answer; the turn is forfeited.
    Rejected,
}

/// Challenge-before-move rule for one client.
#[derive(Debug, Clone)]
pub struct TurnGate {
    pool: ChallengePool,
    state: ChallengeState,
}

impl TurnGate {
    /// Creates a gate over `pool`, carrying over pre-answered entries.
    pub fn new(pool: ChallengePool) -> Self {
        let state = ChallengeState {
            cursor: 0,
            answered: pool.answered.clone(),
        };
        Self { pool, state }
    }

    /// Progress so far.
    pub fn state(&self) -> &ChallengeState {
        &self.state
    }

    /// Challenge to present for the next move, or `None` once exhausted.
    pub fn pending(&self) -> Option<&Challenge> {
        self.pending_index().map(|index| &self.pool.challenges[index])
    }

    /// True when every challenge has been answered.
    pub fn is_exhausted(&self) -> bool {
        self.pending_index().is_none()
    }

    /// Judges `answer` against the pending challenge. Either way the cursor
    /// moves on, so a missed word comes back only after the others.
    #[instrument(skip(self))]
    pub fn check(&mut self, answer: &str) -> GateVerdict {
        let Some(index) = self.pending_index() else {
            debug!("Pool exhausted, gate open");
            return GateVerdict::PassThrough;
        };
        let challenge = &self.pool.challenges[index];
        self.state.cursor = index + 1;

        if challenge.accepts(answer) {
            info!(word = %challenge.word, "Challenge answered");
            self.state.answered.insert(challenge.id);
            GateVerdict::Accepted
        } else {
            info!(word = %challenge.word, "Challenge missed");
            GateVerdict::Rejected
        }
    }

    fn pending_index(&self) -> Option<usize> {
        let len = self.pool.challenges.len();
        (0..len)
            .map(|offset| (self.state.cursor + offset) % len)
            .find(|&index| {
                !self
                    .state
                    .answered
                    .contains(&self.pool.challenges[index].id)
            })
    }
}

/// Canonical form for comparing answers: trimmed, lowercased, with
/// diacritics removed. Punctuation is kept.
pub fn normalize_answer(raw: &str) -> String {
    raw.trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const VOCABULARY: &str = r#"[
        {"word": "Mexico", "answers": ["México"]},
        {"word": "dog", "answers": ["perro", "can"]},
        {"word": "cat", "answers": ["gato"], "answeredCorrectly": true}
    ]"#;

    #[test]
    fn test_answer_normalization() {
        let challenge = Challenge::new(0, "Mexico".to_string(), vec!["mexico".to_string()]);
        assert!(challenge.accepts("México"));
        assert!(challenge.accepts("mexico"));
        assert!(challenge.accepts(" Mexico "));
        assert!(!challenge.accepts("méxico!"));
    }

    #[test]
    fn test_pool_honours_answered_flag() {
        let gate = TurnGate::new(ChallengePool::from_json(VOCABULARY).unwrap());
        assert_eq!(gate.state().answered, BTreeSet::from([2]));
        assert_eq!(gate.pending().unwrap().word, "Mexico");
    }

    #[test]
    fn test_gate_cycles_until_exhausted() {
        let mut gate = TurnGate::new(ChallengePool::from_json(VOCABULARY).unwrap());

        assert_eq!(gate.check("mexico"), GateVerdict::Accepted);
        assert_eq!(gate.pending().unwrap().word, "dog");
        assert_eq!(gate.check("chien"), GateVerdict::Rejected);
        // Only "dog" is left, so it comes straight back.
        assert_eq!(gate.pending().unwrap().word, "dog");
        assert_eq!(gate.check("CAN"), GateVerdict::Accepted);

        assert!(gate.is_exhausted());
        assert_eq!(gate.pending(), None);
        assert_eq!(gate.check("anything"), GateVerdict::PassThrough);
    }

    #[test]
    fn test_empty_pool_is_open() {
        let mut gate = TurnGate::new(ChallengePool::default());
        assert!(gate.is_exhausted());
        assert_eq!(gate.check(""), GateVerdict::PassThrough);
    }

    #[test]
    fn test_invalid_vocabulary() {
        assert!(ChallengePool::from_json("{}").is_err());
        assert!(ChallengePool::from_json(r#"[{"word": "x", "answers": []}]"#).is_err());
        assert!(ChallengePool::from_json(r#"[{"word": " ", "answers": ["y"]}]"#).is_err());
    }

    #[test]
    fn test_shuffle_keeps_ids() {
        let mut pool = ChallengePool::from_json(VOCABULARY).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        pool.shuffle(&mut rng);
        let mut ids: Vec<usize> = pool.challenges().iter().map(|c| c.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1, 2]);
        let gate = TurnGate::new(pool);
        assert_ne!(gate.pending().unwrap().word, "cat");
    }
}
