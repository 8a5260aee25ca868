//! Dative inflection of Russian names.
//!
//! Certificates address the recipient in dative case ("выдан Марии
//! Ивановой"). Forms collect names in nominative, so each name fragment is
//! run through a suffix heuristic and the result is cached in SQLite. The
//! cache doubles as a review queue: automatic guesses land unconfirmed, and
//! the operator can audit and fix them before they reach a certificate.

use tracing::{debug, warn};

use crate::db::Database;
use crate::error::Result;
use crate::models::Inflection;

const VOWELS: [char; 10] = ['а', 'е', 'ё', 'и', 'о', 'у', 'ы', 'э', 'ю', 'я'];

/// Guess the dative form of one name fragment.
///
/// Returns `None` when the fragment is not a Cyrillic word, meaning the
/// heuristic has nothing sensible to say and the base form should be used.
#[must_use]
pub fn guess_dative(fragment: &str) -> Option<String> {
    if fragment.is_empty() || !fragment.chars().all(|c| is_cyrillic(c) || c == '-') {
        return None;
    }
    // Hyphenated double names inflect each part: "Анна-Мария" -> "Анне-Марии".
    if fragment.contains('-') {
        let parts: Option<Vec<String>> = fragment.split('-').map(guess_dative).collect();
        return parts.map(|parts| parts.join("-"));
    }

    if let Some(stem) = fragment.strip_suffix("ия") {
        return Some(format!("{stem}ии"));
    }
    if let Some(stem) = fragment.strip_suffix('а') {
        // Surnames in -ова, -ева, -ёва take -ой, given names in -а take -е.
        for feminine_surname in ["ов", "ев", "ёв", "ин", "ын"] {
            if stem.ends_with(feminine_surname) {
                return Some(format!("{stem}ой"));
            }
        }
        return Some(format!("{stem}е"));
    }
    if let Some(stem) = fragment.strip_suffix('я') {
        return Some(format!("{stem}е"));
    }
    if let Some(stem) = fragment.strip_suffix('й') {
        return Some(format!("{stem}ю"));
    }
    if let Some(stem) = fragment.strip_suffix('ь') {
        return Some(format!("{stem}ю"));
    }
    let last = fragment.chars().last()?;
    if VOWELS.contains(&last) {
        // Indeclinable endings like -о or -и stay as they are.
        return Some(fragment.to_string());
    }
    Some(format!("{fragment}у"))
}

fn is_cyrillic(c: char) -> bool {
    ('\u{0400}'..='\u{04FF}').contains(&c)
}

/// Cache-backed inflector.
pub struct NameInflector<'a> {
    db: &'a Database,
}

impl<'a> NameInflector<'a> {
    #[must_use]
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Inflect every whitespace-separated fragment of a full name.
    ///
    /// Cache hits are used as-is, including operator corrections. Misses
    /// are guessed, cached unconfirmed, and used.
    pub fn dative_full_name(&self, full_name: &str) -> Result<String> {
        let dative: Vec<String> = full_name
            .split_whitespace()
            .map(|fragment| self.dative_fragment(fragment))
            .collect::<Result<_>>()?;
        Ok(dative.join(" "))
    }

    fn dative_fragment(&self, fragment: &str) -> Result<String> {
        Ok(self.get_dative(fragment)?.dative_or_base().to_string())
    }

    /// Cached inflection for one fragment, guessing and caching on a miss.
    pub fn get_dative(&self, base: &str) -> Result<Inflection> {
        if let Some(cached) = self.db.get_inflection(base)? {
            return Ok(cached);
        }
        let guess = guess_dative(base);
        if guess.is_none() {
            warn!(base, "cannot inflect name fragment, keeping base form");
        }
        let inflection = Inflection { base: base.to_string(), dative: guess, is_confirmed: false };
        self.db.upsert_inflection(&inflection)?;
        debug!(base, dative = inflection.dative_or_base(), "cached inflection guess");
        Ok(inflection)
    }

    /// Record an operator-supplied dative form as confirmed. `None` marks
    /// the fragment as known-unresolvable, so the base form is used and the
    /// guesser never revisits it.
    pub fn set_confirmed(&self, base: &str, dative: Option<&str>) -> Result<()> {
        self.db.upsert_inflection(&Inflection {
            base: base.to_string(),
            dative: dative.map(ToString::to_string),
            is_confirmed: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn assert_guess(base: &str, expected: &str) {
        assert_eq!(guess_dative(base).as_deref(), Some(expected), "base {base:?}");
    }

    #[test]
    fn guesses_common_given_names() {
        assert_guess("Мария", "Марии");
        assert_guess("Ольга", "Ольге");
        assert_guess("Катя", "Кате");
        assert_guess("Иван", "Ивану");
        assert_guess("Сергей", "Сергею");
        assert_guess("Дмитрий", "Дмитрию");
        assert_guess("Игорь", "Игорю");
    }

    #[test]
    fn guesses_surnames() {
        assert_guess("Иванова", "Ивановой");
        assert_guess("Пушкина", "Пушкиной");
        assert_guess("Петров", "Петрову");
    }

    #[test]
    fn guesses_patronymics() {
        assert_guess("Петровна", "Петровне");
        assert_guess("Сергеевич", "Сергеевичу");
    }

    #[test]
    fn indeclinable_names_stay_put() {
        assert_guess("Шевченко", "Шевченко");
    }

    #[test]
    fn hyphenated_names_inflect_both_parts() {
        assert_guess("Анна-Мария", "Анне-Марии");
    }

    #[test]
    fn non_cyrillic_is_not_guessed() {
        assert_eq!(guess_dative("Maria"), None);
        assert_eq!(guess_dative(""), None);
    }

    #[test]
    fn inflector_caches_guesses_unconfirmed() {
        let db = Database::open_in_memory().unwrap();
        let inflector = NameInflector::new(&db);
        assert_eq!(inflector.dative_full_name("Иванова Мария").unwrap(), "Ивановой Марии");
        let cached = db.get_inflection("Мария").unwrap().unwrap();
        assert_eq!(cached.dative.as_deref(), Some("Марии"));
        assert!(!cached.is_confirmed);
    }

    #[test]
    fn inflector_prefers_cached_corrections() {
        let db = Database::open_in_memory().unwrap();
        let inflector = NameInflector::new(&db);
        inflector.set_confirmed("Любовь", Some("Любови")).unwrap();
        assert_eq!(inflector.dative_full_name("Любовь").unwrap(), "Любови");
    }

    #[test]
    fn known_unresolvable_fragment_is_confirmed_with_base() {
        let db = Database::open_in_memory().unwrap();
        let inflector = NameInflector::new(&db);
        inflector.set_confirmed("Дюма", None).unwrap();
        assert_eq!(inflector.dative_full_name("Дюма").unwrap(), "Дюма");
        assert!(db.get_inflection("Дюма").unwrap().unwrap().is_confirmed);
    }

    #[test]
    fn uninflectable_fragment_keeps_base() {
        let db = Database::open_in_memory().unwrap();
        let inflector = NameInflector::new(&db);
        assert_eq!(inflector.dative_full_name("Maria Smith").unwrap(), "Maria Smith");
        let cached = db.get_inflection("Maria").unwrap().unwrap();
        assert_eq!(cached.dative, None);
    }
}
