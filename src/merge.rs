//! Deduplication and ordering of a room transcript.
//!
//! Messages are identified by `author::ts::text`. A [`Transcript`] keeps one
//! entry per key, sorted by `ts` (stable, so equal timestamps keep arrival
//! order), and tracks the polling cursor separately from what is displayed:
//! only server-delivered pages move the cursor, so locally stamped optimistic
//! entries can never make the next poll skip someone else's message.

use std::collections::HashSet;
use std::time::Duration;

use uuid::Uuid;

use crate::model::Message;

pub const DEFAULT_RECONCILE_WINDOW: Duration = Duration::from_secs(3);

pub fn dedup_key(message: &Message) -> String {
    format!("{}::{}::{}", message.author, message.ts, message.text)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub message: Message,
    /// Inserted locally and not yet confirmed by the server.
    pub optimistic: bool,
}

#[derive(Debug, Clone)]
pub struct Transcript {
    entries: Vec<Entry>,
    keys: HashSet<String>,
    cursor: i64,
    window_ms: i64,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(DEFAULT_RECONCILE_WINDOW)
    }
}

impl Transcript {
    pub fn new(reconcile_window: Duration) -> Self {
        Self {
            entries: Vec::new(),
            keys: HashSet::new(),
            cursor: 0,
            window_ms: reconcile_window.as_millis() as i64,
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|e| &e.message)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest `ts` the server has delivered. Never decreases until [`Transcript::clear`].
    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.keys.clear();
        self.cursor = 0;
    }

    /// Throw away local state and adopt `history` wholesale, as on join.
    pub fn replace(&mut self, history: Vec<Message>) {
        self.clear();
        self.merge_page(history);
    }

    /// Merge a page of server-confirmed messages. Returns how many were new.
    pub fn merge_page(&mut self, page: Vec<Message>) -> usize {
        let mut added = 0;
        for message in page {
            self.cursor = self.cursor.max(message.ts);
            if self.insert_confirmed(message) {
                added += 1;
            }
        }
        self.sort();
        added
    }

    /// Show a message before the server has acknowledged it.
    pub fn push_optimistic(&mut self, message: Message) {
        if !self.keys.insert(dedup_key(&message)) {
            return;
        }
        self.entries.push(Entry {
            message,
            optimistic: true,
        });
        self.sort();
    }

    /// Swap the optimistic entry for `local` with the server's copy.
    ///
    /// The cursor is left alone: messages from other writers with a smaller
    /// `ts` may still be waiting for the next poll.
    pub fn confirm(&mut self, local: &Message, confirmed: Message) {
        if let Some(index) = self.entries.iter().position(|e| e.optimistic && e.message == *local) {
            let entry = self.entries.remove(index);
            self.keys.remove(&dedup_key(&entry.message));
        }
        self.insert_confirmed(confirmed);
        self.sort();
    }

    /// Insert a server message, dropping any optimistic stand-in for it.
    fn insert_confirmed(&mut self, message: Message) -> bool {
        if let Some(index) = self.find_optimistic(&message) {
            let stale = self.entries.remove(index);
            self.keys.remove(&dedup_key(&stale.message));
        }
        if !self.keys.insert(dedup_key(&message)) {
            return false;
        }
        self.entries.push(Entry {
            message,
            optimistic: false,
        });
        true
    }

    fn find_optimistic(&self, confirmed: &Message) -> Option<usize> {
        if let Some(client_id) = confirmed.client_id {
            let by_token = self
                .entries
                .iter()
                .position(|e| e.optimistic && e.message.client_id == Some(client_id));
            if by_token.is_some() {
                return by_token;
            }
        }
        self.entries.iter().position(|e| {
            e.optimistic
                && e.message.author == confirmed.author
                && e.message.text == confirmed.text
                && (e.message.ts - confirmed.ts).abs() <= self.window_ms
                && tokens_compatible(e.message.client_id, confirmed.client_id)
        })
    }

    fn sort(&mut self) {
        self.entries.sort_by_key(|e| e.message.ts);
    }
}

fn tokens_compatible(local: Option<Uuid>, confirmed: Option<Uuid>) -> bool {
    match (local, confirmed) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(author: &str, text: &str, ts: i64) -> Message {
        Message {
            author: author.into(),
            text: text.into(),
            ts,
            client_id: None,
        }
    }

    fn texts(transcript: &Transcript) -> Vec<&str> {
        transcript.messages().map(|m| m.text.as_str()).collect()
    }

    #[test]
    fn key_combines_author_ts_and_text() {
        assert_eq!(dedup_key(&msg("Alice", "Bonjour", 42)), "Alice::42::Bonjour");
    }

    #[test]
    fn merging_twice_keeps_one_copy() {
        let mut transcript = Transcript::default();
        assert_eq!(transcript.merge_page(vec![msg("Alice", "Bonjour", 10)]), 1);
        assert_eq!(transcript.merge_page(vec![msg("Alice", "Bonjour", 10)]), 0);
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn out_of_order_delivery_is_sorted() {
        let mut transcript = Transcript::default();
        transcript.merge_page(vec![msg("A", "third", 30), msg("B", "first", 10)]);
        transcript.merge_page(vec![msg("A", "second", 20)]);
        assert_eq!(texts(&transcript), ["first", "second", "third"]);
        assert_eq!(transcript.cursor(), 30);
    }

    #[test]
    fn equal_timestamps_keep_arrival_order() {
        let mut transcript = Transcript::default();
        transcript.merge_page(vec![msg("A", "one", 5), msg("B", "two", 5), msg("C", "three", 5)]);
        assert_eq!(texts(&transcript), ["one", "two", "three"]);
    }

    #[test]
    fn cursor_never_moves_back() {
        let mut transcript = Transcript::default();
        transcript.merge_page(vec![msg("A", "late", 50)]);
        transcript.merge_page(vec![msg("B", "early", 20)]);
        assert_eq!(transcript.cursor(), 50);
    }

    #[test]
    fn replace_discards_previous_history() {
        let mut transcript = Transcript::default();
        transcript.merge_page(vec![msg("A", "old", 99)]);
        transcript.push_optimistic(msg("A", "pending", 120));
        transcript.replace(vec![msg("B", "fresh", 10)]);
        assert_eq!(texts(&transcript), ["fresh"]);
        assert_eq!(transcript.cursor(), 10);
    }

    #[test]
    fn optimistic_entries_do_not_move_the_cursor() {
        let mut transcript = Transcript::default();
        transcript.merge_page(vec![msg("A", "hi", 10)]);
        transcript.push_optimistic(msg("B", "yo", 1_000));
        assert_eq!(transcript.cursor(), 10);
        assert!(transcript.entries().last().unwrap().optimistic);
    }

    #[test]
    fn confirmation_replaces_the_optimistic_copy() {
        let mut transcript = Transcript::default();
        let local = msg("Alice", "Salut", 1_000);
        transcript.push_optimistic(local.clone());
        transcript.confirm(&local, msg("Alice", "Salut", 1_250));

        assert_eq!(transcript.len(), 1);
        let entry = &transcript.entries()[0];
        assert!(!entry.optimistic);
        assert_eq!(entry.message.ts, 1_250);
        assert_eq!(transcript.cursor(), 0);
    }

    #[test]
    fn poll_echo_before_post_response_does_not_duplicate() {
        let mut transcript = Transcript::default();
        let local = msg("Alice", "Salut", 1_000);
        transcript.push_optimistic(local.clone());

        transcript.merge_page(vec![msg("Alice", "Salut", 1_900)]);
        assert_eq!(transcript.len(), 1);

        transcript.confirm(&local, msg("Alice", "Salut", 1_900));
        assert_eq!(transcript.len(), 1);
        assert!(!transcript.entries()[0].optimistic);
    }

    #[test]
    fn echo_outside_the_window_is_a_separate_message() {
        let mut transcript = Transcript::default();
        transcript.push_optimistic(msg("Alice", "again", 1_000));
        transcript.merge_page(vec![msg("Alice", "again", 10_000)]);
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn client_token_picks_the_right_optimistic_entry() {
        let mut transcript = Transcript::default();
        let first = Uuid::now_v7();
        let second = Uuid::now_v7();
        let mut a = msg("Alice", "ok", 1_000);
        a.client_id = Some(first);
        let mut b = msg("Alice", "ok", 1_001);
        b.client_id = Some(second);
        transcript.push_optimistic(a);
        transcript.push_optimistic(b);

        let mut echo = msg("Alice", "ok", 1_500);
        echo.client_id = Some(second);
        transcript.merge_page(vec![echo]);

        let pending: Vec<_> = transcript
            .entries()
            .iter()
            .filter(|e| e.optimistic)
            .map(|e| e.message.client_id)
            .collect();
        assert_eq!(pending, vec![Some(first)]);
        assert_eq!(transcript.len(), 2);
    }
}
