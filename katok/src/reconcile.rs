//! Merging optimistic, fetched and pushed messages into one ordered list.
//!
//! Every entry is addressed by a stable [`LocalHandle`] rather than its
//! index, so swapping a temporary id for a permanent one never moves it.
//! Display order is the order in which the client learned about messages;
//! nothing is re-sorted by timestamp.

use std::fmt;

use crate::models::{Message, MessageId, MessageKey, TempId};

/// Stable local identity of a store entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalHandle(u64);

impl fmt::Display for LocalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What applying a message did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// A new entry was added.
    Inserted,
    /// A pending optimistic entry was replaced in place.
    Replaced,
    /// The message was already present.
    Duplicate,
}

impl Applied {
    pub fn changed(&self) -> bool {
        !matches!(self, Applied::Duplicate)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    handle: LocalHandle,
    message: Message,
}

/// Ordered, duplicate-free message list for one conversation.
#[derive(Debug, Default)]
pub struct MessageStore {
    entries: Vec<Entry>,
    next_handle: u64,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Messages in display order.
    pub fn messages(
        &self,
    ) -> impl DoubleEndedIterator<Item = &Message> + ExactSizeIterator + '_ {
        self.entries.iter().map(|e| &e.message)
    }

    /// Owned copy of the list in display order.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages().cloned().collect()
    }

    /// Look up an entry by handle.
    pub fn get(&self, handle: LocalHandle) -> Option<&Message> {
        self.index_of(handle).map(|i| &self.entries[i].message)
    }

    /// Current display position of an entry.
    pub fn index_of(&self, handle: LocalHandle) -> Option<usize> {
        self.entries.iter().position(|e| e.handle == handle)
    }

    /// Number of optimistic entries awaiting confirmation.
    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| e.message.is_pending()).count()
    }

    pub fn contains_id(&self, id: MessageId) -> bool {
        self.position_of_id(id).is_some()
    }

    /// Insert a locally authored message ahead of server confirmation.
    pub fn insert_optimistic(&mut self, content: impl Into<String>, is_auto_reply: bool) -> LocalHandle {
        let message = Message::optimistic(TempId::generate(), content, is_auto_reply);
        self.push_entry(message)
    }

    /// Record the server's confirmation of an optimistic send.
    pub fn confirm(&mut self, handle: LocalHandle, confirmed: Message) -> Applied {
        let Some(id) = confirmed.key.permanent() else {
            return Applied::Duplicate;
        };

        let index = self.index_of(handle);
        let holder = self.position_of_id(id);

        match (index, holder) {
            (Some(i), _) if holder == Some(i) => Applied::Duplicate,
            (Some(i), None) if self.entries[i].message.is_pending() => {
                self.entries[i].message = confirmed;
                Applied::Replaced
            }
            // Another entry already carries this id (delivered earlier); the
            // handle's entry stays pending until its own copy arrives.
            (_, Some(_)) => {
                log::debug!("Confirmation {} for {} already applied elsewhere", id, handle);
                Applied::Duplicate
            }
            _ => self.apply(confirmed),
        }
    }

    /// Remove an optimistic entry whose send failed.
    pub fn rollback(&mut self, handle: LocalHandle) -> Option<Message> {
        let index = self.index_of(handle)?;
        if !self.entries[index].message.is_pending() {
            return None;
        }
        Some(self.entries.remove(index).message)
    }

    /// Apply one message delivered by push or poll.
    pub fn apply(&mut self, message: Message) -> Applied {
        if let Some(id) = message.key.permanent() {
            if self.contains_id(id) {
                return Applied::Duplicate;
            }
        }

        if let Some(i) = self.find_pending_match(&message) {
            self.entries[i].message = message;
            return Applied::Replaced;
        }

        self.push_entry(message);
        Applied::Inserted
    }

    /// Merge a full-history fetch. Never removes entries.
    ///
    /// Messages unknown to the store are inserted right after the closest
    /// preceding history message already present, keeping causal order.
    /// Returns the number of entries inserted or replaced.
    pub fn merge_history(&mut self, history: Vec<Message>) -> usize {
        let mut cursor = 0;
        let mut changed = 0;

        for message in history {
            if let Some(id) = message.key.permanent() {
                if let Some(pos) = self.position_of_id(id) {
                    cursor = cursor.max(pos + 1);
                    continue;
                }
            }

            if let Some(i) = self.find_pending_match(&message) {
                self.entries[i].message = message;
                cursor = cursor.max(i + 1);
                changed += 1;
                continue;
            }

            let handle = self.next_handle();
            self.entries.insert(cursor, Entry { handle, message });
            cursor += 1;
            changed += 1;
        }

        changed
    }

    /// Drop everything, e.g. when the conversation closes.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn push_entry(&mut self, message: Message) -> LocalHandle {
        let handle = self.next_handle();
        self.entries.push(Entry { handle, message });
        handle
    }

    fn next_handle(&mut self) -> LocalHandle {
        let handle = LocalHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn position_of_id(&self, id: MessageId) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.message.key == MessageKey::Permanent(id))
    }

    /// Earliest pending entry with the same content and sender.
    fn find_pending_match(&self, message: &Message) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .find(|(_, e)| {
                e.message.is_pending()
                    && e.message.sender == message.sender
                    && e.message.content == message.content
            })
            .map(|(i, _)| i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessagePayload, RoomId, Sender, UserId};
    use pretty_assertions::assert_eq;

    const ME: UserId = UserId(1);
    const FRIEND: UserId = UserId(2);

    fn server(id: i64, sender: UserId, content: &str) -> Message {
        Message::from_payload(
            MessagePayload {
                id: MessageId(id),
                chat_room_id: RoomId(1),
                sender_id: sender,
                content: content.into(),
                created_at: Some("2025-03-01T10:00:00".into()),
                ..Default::default()
            },
            ME,
        )
    }

    fn contents(store: &MessageStore) -> Vec<String> {
        store.messages().map(|m| m.content.clone()).collect()
    }

    fn ids(store: &MessageStore) -> Vec<Option<i64>> {
        store
            .messages()
            .map(|m| m.key.permanent().map(|id| id.get()))
            .collect()
    }

    #[test]
    fn test_confirm_swaps_id_in_place() {
        let mut store = MessageStore::new();
        store.apply(server(1, FRIEND, "hi"));
        let h = store.insert_optimistic("hello", false);
        store.apply(server(2, FRIEND, "how are you"));

        assert_eq!(store.confirm(h, server(10, ME, "hello")), Applied::Replaced);
        assert_eq!(ids(&store), vec![Some(1), Some(10), Some(2)]);
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn test_sends_then_confirmations_yield_one_entry_each() {
        let mut store = MessageStore::new();
        let handles: Vec<_> = (0..5)
            .map(|i| store.insert_optimistic(format!("m{}", i), false))
            .collect();

        for (i, h) in handles.iter().enumerate() {
            store.confirm(*h, server(100 + i as i64, ME, &format!("m{}", i)));
        }
        // Push echoes arrive after confirmation.
        for i in 0..5 {
            assert_eq!(store.apply(server(100 + i, ME, &format!("m{}", i))), Applied::Duplicate);
        }

        assert_eq!(store.len(), 5);
        assert_eq!(ids(&store), (100i64..105).map(Some).collect::<Vec<_>>());
    }

    #[test]
    fn test_push_before_confirmation_replaces_in_place() {
        let mut store = MessageStore::new();
        store.apply(server(1, FRIEND, "a"));
        let h = store.insert_optimistic("same", false);
        store.apply(server(2, FRIEND, "b"));

        assert_eq!(store.apply(server(50, ME, "same")), Applied::Replaced);
        assert_eq!(store.index_of(h), Some(1));
        assert_eq!(store.confirm(h, server(50, ME, "same")), Applied::Duplicate);
        assert_eq!(ids(&store), vec![Some(1), Some(50), Some(2)]);
    }

    #[test]
    fn test_identical_pending_matched_earliest_first() {
        let mut store = MessageStore::new();
        let a = store.insert_optimistic("ㅋㅋ", false);
        let b = store.insert_optimistic("ㅋㅋ", false);

        store.apply(server(7, ME, "ㅋㅋ"));
        assert_eq!(store.get(a).and_then(|m| m.key.permanent()), Some(MessageId(7)));
        assert!(store.get(b).unwrap().is_pending());

        // b's confirmation arrives carrying 8.
        store.confirm(b, server(8, ME, "ㅋㅋ"));
        store.confirm(a, server(7, ME, "ㅋㅋ"));
        assert_eq!(ids(&store), vec![Some(7), Some(8)]);
    }

    #[test]
    fn test_counterpart_never_matches_optimistic() {
        let mut store = MessageStore::new();
        store.insert_optimistic("ok", false);
        assert_eq!(store.apply(server(3, FRIEND, "ok")), Applied::Inserted);
        assert_eq!(store.len(), 2);
        assert_eq!(store.messages().nth(1).map(|m| m.sender), Some(Sender::Other));
    }

    #[test]
    fn test_rollback_removes_entry() {
        let mut store = MessageStore::new();
        store.apply(server(1, FRIEND, "a"));
        let h = store.insert_optimistic("lost", false);

        assert!(store.rollback(h).is_some());
        assert_eq!(contents(&store), vec!["a"]);
        assert!(store.rollback(h).is_none());
    }

    #[test]
    fn test_rollback_keeps_confirmed_entry() {
        let mut store = MessageStore::new();
        let h = store.insert_optimistic("x", false);
        store.apply(server(5, ME, "x"));
        assert!(store.rollback(h).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_history_refetch_is_idempotent() {
        let mut store = MessageStore::new();
        let history = vec![server(1, FRIEND, "a"), server(2, ME, "b")];
        assert_eq!(store.merge_history(history.clone()), 2);
        assert_eq!(store.merge_history(history), 0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_late_history_never_shrinks() {
        let mut store = MessageStore::new();
        store.merge_history(vec![server(1, FRIEND, "a")]);
        for i in 2..5 {
            store.apply(server(i, FRIEND, &format!("push{}", i)));
        }

        // Stale snapshot taken before the pushes.
        store.merge_history(vec![server(1, FRIEND, "a")]);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_history_after_push_keeps_causal_order() {
        let mut store = MessageStore::new();
        // Push delivered 3 before the initial load completed.
        store.apply(server(3, FRIEND, "c"));
        store.merge_history(vec![
            server(1, FRIEND, "a"),
            server(2, ME, "b"),
            server(3, FRIEND, "c"),
        ]);
        assert_eq!(ids(&store), vec![Some(1), Some(2), Some(3)]);

        store.apply(server(5, FRIEND, "e"));
        store.merge_history(vec![
            server(1, FRIEND, "a"),
            server(2, ME, "b"),
            server(3, FRIEND, "c"),
            server(4, FRIEND, "d"),
            server(5, FRIEND, "e"),
        ]);
        assert_eq!(ids(&store), vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);
    }

    #[test]
    fn test_history_replaces_pending_in_place() {
        let mut store = MessageStore::new();
        store.merge_history(vec![server(1, FRIEND, "a")]);
        let h = store.insert_optimistic("mine", false);

        store.merge_history(vec![server(1, FRIEND, "a"), server(2, ME, "mine")]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(h).and_then(|m| m.key.permanent()), Some(MessageId(2)));
    }
}
