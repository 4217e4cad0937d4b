//! In-memory fakes shared by the unit tests of this crate.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use relaychat_types::error::{NotifyError, RepositoryError};
use relaychat_types::message::{Chat, ChatMessage, LinkPreview, NewMessage};

use crate::chat::preview::{LinkPreviewer, PreviewError};
use crate::chat::repository::ChatRepository;
use crate::notify::directory::RecipientDirectory;
use crate::notify::mailer::EmailSender;

pub fn message(id: i64, chat_id: i64, text: &str) -> ChatMessage {
    ChatMessage {
        id,
        chat_id,
        sender: "alice@example.com".to_string(),
        text: text.to_string(),
        created_at: Utc::now(),
    }
}

#[derive(Default)]
struct RepoState {
    chats: BTreeMap<i64, Chat>,
    messages: BTreeMap<i64, ChatMessage>,
    next_chat_id: i64,
    next_message_id: i64,
}

/// Cloneable in-memory `ChatRepository`. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryRepo {
    state: Arc<Mutex<RepoState>>,
    fail_writes: Arc<AtomicBool>,
    fail_deletes: Arc<AtomicBool>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn message_count(&self) -> usize {
        self.state.lock().unwrap().messages.len()
    }

    pub fn contains(&self, message_id: i64) -> bool {
        self.state.lock().unwrap().messages.contains_key(&message_id)
    }

    fn check_writes(&self) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(RepositoryError::Query("store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

impl ChatRepository for MemoryRepo {
    async fn create_chat(&self, members: &[String]) -> Result<Chat, RepositoryError> {
        self.check_writes()?;
        let mut state = self.state.lock().unwrap();
        state.next_chat_id += 1;
        let chat = Chat {
            id: state.next_chat_id,
            members: members.to_vec(),
            created_at: Utc::now(),
        };
        state.chats.insert(chat.id, chat.clone());
        Ok(chat)
    }

    async fn get_chat(&self, chat_id: i64) -> Result<Option<Chat>, RepositoryError> {
        Ok(self.state.lock().unwrap().chats.get(&chat_id).cloned())
    }

    async fn delete_chat(&self, chat_id: i64) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if state.chats.remove(&chat_id).is_none() {
            return Err(RepositoryError::NotFound);
        }
        state.messages.retain(|_, m| m.chat_id != chat_id);
        Ok(())
    }

    async fn append_message(&self, message: &NewMessage) -> Result<ChatMessage, RepositoryError> {
        self.check_writes()?;
        let mut state = self.state.lock().unwrap();
        let next = state
            .messages
            .keys()
            .next_back()
            .copied()
            .unwrap_or(0)
            .max(state.next_message_id)
            + 1;
        state.next_message_id = next;
        let stored = message.clone().with_id(next);
        state.messages.insert(next, stored.clone());
        Ok(stored)
    }

    async fn insert_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        self.check_writes()?;
        let mut state = self.state.lock().unwrap();
        if state.messages.contains_key(&message.id) {
            return Err(RepositoryError::Conflict(format!("message {} exists", message.id)));
        }
        state.messages.insert(message.id, message.clone());
        Ok(())
    }

    async fn get_message(&self, message_id: i64) -> Result<Option<ChatMessage>, RepositoryError> {
        Ok(self.state.lock().unwrap().messages.get(&message_id).cloned())
    }

    async fn delete_message(&self, message_id: i64) -> Result<(), RepositoryError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Connection);
        }
        self.state.lock().unwrap().messages.remove(&message_id);
        Ok(())
    }

    async fn history(&self, chat_id: i64) -> Result<Vec<ChatMessage>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .messages
            .values()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect())
    }
}

/// Email sender that records deliveries and fails for chosen recipients.
///
/// A recipient registered with `fail_times(addr, n)` fails its first `n`
/// attempts and then succeeds; `always_fail(addr)` never succeeds.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<(String, String, String)>>>,
    attempts: Arc<Mutex<Vec<String>>>,
    failures: Arc<Mutex<HashMap<String, u32>>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn always_fail(&self, recipient: &str) {
        self.fail_times(recipient, u32::MAX);
    }

    pub fn fail_times(&self, recipient: &str, times: u32) {
        self.failures
            .lock()
            .unwrap()
            .insert(recipient.to_string(), times);
    }

    /// Recipients successfully emailed, in order.
    pub fn recipients(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(to, _, _)| to.clone())
            .collect()
    }

    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Every attempted recipient, including failed attempts.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

impl EmailSender for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.attempts.lock().unwrap().push(to.to_string());
        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(to) {
                if *remaining > 0 {
                    if *remaining != u32::MAX {
                        *remaining -= 1;
                    }
                    return Err(NotifyError::Delivery {
                        recipient: to.to_string(),
                        reason: "mailbox unavailable".to_string(),
                    });
                }
            }
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

/// Recipient directory backed by a fixed map.
#[derive(Clone, Default)]
pub struct StaticDirectory {
    recipients: Arc<Mutex<HashMap<i64, Vec<String>>>>,
    failing: Arc<AtomicBool>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chat(self, chat_id: i64, recipients: &[&str]) -> Self {
        self.recipients
            .lock()
            .unwrap()
            .insert(chat_id, recipients.iter().map(|r| r.to_string()).collect());
        self
    }

    pub fn fail(&self, fail: bool) {
        self.failing.store(fail, Ordering::SeqCst);
    }
}

impl RecipientDirectory for StaticDirectory {
    async fn recipients(&self, chat_id: i64) -> Result<Vec<String>, NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Directory("directory unavailable".to_string()));
        }
        Ok(self
            .recipients
            .lock()
            .unwrap()
            .get(&chat_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Previewer returning a fixed result.
pub struct StaticPreviewer(pub Result<Option<LinkPreview>, String>);

impl LinkPreviewer for StaticPreviewer {
    async fn preview(&self, _url: &str) -> Result<Option<LinkPreview>, PreviewError> {
        self.0.clone().map_err(PreviewError::Fetch)
    }
}
