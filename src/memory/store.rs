//! 会话存储：每个会话一个 JSON 文件
//!
//! 文件名由会话 ID 清洗得到（非字母数字及 `_-.` 的字符替换为 `_`），保证是平铺的安全文件名。
//! 写入走「临时文件 + rename」保证原子性；读取或解码失败一律视为不存在，不向调用方抛错。
//! append_message / update_metadata 是读-改-写，同一会话只能有一个写者（约定，不加锁）。

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::StoreError;
use crate::memory::{Message, Role};

/// 会话元数据（user_intent、turn_count 等，键值开放）
pub type Metadata = Map<String, Value>;

/// 持久化的单条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl StoredMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    /// 还原为内存消息；只接受 user / assistant
    pub fn to_message(&self) -> Option<Message> {
        let msg = match self.role {
            Role::User => Message::user(self.content.clone()),
            Role::Assistant => Message::assistant(self.content.clone()),
            Role::System | Role::Tool => return None,
        };
        Some(msg.with_timestamp(self.timestamp))
    }
}

impl From<&Message> for StoredMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role,
            content: msg.text(),
            timestamp: msg.timestamp,
            metadata: None,
        }
    }
}

/// 一个会话的完整持久化记录
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub conversation_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
    #[serde(default)]
    pub metadata: Metadata,
}

/// list() 返回的会话摘要
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

/// 基于文件的会话存储
#[derive(Debug, Clone)]
pub struct ConversationStore {
    storage_dir: PathBuf,
}

impl ConversationStore {
    /// 目录不存在时尝试创建；失败只记日志，首次写入时会再次创建并返回错误
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        let storage_dir = storage_dir.into();
        if let Err(e) = std::fs::create_dir_all(&storage_dir) {
            tracing::warn!(dir = %storage_dir.display(), error = %e, "failed to create storage dir");
        }
        Self { storage_dir }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    fn conversation_path(&self, conversation_id: &str) -> PathBuf {
        self.storage_dir
            .join(format!("{}.json", sanitize_conversation_id(conversation_id)))
    }

    /// 覆盖写入；保留已有记录的 created_at，刷新 updated_at
    pub fn save(
        &self,
        conversation_id: &str,
        messages: &[StoredMessage],
        metadata: &Metadata,
    ) -> Result<(), StoreError> {
        let path = self.conversation_path(conversation_id);
        let now = Utc::now();
        let created_at = read_record(&path).map(|r| r.created_at).unwrap_or(now);

        let record = ConversationRecord {
            conversation_id: conversation_id.to_string(),
            created_at,
            updated_at: now,
            messages: messages.to_vec(),
            metadata: metadata.clone(),
        };
        let data = serde_json::to_vec_pretty(&record).map_err(|source| StoreError::Encode {
            id: conversation_id.to_string(),
            source,
        })?;
        self.write_atomic(&path, &data)
            .map_err(|source| StoreError::Write {
                id: conversation_id.to_string(),
                source,
            })?;

        tracing::debug!(
            conversation_id = %conversation_id,
            message_count = messages.len(),
            "conversation saved"
        );
        Ok(())
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.storage_dir)?;
        let mut temp_file = tempfile::Builder::new()
            .prefix(".conversation")
            .suffix(".tmp")
            .tempfile_in(&self.storage_dir)?;
        temp_file.write_all(contents)?;
        temp_file.as_file_mut().sync_all()?;
        temp_file.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// 读取记录；文件缺失、读取或解码失败都返回 None
    pub fn load(&self, conversation_id: &str) -> Option<ConversationRecord> {
        let record = read_record(&self.conversation_path(conversation_id))?;
        tracing::debug!(conversation_id = %conversation_id, "conversation loaded");
        Some(record)
    }

    pub fn get_messages(&self, conversation_id: &str) -> Vec<StoredMessage> {
        self.load(conversation_id)
            .map(|r| r.messages)
            .unwrap_or_default()
    }

    /// 追加一条消息（读-改-写），保留现有元数据
    pub fn append_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
        metadata: Option<Metadata>,
    ) -> Result<(), StoreError> {
        let (mut messages, conv_metadata) = match self.load(conversation_id) {
            Some(r) => (r.messages, r.metadata),
            None => (Vec::new(), Metadata::new()),
        };
        let mut message = StoredMessage::new(role, content);
        message.metadata = metadata.filter(|m| !m.is_empty());
        messages.push(message);
        self.save(conversation_id, &messages, &conv_metadata)
    }

    /// 合并元数据（同名键覆盖，其余保留）；记录不存在时以空消息列表创建
    pub fn update_metadata(&self, conversation_id: &str, partial: Metadata) -> Result<(), StoreError> {
        match self.load(conversation_id) {
            Some(existing) => {
                let mut metadata = existing.metadata;
                metadata.extend(partial);
                self.save(conversation_id, &existing.messages, &metadata)
            }
            None => self.save(conversation_id, &[], &partial),
        }
    }

    /// 记录存在且删除成功时返回 true
    pub fn delete(&self, conversation_id: &str) -> bool {
        let path = self.conversation_path(conversation_id);
        if !path.exists() {
            return false;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(conversation_id = %conversation_id, "conversation deleted");
                true
            }
            Err(e) => {
                tracing::warn!(conversation_id = %conversation_id, error = %e, "failed to delete conversation");
                false
            }
        }
    }

    /// 所有会话摘要，按 updated_at 倒序；无法解析的文件跳过
    pub fn list(&self) -> Vec<ConversationSummary> {
        let mut conversations: Vec<ConversationSummary> = self
            .record_paths()
            .iter()
            .filter_map(|p| read_record(p))
            .map(|r| ConversationSummary {
                conversation_id: r.conversation_id,
                created_at: r.created_at,
                updated_at: r.updated_at,
                message_count: r.messages.len(),
            })
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        conversations
    }

    /// 删除全部会话文件，返回删除数量
    pub fn clear_all(&self) -> usize {
        let count = self
            .record_paths()
            .iter()
            .filter(|p| std::fs::remove_file(p).is_ok())
            .count();
        tracing::info!(count, "all conversations cleared");
        count
    }

    fn record_paths(&self) -> Vec<PathBuf> {
        let pattern = format!(
            "{}/*.json",
            glob::Pattern::escape(&self.storage_dir.to_string_lossy())
        );
        match glob::glob(&pattern) {
            Ok(paths) => paths.filter_map(Result::ok).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "invalid storage glob pattern");
                Vec::new()
            }
        }
    }
}

fn read_record(path: &Path) -> Option<ConversationRecord> {
    let data = match std::fs::read_to_string(path) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read conversation");
            return None;
        }
    };
    match serde_json::from_str(&data) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to decode conversation");
            None
        }
    }
}

/// 清理会话 ID 中的特殊字符用于文件名
pub fn sanitize_conversation_id(conversation_id: &str) -> String {
    conversation_id
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn metadata(value: Value) -> Metadata {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = ConversationStore::new(dir.path());
        let msgs = vec![
            StoredMessage::new(Role::User, "What is a monad?"),
            StoredMessage::new(Role::Assistant, "A monoid in the category of endofunctors."),
        ];
        let meta = metadata(json!({"user_intent": "explain", "turn_count": 1}));

        store.save("s1", &msgs, &meta).unwrap();
        let record = store.load("s1").unwrap();

        assert_eq!(record.conversation_id, "s1");
        assert_eq!(record.messages, msgs);
        assert_eq!(record.metadata.get("user_intent"), Some(&json!("explain")));
        assert_eq!(record.metadata.get("turn_count"), Some(&json!(1)));
    }

    #[test]
    fn test_created_at_preserved_across_saves() {
        let dir = TempDir::new().unwrap();
        let store = ConversationStore::new(dir.path());
        store
            .save("s1", &[StoredMessage::new(Role::User, "one")], &Metadata::new())
            .unwrap();
        let first = store.load("s1").unwrap();

        std::thread::sleep(std::time::Duration::from_millis(5));
        store
            .save(
                "s1",
                &[
                    StoredMessage::new(Role::User, "one"),
                    StoredMessage::new(Role::Assistant, "two"),
                ],
                &Metadata::new(),
            )
            .unwrap();
        let second = store.load("s1").unwrap();

        assert_eq!(first.created_at, second.created_at);
        assert!(second.updated_at > first.updated_at);
        assert_eq!(second.messages.len(), 2);
    }

    #[test]
    fn test_load_missing_and_corrupt_is_none() {
        let dir = TempDir::new().unwrap();
        let store = ConversationStore::new(dir.path());
        assert!(store.load("nope").is_none());

        std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        assert!(store.load("broken").is_none());
        assert!(store.get_messages("broken").is_empty());
    }

    #[test]
    fn test_ids_with_separators_stay_flat() {
        let dir = TempDir::new().unwrap();
        let store = ConversationStore::new(dir.path());
        store.save("../etc/passwd", &[], &Metadata::new()).unwrap();

        assert!(dir.path().join(".._etc_passwd.json").exists());
        assert_eq!(store.load("../etc/passwd").unwrap().conversation_id, "../etc/passwd");
    }

    #[test]
    fn test_append_message_keeps_metadata() {
        let dir = TempDir::new().unwrap();
        let store = ConversationStore::new(dir.path());
        store
            .update_metadata("s1", metadata(json!({"user_intent": "learn"})))
            .unwrap();
        store.append_message("s1", Role::User, "hello", None).unwrap();
        store
            .append_message(
                "s1",
                Role::Assistant,
                "hi",
                Some(metadata(json!({"agent": "explainer"}))),
            )
            .unwrap();

        let record = store.load("s1").unwrap();
        assert_eq!(record.messages.len(), 2);
        assert_eq!(record.messages[0].content, "hello");
        assert_eq!(
            record.messages[1].metadata.as_ref().unwrap().get("agent"),
            Some(&json!("explainer"))
        );
        assert_eq!(record.metadata.get("user_intent"), Some(&json!("learn")));
    }

    #[test]
    fn test_update_metadata_merges() {
        let dir = TempDir::new().unwrap();
        let store = ConversationStore::new(dir.path());
        store
            .save(
                "s1",
                &[StoredMessage::new(Role::User, "q")],
                &metadata(json!({"user_intent": "explain", "turn_count": 1})),
            )
            .unwrap();
        store
            .update_metadata("s1", metadata(json!({"turn_count": 2, "topic": "graphs"})))
            .unwrap();

        let record = store.load("s1").unwrap();
        assert_eq!(record.messages.len(), 1);
        assert_eq!(record.metadata.get("user_intent"), Some(&json!("explain")));
        assert_eq!(record.metadata.get("turn_count"), Some(&json!(2)));
        assert_eq!(record.metadata.get("topic"), Some(&json!("graphs")));
    }

    #[test]
    fn test_delete() {
        let dir = TempDir::new().unwrap();
        let store = ConversationStore::new(dir.path());
        assert!(!store.delete("s1"));
        store.save("s1", &[], &Metadata::new()).unwrap();
        assert!(store.delete("s1"));
        assert!(store.load("s1").is_none());
    }

    #[test]
    fn test_list_orders_by_updated_desc_and_skips_garbage() {
        let dir = TempDir::new().unwrap();
        let store = ConversationStore::new(dir.path());
        store.save("older", &[], &Metadata::new()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store
            .save("newer", &[StoredMessage::new(Role::User, "x")], &Metadata::new())
            .unwrap();
        std::fs::write(dir.path().join("junk.json"), "[]").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let list = store.list();
        let ids: Vec<&str> = list.iter().map(|s| s.conversation_id.as_str()).collect();
        assert_eq!(ids, vec!["newer", "older"]);
        assert_eq!(list[0].message_count, 1);
    }

    #[test]
    fn test_clear_all_counts_json_files() {
        let dir = TempDir::new().unwrap();
        let store = ConversationStore::new(dir.path());
        store.save("a", &[], &Metadata::new()).unwrap();
        store.save("b", &[], &Metadata::new()).unwrap();
        std::fs::write(dir.path().join("keep.txt"), "x").unwrap();

        assert_eq!(store.clear_all(), 2);
        assert!(store.list().is_empty());
        assert!(dir.path().join("keep.txt").exists());
    }

    #[test]
    fn test_stored_message_to_message_skips_tool_roles() {
        assert!(StoredMessage::new(Role::Tool, "raw").to_message().is_none());
        let msg = StoredMessage::new(Role::Assistant, "hi").to_message().unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.text(), "hi");
    }
}
