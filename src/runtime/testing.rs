//! Mock implementations for testing
//!
//! These mocks enable integration testing of whole dialogs against an
//! in-memory database with injectable storage failures.

use super::traits::*;
use crate::db::{
    CatalogItem, Database, Exercise, HistoryEntry, HistoryExportRow, HistoryLine, NewHistoryEntry,
    TodayRecord, User,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

// ============================================================================
// Flaky Gateway
// ============================================================================

/// Real gateway over an in-memory database that can be told to fail
pub struct FlakyGateway {
    inner: DatabaseGateway,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    /// Number of writes attempted, failed or not
    pub writes: AtomicUsize,
}

#[allow(dead_code)]
impl FlakyGateway {
    pub fn new() -> Self {
        let db = Database::open_in_memory().expect("in-memory database");
        Self::with_database(db)
    }

    pub fn with_database(db: Database) -> Self {
        Self {
            inner: DatabaseGateway::new(db),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn db(&self) -> &Database {
        self.inner.inner()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_read(&self) -> StorageResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Transient("injected read failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Transient("injected write failure".to_string()));
        }
        Ok(())
    }
}

impl Default for FlakyGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for FlakyGateway {
    async fn find_user_by_external_id(&self, external_id: i64) -> StorageResult<Option<User>> {
        self.check_read()?;
        self.inner.find_user_by_external_id(external_id).await
    }

    async fn create_user(&self, external_id: i64, user_name: &str) -> StorageResult<User> {
        self.check_write()?;
        self.inner.create_user(external_id, user_name).await
    }
}

#[async_trait]
impl CatalogStore for FlakyGateway {
    async fn list_body_parts(&self) -> StorageResult<Vec<CatalogItem>> {
        self.check_read()?;
        self.inner.list_body_parts().await
    }

    async fn find_body_part(&self, id: i64) -> StorageResult<Option<CatalogItem>> {
        self.check_read()?;
        self.inner.find_body_part(id).await
    }

    async fn list_exercises(
        &self,
        user_id: i64,
        body_part_id: i64,
    ) -> StorageResult<Vec<CatalogItem>> {
        self.check_read()?;
        self.inner.list_exercises(user_id, body_part_id).await
    }

    async fn find_exercise(
        &self,
        user_id: i64,
        body_part_id: i64,
        exercise_id: i64,
    ) -> StorageResult<Option<CatalogItem>> {
        self.check_read()?;
        self.inner
            .find_exercise(user_id, body_part_id, exercise_id)
            .await
    }

    async fn create_exercise(
        &self,
        user_id: i64,
        body_part_id: i64,
        name: &str,
    ) -> StorageResult<Exercise> {
        self.check_write()?;
        self.inner.create_exercise(user_id, body_part_id, name).await
    }
}

#[async_trait]
impl HistoryStore for FlakyGateway {
    async fn create_history_entry(&self, entry: &NewHistoryEntry) -> StorageResult<HistoryEntry> {
        self.check_write()?;
        self.inner.create_history_entry(entry).await
    }

    async fn list_recent_history(
        &self,
        user_id: i64,
        exercise_id: i64,
        limit: usize,
    ) -> StorageResult<Vec<HistoryLine>> {
        self.check_read()?;
        self.inner.list_recent_history(user_id, exercise_id, limit).await
    }

    async fn list_today_history(&self, user_id: i64) -> StorageResult<Vec<TodayRecord>> {
        self.check_read()?;
        self.inner.list_today_history(user_id).await
    }

    async fn export_history(&self) -> StorageResult<Vec<HistoryExportRow>> {
        self.check_read()?;
        self.inner.export_history().await
    }
}

// ============================================================================
// Integration Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::button::ButtonToken;
    use crate::runtime::DialogManager;
    use crate::session::SessionStore;
    use crate::state_machine::transition::{DIALOG_CLOSED, NOTHING_TO_CANCEL, STORAGE_FAILED};
    use crate::state_machine::{DialogContext, DialogState, Event, Reply};
    use std::sync::Arc;

    const CHAT: i64 = 4242;

    fn manager_with(gateway: Arc<FlakyGateway>) -> DialogManager<FlakyGateway> {
        DialogManager::new(
            gateway,
            Arc::new(SessionStore::new()),
            DialogContext::default(),
        )
    }

    fn start() -> Event {
        Event::Start {
            display_name: "lifter".to_string(),
        }
    }

    fn press(data: &str) -> Event {
        Event::Button {
            token: ButtonToken::decode(data).unwrap(),
            message_id: 500,
        }
    }

    fn text(value: &str) -> Event {
        Event::Text {
            text: value.to_string(),
        }
    }

    fn reply_texts(replies: &[Reply]) -> Vec<String> {
        replies
            .iter()
            .filter_map(|r| match r {
                Reply::Text { text } | Reply::Menu { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    async fn state(manager: &DialogManager<FlakyGateway>) -> Option<DialogState> {
        manager.sessions().get(CHAT).await.map(|s| s.state)
    }

    /// Drive a fresh user up to the note confirmation for a new exercise
    async fn drive_to_confirmation(manager: &DialogManager<FlakyGateway>) {
        manager.submit(CHAT, start()).await.unwrap();
        manager.submit(CHAT, press("bpitem_1")).await.unwrap();
        manager.submit(CHAT, press("create_exercise")).await.unwrap();
        manager.submit(CHAT, text("Bench Press")).await.unwrap();
        manager.submit(CHAT, text("100(8)-90(7)")).await.unwrap();
        assert_eq!(
            state(manager).await,
            Some(DialogState::AwaitingNoteConfirmation)
        );
    }

    #[tokio::test]
    async fn test_start_registers_user_and_shows_body_parts() {
        let gateway = Arc::new(FlakyGateway::new());
        let manager = manager_with(gateway.clone());

        let replies = manager.submit(CHAT, start()).await.unwrap();
        match &replies[..] {
            [Reply::Menu {
                text,
                keyboard,
                edit_message_id: None,
            }] => {
                assert_eq!(text, "Choose a body part (page 1/2):");
                assert_eq!(keyboard[0][0].text, "Chest");
                assert_eq!(keyboard[0][0].data, "bpitem_1");
            }
            other => panic!("unexpected replies {other:?}"),
        }

        assert!(gateway.db().find_user_by_external_id(CHAT).unwrap().is_some());
        assert_eq!(state(&manager).await, Some(DialogState::AwaitingBodyPartChoice));

        // A second /start reuses the user
        manager.submit(CHAT, start()).await.unwrap();
        assert_eq!(gateway.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_full_logging_dialog() {
        let gateway = Arc::new(FlakyGateway::new());
        let manager = manager_with(gateway.clone());
        drive_to_confirmation(&manager).await;

        let replies = manager.submit(CHAT, press("confirm_yes")).await.unwrap();
        assert_eq!(replies[0], Reply::RemoveKeyboard { message_id: 500 });
        assert_eq!(reply_texts(&replies), vec!["Saved Bench Press: 100(8)-90(7)"]);
        assert_eq!(state(&manager).await, None);

        let user = gateway.db().find_user_by_external_id(CHAT).unwrap().unwrap();
        let today = gateway.db().list_today_history(user.id).unwrap();
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].body_part, "Chest");
        assert_eq!(today[0].exercise, "Bench Press");
        assert_eq!(today[0].note, "100(8)-90(7)");
    }

    #[tokio::test]
    async fn test_existing_exercise_shows_history() {
        let gateway = Arc::new(FlakyGateway::new());
        let manager = manager_with(gateway.clone());
        drive_to_confirmation(&manager).await;
        manager.submit(CHAT, press("confirm_yes")).await.unwrap();

        manager.submit(CHAT, start()).await.unwrap();
        manager.submit(CHAT, press("bpitem_1")).await.unwrap();
        let replies = manager.submit(CHAT, press("choose_exercise")).await.unwrap();
        let exercise_data = match &replies[..] {
            [Reply::Menu { keyboard, .. }] => keyboard[0][0].data.clone(),
            other => panic!("unexpected replies {other:?}"),
        };

        let replies = manager.submit(CHAT, press(&exercise_data)).await.unwrap();
        let texts = reply_texts(&replies);
        assert!(texts[0].starts_with("Bench Press"));
        assert!(texts[0].contains("100(8)-90(7)"));
        assert_eq!(state(&manager).await, Some(DialogState::AwaitingNote));
    }

    #[tokio::test]
    async fn test_duplicate_exercise_name_asks_again() {
        let gateway = Arc::new(FlakyGateway::new());
        let manager = manager_with(gateway.clone());
        drive_to_confirmation(&manager).await;
        manager.submit(CHAT, press("confirm_yes")).await.unwrap();

        manager.submit(CHAT, start()).await.unwrap();
        manager.submit(CHAT, press("bpitem_1")).await.unwrap();
        manager.submit(CHAT, press("create_exercise")).await.unwrap();
        let replies = manager.submit(CHAT, text("Bench Press")).await.unwrap();

        assert!(reply_texts(&replies)[0].contains("already exists"));
        assert_eq!(state(&manager).await, Some(DialogState::AwaitingNewExerciseName));

        let user = gateway.db().find_user_by_external_id(CHAT).unwrap().unwrap();
        assert_eq!(gateway.db().list_exercises(user.id, 1).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_draft_for_retry() {
        let gateway = Arc::new(FlakyGateway::new());
        let manager = manager_with(gateway.clone());
        drive_to_confirmation(&manager).await;

        gateway.fail_writes(true);
        let replies = manager.submit(CHAT, press("confirm_yes")).await.unwrap();
        assert_eq!(reply_texts(&replies), vec![STORAGE_FAILED]);
        let session = manager.sessions().get(CHAT).await.unwrap();
        assert_eq!(session.state, DialogState::AwaitingNoteConfirmation);
        assert_eq!(session.draft_note.as_deref(), Some("100(8)-90(7)"));

        gateway.fail_writes(false);
        let replies = manager.submit(CHAT, press("confirm_yes")).await.unwrap();
        assert_eq!(reply_texts(&replies), vec!["Saved Bench Press: 100(8)-90(7)"]);
        assert_eq!(state(&manager).await, None);
    }

    #[tokio::test]
    async fn test_failed_read_keeps_menu() {
        let gateway = Arc::new(FlakyGateway::new());
        let manager = manager_with(gateway.clone());
        manager.submit(CHAT, start()).await.unwrap();

        gateway.fail_reads(true);
        let replies = manager.submit(CHAT, press("bpitem_1")).await.unwrap();
        assert_eq!(reply_texts(&replies), vec![STORAGE_FAILED]);
        assert_eq!(state(&manager).await, Some(DialogState::AwaitingBodyPartChoice));
    }

    #[tokio::test]
    async fn test_cancel_twice() {
        let manager = manager_with(Arc::new(FlakyGateway::new()));
        manager.submit(CHAT, start()).await.unwrap();

        let first = manager.submit(CHAT, Event::Cancel).await.unwrap();
        assert_eq!(reply_texts(&first), vec![DIALOG_CLOSED]);
        let second = manager.submit(CHAT, Event::Cancel).await.unwrap();
        assert_eq!(reply_texts(&second), vec![NOTHING_TO_CANCEL]);
        assert_eq!(state(&manager).await, None);
    }

    #[tokio::test]
    async fn test_back_returns_to_body_parts() {
        let manager = manager_with(Arc::new(FlakyGateway::new()));
        manager.submit(CHAT, start()).await.unwrap();
        manager.submit(CHAT, press("bpitem_2")).await.unwrap();

        let replies = manager.submit(CHAT, press("back")).await.unwrap();
        assert_eq!(replies[0], Reply::DeleteMessage { message_id: 500 });
        assert!(matches!(replies[1], Reply::Menu { edit_message_id: None, .. }));

        let session = manager.sessions().get(CHAT).await.unwrap();
        assert_eq!(session.state, DialogState::AwaitingBodyPartChoice);
        assert!(session.body_part.is_none());
    }

    #[tokio::test]
    async fn test_body_part_paging_edits_menu() {
        let manager = manager_with(Arc::new(FlakyGateway::new()));
        manager.submit(CHAT, start()).await.unwrap();

        let replies = manager.submit(CHAT, press("bppage_1")).await.unwrap();
        match &replies[..] {
            [Reply::Menu {
                text,
                keyboard,
                edit_message_id: Some(500),
            }] => {
                assert_eq!(text, "Choose a body part (page 2/2):");
                assert_eq!(keyboard[0][0].text, "Other");
                assert_eq!(keyboard[1][0].data, "bppage_0");
            }
            other => panic!("unexpected replies {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sessions_do_not_survive_restart() {
        let gateway = Arc::new(FlakyGateway::new());
        let manager = manager_with(gateway.clone());
        drive_to_confirmation(&manager).await;

        let restarted = manager_with(gateway);
        let replies = restarted.submit(CHAT, press("confirm_yes")).await.unwrap();
        assert!(reply_texts(&replies)[0].contains("/start"));
    }

    #[tokio::test]
    async fn test_concurrent_confirmations_save_once() {
        let gateway = Arc::new(FlakyGateway::new());
        let manager = Arc::new(manager_with(gateway.clone()));
        drive_to_confirmation(&manager).await;

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.submit(CHAT, press("confirm_yes")).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let user = gateway.db().find_user_by_external_id(CHAT).unwrap().unwrap();
        assert_eq!(gateway.db().list_today_history(user.id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let gateway = Arc::new(FlakyGateway::new());
        let manager = manager_with(gateway.clone());
        drive_to_confirmation(&manager).await;

        manager.submit(CHAT + 1, start()).await.unwrap();
        manager.submit(CHAT + 1, press("bpitem_1")).await.unwrap();
        let replies = manager.submit(CHAT + 1, press("choose_exercise")).await.unwrap();
        assert!(reply_texts(&replies)[0].starts_with("No exercises"));
        assert_eq!(
            state(&manager).await,
            Some(DialogState::AwaitingNoteConfirmation)
        );
    }

    #[tokio::test]
    async fn test_evict_idle_drops_sessions() {
        let manager = manager_with(Arc::new(FlakyGateway::new()));
        manager.submit(CHAT, start()).await.unwrap();

        assert_eq!(manager.evict_idle(std::time::Duration::from_secs(60)).await, 0);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(manager.evict_idle(std::time::Duration::from_millis(5)).await, 1);

        let replies = manager.submit(CHAT, press("bpitem_1")).await.unwrap();
        assert!(reply_texts(&replies)[0].contains("/start"));
    }

    #[tokio::test]
    async fn test_active_user_survives_eviction() {
        let manager = manager_with(Arc::new(FlakyGateway::new()));
        manager.submit(CHAT, start()).await.unwrap();

        // Page navigation keeps the session as it is but still counts as activity
        for _ in 0..6 {
            tokio::time::sleep(std::time::Duration::from_millis(40)).await;
            manager.submit(CHAT, press("bppage_1")).await.unwrap();
        }

        assert_eq!(manager.evict_idle(std::time::Duration::from_millis(100)).await, 0);
        assert_eq!(state(&manager).await, Some(DialogState::AwaitingBodyPartChoice));
    }

    #[tokio::test]
    async fn test_eviction_never_splits_a_save() {
        let gateway = Arc::new(FlakyGateway::new());
        let manager = manager_with(gateway.clone());
        drive_to_confirmation(&manager).await;

        let (replies, _) = tokio::join!(
            manager.submit(CHAT, press("confirm_yes")),
            manager.evict_idle(std::time::Duration::ZERO),
        );
        let saved = reply_texts(&replies.unwrap())
            .iter()
            .any(|t| t.starts_with("Saved"));

        let user = gateway.db().find_user_by_external_id(CHAT).unwrap().unwrap();
        let rows = gateway.db().list_today_history(user.id).unwrap().len();
        assert_eq!(rows, usize::from(saved));
        assert!(state(&manager).await.is_none());
    }

    #[tokio::test]
    async fn test_idle_sweeper_evicts_in_background() {
        let manager = Arc::new(manager_with(Arc::new(FlakyGateway::new())));
        manager.submit(CHAT, start()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;

        // The first sweep runs as soon as the sweeper starts
        manager.spawn_idle_sweeper(std::time::Duration::from_millis(10));
        for _ in 0..50 {
            if manager.sessions().len().await == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(manager.sessions().len().await, 0);

        let replies = manager.submit(CHAT, press("bpitem_1")).await.unwrap();
        assert!(reply_texts(&replies)[0].contains("/start"));
    }
}
