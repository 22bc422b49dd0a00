mod common;

use common::{seed_story, stored_text, Call, RecordingStore};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use storystage_core::db::open_db_in_memory;
use storystage_core::stage::navigation::{NavigationError, PagePosition};
use storystage_core::stage::scheduler::SchedulerState;
use storystage_core::{
    Alignment, ArticlePatch, FlushOutcome, InsertOutcome, ManualClock, PageSwitch, RepoError,
    SqliteStoryStore, StageConfig, StageController, StageError, StageEvent, StoryStore,
    SyncStatus, UserEdit,
};
use uuid::Uuid;

fn replace_all(text: &str) -> UserEdit {
    UserEdit::ReplaceAll {
        text: text.to_string(),
    }
}

fn controller<'conn>(
    store: RecordingStore<'conn>,
    clock: &ManualClock,
) -> StageController<RecordingStore<'conn>, ManualClock> {
    StageController::new(store, clock.clone(), &StageConfig::default())
}

#[test]
fn open_story_activates_first_page_with_empty_document() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordingStore::new(&conn);
    let story = seed_story(store.inner(), 2);
    let clock = ManualClock::new();
    let mut stage = controller(store, &clock);

    let switch = stage.open_story(story.id, None).unwrap();

    assert_eq!(
        switch,
        PageSwitch::Switched(PagePosition {
            article_id: story.article_order[0],
            index: 0
        })
    );
    let cursor = stage.cursor().unwrap();
    assert_eq!(cursor.active_article_id, story.article_order[0]);
    assert!(!cursor.detail_panel_open);
    assert!(stage.document().unwrap().is_blank());
    assert_eq!(stage.sync_status(), SyncStatus::InSync);
}

#[test]
fn open_story_loads_requested_page_and_stored_content() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordingStore::new(&conn);
    let story = seed_story(store.inner(), 3);
    let target = story.article_order[2];
    let blob = storystage_core::encode(&storystage_core::EditorDocument::from_plain_text(
        "already\nwritten",
    ))
    .unwrap();
    store
        .inner()
        .edit_article(target, &ArticlePatch::draft_content(blob))
        .unwrap();
    let clock = ManualClock::new();
    let mut stage = controller(store, &clock);

    let switch = stage.open_story(story.id, Some(target)).unwrap();

    assert_eq!(switch.position().unwrap().index, 2);
    assert_eq!(
        stage.document().unwrap().plain_text(),
        "already\nwritten"
    );
}

#[test]
fn open_story_propagates_lookup_failures() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordingStore::new(&conn);
    let story = seed_story(store.inner(), 1);
    let empty_id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO stories (uuid, name) VALUES (?1, 'Empty');",
        [empty_id.to_string()],
    )
    .unwrap();
    let clock = ManualClock::new();
    let mut stage = controller(store, &clock);

    let stranger = Uuid::new_v4();
    assert!(matches!(
        stage.open_story(story.id, Some(stranger)),
        Err(StageError::Navigation(NavigationError::NotFound(id))) if id == stranger
    ));
    assert!(matches!(
        stage.open_story(empty_id, None),
        Err(StageError::Navigation(NavigationError::EmptyStory(id))) if id == empty_id
    ));
    let missing = Uuid::new_v4();
    assert!(matches!(
        stage.open_story(missing, None),
        Err(StageError::Repo(RepoError::StoryNotFound(id))) if id == missing
    ));
    assert!(stage.cursor().is_none());
}

#[test]
fn operations_without_story_report_no_story_loaded() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::new();
    let mut stage = controller(RecordingStore::new(&conn), &clock);

    assert!(matches!(
        stage.apply_edit(&replace_all("x")),
        Err(StageError::NoStoryLoaded)
    ));
    assert!(matches!(stage.turn_next(), Err(StageError::NoStoryLoaded)));
    assert!(matches!(stage.insert_after(), Err(StageError::NoStoryLoaded)));
    assert!(matches!(stage.save_now(), Err(StageError::NoStoryLoaded)));
    assert_eq!(stage.tick(), None);
}

#[test]
fn edit_is_persisted_once_after_quiet_period() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordingStore::new(&conn);
    let story = seed_story(store.inner(), 1);
    let article = story.article_order[0];
    let calls = Rc::clone(&store.calls);
    let clock = ManualClock::new();
    let mut stage = controller(store, &clock);
    stage.open_story(story.id, None).unwrap();
    calls.borrow_mut().clear();

    assert_eq!(
        stage.apply_edit(&replace_all("first")).unwrap(),
        SyncStatus::Dirty
    );
    clock.advance(Duration::from_millis(1000));
    stage.apply_edit(&replace_all("second")).unwrap();
    clock.advance(Duration::from_millis(2999));
    assert_eq!(stage.tick(), None);
    assert!(calls.borrow().is_empty());

    clock.advance(Duration::from_millis(1));
    let outcome = stage.tick().unwrap();

    assert!(outcome.is_persisted());
    assert_eq!(*calls.borrow(), vec![Call::EditArticle(article)]);
    assert_eq!(stage.sync_status(), SyncStatus::InSync);
    assert_eq!(
        stored_text(stage.store().inner(), article).as_deref(),
        Some("second")
    );
}

#[test]
fn timer_token_from_before_a_new_edit_is_stale() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordingStore::new(&conn);
    let story = seed_story(store.inner(), 1);
    let clock = ManualClock::new();
    let mut stage = controller(store, &clock);
    stage.open_story(story.id, None).unwrap();

    stage.apply_edit(&replace_all("one")).unwrap();
    let first_token = stage.pending_timer().unwrap();
    clock.advance(Duration::from_millis(2000));
    stage.apply_edit(&replace_all("two")).unwrap();
    let second_token = stage.pending_timer().unwrap();
    assert_ne!(first_token, second_token);

    clock.advance(Duration::from_millis(1500));
    assert_eq!(stage.on_timer(first_token), None);
    assert_eq!(stage.sync_status(), SyncStatus::Dirty);

    clock.advance(Duration::from_millis(1500));
    assert!(stage.on_timer(second_token).unwrap().is_persisted());
}

#[test]
fn page_turn_flushes_outgoing_page_before_loading_target() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordingStore::new(&conn);
    let story = seed_story(store.inner(), 2);
    let (a, b) = (story.article_order[0], story.article_order[1]);
    let calls = Rc::clone(&store.calls);
    let clock = ManualClock::new();
    let mut stage = controller(store, &clock);
    stage.open_story(story.id, None).unwrap();
    calls.borrow_mut().clear();

    stage.apply_edit(&replace_all("page a")).unwrap();
    let outcome = stage.turn_next().unwrap();

    assert_eq!(
        outcome,
        PageSwitch::Switched(PagePosition {
            article_id: b,
            index: 1
        })
    );
    let recorded = calls.borrow().clone();
    let edit_a = recorded
        .iter()
        .position(|call| *call == Call::EditArticle(a))
        .unwrap();
    let get_b = recorded
        .iter()
        .position(|call| *call == Call::GetArticle(b))
        .unwrap();
    assert!(edit_a < get_b, "calls: {recorded:?}");
    assert_eq!(stage.sync_status(), SyncStatus::InSync);
    assert!(stage.pending_timer().is_none());
    assert_eq!(stage.cursor().unwrap().active_article_id, b);
    assert_eq!(
        stored_text(stage.store().inner(), a).as_deref(),
        Some("page a")
    );

    clock.advance(Duration::from_secs(10));
    assert_eq!(stage.tick(), None);
    let writes_of_a = calls
        .borrow()
        .iter()
        .filter(|call| **call == Call::EditArticle(a))
        .count();
    assert_eq!(writes_of_a, 1);
}

#[test]
fn page_turn_past_either_end_is_rejected_without_side_effects() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordingStore::new(&conn);
    let story = seed_story(store.inner(), 2);
    let calls = Rc::clone(&store.calls);
    let clock = ManualClock::new();
    let mut stage = controller(store, &clock);
    stage.open_story(story.id, None).unwrap();
    calls.borrow_mut().clear();

    let before = stage.cursor();
    assert_eq!(stage.turn_prev().unwrap(), PageSwitch::Rejected);
    assert_eq!(stage.cursor(), before);
    assert!(calls.borrow().is_empty());

    stage.turn_next().unwrap();
    let at_end = stage.cursor();
    calls.borrow_mut().clear();
    assert_eq!(stage.turn_next().unwrap(), PageSwitch::Rejected);
    assert_eq!(stage.cursor(), at_end);
    assert!(calls.borrow().is_empty());
}

#[test]
fn staged_composition_is_committed_before_page_turn() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordingStore::new(&conn);
    let story = seed_story(store.inner(), 2);
    let a = story.article_order[0];
    let clock = ManualClock::new();
    let mut stage = controller(store, &clock);
    stage.open_story(story.id, None).unwrap();

    stage
        .stage_edit(&UserEdit::InsertText {
            block: 0,
            offset: 0,
            text: "composing".to_string(),
        })
        .unwrap();
    assert!(stage.document().unwrap().is_blank());
    assert_eq!(stage.visible_document().unwrap().plain_text(), "composing");
    assert_eq!(stage.sync_status(), SyncStatus::InSync);

    stage.turn_next().unwrap();

    assert_eq!(
        stored_text(stage.store().inner(), a).as_deref(),
        Some("composing")
    );
}

#[test]
fn failed_open_keeps_previous_story_and_page() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordingStore::new(&conn);
    let first = seed_story(store.inner(), 2);
    let second = seed_story(store.inner(), 1);
    conn.execute(
        "UPDATE articles SET draft_content = 'not json' WHERE uuid = ?1;",
        [second.article_order[0].to_string()],
    )
    .unwrap();
    let clock = ManualClock::new();
    let mut stage = controller(store, &clock);
    stage.open_story(first.id, None).unwrap();
    stage.turn_next().unwrap();
    stage.apply_edit(&replace_all("draft")).unwrap();
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    stage.subscribe(move |event: &StageEvent| sink.borrow_mut().push(event.clone()));

    assert!(matches!(
        stage.open_story(second.id, None),
        Err(StageError::Codec(_))
    ));

    assert_eq!(stage.story().unwrap().id, first.id);
    let cursor = stage.cursor().unwrap();
    assert_eq!(cursor.active_article_id, first.article_order[1]);
    assert_eq!(cursor.active_page_index, 1);
    assert_eq!(stage.document().unwrap().plain_text(), "draft");
    assert!(!events
        .borrow()
        .iter()
        .any(|event| matches!(event, StageEvent::PageChanged(_))));

    assert!(matches!(stage.turn_prev().unwrap(), PageSwitch::Switched(_)));
    assert_eq!(stage.cursor().unwrap().active_article_id, first.article_order[0]);
}

#[test]
fn unsaved_outgoing_page_holds_the_turn() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordingStore::new(&conn);
    let story = seed_story(store.inner(), 2);
    let (a, b) = (story.article_order[0], story.article_order[1]);
    let refuse = Rc::clone(&store.refuse_writes);
    let calls = Rc::clone(&store.calls);
    let clock = ManualClock::new();
    let mut stage = controller(store, &clock);
    stage.open_story(story.id, None).unwrap();

    stage.apply_edit(&replace_all("precious")).unwrap();
    refuse.set(true);
    calls.borrow_mut().clear();

    assert_eq!(stage.turn_next().unwrap(), PageSwitch::Held { unsaved: a });
    assert!(!calls.borrow().contains(&Call::GetArticle(b)));
    assert_eq!(stage.cursor().unwrap().active_article_id, a);
    assert_eq!(stage.document().unwrap().plain_text(), "precious");
    assert_eq!(stage.sync_status(), SyncStatus::Dirty);
    assert!(stage.has_unsaved_changes());

    refuse.set(false);
    assert_eq!(stage.turn_prev().unwrap(), PageSwitch::Rejected);
    assert_eq!(stage.sync_status(), SyncStatus::Dirty);
    assert_eq!(stage.document().unwrap().plain_text(), "precious");

    assert!(matches!(stage.turn_next().unwrap(), PageSwitch::Switched(_)));
    assert_eq!(
        stored_text(stage.store().inner(), a).as_deref(),
        Some("precious")
    );
    assert_eq!(stage.sync_status(), SyncStatus::InSync);
    assert!(!stage.has_unsaved_changes());

    stage.turn_prev().unwrap();
    assert_eq!(stage.document().unwrap().plain_text(), "precious");
}

#[test]
fn page_turn_without_edits_does_not_write() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordingStore::new(&conn);
    let story = seed_story(store.inner(), 2);
    let calls = Rc::clone(&store.calls);
    let clock = ManualClock::new();
    let mut stage = controller(store, &clock);
    stage.open_story(story.id, None).unwrap();
    stage.apply_edit(&replace_all("once")).unwrap();
    clock.advance(Duration::from_millis(3000));
    stage.tick().unwrap();
    calls.borrow_mut().clear();

    stage.turn_next().unwrap();
    stage.turn_prev().unwrap();

    assert!(!calls
        .borrow()
        .iter()
        .any(|call| matches!(call, Call::EditArticle(_))));
    assert_eq!(stage.save_now().unwrap(), None);
}

#[test]
fn reindexed_active_page_reports_page_changed() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordingStore::new(&conn);
    let story = seed_story(store.inner(), 1);
    let a = story.article_order[0];
    conn.execute("UPDATE articles SET chapter_name = NULL;", [])
        .unwrap();
    let clock = ManualClock::new();
    let mut stage = controller(store, &clock);
    stage.open_story(story.id, None).unwrap();
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    stage.subscribe(move |event: &StageEvent| sink.borrow_mut().push(event.clone()));

    stage.insert_before().unwrap();
    assert_eq!(
        *events.borrow(),
        vec![StageEvent::PageChanged(PagePosition {
            article_id: a,
            index: 1
        })]
    );

    events.borrow_mut().clear();
    stage.store().inner().create_article(story.id, 0).unwrap();
    assert_eq!(
        stage.on_navigation(a, 2).unwrap(),
        PageSwitch::Unchanged(PagePosition {
            article_id: a,
            index: 2
        })
    );
    assert_eq!(
        *events.borrow(),
        vec![StageEvent::PageChanged(PagePosition {
            article_id: a,
            index: 2
        })]
    );
}

#[test]
fn insert_before_chapter_opening_first_page_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordingStore::new(&conn);
    let story = seed_story(store.inner(), 1);
    let calls = Rc::clone(&store.calls);
    let clock = ManualClock::new();
    let mut stage = controller(store, &clock);
    stage.open_story(story.id, None).unwrap();

    assert_eq!(stage.insert_before().unwrap(), InsertOutcome::Rejected);
    assert!(!calls
        .borrow()
        .iter()
        .any(|call| matches!(call, Call::CreateArticle(..))));
    assert_eq!(stage.story().unwrap().len(), 1);
}

#[test]
fn insert_before_first_page_without_chapter_name_is_allowed() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordingStore::new(&conn);
    let story = seed_story(store.inner(), 1);
    let a = story.article_order[0];
    conn.execute("UPDATE articles SET chapter_name = NULL;", [])
        .unwrap();
    let clock = ManualClock::new();
    let mut stage = controller(store, &clock);
    stage.open_story(story.id, None).unwrap();

    let InsertOutcome::Created { article, index } = stage.insert_before().unwrap() else {
        panic!("insert was rejected");
    };

    assert_eq!(index, 0);
    assert_eq!(stage.story().unwrap().article_order, vec![article.id, a]);
    let cursor = stage.cursor().unwrap();
    assert_eq!(cursor.active_article_id, a);
    assert_eq!(cursor.active_page_index, 1);
}

#[test]
fn insert_after_creates_article_without_touching_active_document() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordingStore::new(&conn);
    let story = seed_story(store.inner(), 1);
    let a = story.article_order[0];
    let calls = Rc::clone(&store.calls);
    let clock = ManualClock::new();
    let mut stage = controller(store, &clock);
    stage.open_story(story.id, None).unwrap();
    stage.apply_edit(&replace_all("keep me")).unwrap();
    let document = stage.document().unwrap();

    let InsertOutcome::Created { article, index } = stage.insert_after().unwrap() else {
        panic!("insert was rejected");
    };

    assert_eq!(index, 1);
    assert!(calls
        .borrow()
        .contains(&Call::CreateArticle(story.id, 1)));
    assert!(Arc::ptr_eq(&document, &stage.document().unwrap()));
    assert_eq!(stage.cursor().unwrap().active_article_id, a);
    assert_eq!(stage.cursor().unwrap().active_page_index, 0);
    assert_eq!(stage.sync_status(), SyncStatus::Dirty);

    stage.on_navigation(article.id, 1).unwrap();
    assert_eq!(stage.cursor().unwrap().active_article_id, article.id);
    assert!(stage.document().unwrap().is_blank());
    assert_eq!(
        stored_text(stage.store().inner(), a).as_deref(),
        Some("keep me")
    );

    let InsertOutcome::Created { index, .. } = stage.insert_before().unwrap() else {
        panic!("insert was rejected");
    };
    assert_eq!(index, 1);
    assert_eq!(stage.cursor().unwrap().active_page_index, 2);
    assert_eq!(stage.cursor().unwrap().active_article_id, article.id);
}

#[test]
fn navigation_to_unknown_article_refreshes_story_order() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordingStore::new(&conn);
    let story = seed_story(store.inner(), 1);
    let clock = ManualClock::new();
    let mut stage = controller(store, &clock);
    stage.open_story(story.id, None).unwrap();

    let created = stage.store().inner().create_article(story.id, 1).unwrap();
    stage.on_navigation(created.id, 1).unwrap();

    assert_eq!(stage.story().unwrap().len(), 2);
    assert_eq!(stage.cursor().unwrap().active_page_index, 1);

    let stranger = Uuid::new_v4();
    assert!(matches!(
        stage.on_navigation(stranger, 0),
        Err(StageError::Navigation(NavigationError::NotFound(_)))
    ));
}

#[test]
fn toggle_alignment_cycles_and_writes_through() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordingStore::new(&conn);
    let story = seed_story(store.inner(), 1);
    let a = story.article_order[0];
    let clock = ManualClock::new();
    let mut stage = controller(store, &clock);
    stage.open_story(story.id, None).unwrap();

    assert_eq!(stage.toggle_alignment().unwrap(), Alignment::Center);
    assert_eq!(stage.toggle_alignment().unwrap(), Alignment::Right);
    assert_eq!(
        stage.store().inner().get_article(a).unwrap().unwrap().alignment,
        Alignment::Right
    );
    assert_eq!(stage.toggle_alignment().unwrap(), Alignment::Left);
}

#[test]
fn failed_write_keeps_dirty_until_next_successful_save() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordingStore::new(&conn);
    let story = seed_story(store.inner(), 1);
    let a = story.article_order[0];
    let refuse = Rc::clone(&store.refuse_writes);
    let clock = ManualClock::new();
    let mut stage = controller(store, &clock);
    stage.open_story(story.id, None).unwrap();

    stage.apply_edit(&replace_all("fragile")).unwrap();
    refuse.set(true);
    clock.advance(Duration::from_millis(3000));

    assert!(matches!(
        stage.tick(),
        Some(FlushOutcome::Failed { attempts: 1, .. })
    ));
    assert_eq!(stage.sync_status(), SyncStatus::Dirty);

    refuse.set(false);
    assert!(stage.save_now().unwrap().unwrap().is_persisted());
    assert_eq!(stage.sync_status(), SyncStatus::InSync);
    assert_eq!(
        stored_text(stage.store().inner(), a).as_deref(),
        Some("fragile")
    );
}

#[test]
fn teardown_flushes_then_disables() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordingStore::new(&conn);
    let story = seed_story(store.inner(), 1);
    let a = story.article_order[0];
    let calls = Rc::clone(&store.calls);
    let clock = ManualClock::new();
    let mut stage = controller(store, &clock);
    stage.open_story(story.id, None).unwrap();
    stage.apply_edit(&replace_all("last words")).unwrap();

    let outcome = stage.teardown();

    assert!(matches!(
        outcome,
        Some(FlushOutcome::Persisted { article_id, .. }) if article_id == a
    ));
    assert_eq!(
        stored_text(stage.store().inner(), a).as_deref(),
        Some("last words")
    );
    assert!(stage.cursor().is_none());
    assert!(stage.is_torn_down());
    assert_eq!(stage.scheduler_state(), SchedulerState::Disabled);
    assert!(matches!(
        stage.apply_edit(&replace_all("late")),
        Err(StageError::TornDown)
    ));

    calls.borrow_mut().clear();
    clock.advance(Duration::from_secs(10));
    assert_eq!(stage.tick(), None);
    assert_eq!(stage.teardown(), None);
    assert!(calls.borrow().is_empty());
}

#[test]
fn failed_teardown_flush_is_reported_and_stays_dirty() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordingStore::new(&conn);
    let story = seed_story(store.inner(), 1);
    let a = story.article_order[0];
    let refuse = Rc::clone(&store.refuse_writes);
    let clock = ManualClock::new();
    let mut stage = controller(store, &clock);
    stage.open_story(story.id, None).unwrap();
    stage.apply_edit(&replace_all("unsaved")).unwrap();
    refuse.set(true);

    assert!(matches!(
        stage.teardown(),
        Some(FlushOutcome::Failed { article_id, .. }) if article_id == a
    ));
    assert_eq!(stage.sync_status(), SyncStatus::Dirty);
    assert!(stage.is_torn_down());
    assert_eq!(stage.scheduler_state(), SchedulerState::Disabled);
    assert_eq!(stored_text(stage.store().inner(), a), None);
}

#[test]
fn dropping_controller_flushes_pending_edit() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordingStore::new(&conn);
    let story = seed_story(store.inner(), 1);
    let a = story.article_order[0];
    let clock = ManualClock::new();
    {
        let mut stage = controller(store, &clock);
        stage.open_story(story.id, None).unwrap();
        stage.apply_edit(&replace_all("saved on drop")).unwrap();
    }

    let store = SqliteStoryStore::try_new(&conn).unwrap();
    assert_eq!(stored_text(&store, a).as_deref(), Some("saved on drop"));
}

#[test]
fn listeners_observe_document_and_status_changes() {
    let conn = open_db_in_memory().unwrap();
    let store = RecordingStore::new(&conn);
    let story = seed_story(store.inner(), 1);
    let a = story.article_order[0];
    let clock = ManualClock::new();
    let mut stage = controller(store, &clock);
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    stage.subscribe(move |event: &StageEvent| sink.borrow_mut().push(event.clone()));

    stage.open_story(story.id, None).unwrap();
    {
        let seen = events.borrow();
        assert_eq!(
            seen[0],
            StageEvent::PageChanged(PagePosition {
                article_id: a,
                index: 0
            })
        );
        assert!(matches!(
            &seen[1],
            StageEvent::DocumentChanged { article_id, status: SyncStatus::InSync, .. } if *article_id == a
        ));
    }

    events.borrow_mut().clear();
    stage.apply_edit(&replace_all("hello")).unwrap();
    {
        let seen = events.borrow();
        assert_eq!(seen.len(), 2);
        assert!(matches!(
            &seen[0],
            StageEvent::DocumentChanged { status: SyncStatus::Dirty, snapshot, .. }
                if snapshot.plain_text() == "hello"
        ));
        assert_eq!(seen[1], StageEvent::StatusChanged(SyncStatus::Dirty));
    }

    events.borrow_mut().clear();
    clock.advance(Duration::from_millis(3000));
    stage.tick().unwrap();
    assert_eq!(
        *events.borrow(),
        vec![StageEvent::StatusChanged(SyncStatus::InSync)]
    );

    events.borrow_mut().clear();
    assert!(stage.toggle_detail_panel().unwrap());
    stage.focus_editor().unwrap();
    assert!(stage.is_focused());
    assert!(stage.cursor().unwrap().detail_panel_open);
    assert_eq!(
        *events.borrow(),
        vec![
            StageEvent::DetailPanelToggled(true),
            StageEvent::FocusRequested
        ]
    );
}
