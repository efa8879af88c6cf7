mod common;

use std::sync::Arc;
use std::time::Duration;

use attempt_core::model::{AnswerPayload, AttemptId, SaveStatus, TestId};
use attempt_core::time::{fixed_clock, fixed_now};
use services::{
    AttemptRemote, AttemptSession, DispatchOutcome, FlushOutcome, ResultNavigator, SaveReason,
    SkipReason, SubmitError, SubmitPrompt, SubmitRequestOutcome,
};
use storage::repository::{DrawingCacheRepository, InMemoryRepository};
use tokio::time::sleep;

use common::{FakeRemote, RecordingNavigator, open, q1, q2, started};

struct Harness {
    remote: Arc<FakeRemote>,
    navigator: Arc<RecordingNavigator>,
    drawings: Arc<InMemoryRepository>,
    session: AttemptSession,
}

fn harness(remote: FakeRemote, remaining_seconds: u32) -> Harness {
    let remote = Arc::new(remote);
    let navigator = Arc::new(RecordingNavigator::default());
    let drawings = Arc::new(InMemoryRepository::new());

    let remote_dyn: Arc<dyn AttemptRemote> = remote.clone();
    let navigator_dyn: Arc<dyn ResultNavigator> = navigator.clone();
    let drawings_dyn: Arc<dyn DrawingCacheRepository> = drawings.clone();
    let session = AttemptSession::builder(remote_dyn)
        .with_navigator(navigator_dyn)
        .with_drawings(drawings_dyn)
        .with_clock(fixed_clock())
        .open(started(remaining_seconds));

    Harness {
        remote,
        navigator,
        drawings,
        session,
    }
}

#[tokio::test(start_paused = true)]
async fn double_submit_sends_one_terminal_call() {
    let h = harness(
        FakeRemote::new().with_submit_latency(Duration::from_secs(1)),
        600,
    );

    let (first, second) = tokio::join!(
        h.session.execute_submit(false),
        h.session.execute_submit(false)
    );

    assert_eq!(
        first.unwrap().result_attempt_id,
        AttemptId::new("TA-RESULT")
    );
    assert!(matches!(second, Err(SubmitError::InFlight)));
    assert!(matches!(
        h.session.execute_submit(false).await,
        Err(SubmitError::AlreadySubmitted(id)) if id == AttemptId::new("TA-RESULT")
    ));
    assert_eq!(
        h.session.request_submit(false).await.unwrap(),
        SubmitRequestOutcome::Ignored
    );
    assert_eq!(h.remote.submits().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_auto_submits_are_collapsed() {
    let h = harness(
        FakeRemote::new().with_submit_latency(Duration::from_secs(1)),
        600,
    );

    let (first, second) = tokio::join!(h.session.request_submit(true), h.session.request_submit(true));

    assert!(matches!(
        first.unwrap(),
        SubmitRequestOutcome::Submitted { .. }
    ));
    assert_eq!(second.unwrap(), SubmitRequestOutcome::Ignored);
    assert_eq!(h.remote.submits().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn manual_submit_asks_for_confirmation_with_unanswered_count() {
    let h = harness(FakeRemote::new(), 600);
    h.session
        .set_answer(&q1(), AnswerPayload::text("answered"))
        .unwrap();

    let outcome = h.session.request_submit(false).await.unwrap();

    let SubmitRequestOutcome::ConfirmationRequired { prompt, flush } = outcome else {
        panic!("expected a confirmation prompt");
    };
    assert_eq!(prompt, SubmitPrompt::Unanswered { count: 1, total: 2 });
    assert_eq!(flush, FlushOutcome::Saved);
    assert_eq!(h.remote.saves().len(), 1);
    assert!(h.remote.submits().is_empty());
    assert!(h.navigator.calls().is_empty());

    let result = h.session.execute_submit(false).await.unwrap();
    assert!(!result.auto_submitted);
    assert_eq!(result.submitted_at, fixed_now());
    assert_eq!(h.remote.submits().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn complete_attempt_gets_the_all_answered_prompt() {
    let h = harness(FakeRemote::new(), 600);
    h.session.set_answer(&q1(), AnswerPayload::text("a")).unwrap();
    h.session
        .set_answer(&q2(), AnswerPayload::text("an essay"))
        .unwrap();
    sleep(Duration::from_secs(1)).await;

    let outcome = h.session.request_submit(false).await.unwrap();

    assert_eq!(
        outcome,
        SubmitRequestOutcome::ConfirmationRequired {
            prompt: SubmitPrompt::AllAnswered,
            flush: FlushOutcome::NotNeeded,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn auto_submit_skips_confirmation_and_navigates() {
    let h = harness(FakeRemote::new(), 600);
    h.session
        .set_answer(&q1(), AnswerPayload::text("last second"))
        .unwrap();

    let outcome = h.session.request_submit(true).await.unwrap();

    let SubmitRequestOutcome::Submitted { result, flush } = outcome else {
        panic!("auto-submit must not ask for confirmation");
    };
    assert!(result.auto_submitted);
    assert_eq!(flush, FlushOutcome::Saved);
    assert_eq!(
        h.navigator.calls(),
        vec![(TestId::new("T-1"), AttemptId::new("TA-RESULT"))]
    );
    let (payload, _) = &h.remote.submits()[0];
    assert_eq!(
        payload.answers[&q1()].answer,
        Some(AnswerPayload::text("last second"))
    );
}

#[tokio::test(start_paused = true)]
async fn countdown_expiry_auto_submits_and_clears_drawings() {
    let h = harness(FakeRemote::new(), 3);
    h.session.cache_drawing(&q2(), "{\"strokes\":3}").await.unwrap();
    h.session
        .set_answer(&q1(), AnswerPayload::text("in time"))
        .unwrap();

    sleep(Duration::from_secs(5)).await;

    assert!(h.session.is_expired());
    assert!(h.session.is_terminal());
    assert_eq!(h.session.remaining_seconds(), 0);
    assert_eq!(
        h.navigator.calls(),
        vec![(TestId::new("T-1"), AttemptId::new("TA-RESULT"))]
    );
    assert!(h.drawings.is_empty().unwrap());
    let result = h.session.result().unwrap();
    assert!(result.auto_submitted);
    assert_eq!(h.remote.submits().len(), 1);

    assert!(!h.session.set_answer(&q1(), AnswerPayload::text("too late")).unwrap());
    assert_eq!(h.session.toggle_mark_for_review(&q2()).unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn missing_result_id_falls_back_to_the_attempt() {
    let h = harness(FakeRemote::new().with_result_id(None), 600);

    let result = h.session.execute_submit(false).await.unwrap();

    assert_eq!(result.result_attempt_id, AttemptId::new("TA-1"));
    assert_eq!(
        h.navigator.calls(),
        vec![(TestId::new("T-1"), AttemptId::new("TA-1"))]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_submit_keeps_the_attempt_open_for_a_retry() {
    let h = harness(FakeRemote::new(), 600);
    h.remote.fail_next_submits(1);
    h.session.set_answer(&q1(), AnswerPayload::text("v1")).unwrap();

    let err = h.session.execute_submit(false).await.unwrap_err();
    assert!(matches!(err, SubmitError::Remote(_)));
    assert_eq!(h.session.save_state().status, SaveStatus::Error);
    assert!(!h.session.is_terminal());
    assert!(h.navigator.calls().is_empty());

    assert!(h.session.set_answer(&q1(), AnswerPayload::text("v2")).unwrap());
    let result = h.session.execute_submit(false).await.unwrap();
    assert_eq!(result.result_attempt_id, AttemptId::new("TA-RESULT"));

    let submits = h.remote.submits();
    assert_eq!(submits.len(), 2);
    assert!(submits.iter().all(|(_, key)| *key == h.session.submission_key()));
    assert_eq!(
        submits[1].0.answers[&q1()].answer,
        Some(AnswerPayload::text("v2"))
    );
    assert_eq!(h.session.save_state().status, SaveStatus::Saved);
}

#[tokio::test(start_paused = true)]
async fn slow_flush_times_out_and_submit_still_proceeds() {
    let h = harness(
        FakeRemote::new().with_save_latency(Duration::from_secs(5)),
        600,
    );
    h.session
        .set_answer(&q1(), AnswerPayload::text("slow network"))
        .unwrap();

    let outcome = h.session.request_submit(false).await.unwrap();
    assert_eq!(
        outcome,
        SubmitRequestOutcome::ConfirmationRequired {
            prompt: SubmitPrompt::Unanswered { count: 1, total: 2 },
            flush: FlushOutcome::TimedOut,
        }
    );

    let result = h.session.execute_submit(false).await.unwrap();
    assert_eq!(result.result_attempt_id, AttemptId::new("TA-RESULT"));
    assert_eq!(
        h.remote.submits()[0].0.answers[&q1()].answer,
        Some(AnswerPayload::text("slow network"))
    );

    sleep(Duration::from_secs(6)).await;
    assert_eq!(h.session.save_state().status, SaveStatus::Saved);
    assert_eq!(h.remote.max_concurrent_saves(), 1);
}

#[tokio::test(start_paused = true)]
async fn edit_during_flush_is_reported_as_stale() {
    let h = harness(
        FakeRemote::new().with_save_latency(Duration::from_secs(1)),
        600,
    );
    h.session.set_answer(&q1(), AnswerPayload::text("one")).unwrap();

    let (outcome, edited) = tokio::join!(h.session.request_submit(false), async {
        sleep(Duration::from_millis(200)).await;
        h.session.set_answer(&q1(), AnswerPayload::text("two"))
    });

    assert!(edited.unwrap());
    let SubmitRequestOutcome::ConfirmationRequired { flush, .. } = outcome.unwrap() else {
        panic!("manual submit must ask for confirmation");
    };
    assert_eq!(flush, FlushOutcome::Stale);
}

#[tokio::test(start_paused = true)]
async fn mutations_are_ignored_while_submitting() {
    let h = harness(
        FakeRemote::new().with_submit_latency(Duration::from_secs(2)),
        600,
    );

    let (submitted, late_edit) = tokio::join!(h.session.execute_submit(false), async {
        sleep(Duration::from_millis(100)).await;
        (
            h.session.set_answer(&q1(), AnswerPayload::text("late")),
            h.session.trigger_save(SaveReason::Manual).await,
        )
    });

    submitted.unwrap();
    let (changed, save) = late_edit;
    assert!(!changed.unwrap());
    assert_eq!(save, DispatchOutcome::Skipped(SkipReason::Submitting));
    assert!(h.remote.submits()[0].0.answers.is_empty());
    assert!(h.session.answer(&q1()).is_none());
}

#[tokio::test(start_paused = true)]
async fn submission_stops_interval_saves() {
    let h = harness(FakeRemote::new(), 600);
    h.session.execute_submit(false).await.unwrap();

    sleep(Duration::from_secs(25)).await;

    assert!(h.remote.saves().is_empty());
    assert_eq!(h.session.remaining_seconds(), 600);
}

#[tokio::test(start_paused = true)]
async fn terminal_attempt_is_read_only() {
    let remote = Arc::new(FakeRemote::new());
    let mut finished = started(600);
    finished.attempt = finished.attempt.with_terminal(true);
    let session = open(&remote, finished);

    assert!(session.is_terminal());
    assert_eq!(
        session.request_submit(false).await.unwrap(),
        SubmitRequestOutcome::Ignored
    );
    assert!(matches!(
        session.execute_submit(false).await,
        Err(SubmitError::AlreadySubmitted(id)) if id == AttemptId::new("TA-1")
    ));
    assert!(!session.set_answer(&q1(), AnswerPayload::text("x")).unwrap());
    assert_eq!(
        session.trigger_save(SaveReason::Manual).await,
        DispatchOutcome::Skipped(SkipReason::Submitting)
    );
    assert!(remote.submits().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_submit_does_not_let_a_second_save_overlap_the_timed_out_flush() {
    let h = harness(
        FakeRemote::new().with_save_latency(Duration::from_secs(5)),
        600,
    );
    h.remote.fail_next_submits(1);
    h.session
        .set_answer(&q1(), AnswerPayload::text("slow network"))
        .unwrap();

    let SubmitRequestOutcome::ConfirmationRequired { flush, .. } =
        h.session.request_submit(false).await.unwrap()
    else {
        panic!("manual submit must ask for confirmation");
    };
    assert_eq!(flush, FlushOutcome::TimedOut);
    assert!(h.session.execute_submit(false).await.is_err());
    assert_eq!(h.session.save_state().status, SaveStatus::Error);

    assert_eq!(
        h.session.trigger_save(SaveReason::Manual).await,
        DispatchOutcome::Skipped(SkipReason::InFlight)
    );

    sleep(Duration::from_secs(20)).await;

    assert_eq!(h.remote.max_concurrent_saves(), 1);
    let saves = h.remote.saves();
    assert!(saves.len() >= 2, "the draft is saved again once the old call settles");
    assert_eq!(
        saves.last().unwrap().answers[&q1()].answer,
        Some(AnswerPayload::text("slow network"))
    );
}

#[tokio::test(start_paused = true)]
async fn flush_retries_after_an_earlier_failed_save() {
    let h = harness(FakeRemote::new(), 600);
    h.remote.fail_next_saves(1);
    h.session
        .set_answer(&q1(), AnswerPayload::text("retry me"))
        .unwrap();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(h.session.save_state().status, SaveStatus::Error);

    let outcome = h.session.request_submit(false).await.unwrap();

    assert_eq!(
        outcome,
        SubmitRequestOutcome::ConfirmationRequired {
            prompt: SubmitPrompt::Unanswered { count: 1, total: 2 },
            flush: FlushOutcome::Saved,
        }
    );
    assert_eq!(h.remote.saves().len(), 2);
    assert_eq!(h.session.save_state().status, SaveStatus::Saved);
}

#[tokio::test(start_paused = true)]
async fn failing_flush_is_reported_but_does_not_block_the_prompt() {
    let h = harness(FakeRemote::new(), 600);
    h.session
        .set_answer(&q1(), AnswerPayload::text("offline"))
        .unwrap();
    h.remote.fail_next_saves(1);

    let outcome = h.session.request_submit(false).await.unwrap();

    let SubmitRequestOutcome::ConfirmationRequired { prompt, flush } = outcome else {
        panic!("manual submit must ask for confirmation");
    };
    assert_eq!(flush, FlushOutcome::Failed);
    assert!(!flush.is_clean());
    assert_eq!(prompt, SubmitPrompt::Unanswered { count: 1, total: 2 });
    assert_eq!(h.session.save_state().status, SaveStatus::Error);
    assert!(h.remote.submits().is_empty());
}
