// Transition-table tests for the sequence controller, driven on a paused
// tokio clock so clip lengths and the settle delay are deterministic. The
// cross-worker cancellation test at the end runs on real time.

mod common;

use common::*;
use recital_lib::{audio::Transport, models::SegmentId, playback::PlaybackMode};
use std::{sync::Arc, time::Duration};

#[tokio::test(start_paused = true)]
async fn play_all_visits_every_verse_in_order_and_ends_idle() {
    let fx = Fixture::uniform(3);

    let state = fx.controller.toggle_all().await;
    assert_eq!(state.mode, PlaybackMode::PlayingAll);

    let state = fx.wait_for_mode(PlaybackMode::Idle).await;
    assert_eq!(state.cursor_index, 0);
    assert_eq!(state.active_segment, None);
    assert_eq!(fx.audit.plays(), ids(&[1, 2, 3]));
    assert_eq!(fx.scroller.scrolled(), ids(&[1, 2, 3]));
    assert_eq!(fx.audit.max_audible(), 1);
    assert!(fx.transport(2).prepared() > 0, "next verse is warmed up");
    assert!(fx.transport(3).prepared() > 0, "next verse is warmed up");
}

#[tokio::test(start_paused = true)]
async fn toggle_all_twice_pauses_with_cursor_unchanged() {
    let fx = Fixture::uniform(3);

    fx.controller.toggle_all().await;
    tick(100).await;
    let state = fx.controller.toggle_all().await;

    assert_eq!(state.mode, PlaybackMode::PausedAll);
    assert_eq!(state.cursor_index, 0);
    assert!(fx.playing().is_empty());

    tick(5_000).await;
    assert_eq!(fx.audit.plays(), ids(&[1]), "a paused run never advances");
    assert_eq!(fx.state().await.mode, PlaybackMode::PausedAll);
}

#[tokio::test(start_paused = true)]
async fn resume_replays_the_paused_verse_from_the_start() {
    let fx = Fixture::uniform(3);

    fx.controller.toggle_all().await;
    fx.wait_for_active(2).await;
    tick(400).await;
    let paused = fx.controller.toggle_all().await;
    assert_eq!(paused.cursor_index, 1);
    assert_eq!(fx.transport(2).position(), Duration::ZERO);

    let resumed = fx.controller.toggle_all().await;
    assert_eq!(resumed.mode, PlaybackMode::PlayingAll);

    fx.wait_for_mode(PlaybackMode::Idle).await;
    assert_eq!(fx.audit.plays(), ids(&[1, 2, 2, 3]));
}

#[tokio::test(start_paused = true)]
async fn play_single_twice_returns_to_idle() {
    let fx = Fixture::uniform(3);

    let state = fx.controller.play_single(SegmentId(2)).await.unwrap();
    assert_eq!(state.mode, PlaybackMode::PlayingSingle);
    assert_eq!(state.active_segment, Some(SegmentId(2)));
    assert_eq!(fx.playing(), ids(&[2]));

    tick(100).await;
    let state = fx.controller.play_single(SegmentId(2)).await.unwrap();
    assert_eq!(state.mode, PlaybackMode::Idle);
    assert_eq!(state.cursor_index, 1);
    assert!(fx.playing().is_empty());
}

#[tokio::test(start_paused = true)]
async fn single_verse_running_out_returns_to_idle() {
    let fx = Fixture::uniform(3);

    fx.controller.play_single(SegmentId(3)).await.unwrap();
    let state = fx.wait_for_mode(PlaybackMode::Idle).await;

    assert_eq!(state.cursor_index, 2);
    assert_eq!(fx.audit.plays(), ids(&[3]));
}

#[tokio::test(start_paused = true)]
async fn switching_single_verses_keeps_one_audible() {
    let fx = Fixture::uniform(3);

    fx.controller.play_single(SegmentId(1)).await.unwrap();
    tick(100).await;
    fx.controller.play_single(SegmentId(3)).await.unwrap();

    assert_eq!(fx.playing(), ids(&[3]));
    assert_eq!(fx.audit.max_audible(), 1);
    assert_eq!(fx.transport(1).position(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn stopping_the_active_verse_of_a_run_pauses_the_run() {
    let fx = Fixture::uniform(3);

    fx.controller.toggle_all().await;
    fx.wait_for_active(2).await;
    let state = fx.controller.play_single(SegmentId(2)).await.unwrap();

    assert_eq!(state.mode, PlaybackMode::PausedAll);
    assert_eq!(state.cursor_index, 1);
    assert!(fx.playing().is_empty());

    fx.controller.toggle_all().await;
    fx.wait_for_mode(PlaybackMode::Idle).await;
    assert_eq!(fx.audit.plays(), ids(&[1, 2, 2, 3]));
}

#[tokio::test(start_paused = true)]
async fn interrupting_a_run_cancels_its_continuation() {
    let fx = Fixture::uniform(3);

    fx.controller.toggle_all().await;
    fx.wait_for_active(1).await;
    let state = fx.controller.play_single(SegmentId(3)).await.unwrap();
    assert_eq!(state.mode, PlaybackMode::PlayingSingle);
    assert_eq!(state.cursor_index, 2);

    let state = fx.wait_for_mode(PlaybackMode::PausedAll).await;
    assert_eq!(state.cursor_index, 2);

    tick(5_000).await;
    assert_eq!(fx.audit.plays(), ids(&[1, 3]), "stale run must not advance");
    assert_eq!(fx.audit.max_audible(), 1);

    fx.controller.toggle_all().await;
    fx.wait_for_mode(PlaybackMode::Idle).await;
    assert_eq!(fx.audit.plays(), ids(&[1, 3, 3]));
}

#[tokio::test(start_paused = true)]
async fn playing_the_same_verse_twice_after_interrupting_a_run_leaves_it_paused() {
    let fx = Fixture::uniform(3);

    fx.controller.toggle_all().await;
    fx.wait_for_active(1).await;
    fx.controller.play_single(SegmentId(2)).await.unwrap();
    tick(100).await;
    let state = fx.controller.play_single(SegmentId(2)).await.unwrap();

    assert_eq!(state.mode, PlaybackMode::PausedAll);
    assert_eq!(state.cursor_index, 1);
}

#[tokio::test(start_paused = true)]
async fn play_failure_moves_on_to_the_next_verse() {
    let fx = Fixture::new(&[Clip::Plays(CLIP), Clip::Fails, Clip::Plays(CLIP)]);

    fx.controller.toggle_all().await;
    fx.wait_for_active(3).await;
    fx.wait_for_mode(PlaybackMode::Idle).await;

    assert_eq!(fx.audit.plays(), ids(&[1, 2, 3]));
    assert_eq!(fx.scroller.scrolled(), ids(&[1, 2, 3]));
}

#[tokio::test(start_paused = true)]
async fn failed_single_play_falls_back_to_idle() {
    let fx = Fixture::new(&[Clip::Fails]);

    let state = fx.controller.play_single(SegmentId(1)).await.unwrap();
    assert_eq!(state.mode, PlaybackMode::Idle);
    assert!(fx.playing().is_empty());
}

#[tokio::test(start_paused = true)]
async fn verses_without_audio_are_skipped() {
    let fx = Fixture::new(&[Clip::Plays(CLIP), Clip::Missing, Clip::Plays(CLIP)]);

    fx.controller.toggle_all().await;
    fx.wait_for_mode(PlaybackMode::Idle).await;

    assert_eq!(fx.audit.plays(), ids(&[1, 3]));
    assert_eq!(fx.scroller.scrolled(), ids(&[1, 3]));

    let state = fx.controller.play_single(SegmentId(2)).await.unwrap();
    assert_eq!(state.mode, PlaybackMode::Idle, "no clip, nothing to play");
}

#[tokio::test(start_paused = true)]
async fn pausing_during_the_settle_delay_stops_the_advance() {
    let fx = Fixture::uniform(3);

    fx.controller.toggle_all().await;
    // verse 1 ends at 1s; the next one would start at 1.3s
    tick(1_100).await;
    let state = fx.controller.toggle_all().await;
    assert_eq!(state.mode, PlaybackMode::PausedAll);

    tick(3_000).await;
    assert_eq!(fx.audit.plays(), ids(&[1]));
}

#[tokio::test(start_paused = true)]
async fn stop_rewinds_to_idle() {
    let fx = Fixture::uniform(3);

    fx.controller.toggle_all().await;
    fx.wait_for_active(2).await;
    let state = fx.controller.stop().await;

    assert_eq!(state.mode, PlaybackMode::Idle);
    assert_eq!(state.cursor_index, 0);
    assert!(fx.playing().is_empty());

    tick(3_000).await;
    assert_eq!(fx.audit.plays(), ids(&[1, 2]));
}

#[tokio::test(start_paused = true)]
async fn unknown_verse_is_an_error() {
    let fx = Fixture::uniform(2);
    assert!(fx.controller.play_single(SegmentId(42)).await.is_err());
    assert_eq!(fx.state().await.mode, PlaybackMode::Idle);
}

#[tokio::test(start_paused = true)]
async fn position_reports_are_mirrored_into_state() {
    let fx = Fixture::new(&[Clip::Plays(Duration::from_secs(10))]);

    fx.controller.play_single(SegmentId(1)).await.unwrap();
    tick(10).await;
    fx.transport(1).report_position(Duration::from_millis(400));
    tick(10).await;

    assert_eq!(fx.state().await.position, Duration::from_millis(400));
}

#[tokio::test(start_paused = true)]
async fn shutdown_silences_everything() {
    let fx = Fixture::uniform(2);

    fx.controller.play_single(SegmentId(1)).await.unwrap();
    fx.controller.shutdown().await;

    assert!(fx.playing().is_empty());
    assert_eq!(fx.state().await.mode, PlaybackMode::Idle);
}

#[tokio::test(start_paused = true)]
async fn toggling_all_during_a_single_verse_runs_from_that_verse() {
    let fx = Fixture::uniform(3);

    fx.controller.play_single(SegmentId(2)).await.unwrap();
    tick(100).await;
    let state = fx.controller.toggle_all().await;
    assert_eq!(state.mode, PlaybackMode::PlayingAll);
    assert_eq!(state.cursor_index, 1);

    fx.wait_for_mode(PlaybackMode::Idle).await;
    assert_eq!(fx.audit.plays(), ids(&[2, 2, 3]));
    assert_eq!(fx.audit.max_audible(), 1);
}

// Real clock on two workers: the run is stuck inside a slow scroll on one
// worker while the pause lands from another.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn pausing_while_the_run_is_between_verses_leaves_nothing_sounding() {
    let scroller = Arc::new(RecordingScroller::blocking(Duration::from_millis(200)));
    let fx = Fixture::with_scroller(&[Clip::Plays(Duration::from_secs(5)); 3], scroller);

    fx.controller.toggle_all().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let state = fx.controller.toggle_all().await;

    assert_eq!(state.mode, PlaybackMode::PausedAll);
    assert!(fx.playing().is_empty(), "paused run left {:?} sounding", fx.playing());

    fx.controller.play_single(SegmentId(3)).await.unwrap();
    assert_eq!(fx.playing(), ids(&[3]));
    assert_eq!(fx.audit.max_audible(), 1);
}
