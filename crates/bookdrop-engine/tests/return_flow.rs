//! End-to-end tests for the return-processing engine.
//!
//! Each test runs the real pipeline — mock reader frames through the
//! bridge, the engine loop, and a scripted circulation backend — and
//! observes the UI notification stream plus the command frames sent back
//! to the reader.

mod common;

use common::{Kiosk, bin, mid, start, uid};

use bookdrop_core::MaterialStatus;
use bookdrop_engine::backend::BackendError;
use bookdrop_engine::{
    CheckInResponse, GENERIC_CHECKIN_FAILURE, TableSeriesDirectory, UiNotification,
};
use bookdrop_wire::ReaderCommand;

// ============================================================================
// Helpers
// ============================================================================

/// Directory where "AAAA0001"/"AAAA0002" form the two-disc material "m1".
fn two_disc_directory() -> TableSeriesDirectory {
    let mut directory = TableSeriesDirectory::new();
    directory.insert_series(mid("m1"), vec![uid("AAAA0001"), uid("AAAA0002")]);
    directory
}

/// Wait until `material` is reported `AwaitingAfi`.
///
/// The reader must not confirm an AFI write before the engine has processed
/// the backend reply; a real reader cannot answer a command that was never
/// sent either.
async fn await_awaiting_afi(kiosk: &mut Kiosk, material: &bookdrop_core::MaterialId) {
    kiosk
        .await_notification(|n| {
            matches!(n, UiNotification::MaterialUpdated(view)
                if view.id == *material && view.status == MaterialStatus::AwaitingAfi)
        })
        .await;
}

/// Run one unrelated single-tag material through to `Sorted`.
///
/// Because the engine processes events strictly in arrival order, a
/// completed sentinel return proves every earlier frame has been fully
/// processed — the test equivalent of a pipeline flush.
async fn complete_single_return(kiosk: &mut Kiosk, tag: &str) {
    kiosk
        .backend
        .script(&mid(tag), CheckInResponse::accepted(mid(tag)));
    kiosk.reader.present_tag(tag).await.unwrap();
    await_awaiting_afi(kiosk, &mid(tag)).await;
    kiosk.reader.confirm_afi(tag, 194, true).await.unwrap();
    kiosk
        .await_notification(|n| {
            matches!(n, UiNotification::MaterialSorted { material_id, .. } if material_id == &mid(tag))
        })
        .await;
}

fn assert_updated(notification: &UiNotification, status: MaterialStatus) {
    match notification {
        UiNotification::MaterialUpdated(view) => assert_eq!(view.status, status),
        other => panic!("expected MaterialUpdated({status}), got {other:?}"),
    }
}

// ============================================================================
// Scenario A: single tag, clean success
// ============================================================================

#[tokio::test]
async fn scenario_a_single_tag_success_ends_sorted_once() {
    let mut kiosk = start(TableSeriesDirectory::new());
    let material = mid("AAAA0001");

    kiosk.backend.script(
        &material,
        CheckInResponse::accepted(material.clone())
            .with_properties("Dune", "Frank Herbert")
            .with_sort_bin("1")
            .with_patron("patron17"),
    );

    kiosk.reader.present_tag("AAAA0001").await.unwrap();

    assert_updated(
        &kiosk.next_notification().await,
        MaterialStatus::CheckingIn,
    );

    let updated = kiosk.next_notification().await;
    assert_updated(&updated, MaterialStatus::AwaitingAfi);
    match updated {
        UiNotification::MaterialUpdated(view) => {
            assert_eq!(view.title.as_deref(), Some("Dune"));
            assert_eq!(view.author.as_deref(), Some("Frank Herbert"));
        }
        _ => unreachable!(),
    }

    // The engine asked the reader to secure the tag.
    assert_eq!(
        kiosk.next_command().await,
        ReaderCommand::SetAfi {
            uid: uid("AAAA0001"),
            afi: 194
        }
    );

    kiosk.reader.confirm_afi("AAAA0001", 194, true).await.unwrap();

    assert_eq!(
        kiosk.next_notification().await,
        UiNotification::MaterialSorted {
            material_id: material.clone(),
            bin: bin("bin1"),
        }
    );
    assert_updated(&kiosk.next_notification().await, MaterialStatus::Sorted);

    // Exactly one entry in the mapped bin, receipt recorded for the patron.
    let summary = kiosk.handle.end_session().await.unwrap();
    let bin1 = summary.bins.iter().find(|b| b.id == bin("bin1")).unwrap();
    assert_eq!(bin1.materials, vec![material]);
    assert_eq!(summary.receipts["patron17"].len(), 1);
}

// ============================================================================
// Scenario B: incomplete series never reaches the backend
// ============================================================================

#[tokio::test]
async fn scenario_b_incomplete_series_stays_collecting() {
    let mut kiosk = start(two_disc_directory());

    kiosk.reader.present_tag("AAAA0001").await.unwrap();

    // Flush the pipeline with an unrelated return, then check nothing
    // happened for the two-disc material.
    complete_single_return(&mut kiosk, "FFFF0001").await;

    let calls = kiosk.backend.calls();
    assert!(calls.iter().all(|(id, _)| id != &mid("m1")));

    let summary = kiosk.handle.end_session().await.unwrap();
    assert!(summary.bins.iter().all(|b| !b.contains(&mid("m1"))));
    assert!(!summary.receipts.contains_key("unknown") || summary.receipts["unknown"]
        .iter()
        .all(|r| r.item_identifier != mid("m1")));
}

#[tokio::test]
async fn complete_series_checks_in_exactly_once() {
    let mut kiosk = start(two_disc_directory());
    kiosk
        .backend
        .script(&mid("m1"), CheckInResponse::accepted(mid("m1")));

    // Both discs arrive in one bulk scan.
    kiosk
        .reader
        .present_tags(&["AAAA0001", "AAAA0002"])
        .await
        .unwrap();
    await_awaiting_afi(&mut kiosk, &mid("m1")).await;

    kiosk.reader.confirm_afi("AAAA0001", 194, true).await.unwrap();
    kiosk.reader.confirm_afi("AAAA0002", 194, true).await.unwrap();

    kiosk
        .await_notification(|n| matches!(n, UiNotification::MaterialSorted { .. }))
        .await;

    assert_eq!(kiosk.backend.calls().len(), 1);
}

// ============================================================================
// Scenario C: tag removed while awaiting AFI, then recovered
// ============================================================================

#[tokio::test]
async fn scenario_c_removal_during_afi_recovers_via_attention_set() {
    let mut kiosk = start(TableSeriesDirectory::new());
    let material = mid("AAAA0001");

    kiosk
        .backend
        .script(&material, CheckInResponse::accepted(material.clone()));

    kiosk.reader.present_tag("AAAA0001").await.unwrap();
    assert_updated(&kiosk.next_notification().await, MaterialStatus::CheckingIn);
    assert_updated(&kiosk.next_notification().await, MaterialStatus::AwaitingAfi);

    // The tag disappears before the AFI result comes back.
    kiosk.reader.remove_tag("AAAA0001").await.unwrap();
    assert_eq!(
        kiosk.next_notification().await,
        UiNotification::AttentionRequired {
            material_id: material.clone()
        }
    );

    // First secure command was sent on check-in; re-presenting the tag
    // re-issues it for that tag alone.
    assert_eq!(
        kiosk.next_command().await,
        ReaderCommand::SetAfi {
            uid: uid("AAAA0001"),
            afi: 194
        }
    );
    kiosk.reader.present_tag("AAAA0001").await.unwrap();
    assert_eq!(
        kiosk.next_command().await,
        ReaderCommand::SetAfi {
            uid: uid("AAAA0001"),
            afi: 194
        }
    );

    kiosk.reader.confirm_afi("AAAA0001", 194, true).await.unwrap();

    assert!(matches!(
        kiosk.next_notification().await,
        UiNotification::MaterialSorted { .. }
    ));
    assert_eq!(
        kiosk.next_notification().await,
        UiNotification::AttentionCleared
    );
    assert_updated(&kiosk.next_notification().await, MaterialStatus::Sorted);
}

#[tokio::test]
async fn removal_during_check_in_parks_material_after_accept() {
    let mut kiosk = start(TableSeriesDirectory::new());
    let material = mid("AAAA0001");

    kiosk
        .backend
        .script(&material, CheckInResponse::accepted(material.clone()));
    kiosk.backend.hold(&material);

    kiosk.reader.present_tag("AAAA0001").await.unwrap();
    assert_updated(&kiosk.next_notification().await, MaterialStatus::CheckingIn);

    // Tag walks away while the backend is still thinking. The garbage
    // frame afterwards acts as a barrier: its BridgeIssue notification
    // proves the removal has been processed before the reply is released.
    kiosk.reader.remove_tag("AAAA0001").await.unwrap();
    kiosk.reader.send_frame("{barrier").await.unwrap();
    kiosk
        .await_notification(|n| matches!(n, UiNotification::BridgeIssue { .. }))
        .await;
    kiosk.backend.release(&material);

    // The accept still lands; the material goes straight into the
    // attention set because its tag is gone.
    assert_eq!(
        kiosk.next_notification().await,
        UiNotification::AttentionRequired {
            material_id: material.clone()
        }
    );
    assert_updated(&kiosk.next_notification().await, MaterialStatus::AwaitingAfi);

    // Recovery is the same path as scenario C.
    kiosk.reader.present_tag("AAAA0001").await.unwrap();
    kiosk.reader.confirm_afi("AAAA0001", 194, true).await.unwrap();
    kiosk
        .await_notification(|n| matches!(n, UiNotification::AttentionCleared))
        .await;
}

// ============================================================================
// Scenario D: backend rejection
// ============================================================================

#[tokio::test]
async fn scenario_d_rejection_preserves_screen_message() {
    let mut kiosk = start(TableSeriesDirectory::new());
    let material = mid("AAAA0001");

    kiosk.backend.script(
        &material,
        CheckInResponse::rejected(material.clone(), "Item not checked out"),
    );

    kiosk.reader.present_tag("AAAA0001").await.unwrap();
    assert_updated(&kiosk.next_notification().await, MaterialStatus::CheckingIn);

    assert_eq!(
        kiosk.next_notification().await,
        UiNotification::MaterialFailed {
            material_id: material.clone(),
            message: "Item not checked out".to_string(),
        }
    );

    // Failed materials reach no bin and no receipt.
    let summary = kiosk.handle.end_session().await.unwrap();
    assert!(summary.bins.iter().all(|b| b.is_empty()));
    assert!(summary.receipts.is_empty());
}

#[tokio::test]
async fn backend_transport_failure_uses_generic_reason() {
    let mut kiosk = start(TableSeriesDirectory::new());
    let material = mid("AAAA0001");

    kiosk
        .backend
        .script_failure(&material, BackendError::Timeout(5000));

    kiosk.reader.present_tag("AAAA0001").await.unwrap();
    assert_updated(&kiosk.next_notification().await, MaterialStatus::CheckingIn);
    assert_eq!(
        kiosk.next_notification().await,
        UiNotification::MaterialFailed {
            material_id: material.clone(),
            message: GENERIC_CHECKIN_FAILURE.to_string(),
        }
    );

    // Re-presenting the tag starts a fresh attempt, which may now succeed.
    kiosk
        .backend
        .script(&material, CheckInResponse::accepted(material.clone()));
    kiosk.reader.present_tag("AAAA0001").await.unwrap();
    await_awaiting_afi(&mut kiosk, &material).await;
    kiosk.reader.confirm_afi("AAAA0001", 194, true).await.unwrap();
    kiosk
        .await_notification(|n| matches!(n, UiNotification::MaterialSorted { .. }))
        .await;
}

// ============================================================================
// Scenario E: unmapped sort code falls back to the default bin
// ============================================================================

#[tokio::test]
async fn scenario_e_unmapped_sort_code_routes_to_default_bin() {
    let mut kiosk = start(TableSeriesDirectory::new());
    let material = mid("AAAA0001");

    kiosk.backend.script(
        &material,
        CheckInResponse::accepted(material.clone()).with_sort_bin("3"),
    );

    kiosk.reader.present_tag("AAAA0001").await.unwrap();
    await_awaiting_afi(&mut kiosk, &material).await;
    kiosk.reader.confirm_afi("AAAA0001", 194, true).await.unwrap();

    assert_eq!(
        kiosk
            .await_notification(|n| matches!(n, UiNotification::MaterialSorted { .. }))
            .await,
        UiNotification::MaterialSorted {
            material_id: material,
            bin: bin("bin3"),
        }
    );
}

// ============================================================================
// Idempotence and monotonicity
// ============================================================================

#[tokio::test]
async fn duplicate_afi_confirmations_do_not_duplicate_bin_entries() {
    let mut kiosk = start(two_disc_directory());
    kiosk
        .backend
        .script(&mid("m1"), CheckInResponse::accepted(mid("m1")));

    kiosk
        .reader
        .present_tags(&["AAAA0001", "AAAA0002"])
        .await
        .unwrap();
    await_awaiting_afi(&mut kiosk, &mid("m1")).await;

    // The first disc confirms twice; the material must not sort until the
    // second disc is confirmed as well.
    kiosk.reader.confirm_afi("AAAA0001", 194, true).await.unwrap();
    kiosk.reader.confirm_afi("AAAA0001", 194, true).await.unwrap();
    kiosk.reader.confirm_afi("AAAA0002", 194, true).await.unwrap();

    kiosk
        .await_notification(|n| matches!(n, UiNotification::MaterialSorted { .. }))
        .await;

    let summary = kiosk.handle.end_session().await.unwrap();
    let bin3 = summary.bins.iter().find(|b| b.id == bin("bin3")).unwrap();
    assert_eq!(bin3.materials, vec![mid("m1")]);
}

#[tokio::test]
async fn afi_off_confirmation_never_reverts_a_secured_tag() {
    let mut kiosk = start(two_disc_directory());
    kiosk
        .backend
        .script(&mid("m1"), CheckInResponse::accepted(mid("m1")));

    kiosk
        .reader
        .present_tags(&["AAAA0001", "AAAA0002"])
        .await
        .unwrap();
    await_awaiting_afi(&mut kiosk, &mid("m1")).await;

    kiosk.reader.confirm_afi("AAAA0001", 194, true).await.unwrap();
    // A stray "off" confirmation for the secured tag must be ignored.
    kiosk.reader.confirm_afi("AAAA0001", 7, true).await.unwrap();
    kiosk.reader.confirm_afi("AAAA0002", 194, true).await.unwrap();

    // Sorting still happens: the first tag stayed confirmed.
    kiosk
        .await_notification(|n| matches!(n, UiNotification::MaterialSorted { .. }))
        .await;
}

#[tokio::test]
async fn failed_afi_write_surfaces_and_is_retryable() {
    let mut kiosk = start(TableSeriesDirectory::new());
    let material = mid("AAAA0001");
    kiosk
        .backend
        .script(&material, CheckInResponse::accepted(material.clone()));

    kiosk.reader.present_tag("AAAA0001").await.unwrap();
    await_awaiting_afi(&mut kiosk, &material).await;
    kiosk.reader.confirm_afi("AAAA0001", 194, false).await.unwrap();

    assert_eq!(
        kiosk
            .await_notification(|n| matches!(n, UiNotification::BridgeIssue { .. }))
            .await,
        UiNotification::BridgeIssue {
            reason: "AFI not set".to_string()
        }
    );

    // The material is still awaiting; a successful write completes it.
    kiosk.reader.confirm_afi("AAAA0001", 194, true).await.unwrap();
    kiosk
        .await_notification(|n| matches!(n, UiNotification::MaterialSorted { .. }))
        .await;
}

// ============================================================================
// In-flight deduplication and shared session timestamp
// ============================================================================

#[tokio::test]
async fn second_completeness_trigger_during_check_in_is_not_duplicated() {
    let mut kiosk = start(TableSeriesDirectory::new());
    let material = mid("AAAA0001");

    kiosk
        .backend
        .script(&material, CheckInResponse::accepted(material.clone()));
    kiosk.backend.hold(&material);

    kiosk.reader.present_tag("AAAA0001").await.unwrap();
    assert_updated(&kiosk.next_notification().await, MaterialStatus::CheckingIn);

    // Duplicate detection while the call is in flight.
    kiosk.reader.present_tag("AAAA0001").await.unwrap();
    kiosk.backend.release(&material);
    await_awaiting_afi(&mut kiosk, &material).await;

    kiosk.reader.confirm_afi("AAAA0001", 194, true).await.unwrap();
    kiosk
        .await_notification(|n| matches!(n, UiNotification::MaterialSorted { .. }))
        .await;

    assert_eq!(kiosk.backend.calls().len(), 1);
}

#[tokio::test]
async fn all_check_ins_carry_the_session_timestamp() {
    let mut kiosk = start(TableSeriesDirectory::new());
    for tag in ["AAAA0001", "BBBB0001"] {
        complete_single_return(&mut kiosk, tag).await;
    }

    let calls = kiosk.backend.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].1, calls[1].1);
}

// ============================================================================
// Bridge-level behavior through the engine
// ============================================================================

#[tokio::test]
async fn reader_handshake_triggers_scan_request() {
    let mut kiosk = start(TableSeriesDirectory::new());

    kiosk.reader.announce().await.unwrap();
    assert_eq!(kiosk.next_notification().await, UiNotification::ReaderReady);
    assert_eq!(kiosk.next_command().await, ReaderCommand::DetectTags);
}

#[tokio::test]
async fn malformed_frames_surface_as_bridge_issues_only() {
    let mut kiosk = start(TableSeriesDirectory::new());

    kiosk.reader.send_frame("{broken").await.unwrap();
    match kiosk.next_notification().await {
        UiNotification::BridgeIssue { reason } => {
            assert!(reason.starts_with("JSON parse error: "));
        }
        other => panic!("unexpected notification: {other:?}"),
    }

    // The engine task is alive and still fully operational afterwards.
    assert!(!kiosk.engine.is_finished());
    complete_single_return(&mut kiosk, "AAAA0001").await;
}

// ============================================================================
// Session teardown
// ============================================================================

#[tokio::test]
async fn late_reply_after_session_end_is_ignored() {
    let mut kiosk = start(TableSeriesDirectory::new());
    let material = mid("AAAA0001");

    kiosk
        .backend
        .script(&material, CheckInResponse::accepted(material.clone()));
    kiosk.backend.hold(&material);

    kiosk.reader.present_tag("AAAA0001").await.unwrap();
    assert_updated(&kiosk.next_notification().await, MaterialStatus::CheckingIn);

    // Patron logs out with the call still in flight.
    let summary = kiosk.handle.end_session().await.unwrap();
    assert!(summary.receipts.is_empty());

    // The reply lands in the fresh session for a now-unknown material.
    kiosk.backend.release(&material);

    // Pipeline flush: only the sentinel's notifications appear.
    kiosk
        .backend
        .script(&mid("FFFF0001"), CheckInResponse::accepted(mid("FFFF0001")));
    kiosk.reader.present_tag("FFFF0001").await.unwrap();
    loop {
        match kiosk.next_notification().await {
            UiNotification::MaterialUpdated(view) => {
                assert_eq!(view.id, mid("FFFF0001"));
                if view.status == MaterialStatus::AwaitingAfi {
                    break;
                }
            }
            UiNotification::MaterialFailed { material_id, .. } => {
                panic!("unexpected failure for {material_id}")
            }
            other => panic!("unexpected notification: {other:?}"),
        }
    }
    kiosk.reader.confirm_afi("FFFF0001", 194, true).await.unwrap();
    loop {
        match kiosk.next_notification().await {
            UiNotification::MaterialSorted { material_id, .. } => {
                assert_eq!(material_id, mid("FFFF0001"));
                break;
            }
            UiNotification::MaterialUpdated(view) => assert_eq!(view.id, mid("FFFF0001")),
            UiNotification::MaterialFailed { material_id, .. } => {
                panic!("unexpected failure for {material_id}")
            }
            other => panic!("unexpected notification: {other:?}"),
        }
    }

    let summary = kiosk.handle.end_session().await.unwrap();
    assert_eq!(summary.receipts["unknown"].len(), 1);
    assert_eq!(
        summary.receipts["unknown"][0].item_identifier,
        mid("FFFF0001")
    );
}

#[tokio::test]
async fn sessions_are_independent() {
    let mut kiosk = start(TableSeriesDirectory::new());

    complete_single_return(&mut kiosk, "AAAA0001").await;
    let first = kiosk.handle.end_session().await.unwrap();

    complete_single_return(&mut kiosk, "BBBB0001").await;
    let second = kiosk.handle.end_session().await.unwrap();

    assert_ne!(first.session_id, second.session_id);
    // The first session's bin contents did not leak into the second.
    let total_second: usize = second.bins.iter().map(|b| b.len()).sum();
    assert_eq!(total_second, 1);
}

// ============================================================================
// Concurrent materials
// ============================================================================

#[tokio::test]
async fn materials_progress_independently_while_one_is_in_flight() {
    let mut kiosk = start(TableSeriesDirectory::new());
    let slow = mid("AAAA0001");
    let fast = mid("BBBB0001");

    kiosk
        .backend
        .script(&slow, CheckInResponse::accepted(slow.clone()));
    kiosk
        .backend
        .script(&fast, CheckInResponse::accepted(fast.clone()));
    kiosk.backend.hold(&slow);

    // The slow material's check-in is parked; the fast one overtakes it.
    kiosk.reader.present_tag("AAAA0001").await.unwrap();
    kiosk.reader.present_tag("BBBB0001").await.unwrap();
    await_awaiting_afi(&mut kiosk, &fast).await;
    kiosk.reader.confirm_afi("BBBB0001", 194, true).await.unwrap();

    assert_eq!(
        kiosk
            .await_notification(|n| matches!(n, UiNotification::MaterialSorted { .. }))
            .await,
        UiNotification::MaterialSorted {
            material_id: fast,
            bin: bin("bin3"),
        }
    );

    // Now let the slow one finish.
    kiosk.backend.release(&slow);
    await_awaiting_afi(&mut kiosk, &slow).await;
    kiosk.reader.confirm_afi("AAAA0001", 194, true).await.unwrap();
    assert_eq!(
        kiosk
            .await_notification(|n| matches!(n, UiNotification::MaterialSorted { .. }))
            .await,
        UiNotification::MaterialSorted {
            material_id: slow,
            bin: bin("bin3"),
        }
    );
}
