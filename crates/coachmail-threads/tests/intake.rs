// SPDX-FileCopyrightText: 2026 Coachmail Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The serialized intake path and engine-level event routing.

mod common;

use chrono::{Duration, Utc};

use coachmail_config::CoachmailConfig;
use coachmail_core::types::{MemberInfo, MessageType};
use coachmail_core::{CommunityId, MessageId};
use coachmail_threads::{sweeps, MailEngine};

use common::{dm, harness, harness_with, staff, user};

#[tokio::test]
async fn a_burst_of_dms_creates_exactly_one_thread() {
    let h = harness().await;
    let engine = MailEngine::new(h.ctx.clone());
    let u = user("3001", "Eager");

    for i in 0..10 {
        engine.handle_private_message(u.clone(), dm(&format!("m{i}"), &u, &format!("ping {i}")));
    }
    h.ctx.queue.flush().await;

    assert_eq!(h.gateway.created_channels().await.len(), 1);
    assert!(engine
        .registry()
        .find_open_by_user(&u.id)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn messages_after_creation_are_relayed_not_recreated() {
    let h = harness().await;
    let engine = MailEngine::new(h.ctx.clone());
    let u = user("3002", "Talker");

    engine.handle_private_message(u.clone(), dm("m1", &u, "opening message"));
    h.ctx.queue.flush().await;
    engine.handle_private_message(u.clone(), dm("m2", &u, "follow-up detail"));
    h.ctx.queue.flush().await;

    let thread = engine
        .registry()
        .find_open_by_user(&u.id)
        .await
        .unwrap()
        .unwrap();
    let row = thread.snapshot().await.unwrap();
    let posts = h.gateway.messages_in(&row.channel_id).await;
    // The triggering first DM opens the survey instead of being relayed.
    assert!(!posts.iter().any(|m| m.content.contains("opening message")));
    assert!(posts.iter().any(|m| m.content.contains("follow-up detail")));
}

#[tokio::test]
async fn accidental_first_messages_create_nothing() {
    let h = harness().await;
    let engine = MailEngine::new(h.ctx.clone());
    let u = user("3003", "Polite");

    engine.handle_private_message(u.clone(), dm("m1", &u, "  Thanks  "));
    h.ctx.queue.flush().await;

    assert!(h.gateway.created_channels().await.is_empty());
    assert!(engine
        .registry()
        .find_open_by_user(&u.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn accidental_phrases_still_relay_into_an_existing_thread() {
    let h = harness().await;
    let engine = MailEngine::new(h.ctx.clone());
    let u = user("3004", "Grateful");

    engine.handle_private_message(u.clone(), dm("m1", &u, "I need help"));
    h.ctx.queue.flush().await;
    engine.handle_private_message(u.clone(), dm("m2", &u, "thanks"));
    h.ctx.queue.flush().await;

    let thread = engine
        .registry()
        .find_open_by_user(&u.id)
        .await
        .unwrap()
        .unwrap();
    let row = thread.snapshot().await.unwrap();
    assert!(h
        .gateway
        .messages_in(&row.channel_id)
        .await
        .iter()
        .any(|m| m.content.contains("thanks")));
}

#[tokio::test]
async fn account_age_gate_denies_with_a_dm_and_no_thread() {
    let mut config = CoachmailConfig::default();
    config.threads.required_account_age_hours = Some(72);
    config.threads.account_age_denied_message =
        Some("Your account is too new to open a thread.".to_string());
    let h = harness_with(config).await;
    let engine = MailEngine::new(h.ctx.clone());

    let mut newcomer = user("3005", "Fresh");
    newcomer.registered_at = Utc::now() - Duration::hours(1);
    engine.handle_private_message(newcomer.clone(), dm("m1", &newcomer, "hi"));
    h.ctx.queue.flush().await;

    assert!(h.gateway.created_channels().await.is_empty());
    let dms = h.gateway.dms_to(&newcomer.id).await;
    assert_eq!(dms.len(), 1);
    assert!(dms[0].content.contains("too new"));
}

#[tokio::test]
async fn tenure_gate_passes_users_invisible_in_every_community() {
    let mut config = CoachmailConfig::default();
    config.threads.communities = vec!["guild-1".to_string()];
    config.threads.required_time_on_server_minutes = Some(60);
    let h = harness_with(config).await;
    let engine = MailEngine::new(h.ctx.clone());

    // No membership data seeded: absence passes the gate.
    let u = user("3006", "Outsider");
    engine.handle_private_message(u.clone(), dm("m1", &u, "hello"));
    h.ctx.queue.flush().await;
    assert_eq!(h.gateway.created_channels().await.len(), 1);
}

#[tokio::test]
async fn tenure_gate_denies_short_tenure_members() {
    let mut config = CoachmailConfig::default();
    config.threads.communities = vec!["guild-1".to_string()];
    config.threads.required_time_on_server_minutes = Some(60);
    let h = harness_with(config).await;
    let engine = MailEngine::new(h.ctx.clone());

    let u = user("3007", "Newjoin");
    h.gateway
        .set_member(
            &CommunityId("guild-1".into()),
            &u.id,
            MemberInfo {
                community: CommunityId("guild-1".into()),
                community_name: "Guild One".to_string(),
                nickname: "newjoin".to_string(),
                joined_at: Utc::now() - Duration::minutes(5),
                voice_channel: None,
                roles: vec![],
            },
        )
        .await;

    engine.handle_private_message(u.clone(), dm("m1", &u, "hello"));
    h.ctx.queue.flush().await;
    assert!(h.gateway.created_channels().await.is_empty());
}

#[tokio::test]
async fn header_summarizes_membership_facts() {
    let mut config = CoachmailConfig::default();
    config.threads.communities = vec!["guild-1".to_string()];
    let h = harness_with(config).await;
    let engine = MailEngine::new(h.ctx.clone());

    let u = user("3008", "Veteran");
    h.gateway
        .set_member(
            &CommunityId("guild-1".into()),
            &u.id,
            MemberInfo {
                community: CommunityId("guild-1".into()),
                community_name: "Guild One".to_string(),
                nickname: "vet".to_string(),
                joined_at: Utc::now() - Duration::days(100),
                voice_channel: Some("Practice Range".to_string()),
                roles: vec!["Member".to_string(), "Veteran".to_string()],
            },
        )
        .await;

    engine.handle_private_message(u.clone(), dm("m1", &u, "hello"));
    h.ctx.queue.flush().await;

    let thread = engine
        .registry()
        .find_open_by_user(&u.id)
        .await
        .unwrap()
        .unwrap();
    let row = thread.snapshot().await.unwrap();
    let header = h
        .gateway
        .messages_in(&row.channel_id)
        .await
        .into_iter()
        .find(|m| m.content.contains("Guild One"))
        .expect("header posted");
    for needle in ["Veteran", "vet", "3 months", "Practice Range", "Member"] {
        assert!(header.content.contains(needle), "missing {needle}");
    }
}

#[tokio::test]
async fn channel_names_are_slugged_with_an_id_suffix() {
    let h = harness().await;
    let engine = MailEngine::new(h.ctx.clone());
    let u = user("987654", "Söme Üser");
    engine.handle_private_message(u.clone(), dm("m1", &u, "hello"));
    h.ctx.queue.flush().await;

    let created = h.gateway.created_channels().await;
    assert_eq!(created.len(), 1);
    assert!(created[0].0.ends_with("-7654"));
    assert!(created[0].0.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
}

#[tokio::test]
async fn staff_messages_route_by_autoreply_membership() {
    let h = harness().await;
    let engine = MailEngine::new(h.ctx.clone());
    let u = user("3009", "Coached");
    engine.handle_private_message(u.clone(), dm("m1", &u, "hello"));
    h.ctx.queue.flush().await;

    let thread = engine
        .registry()
        .find_open_by_user(&u.id)
        .await
        .unwrap()
        .unwrap();
    let row = thread.snapshot().await.unwrap();
    let coach = staff("9001", "Coach");

    // Not in the autoreply set: logged as chatter, not delivered.
    engine
        .handle_staff_message(&row.channel_id, &coach, "internal note", &[], &MessageId("s1".into()))
        .await
        .unwrap();
    let dms_before = h.gateway.dms_to(&u.id).await.len();
    let log = thread.messages().await.unwrap();
    assert!(log
        .iter()
        .any(|m| m.message_type == MessageType::Chat && m.body == "internal note"));

    // In the set: the same path becomes a relayed reply.
    thread.toggle_autoreply(&coach.id).await.unwrap();
    engine
        .handle_staff_message(&row.channel_id, &coach, "do this drill", &[], &MessageId("s2".into()))
        .await
        .unwrap();
    let dms = h.gateway.dms_to(&u.id).await;
    assert_eq!(dms.len(), dms_before + 1);
    assert!(dms.last().unwrap().content.contains("do this drill"));
}

#[tokio::test]
async fn dm_edits_post_a_before_after_note() {
    let h = harness().await;
    let engine = MailEngine::new(h.ctx.clone());
    let u = user("3010", "Editor");
    engine.handle_private_message(u.clone(), dm("m1", &u, "hello"));
    h.ctx.queue.flush().await;
    engine.handle_private_message(u.clone(), dm("m2", &u, "original wording"));
    h.ctx.queue.flush().await;

    engine
        .handle_dm_edit(&u.id, &MessageId("m2".into()), "revised wording")
        .await
        .unwrap();

    let thread = engine
        .registry()
        .find_open_by_user(&u.id)
        .await
        .unwrap()
        .unwrap();
    let row = thread.snapshot().await.unwrap();
    let note = h
        .gateway
        .messages_in(&row.channel_id)
        .await
        .into_iter()
        .find(|m| m.content.contains("edited a message"))
        .expect("edit note posted");
    assert!(note.content.contains("original wording"));
    assert!(note.content.contains("revised wording"));
    // The transcript keeps the original body.
    assert!(thread
        .messages()
        .await
        .unwrap()
        .iter()
        .any(|m| m.body.contains("original wording")));
}

#[tokio::test]
async fn membership_changes_are_noted_in_open_threads() {
    let h = harness().await;
    let engine = MailEngine::new(h.ctx.clone());
    let u = user("3011", "Leaver");
    engine.handle_private_message(u.clone(), dm("m1", &u, "hello"));
    h.ctx.queue.flush().await;

    engine.handle_member_left(&u.id).await.unwrap();
    engine.handle_member_rejoined(&u.id).await.unwrap();

    let thread = engine
        .registry()
        .find_open_by_user(&u.id)
        .await
        .unwrap()
        .unwrap();
    let row = thread.snapshot().await.unwrap();
    let posts = h.gateway.messages_in(&row.channel_id).await;
    assert!(posts.iter().any(|m| m.content.contains("left the community")));
    assert!(posts.iter().any(|m| m.content.contains("rejoined the community")));
}

#[tokio::test]
async fn expiry_sweep_reports_unfinished_surveys_only_when_enabled() {
    let mut config = CoachmailConfig::default();
    config.scheduler.gather_timeout_minutes = Some(30);
    let h = harness_with(config).await;
    let engine = MailEngine::new(h.ctx.clone());
    let u = user("3012", "Stalled");
    engine.handle_private_message(u.clone(), dm("m1", &u, "hello"));
    h.ctx.queue.flush().await;

    let later = Utc::now() + Duration::minutes(31);
    let expired = sweeps::expired_incomplete_threads(&h.ctx, later).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].user_id, u.id);

    // Not yet past the cutoff: empty.
    let soon = Utc::now() + Duration::minutes(10);
    assert!(sweeps::expired_incomplete_threads(&h.ctx, soon)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn closed_thread_history_is_queryable() {
    let h = harness().await;
    let engine = MailEngine::new(h.ctx.clone());
    let registry = engine.registry();
    let u = user("3013", "Returning");

    for _ in 0..2 {
        let thread = registry.create(&u, true, true).await.unwrap().unwrap();
        thread.close(true, true).await.unwrap();
    }

    assert_eq!(registry.closed_thread_count_by_user(&u.id).await.unwrap(), 2);
    assert_eq!(registry.closed_threads_by_user(&u.id).await.unwrap().len(), 2);
}
