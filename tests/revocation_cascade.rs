mod support;

use authkeeper::error::AuthError;
use authkeeper::events::{AuthEvent, RevocationReason};
use authkeeper::repositories::RefreshTokenStore;

use support::{expect_authenticated, harness, meta};

#[tokio::test]
async fn sign_out_revokes_the_session_and_its_tokens() {
    let h = harness();
    h.add_user("user-1", "alice@example.com", "correct horse");
    let authenticated = expect_authenticated(
        h.service
            .sign_in("alice@example.com", "correct horse", &meta(), false)
            .await
            .unwrap(),
    );

    h.service.sign_out(&authenticated.session.id).await.unwrap();

    assert!(h.sessions.get(&authenticated.session.id).unwrap().revoked);
    let tokens = h
        .refresh_tokens
        .find_by_session(&authenticated.session.id)
        .await
        .unwrap();
    assert!(tokens.iter().all(|token| token.revoked));
    assert!(h.events.events().iter().any(|event| matches!(
        event,
        AuthEvent::SessionRevoked {
            reason: RevocationReason::UserInitiated,
            ..
        }
    )));
}

#[tokio::test]
async fn repeated_sign_out_is_idempotent_and_emits_once() {
    let h = harness();
    h.add_user("user-1", "alice@example.com", "correct horse");
    let authenticated = expect_authenticated(
        h.service
            .sign_in("alice@example.com", "correct horse", &meta(), false)
            .await
            .unwrap(),
    );

    h.service.sign_out(&authenticated.session.id).await.unwrap();
    h.service.sign_out(&authenticated.session.id).await.unwrap();

    let revoked_events = h
        .events
        .events()
        .iter()
        .filter(|event| matches!(event, AuthEvent::SessionRevoked { .. }))
        .count();
    assert_eq!(revoked_events, 1);
}

#[tokio::test]
async fn signing_out_an_unknown_session_is_rejected() {
    let h = harness();
    let result = h.service.sign_out("no-such-session").await;
    assert!(matches!(result, Err(AuthError::Unauthorized)));
}

#[tokio::test]
async fn sign_out_all_sweeps_every_live_session() {
    let h = harness();
    let user = h.add_user("user-1", "alice@example.com", "correct horse");

    let mut session_ids = Vec::new();
    for _ in 0..3 {
        let authenticated = expect_authenticated(
            h.service
                .sign_in("alice@example.com", "correct horse", &meta(), false)
                .await
                .unwrap(),
        );
        session_ids.push(authenticated.session.id);
    }

    let revoked = h.service.sign_out_all(&user.id).await.unwrap();
    assert_eq!(revoked, 3);
    for session_id in &session_ids {
        assert!(h.sessions.get(session_id).unwrap().revoked);
        let tokens = h.refresh_tokens.find_by_session(session_id).await.unwrap();
        assert!(tokens.iter().all(|token| token.revoked));
    }
    assert!(h.events.events().iter().any(|event| matches!(
        event,
        AuthEvent::AllSessionsRevoked {
            reason: RevocationReason::UserInitiated,
            revoked_count: 3,
            ..
        }
    )));

    // Everything is already revoked, so a second sweep counts nothing.
    let revoked = h.service.sign_out_all(&user.id).await.unwrap();
    assert_eq!(revoked, 0);
}

#[tokio::test]
async fn password_change_spares_only_the_originating_session() {
    let h = harness();
    let user = h.add_user("user-1", "alice@example.com", "old password");

    let current = expect_authenticated(
        h.service
            .sign_in("alice@example.com", "old password", &meta(), false)
            .await
            .unwrap(),
    );
    let other = expect_authenticated(
        h.service
            .sign_in("alice@example.com", "old password", &meta(), false)
            .await
            .unwrap(),
    );

    h.service
        .change_password(&user.id, &current.session.id, "old password", "new password")
        .await
        .unwrap();

    assert!(!h.sessions.get(&current.session.id).unwrap().revoked);
    assert!(h.sessions.get(&other.session.id).unwrap().revoked);
    assert!(h.events.events().iter().any(|event| matches!(
        event,
        AuthEvent::AllSessionsRevoked {
            reason: RevocationReason::PasswordChanged,
            revoked_count: 1,
            ..
        }
    )));

    // Old credentials are dead, new ones work.
    let result = h
        .service
        .sign_in("alice@example.com", "old password", &meta(), false)
        .await;
    assert!(matches!(result, Err(AuthError::Unauthorized)));
    expect_authenticated(
        h.service
            .sign_in("alice@example.com", "new password", &meta(), false)
            .await
            .unwrap(),
    );
}

#[tokio::test]
async fn password_change_demands_the_current_password() {
    let h = harness();
    let user = h.add_user("user-1", "alice@example.com", "old password");
    let current = expect_authenticated(
        h.service
            .sign_in("alice@example.com", "old password", &meta(), false)
            .await
            .unwrap(),
    );

    let result = h
        .service
        .change_password(&user.id, &current.session.id, "not the password", "new password")
        .await;
    assert!(matches!(result, Err(AuthError::Unauthorized)));

    // Nothing was revoked and the old password still signs in.
    assert!(!h.sessions.get(&current.session.id).unwrap().revoked);
    expect_authenticated(
        h.service
            .sign_in("alice@example.com", "old password", &meta(), false)
            .await
            .unwrap(),
    );
}
