// Integration tests for token issuance, rotation, replay detection and
// family revocation, driven through the token service against a real
// database.

mod common;

use hearth_backend_core::db::DieselPool;
use hearth_backend_core::services::{JwtCodec, TokenService};
use serial_test::serial;

fn test_service(pool: DieselPool) -> TokenService {
    let codec = JwtCodec::new(
        "integration-test-secret",
        "hearth-test".to_string(),
        600,
        2_419_200,
    );
    TokenService::new(codec, pool)
}

#[tokio::test]
#[serial]
async fn test_login_rejects_bad_credentials() {
    let Some(pool) = common::setup_test_pool().await else {
        return;
    };
    let user = common::create_test_user(&pool, false).await;
    let service = test_service(pool.clone());

    let result = service
        .login(&user.username, "wrong-password", "test-device")
        .await;
    assert!(result.is_err(), "wrong password must be rejected");

    let result = service
        .login("no-such-user", common::TEST_PASSWORD, "test-device")
        .await;
    assert!(result.is_err(), "unknown user must be rejected");

    common::cleanup_user(&pool, &user).await;
}

#[tokio::test]
#[serial]
async fn test_normal_rotation() {
    let Some(pool) = common::setup_test_pool().await else {
        return;
    };
    let user = common::create_test_user(&pool, false).await;
    let service = test_service(pool.clone());

    let pair = service
        .login(&user.username, common::TEST_PASSWORD, "test-device")
        .await
        .expect("login");

    let (verified, claims) = service
        .verify_access(&pair.access_token)
        .await
        .expect("initial access must verify");
    assert_eq!(verified.id, user.id);
    assert!(!claims.fresh);

    let rotated = service
        .refresh(&pair.refresh_token)
        .await
        .expect("rotation");

    service
        .verify_access(&rotated.access_token)
        .await
        .expect("rotated access must verify");

    common::cleanup_user(&pool, &user).await;
}

#[tokio::test]
#[serial]
async fn test_shaky_network_tolerates_lost_rotation() {
    let Some(pool) = common::setup_test_pool().await else {
        return;
    };
    let user = common::create_test_user(&pool, false).await;
    let service = test_service(pool.clone());

    let pair = service
        .login(&user.username, common::TEST_PASSWORD, "test-device")
        .await
        .expect("login");

    service
        .verify_access(&pair.access_token)
        .await
        .expect("access");

    // Client rotates but loses the response
    let _lost = service
        .refresh(&pair.refresh_token)
        .await
        .expect("first rotation");

    // Old access keeps working: nothing downstream was activated
    service
        .verify_access(&pair.access_token)
        .await
        .expect("old access after lost rotation");

    // The original refresh still rotates
    let second = service
        .refresh(&pair.refresh_token)
        .await
        .expect("second rotation on the same refresh");

    service
        .verify_access(&second.access_token)
        .await
        .expect("access from the second rotation");

    common::cleanup_user(&pool, &user).await;
}

#[tokio::test]
#[serial]
async fn test_hijack_after_user_keeps_chain() {
    let Some(pool) = common::setup_test_pool().await else {
        return;
    };
    let user = common::create_test_user(&pool, false).await;
    let service = test_service(pool.clone());

    let pair = service
        .login(&user.username, common::TEST_PASSWORD, "test-device")
        .await
        .expect("login");

    // Attacker steals the refresh credential and rotates silently
    let stolen = service
        .refresh(&pair.refresh_token)
        .await
        .expect("attacker rotation");

    // User continues normally and activates their own branch
    service
        .verify_access(&pair.access_token)
        .await
        .expect("user access");
    let user_pair = service
        .refresh(&pair.refresh_token)
        .await
        .expect("user rotation");
    service
        .verify_access(&user_pair.access_token)
        .await
        .expect("user activates new access");

    // The attacker's branch is now dead
    assert!(
        service.verify_access(&stolen.access_token).await.is_err(),
        "attacker access must be rejected"
    );
    assert!(
        service.refresh(&stolen.refresh_token).await.is_err(),
        "attacker refresh must be rejected and revoke the family"
    );

    // Detection burned the whole family, the user included
    assert!(
        service.refresh(&user_pair.refresh_token).await.is_err(),
        "family must be revoked after compromise detection"
    );

    common::cleanup_user(&pool, &user).await;
}

#[tokio::test]
#[serial]
async fn test_hijack_before_user_replay_revokes_family() {
    let Some(pool) = common::setup_test_pool().await else {
        return;
    };
    let user = common::create_test_user(&pool, false).await;
    let service = test_service(pool.clone());

    let pair = service
        .login(&user.username, common::TEST_PASSWORD, "test-device")
        .await
        .expect("login");

    // Attacker rotates first and uses the loot
    let stolen = service
        .refresh(&pair.refresh_token)
        .await
        .expect("attacker rotation");
    service
        .verify_access(&stolen.access_token)
        .await
        .expect("attacker activates their access");

    // The user's original pair is now behind the activated point
    assert!(
        service.verify_access(&pair.access_token).await.is_err(),
        "original access must be rejected"
    );
    assert!(
        service.refresh(&pair.refresh_token).await.is_err(),
        "original refresh replay must be rejected"
    );

    // The replay was the detection point; the attacker is out too
    assert!(
        service.verify_access(&stolen.access_token).await.is_err(),
        "attacker access must be dead after revocation"
    );
    assert!(
        service.refresh(&stolen.refresh_token).await.is_err(),
        "attacker refresh must be dead after revocation"
    );

    common::cleanup_user(&pool, &user).await;
}

#[tokio::test]
#[serial]
async fn test_rotation_race_first_activation_wins() {
    let Some(pool) = common::setup_test_pool().await else {
        return;
    };
    let user = common::create_test_user(&pool, false).await;
    let service = test_service(pool.clone());

    let pair = service
        .login(&user.username, common::TEST_PASSWORD, "test-device")
        .await
        .expect("login");

    // Two clients rotate the same refresh before either access is used
    let first = service
        .refresh(&pair.refresh_token)
        .await
        .expect("first racer");
    let second = service
        .refresh(&pair.refresh_token)
        .await
        .expect("second racer");

    // The second racer activates first and owns the chain
    service
        .verify_access(&second.access_token)
        .await
        .expect("winner's access");

    assert!(
        service.verify_access(&first.access_token).await.is_err(),
        "loser's access must be rejected"
    );
    assert!(
        service.refresh(&first.refresh_token).await.is_err(),
        "loser's refresh must be rejected"
    );
    assert!(
        service.refresh(&pair.refresh_token).await.is_err(),
        "root refresh must be rejected once the chain moved on"
    );

    common::cleanup_user(&pool, &user).await;
}

#[tokio::test]
#[serial]
async fn test_fresh_login_mints_fresh_access_only() {
    let Some(pool) = common::setup_test_pool().await else {
        return;
    };
    let user = common::create_test_user(&pool, false).await;
    let service = test_service(pool.clone());

    let pair = service
        .login(&user.username, common::TEST_PASSWORD, "test-device")
        .await
        .expect("login");

    let fresh_token = service
        .fresh_login(&user.username, common::TEST_PASSWORD, "test-device")
        .await
        .expect("fresh login");

    let (_, claims) = service
        .verify_access(&fresh_token)
        .await
        .expect("fresh access must verify");
    assert!(claims.fresh, "fresh-login access must carry the fresh claim");

    // The existing chain is untouched by a fresh login
    service
        .refresh(&pair.refresh_token)
        .await
        .expect("refresh chain survives fresh login");

    common::cleanup_user(&pool, &user).await;
}

#[tokio::test]
#[serial]
async fn test_logout_revokes_the_family() {
    let Some(pool) = common::setup_test_pool().await else {
        return;
    };
    let user = common::create_test_user(&pool, false).await;
    let service = test_service(pool.clone());

    let pair = service
        .login(&user.username, common::TEST_PASSWORD, "test-device")
        .await
        .expect("login");

    let (_, claims) = service
        .verify_access(&pair.access_token)
        .await
        .expect("access");

    service.logout(&claims).await.expect("logout");

    assert!(
        service.verify_access(&pair.access_token).await.is_err(),
        "access must be dead after logout"
    );
    assert!(
        service.refresh(&pair.refresh_token).await.is_err(),
        "refresh must be dead after logout"
    );

    common::cleanup_user(&pool, &user).await;
}

#[tokio::test]
#[serial]
async fn test_longlived_token_survives_chain_revocation() {
    let Some(pool) = common::setup_test_pool().await else {
        return;
    };
    let user = common::create_test_user(&pool, false).await;
    let service = test_service(pool.clone());

    let llt = service
        .create_longlived_token(user.id, "automation")
        .await
        .expect("llt");

    let pair = service
        .login(&user.username, common::TEST_PASSWORD, "test-device")
        .await
        .expect("login");

    // Trigger a family revocation on the login chain
    let stolen = service.refresh(&pair.refresh_token).await.expect("rotate");
    service
        .verify_access(&stolen.access_token)
        .await
        .expect("activate");
    assert!(service.refresh(&pair.refresh_token).await.is_err());

    // The llt sits outside any family and keeps working
    let (verified, claims) = service
        .verify_access(&llt)
        .await
        .expect("llt must still verify");
    assert_eq!(verified.id, user.id);
    assert_eq!(claims.exp, None);

    common::cleanup_user(&pool, &user).await;
}

#[tokio::test]
#[serial]
async fn test_session_listing_and_revocation() {
    let Some(pool) = common::setup_test_pool().await else {
        return;
    };
    let user = common::create_test_user(&pool, false).await;
    let service = test_service(pool.clone());

    let pair = service
        .login(&user.username, common::TEST_PASSWORD, "phone")
        .await
        .expect("login");
    service
        .create_longlived_token(user.id, "automation")
        .await
        .expect("llt");

    let sessions = service.list_sessions(user.id).await.expect("sessions");
    // One refresh root plus the llt; access records are not sessions
    assert_eq!(sessions.len(), 2);

    let refresh_session = sessions
        .iter()
        .find(|s| s.name == "phone")
        .expect("refresh session listed");

    service
        .revoke_session(user.id, refresh_session.id)
        .await
        .expect("revoke");

    assert!(
        service.verify_access(&pair.access_token).await.is_err(),
        "revoking the session kills its family"
    );

    common::cleanup_user(&pool, &user).await;
}
