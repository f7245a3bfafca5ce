mod common;

use axum::http::{Method, StatusCode};

use common::TestApp;

const LIKES: &str = "SELECT likes_count FROM posts WHERE id = ?1";
const DISLIKES: &str = "SELECT dislikes_count FROM posts WHERE id = ?1";
const LIKE_ROWS: &str = "SELECT COUNT(*) FROM reactions WHERE post_id = ?1 AND kind = 'like'";
const DISLIKE_ROWS: &str = "SELECT COUNT(*) FROM reactions WHERE post_id = ?1 AND kind = 'dislike'";

fn assert_consistent(app: &TestApp, post_id: &str) {
    assert_eq!(app.count(LIKES, post_id), app.count(LIKE_ROWS, post_id));
    assert_eq!(app.count(DISLIKES, post_id), app.count(DISLIKE_ROWS, post_id));
}

#[tokio::test]
async fn like_dislike_remove_scenario() {
    let app = TestApp::new();
    let (_, admin) = app.admin("root@example.com").await;
    let (_, alice) = app.register("alice", "alice@example.com").await;
    let id = app.blog(&admin, "reacted").await;
    let base = format!("/api/v1/reactions/blog/{}", id);

    let like = app
        .send(Method::POST, &format!("{}/like", base), Some(&alice), None)
        .await;
    assert_eq!(like.status, StatusCode::CREATED);
    assert_eq!(like.body["message"], "Blog liked");
    assert_eq!(like.body["data"]["reaction"], "like");
    assert_eq!(like.body["data"]["likesCount"], 1);
    assert_eq!(like.body["data"]["dislikesCount"], 0);

    let switch = app
        .send(Method::POST, &format!("{}/dislike", base), Some(&alice), None)
        .await;
    assert_eq!(switch.status, StatusCode::OK);
    assert_eq!(switch.body["message"], "Changed to dislike");
    assert_eq!(switch.body["data"]["reaction"], "dislike");
    assert_eq!(switch.body["data"]["likesCount"], 0);
    assert_eq!(switch.body["data"]["dislikesCount"], 1);

    let toggle_off = app
        .send(Method::POST, &format!("{}/dislike", base), Some(&alice), None)
        .await;
    assert_eq!(toggle_off.status, StatusCode::OK);
    assert_eq!(toggle_off.body["message"], "Dislike removed");
    assert!(toggle_off.body["data"]["reaction"].is_null());
    assert_eq!(toggle_off.body["data"]["dislikesCount"], 0);

    app.send(Method::POST, &format!("{}/like", base), Some(&alice), None)
        .await;
    let removed = app
        .send(Method::DELETE, &format!("{}/reaction", base), Some(&alice), None)
        .await;
    assert_eq!(removed.status, StatusCode::OK);
    assert_eq!(removed.body["message"], "Reaction removed");
    assert_eq!(removed.body["data"]["likesCount"], 0);

    let nothing = app
        .send(Method::DELETE, &format!("{}/reaction", base), Some(&alice), None)
        .await;
    assert_eq!(nothing.status, StatusCode::NOT_FOUND);
    assert_eq!(nothing.body["message"], "No reaction found");

    assert_consistent(&app, &id);
}

#[tokio::test]
async fn reactions_require_a_regular_user() {
    let app = TestApp::new();
    let (_, admin) = app.admin("root@example.com").await;
    let id = app.blog(&admin, "guarded").await;
    let uri = format!("/api/v1/reactions/blog/{}/like", id);

    let anonymous = app.send(Method::POST, &uri, None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let as_admin = app.send(Method::POST, &uri, Some(&admin), None).await;
    assert_eq!(as_admin.status, StatusCode::FORBIDDEN);

    assert_eq!(app.count(LIKES, &id), 0);
}

#[tokio::test]
async fn reacting_to_missing_blog_is_not_found() {
    let app = TestApp::new();
    let (_, alice) = app.register("alice", "alice@example.com").await;

    let reply = app
        .send(
            Method::POST,
            "/api/v1/reactions/blog/no-such-id/like",
            Some(&alice),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn current_reaction_is_readable() {
    let app = TestApp::new();
    let (_, admin) = app.admin("root@example.com").await;
    let (_, alice) = app.register("alice", "alice@example.com").await;
    let id = app.blog(&admin, "peek").await;
    let uri = format!("/api/v1/reactions/blog/{}", id);

    let before = app.send(Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(before.status, StatusCode::OK);
    assert!(before.body["data"]["reaction"].is_null());

    app.send(Method::POST, &format!("{}/dislike", uri), Some(&alice), None)
        .await;
    let after = app.send(Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(after.body["data"]["reaction"], "dislike");
    assert_eq!(after.body["data"]["dislikesCount"], 1);
}

#[tokio::test]
async fn deleting_a_user_withdraws_their_reactions() {
    let app = TestApp::new();
    let (_, admin) = app.admin("root@example.com").await;
    let (alice_id, alice) = app.register("alice", "alice@example.com").await;
    let (_, bob) = app.register("bob", "bob@example.com").await;
    let id = app.blog(&admin, "popular").await;

    app.send(
        Method::POST,
        &format!("/api/v1/reactions/blog/{}/like", id),
        Some(&alice),
        None,
    )
    .await;
    app.send(
        Method::POST,
        &format!("/api/v1/reactions/blog/{}/dislike", id),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(app.count(LIKES, &id), 1);

    let reply = app
        .send(
            Method::DELETE,
            &format!("/api/v1/users/delete-user/{}", alice_id),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);

    assert_eq!(app.count(LIKES, &id), 0);
    assert_eq!(app.count(DISLIKES, &id), 1);
    assert_consistent(&app, &id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reactions_keep_counters_exact() {
    let app = TestApp::new();
    let (_, admin) = app.admin("root@example.com").await;
    let id = app.blog(&admin, "contended").await;

    let mut tokens = Vec::new();
    for i in 0..12 {
        let (_, token) = app
            .register(&format!("user{}", i), &format!("user{}@example.com", i))
            .await;
        tokens.push(token);
    }

    let app = std::sync::Arc::new(app);
    let mut handles = Vec::new();
    for (i, token) in tokens.into_iter().enumerate() {
        let app = app.clone();
        let id = id.clone();
        handles.push(tokio::spawn(async move {
            // Each user ends on a different state depending on parity
            let steps: &[&str] = if i % 2 == 0 {
                &["like", "dislike", "like"]
            } else {
                &["dislike", "like", "like"]
            };
            for step in steps {
                let reply = app
                    .send(
                        Method::POST,
                        &format!("/api/v1/reactions/blog/{}/{}", id, step),
                        Some(&token),
                        None,
                    )
                    .await;
                assert!(
                    reply.status.is_success(),
                    "reaction failed: {} {}",
                    reply.status,
                    reply.body
                );
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Evens end on like; odds liked twice, which toggles it off
    assert_eq!(app.count(LIKES, &id), 6);
    assert_eq!(app.count(DISLIKES, &id), 0);
    assert_consistent(&app, &id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rapid_likes_from_one_user_settle_on_parity() {
    const CALLS: usize = 11;

    let app = TestApp::new();
    let (_, admin) = app.admin("root@example.com").await;
    let (_, alice) = app.register("alice", "alice@example.com").await;
    let id = app.blog(&admin, "hammered").await;

    let app = std::sync::Arc::new(app);
    let barrier = std::sync::Arc::new(tokio::sync::Barrier::new(CALLS));
    let mut handles = Vec::new();
    for _ in 0..CALLS {
        let (app, barrier) = (app.clone(), barrier.clone());
        let (id, token) = (id.clone(), alice.clone());
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            app.send(
                Method::POST,
                &format!("/api/v1/reactions/blog/{}/like", id),
                Some(&token),
                None,
            )
            .await
            .status
        }));
    }

    let mut created = 0;
    for handle in handles {
        let status = handle.await.unwrap();
        assert!(status.is_success(), "like failed with {}", status);
        if status == StatusCode::CREATED {
            created += 1;
        }
    }

    // Each like toggles, so an odd number of calls leaves one like behind
    assert_eq!(created, CALLS.div_ceil(2));
    assert_eq!(app.count(LIKES, &id), (CALLS % 2) as i64);
    assert_eq!(app.count(DISLIKES, &id), 0);
    assert_consistent(&app, &id);
}
