//! Worker and orchestration tests against a scripted command runner

mod common;

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use common::{existing_checkout, harness, harness_with_cancel, RecordingNotifier, RecordingTracker, ScriptedRunner};
use dockyard::deploy::fsm::DeploymentStatus;
use dockyard::deploy::process::cancellation;
use dockyard::models::deployment::Deployment;
use dockyard::storage::deployments::DeploymentStore;
use dockyard::workers::deployer::process_deployment;
use dockyard::workers::{pool, WorkerPool};
use tempfile::TempDir;

const SHA: &str = "abcdef1234567890";

fn request() -> Deployment {
    Deployment::new("acme", "site", "refs/heads/main", SHA)
}

#[tokio::test]
async fn test_static_site_deploys() {
    let repos = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let checkout = existing_checkout(repos.path(), "acme", "site", "production");
    fs::write(checkout.join("index.html"), "<h1>hi</h1>").unwrap();

    let h = harness(repos.path(), logs.path(), ScriptedRunner::new(), |c| c);
    let mut deployment = request();
    h.ctx.queue.enqueue(&mut deployment).await.unwrap();
    let queued = h.ctx.queue.next().await.unwrap();

    let finished = process_deployment(&h.ctx, queued).await;

    assert_eq!(finished.status(), DeploymentStatus::Success, "{:?}", finished.error);
    assert_eq!(finished.project_type.as_deref(), Some("static"));
    assert_eq!(finished.port, Some(8080));
    assert_eq!(finished.url.as_deref(), Some("https://site.example.test"));
    assert!(finished.error.is_none());
    assert!(h.ctx.registry.is_empty());

    let commands = h.runner.commands();
    assert_eq!(commands[0], "git fetch --all");
    assert_eq!(commands[1], format!("git checkout --detach {}", SHA));
    assert!(commands.contains(&"pm2 stop acme-site-production".to_string()));
    assert!(commands.contains(&"docker-compose -p acme-site-production down".to_string()));
    assert_eq!(
        commands.last().unwrap(),
        "pm2 start python --name acme-site-production --no-autorestart -- -m http.server 8080"
    );

    let stored = h.store.get(&finished.id).await.unwrap();
    assert_eq!(stored, finished);

    let log = fs::read_to_string(finished.log_path.unwrap()).unwrap();
    assert!(log.contains("==> Syncing repository"));
    assert!(log.contains("Running: git fetch --all"));
    assert!(log.contains("==> Deployment succeeded: https://site.example.test"));
}

#[tokio::test]
async fn test_timestamps_are_ordered() {
    let repos = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let checkout = existing_checkout(repos.path(), "acme", "site", "production");
    fs::write(checkout.join("index.html"), "").unwrap();

    let h = harness(repos.path(), logs.path(), ScriptedRunner::new(), |c| c);
    let mut deployment = request();
    h.ctx.queue.enqueue(&mut deployment).await.unwrap();
    let finished = process_deployment(&h.ctx, h.ctx.queue.next().await.unwrap()).await;

    let started = finished.started_at().unwrap();
    let completed = finished.completed_at().unwrap();
    assert!(finished.created_at() <= started);
    assert!(started <= completed);
}

#[tokio::test]
async fn test_sync_failure_fails_deployment() {
    let base = TempDir::new().unwrap();
    let blocker = base.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();
    let repos = blocker.join("repos");
    let logs = TempDir::new().unwrap();

    let h = harness(&repos, logs.path(), ScriptedRunner::new(), |c| c);
    let mut deployment = request();
    h.ctx.queue.enqueue(&mut deployment).await.unwrap();
    let finished = process_deployment(&h.ctx, h.ctx.queue.next().await.unwrap()).await;

    assert_eq!(finished.status(), DeploymentStatus::Failed);
    let error = finished.error.clone().unwrap();
    assert!(error.starts_with("Repository sync failed"), "{}", error);
    assert!(finished.port.is_none());
    assert!(finished.url.is_none());
    assert!(finished.completed_at().is_some());
    assert!(h.runner.commands().is_empty());
}

#[tokio::test]
async fn test_build_failure_stops_before_start() {
    let repos = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let checkout = existing_checkout(repos.path(), "acme", "api", "production");
    fs::write(
        checkout.join("package.json"),
        r#"{"dependencies": {"express": "^4.18.0"}}"#,
    )
    .unwrap();

    let h = harness(
        repos.path(),
        logs.path(),
        ScriptedRunner::new().fail_on("npm install"),
        |c| c,
    );
    let mut deployment = Deployment::new("acme", "api", "refs/heads/main", SHA);
    h.ctx.queue.enqueue(&mut deployment).await.unwrap();
    let finished = process_deployment(&h.ctx, h.ctx.queue.next().await.unwrap()).await;

    assert_eq!(finished.status(), DeploymentStatus::Failed);
    assert!(finished.error.unwrap().starts_with("Build failed"));
    assert_eq!(finished.project_type.as_deref(), Some("node"));
    assert_eq!(finished.port, Some(3000));
    assert!(finished.url.is_none());
    assert!(!h.runner.commands().iter().any(|c| c.starts_with("pm2")));
}

#[tokio::test]
async fn test_supervisor_failure_falls_back_to_direct_launch() {
    let repos = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let checkout = existing_checkout(repos.path(), "acme", "site", "production");
    fs::write(checkout.join("index.html"), "").unwrap();

    let h = harness(
        repos.path(),
        logs.path(),
        ScriptedRunner::new().fail_on("pm2 start"),
        |c| c,
    );
    let mut deployment = request();
    h.ctx.queue.enqueue(&mut deployment).await.unwrap();
    let finished = process_deployment(&h.ctx, h.ctx.queue.next().await.unwrap()).await;

    assert_eq!(finished.status(), DeploymentStatus::Success, "{:?}", finished.error);
    assert_eq!(
        h.runner.commands().last().unwrap(),
        "launch python -m http.server 8080"
    );
}

#[tokio::test]
async fn test_container_start_failure_has_no_fallback() {
    let repos = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let checkout = existing_checkout(repos.path(), "acme", "stack", "production");
    fs::write(checkout.join("compose.yaml"), "services: {}\n").unwrap();

    let h = harness(
        repos.path(),
        logs.path(),
        ScriptedRunner::new().fail_on("docker-compose up"),
        |c| c,
    );
    let mut deployment = Deployment::new("acme", "stack", "refs/heads/main", SHA);
    h.ctx.queue.enqueue(&mut deployment).await.unwrap();
    let finished = process_deployment(&h.ctx, h.ctx.queue.next().await.unwrap()).await;

    assert_eq!(finished.status(), DeploymentStatus::Failed);
    assert!(finished.error.unwrap().starts_with("Start failed"));
    assert_eq!(finished.project_type.as_deref(), Some("container"));
    assert!(!h.runner.commands().iter().any(|c| c.starts_with("launch")));
}

#[tokio::test]
async fn test_dockerfile_image_is_named_after_instance() {
    let repos = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let checkout = existing_checkout(repos.path(), "acme", "app", "production");
    fs::write(checkout.join("Dockerfile"), "FROM nginx\n").unwrap();

    let h = harness(repos.path(), logs.path(), ScriptedRunner::new(), |c| c);
    let mut deployment = Deployment::new("acme", "app", "refs/heads/main", SHA);
    h.ctx.queue.enqueue(&mut deployment).await.unwrap();
    let finished = process_deployment(&h.ctx, h.ctx.queue.next().await.unwrap()).await;

    assert_eq!(finished.status(), DeploymentStatus::Success, "{:?}", finished.error);
    assert_eq!(finished.project_type.as_deref(), Some("container"));

    let commands = h.runner.commands();
    let position = |wanted: &str| {
        commands
            .iter()
            .position(|c| c == wanted)
            .unwrap_or_else(|| panic!("{} not in {:?}", wanted, commands))
    };
    let build = position("docker build -t acme-app-production .");
    let remove = position("docker rm -f acme-app-production");
    let run = position("docker run -d --name acme-app-production -p 3000:3000 acme-app-production");
    assert!(build < remove && remove < run);
    assert!(!commands.iter().any(|c| c.split_whitespace().any(|word| word == "app")));
}

#[tokio::test]
async fn test_environments_do_not_share_a_checkout() {
    let repos = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let checkout = existing_checkout(repos.path(), "acme", "site", "production");
    fs::write(checkout.join("index.html"), "").unwrap();

    let h = harness(
        repos.path(),
        logs.path(),
        ScriptedRunner::new().fail_on("git clone"),
        |c| c,
    );
    let mut preview = request().with_pull_request(7);
    h.ctx.queue.enqueue(&mut preview).await.unwrap();
    let finished = process_deployment(&h.ctx, h.ctx.queue.next().await.unwrap()).await;

    let target = repos.path().join("acme").join("site").join("preview-pr-7");
    assert_eq!(
        h.runner.commands(),
        vec![format!(
            "git clone https://github.com/acme/site.git {}",
            target.display()
        )]
    );
    assert_eq!(finished.status(), DeploymentStatus::Failed);
    assert!(checkout.join("index.html").exists());
}

#[tokio::test]
async fn test_tracker_and_notifier_are_informed() {
    let repos = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    let checkout = existing_checkout(repos.path(), "acme", "site", "preview-pr-7");
    fs::write(checkout.join("index.html"), "").unwrap();

    let tracker = Arc::new(RecordingTracker::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let h = harness(repos.path(), logs.path(), ScriptedRunner::new(), |c| {
        c.tracker(tracker.clone()).notifier(notifier.clone())
    });

    let mut deployment = request().with_pull_request(7).with_external_id(42);
    h.ctx.queue.enqueue(&mut deployment).await.unwrap();
    let finished = process_deployment(&h.ctx, h.ctx.queue.next().await.unwrap()).await;

    let url = "https://preview-pr-7.example.test";
    assert_eq!(finished.url.as_deref(), Some(url));
    assert_eq!(
        *tracker.events.lock().unwrap(),
        vec![
            "status 42 in_progress -".to_string(),
            format!("status 42 success {}", url),
            format!("comment 7 Preview deployment ready at {}", url),
        ]
    );
    assert_eq!(
        notifier.wait_for(1).await,
        vec![format!("success acme/site {}", url)]
    );
}

#[tokio::test]
async fn test_tracker_skipped_without_external_id() {
    let base = TempDir::new().unwrap();
    let blocker = base.path().join("blocker");
    fs::write(&blocker, "").unwrap();
    let logs = TempDir::new().unwrap();

    let tracker = Arc::new(RecordingTracker::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let h = harness(&blocker.join("repos"), logs.path(), ScriptedRunner::new(), |c| {
        c.tracker(tracker.clone()).notifier(notifier.clone())
    });

    let mut deployment = request();
    h.ctx.queue.enqueue(&mut deployment).await.unwrap();
    process_deployment(&h.ctx, h.ctx.queue.next().await.unwrap()).await;

    assert!(tracker.events.lock().unwrap().is_empty());
    let events = notifier.wait_for(1).await;
    assert_eq!(events.len(), 1);
    assert!(events[0].starts_with("failure acme/site Repository sync failed"));
}

#[tokio::test]
async fn test_pool_drains_queue_on_shutdown() {
    let repos = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    for repo in ["one", "two", "three"] {
        let checkout = existing_checkout(repos.path(), "acme", repo, "production");
        fs::write(checkout.join("index.html"), "").unwrap();
    }

    let h = harness(repos.path(), logs.path(), ScriptedRunner::new(), |c| c);
    let pool = WorkerPool::start(
        pool::Options {
            workers: 2,
            ..Default::default()
        },
        h.ctx.clone(),
        h.cancel,
    );

    let mut ids = Vec::new();
    for repo in ["one", "two", "three"] {
        let mut deployment = Deployment::new("acme", repo, "refs/heads/main", SHA);
        h.ctx.queue.enqueue(&mut deployment).await.unwrap();
        ids.push(deployment.id);
    }

    pool.shutdown().await.unwrap();

    for id in ids {
        let stored = h.store.get(&id).await.unwrap();
        assert_eq!(stored.status(), DeploymentStatus::Success, "{}: {:?}", id, stored.error);
    }
    assert!(h.ctx.registry.is_empty());
}

#[tokio::test]
async fn test_shutdown_cancels_stuck_deployments() {
    let repos = TempDir::new().unwrap();
    let logs = TempDir::new().unwrap();
    for repo in ["slow", "waiting"] {
        existing_checkout(repos.path(), "acme", repo, "production");
    }

    let (cancel_handle, cancel) = cancellation();
    let runner = ScriptedRunner::new().slow(Duration::from_secs(30), cancel.clone());
    let h = harness_with_cancel(repos.path(), logs.path(), runner, |c| c, cancel_handle, cancel);
    let pool = WorkerPool::start(
        pool::Options {
            workers: 1,
            max_shutdown_delay: Duration::from_millis(100),
        },
        h.ctx.clone(),
        h.cancel,
    );

    let mut ids = Vec::new();
    for repo in ["slow", "waiting"] {
        let mut deployment = Deployment::new("acme", repo, "refs/heads/main", SHA);
        h.ctx.queue.enqueue(&mut deployment).await.unwrap();
        ids.push(deployment.id);
    }

    tokio::time::timeout(Duration::from_secs(5), pool.shutdown())
        .await
        .expect("shutdown hung")
        .unwrap();

    for id in ids {
        let stored = h.store.get(&id).await.unwrap();
        assert_eq!(stored.status(), DeploymentStatus::Failed);
        assert!(stored.error.unwrap().starts_with("Deployment cancelled"));
    }
}
