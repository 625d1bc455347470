use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::Notify;
use tracing::error;

use crate::config::AppConfig;
use crate::limiter::RateLimiter;
use crate::mailer::Mailer;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub mailer: Arc<Mailer>,
    pub limiter: Arc<RateLimiter>,
    pub tasks: BackgroundTasks,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(25)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    // Bound every statement so a slow query fails instead of
                    // holding a request task indefinitely.
                    sqlx::query("SET statement_timeout = 3000")
                        .execute(conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let mailer = Arc::new(Mailer::new(&config.smtp)?);
        let limiter = Arc::new(RateLimiter::new(&config.limiter));

        Ok(Self {
            db,
            config,
            mailer,
            limiter,
            tasks: BackgroundTasks::new(),
        })
    }
}

/// Tracks fire-and-forget tasks so shutdown can wait for them. A panic in a
/// tracked task is logged and swallowed; the response it belongs to has
/// already been sent.
#[derive(Clone)]
pub struct BackgroundTasks {
    inner: Arc<TaskCounter>,
}

struct TaskCounter {
    outstanding: AtomicUsize,
    done: Notify,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TaskCounter {
                outstanding: AtomicUsize::new(0),
                done: Notify::new(),
            }),
        }
    }

    pub fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) {
        let inner = self.inner.clone();
        inner.outstanding.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            // The inner spawn isolates a panic in `fut` from the tracking
            // task, so the counter always comes back down.
            if let Err(e) = tokio::spawn(fut).await {
                if e.is_panic() {
                    error!("background task panicked");
                }
            }
            if inner.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
                inner.done.notify_waiters();
            }
        });
    }

    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::SeqCst)
    }

    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.done.notified();
            if self.inner.outstanding.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_idle_returns_after_tasks_finish() {
        let tasks = BackgroundTasks::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tasks.spawn(async move {
            rx.await.ok();
        });
        assert_eq!(tasks.outstanding(), 1);

        tx.send(()).unwrap();
        tasks.wait_idle().await;
        assert_eq!(tasks.outstanding(), 0);
    }

    #[tokio::test]
    async fn panicking_task_is_contained_and_untracked() {
        let tasks = BackgroundTasks::new();
        tasks.spawn(async {
            panic!("boom");
        });
        tasks.wait_idle().await;
        assert_eq!(tasks.outstanding(), 0);
    }

    #[tokio::test]
    async fn wait_idle_with_no_tasks_returns_immediately() {
        BackgroundTasks::new().wait_idle().await;
    }
}
