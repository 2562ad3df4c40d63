//! Concurrent credential testing across a bounded worker pool.
//!
//! Each worker owns one browser session for its whole life and processes
//! tasks one at a time. The collector, not the workers, enforces the global
//! stop conditions: success quota, wall-clock deadline, external
//! cancellation. Workers observe the shared token at dequeue and at every
//! poll tick, but a task already mid-interaction finishes its current
//! attempt so the page is never abandoned half-mutated.

use crate::attempt::{AttemptOptions, LoginAttemptExecutor};
use crate::captcha::CaptchaSolver;
use crate::driver::{Driver, DriverFactory};
use crate::locator::FormLocator;
use crate::resolver::ElementResolver;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use webcrack_common::error::{AttemptError, DriverError};
use webcrack_common::protocol::{Selector, Task, TaskResult};
use webcrack_common::roles::{DEFAULT_PASSWORDS, USERNAME_PLACEHOLDER};

/// Orchestration knobs.
#[derive(Debug, Clone)]
pub struct CrackOptions {
    /// Cross product of users and passwords instead of paired iteration.
    pub crack_all: bool,
    /// Throttle between tasks on one worker, against target-side lockouts.
    pub delay: Duration,
    /// Attempt ceiling per task.
    pub max_attempts: u32,
    /// Stop after this many successes; zero means no limit.
    pub max_crack_num: usize,
    /// Global wall-clock budget for the whole run.
    pub max_crack_time: Duration,
    /// Worker pool size; also the browser session count.
    pub threads: usize,
    /// Deadline for one page navigation.
    pub navigation_timeout: Duration,
}

impl Default for CrackOptions {
    fn default() -> Self {
        Self {
            crack_all: false,
            delay: Duration::from_secs(1),
            max_attempts: 3,
            max_crack_num: 0,
            max_crack_time: Duration::from_secs(300),
            threads: 3,
            navigation_timeout: Duration::from_secs(10),
        }
    }
}

/// Expand targets and credentials into tasks.
///
/// `crack_all` takes the full cross product; otherwise the i-th username is
/// paired with the i-th password.
pub fn generate_tasks(
    urls: &[String],
    usernames: &[String],
    passwords: &[String],
    crack_all: bool,
) -> Vec<Task> {
    let mut tasks = Vec::new();
    if crack_all {
        for url in urls {
            for user in usernames {
                for pass in passwords {
                    tasks.push(Task::new(url, user, pass));
                }
            }
        }
    } else {
        for url in urls {
            for (user, pass) in usernames.iter().zip(passwords.iter()) {
                tasks.push(Task::new(url, user, pass));
            }
        }
    }
    tasks
}

/// Replace the username placeholder in a password, once, textually.
/// Passwords without the placeholder pass through unchanged.
pub fn substitute_username(password: &str, username: &str) -> String {
    password.replace(USERNAME_PLACEHOLDER, username)
}

/// Everything a worker needs to turn one task into one result.
#[derive(Clone)]
struct TaskRunner {
    solver: Option<Arc<dyn CaptchaSolver>>,
    options: CrackOptions,
    attempt_options: AttemptOptions,
    selectors: Arc<HashMap<String, Selector>>,
    cancel: CancellationToken,
}

impl TaskRunner {
    /// Run one task to its single result, spending up to `max_attempts`.
    async fn process(
        &self,
        driver: &mut dyn Driver,
        resolver: &ElementResolver,
        task: Task,
    ) -> TaskResult {
        let mut last_error: Option<AttemptError> = None;
        let mut attempts_used = 0;

        for attempt in 1..=self.options.max_attempts.max(1) {
            if self.cancel.is_cancelled() {
                break;
            }
            attempts_used = attempt;

            match self.attempt(driver, resolver, &task).await {
                Ok(()) => {
                    return TaskResult::success(task, attempt);
                }
                Err(err) => {
                    debug!(
                        url = %task.url,
                        username = %task.username,
                        attempt,
                        error = %err,
                        "attempt failed"
                    );
                    let retryable = err.is_retryable();
                    last_error = Some(err);
                    if !retryable {
                        break;
                    }
                }
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "cancelled before attempt".to_string());
        TaskResult::failure(task, reason, attempts_used)
    }

    async fn attempt(
        &self,
        driver: &mut dyn Driver,
        resolver: &ElementResolver,
        task: &Task,
    ) -> Result<(), AttemptError> {
        match tokio::time::timeout(self.options.navigation_timeout, driver.navigate(&task.url))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(DriverError::Navigation(reason))) => {
                return Err(AttemptError::Navigation(reason))
            }
            Ok(Err(other)) => return Err(other.into()),
            Err(_) => {
                return Err(AttemptError::Navigation(format!(
                    "timed out after {:?}",
                    self.options.navigation_timeout
                )))
            }
        }

        // Use the pre-detected selector for this target when the caller
        // supplied one; detect on the fly otherwise.
        let selector = match self.selectors.get(&task.url) {
            Some(selector) => selector.clone(),
            None => {
                FormLocator::with_resolver(resolver.clone(), self.solver.is_some())
                    .detect(driver)
                    .await?
            }
        };

        let password = substitute_username(&task.password, &task.username);
        let executor = LoginAttemptExecutor::new(
            resolver,
            self.solver.as_deref(),
            self.attempt_options.clone(),
        );
        executor
            .execute(driver, &selector, &task.username, &password, &self.cancel)
            .await
    }
}

/// Fans tasks out to a worker pool and collects results until done or a
/// stop condition fires.
pub struct CrackOrchestrator {
    factory: Arc<dyn DriverFactory>,
    solver: Option<Arc<dyn CaptchaSolver>>,
    options: CrackOptions,
    attempt_options: AttemptOptions,
}

impl CrackOrchestrator {
    pub fn new(factory: Arc<dyn DriverFactory>, options: CrackOptions) -> Self {
        Self {
            factory,
            solver: None,
            options,
            attempt_options: AttemptOptions::default(),
        }
    }

    pub fn with_solver(mut self, solver: Arc<dyn CaptchaSolver>) -> Self {
        self.solver = Some(solver);
        self
    }

    pub fn with_attempt_options(mut self, attempt_options: AttemptOptions) -> Self {
        self.attempt_options = attempt_options;
        self
    }

    /// Run the full task set. Results arrive in completion order.
    pub async fn run(
        &self,
        tasks: Vec<Task>,
        selectors: HashMap<String, Selector>,
    ) -> Vec<TaskResult> {
        self.run_with_cancel(tasks, selectors, CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run) with an externally owned cancellation token,
    /// so a caller can stop the run early (signal handler, embedding
    /// application).
    pub async fn run_with_cancel(
        &self,
        tasks: Vec<Task>,
        selectors: HashMap<String, Selector>,
        cancel: CancellationToken,
    ) -> Vec<TaskResult> {
        let total = tasks.len();
        if total == 0 {
            return Vec::new();
        }
        info!(
            total,
            threads = self.options.threads,
            crack_all = self.options.crack_all,
            "starting crack run"
        );

        // Channel capacity covers every task and every result, so workers
        // never block on a send after the collector stops reading.
        let (task_tx, task_rx) = mpsc::channel::<Task>(total);
        let (result_tx, mut result_rx) = mpsc::channel::<TaskResult>(total);
        for task in tasks {
            // Capacity equals the task count, so this cannot block.
            let _ = task_tx.send(task).await;
        }
        drop(task_tx);
        let task_rx = Arc::new(Mutex::new(task_rx));

        let runner = TaskRunner {
            solver: self.solver.clone(),
            options: self.options.clone(),
            attempt_options: self.attempt_options.clone(),
            selectors: Arc::new(selectors),
            cancel: cancel.clone(),
        };

        // The wall-clock budget fires the same token the workers watch.
        let deadline_guard = {
            let cancel = cancel.clone();
            let budget = self.options.max_crack_time;
            tokio::spawn(async move {
                if !budget.is_zero() {
                    tokio::time::sleep(budget).await;
                    warn!(?budget, "wall-clock budget exhausted, cancelling run");
                    cancel.cancel();
                }
            })
        };

        let mut workers = Vec::new();
        for worker_id in 0..self.options.threads.max(1) {
            workers.push(tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&self.factory),
                runner.clone(),
                Arc::clone(&task_rx),
                result_tx.clone(),
            )));
        }
        drop(result_tx);

        let mut results = Vec::new();
        let mut successes = 0usize;
        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                received = result_rx.recv() => match received {
                    Some(result) => result,
                    None => break,
                },
            };

            if result.success {
                successes += 1;
                info!(
                    url = %result.task.url,
                    username = %result.task.username,
                    attempts = result.attempts,
                    "login successful"
                );
            }
            results.push(result);

            if self.options.max_crack_num > 0 && successes >= self.options.max_crack_num {
                info!(successes, "success quota reached, cancelling run");
                break;
            }
        }

        // Idempotent: already fired on quota/deadline paths.
        cancel.cancel();
        for worker in workers {
            let _ = worker.await;
        }
        deadline_guard.abort();

        info!(
            total = results.len(),
            successes,
            failures = results.len() - successes,
            "crack run finished"
        );
        results
    }

    /// Single-target mode: iterate the built-in password dictionary for one
    /// username, sequentially, stopping at the first success.
    ///
    /// A pre-detected selector avoids re-running detection on every
    /// sub-attempt. Returns the result of every sub-attempt actually made.
    pub async fn crack_single(
        &self,
        url: &str,
        username: &str,
        selector: Option<Selector>,
        cancel: CancellationToken,
    ) -> Vec<TaskResult> {
        let mut driver = match self.factory.create().await {
            Ok(driver) => driver,
            Err(err) => {
                warn!(error = %err, "failed to create browser session");
                return vec![TaskResult::failure(
                    Task::new(url, username, ""),
                    err,
                    0,
                )];
            }
        };

        let selectors = selector
            .map(|s| HashMap::from([(url.to_string(), s)]))
            .unwrap_or_default();
        let runner = TaskRunner {
            solver: self.solver.clone(),
            options: self.options.clone(),
            attempt_options: self.attempt_options.clone(),
            selectors: Arc::new(selectors),
            cancel: cancel.clone(),
        };
        let resolver = ElementResolver::new();

        let mut results = Vec::new();
        for password in DEFAULT_PASSWORDS {
            if cancel.is_cancelled() {
                break;
            }
            let task = Task::new(url, username, *password);
            let result = runner.process(driver.as_mut(), &resolver, task).await;
            let succeeded = result.success;
            results.push(result);
            if succeeded {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.options.delay) => {}
            }
        }

        if let Err(err) = driver.close().await {
            debug!(error = %err, "error closing browser session");
        }
        results
    }
}

async fn worker_loop(
    worker_id: usize,
    factory: Arc<dyn DriverFactory>,
    runner: TaskRunner,
    task_rx: Arc<Mutex<mpsc::Receiver<Task>>>,
    result_tx: mpsc::Sender<TaskResult>,
) {
    let mut driver = match factory.create().await {
        Ok(driver) => driver,
        Err(err) => {
            warn!(worker_id, error = %err, "worker failed to create browser session");
            return;
        }
    };
    let resolver = ElementResolver::new();
    debug!(worker_id, "worker started");

    loop {
        if runner.cancel.is_cancelled() {
            break;
        }
        let task = tokio::select! {
            _ = runner.cancel.cancelled() => break,
            task = async { task_rx.lock().await.recv().await } => match task {
                Some(task) => task,
                None => break,
            },
        };

        let result = runner.process(driver.as_mut(), &resolver, task).await;
        if result_tx.send(result).await.is_err() {
            break;
        }

        tokio::select! {
            _ = runner.cancel.cancelled() => break,
            _ = tokio::time::sleep(runner.options.delay) => {}
        }
    }

    if let Err(err) = driver.close().await {
        debug!(worker_id, error = %err, "error closing browser session");
    }
    debug!(worker_id, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cross_product_generation() {
        let tasks = generate_tasks(
            &strings(&["http://a", "http://b"]),
            &strings(&["root", "admin"]),
            &strings(&["x", "y", "z"]),
            true,
        );
        assert_eq!(tasks.len(), 2 * 2 * 3);
        assert_eq!(tasks[0], Task::new("http://a", "root", "x"));
    }

    #[test]
    fn paired_generation_stops_at_shorter_list() {
        let tasks = generate_tasks(
            &strings(&["http://a"]),
            &strings(&["root", "admin", "guest"]),
            &strings(&["x", "y"]),
            false,
        );
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1], Task::new("http://a", "admin", "y"));
    }

    #[test]
    fn substitution_replaces_placeholder() {
        assert_eq!(substitute_username("%user%123", "root"), "root123");
        assert_eq!(substitute_username("%user%", "root"), "root");
    }

    #[test]
    fn substitution_is_identity_without_placeholder() {
        assert_eq!(substitute_username("hunter2", "root"), "hunter2");
        assert_eq!(substitute_username("", "root"), "");
    }
}
