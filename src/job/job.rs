//! Job orchestration
//!
//! A job drives the whole run: it seeds the target queue, pumps wordlist
//! inputs through a bounded worker pool for each queued target, classifies
//! responses, spawns recursion targets, and enforces the adaptive stop,
//! timeout, pause, and shutdown rules.

use crate::config::{Config, RecursionStrategy};
use crate::input::{InputMap, InputProvider};
use crate::job::delay::DelayPolicy;
use crate::job::matching::{calibration_filters, MatchEngine, MatchError};
use crate::job::pause::PauseGate;
use crate::job::queue::{QueueTarget, TargetQueue};
use crate::job::rate::RateThrottle;
use crate::output::{OutputProvider, Progress};
use crate::runner::{Response, RunnerError, RunnerProvider};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Dispatched inputs required before adaptive stop conditions engage
const ADAPTIVE_SAMPLE_FLOOR: usize = 50;

/// Share of 403 responses that triggers a stop
const FORBIDDEN_STOP_RATIO: f64 = 0.95;

/// Share of 429 responses that triggers a stop
const RATE_LIMITED_STOP_RATIO: f64 = 0.2;

/// Counters shared across workers, all guarded by one lock so the stop
/// controller reads a consistent tuple
#[derive(Debug, Default)]
struct Counters {
    /// Inputs dispatched for the current target
    dispatched: usize,

    /// Total request errors for the whole run
    errors: usize,

    /// Consecutive-failure errors; reset on any successful execute
    spurious_errors: usize,

    /// 403 responses seen for the current target
    forbidden: usize,

    /// 429 responses seen for the current target
    rate_limited: usize,

    /// Terminal diagnostic, set once by the first stop trigger
    error_message: String,
}

/// Read-only snapshot of the engine counters
#[derive(Debug, Clone, Copy, Default)]
pub struct JobStats {
    pub dispatched: usize,
    pub errors: usize,
    pub spurious_errors: usize,
    pub forbidden: usize,
    pub rate_limited: usize,
}

/// State shared between the dispatcher, workers, the progress monitor, and
/// the signal handler
struct EngineContext {
    config: Config,
    runner: Arc<dyn RunnerProvider>,
    replay_runner: Option<Arc<dyn RunnerProvider>>,
    output: Arc<dyn OutputProvider>,
    matcher: RwLock<MatchEngine>,
    queue: TargetQueue,
    counters: Mutex<Counters>,
    running: AtomicBool,
    running_target: AtomicBool,
    skip_target: AtomicBool,
    current_depth: AtomicU32,
    current_url: RwLock<String>,
    total: AtomicUsize,
    start_time: Instant,
    start_time_target: Mutex<Instant>,
    pause_gate: PauseGate,
    rate: RateThrottle,
    delay: DelayPolicy,
    cancel: CancellationToken,
}

impl EngineContext {
    fn inc_error(&self) {
        let mut counters = self.counters.lock().expect("counter lock poisoned");
        counters.errors += 1;
        counters.spurious_errors += 1;
    }

    fn inc_forbidden(&self) {
        let mut counters = self.counters.lock().expect("counter lock poisoned");
        counters.forbidden += 1;
    }

    fn inc_rate_limited(&self) {
        let mut counters = self.counters.lock().expect("counter lock poisoned");
        counters.rate_limited += 1;
    }

    fn reset_spurious_errors(&self) {
        let mut counters = self.counters.lock().expect("counter lock poisoned");
        if counters.spurious_errors > 0 {
            counters.spurious_errors = 0;
        }
    }

    /// Records the terminal diagnostic; the first trigger wins
    fn set_error(&self, message: &str) {
        let mut counters = self.counters.lock().expect("counter lock poisoned");
        if counters.error_message.is_empty() {
            counters.error_message = message.to_string();
        }
    }

    fn error_message(&self) -> String {
        self.counters
            .lock()
            .expect("counter lock poisoned")
            .error_message
            .clone()
    }

    fn stats(&self) -> JobStats {
        let counters = self.counters.lock().expect("counter lock poisoned");
        JobStats {
            dispatched: counters.dispatched,
            errors: counters.errors,
            spurious_errors: counters.spurious_errors,
            forbidden: counters.forbidden,
            rate_limited: counters.rate_limited,
        }
    }

    /// Stops the whole run and cancels all in-flight work
    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.cancel.cancel();
    }

    /// Abandons the current target; the queue drain continues
    fn next_target(&self) {
        self.running_target.store(false, Ordering::SeqCst);
    }

    fn pause(&self) {
        if self.pause_gate.close() {
            self.output.info("------ PAUSING ------");
        }
    }

    fn resume(&self) {
        if self.pause_gate.open() {
            self.output.info("------ RESUMING -----");
        }
    }

    /// First-signal graceful shutdown: releases any pause barrier so waiters
    /// can unwind, then stops the run
    fn interrupt(&self) {
        self.set_error("Caught keyboard interrupt (Ctrl-C)");
        self.pause_gate.open();
        self.stop();
    }

    /// Evaluates adaptive and wall-clock stop conditions
    ///
    /// Called at the top of every dispatch iteration. The adaptive
    /// predicates only engage once enough samples have accumulated.
    fn check_stop(&self) {
        let (dispatched, spurious, forbidden, rate_limited) = {
            let counters = self.counters.lock().expect("counter lock poisoned");
            (
                counters.dispatched,
                counters.spurious_errors,
                counters.forbidden,
                counters.rate_limited,
            )
        };
        let safety = self.config.safety;

        if dispatched > ADAPTIVE_SAMPLE_FLOOR {
            if (safety.stop_on_403 || safety.stop_on_all)
                && forbidden as f64 / dispatched as f64 > FORBIDDEN_STOP_RATIO
            {
                self.set_error("Getting an unusual amount of 403 responses, exiting.");
                self.stop();
            }
            if (safety.stop_on_errors || safety.stop_on_all)
                && spurious > self.config.fuzzer.threads * 2
            {
                self.set_error("Receiving spurious errors, exiting.");
                self.stop();
            }
            if safety.stop_on_all
                && rate_limited as f64 / dispatched as f64 > RATE_LIMITED_STOP_RATIO
            {
                self.set_error("Getting an unusual amount of 429 responses, exiting.");
                self.stop();
            }
        }

        let max_time = self.config.fuzzer.max_time;
        if max_time > 0 && self.start_time.elapsed() >= Duration::from_secs(max_time) {
            self.set_error("Maximum running time for entire process reached, exiting.");
            self.stop();
        }

        let max_time_target = self.config.fuzzer.max_time_target;
        if max_time_target > 0 {
            let elapsed = self
                .start_time_target
                .lock()
                .expect("start time lock poisoned")
                .elapsed();
            if elapsed >= Duration::from_secs(max_time_target) {
                self.set_error(
                    "Maximum running time for this job reached, continuing with next job if one exists.",
                );
                self.next_target();
            }
        }
    }

    /// Emits a progress snapshot
    fn update_progress(&self) {
        let (dispatched, errors) = {
            let counters = self.counters.lock().expect("counter lock poisoned");
            (counters.dispatched, counters.errors)
        };
        let progress = Progress {
            started_at: *self
                .start_time_target
                .lock()
                .expect("start time lock poisoned"),
            req_count: dispatched,
            req_total: self.total.load(Ordering::SeqCst),
            req_sec: self.rate.current_rate(),
            queue_pos: self.queue.cursor(),
            queue_total: self.queue.len(),
            error_count: errors,
        };
        self.output.progress(&progress);
    }
}

/// Control handle for a running job
///
/// Cheap to clone out of the job before it is moved into a task; gives the
/// caller pause/resume, skip, stop, and inspection without touching the
/// dispatcher.
#[derive(Clone)]
pub struct JobHandle {
    ctx: Arc<EngineContext>,
}

impl JobHandle {
    /// Pauses the run; idempotent
    pub fn pause(&self) {
        self.ctx.pause();
    }

    /// Resumes a paused run; idempotent
    pub fn resume(&self) {
        self.ctx.resume();
    }

    /// Stops the whole run and cancels in-flight work
    pub fn stop(&self) {
        self.ctx.stop();
    }

    /// Abandons the current target and advances to the next queued one
    pub fn skip_current_target(&self) {
        self.ctx.skip_target.store(true, Ordering::SeqCst);
    }

    /// Behaves like the first Ctrl-C: records the interrupt, releases any
    /// pause barrier, and stops the run
    pub fn interrupt(&self) {
        self.ctx.interrupt();
    }

    /// Whether the run is still live
    pub fn is_running(&self) -> bool {
        self.ctx.running.load(Ordering::SeqCst)
    }

    /// The terminal diagnostic, empty while none has been recorded
    pub fn error_message(&self) -> String {
        self.ctx.error_message()
    }

    /// Snapshot of the engine counters
    pub fn stats(&self) -> JobStats {
        self.ctx.stats()
    }

    /// The current target plus everything still pending
    pub fn queued_targets(&self) -> Vec<QueueTarget> {
        self.ctx.queue.visible()
    }

    /// Deletes the `index`-th pending target, 1-based
    pub fn delete_queued_target(&self, index: usize) -> bool {
        self.ctx.queue.delete_pending(index)
    }
}

/// Ties together config, input, runner, and output for one fuzzing run
pub struct Job {
    ctx: Arc<EngineContext>,
    input: Box<dyn InputProvider>,
}

impl Job {
    /// Builds a job from its collaborators
    ///
    /// # Arguments
    ///
    /// * `config` - Validated run configuration
    /// * `input` - Wordlist provider, iterated once per queued target
    /// * `runner` - HTTP executor for fuzzed requests
    /// * `replay_runner` - Optional executor matched requests are replayed
    ///   through
    /// * `output` - Sink for results, progress, and diagnostics
    /// * `cancel` - Token shared with the runners; cancelled on stop
    pub fn new(
        config: Config,
        input: Box<dyn InputProvider>,
        runner: Arc<dyn RunnerProvider>,
        replay_runner: Option<Arc<dyn RunnerProvider>>,
        output: Arc<dyn OutputProvider>,
        cancel: CancellationToken,
    ) -> Result<Self, MatchError> {
        let matcher = MatchEngine::from_rules(&config.matchers, &config.filters)?;
        let rate = RateThrottle::new(config.fuzzer.rate);
        let delay = DelayPolicy::new(config.fuzzer.delay);
        let ctx = Arc::new(EngineContext {
            runner,
            replay_runner,
            output,
            matcher: RwLock::new(matcher),
            queue: TargetQueue::new(),
            counters: Mutex::new(Counters::default()),
            running: AtomicBool::new(false),
            running_target: AtomicBool::new(false),
            skip_target: AtomicBool::new(false),
            current_depth: AtomicU32::new(0),
            current_url: RwLock::new(config.target.url.clone()),
            total: AtomicUsize::new(0),
            start_time: Instant::now(),
            start_time_target: Mutex::new(Instant::now()),
            pause_gate: PauseGate::new(),
            rate,
            delay,
            cancel,
            config,
        });
        Ok(Self { ctx, input })
    }

    /// Returns a control handle usable while `start` runs elsewhere
    pub fn handle(&self) -> JobHandle {
        JobHandle {
            ctx: self.ctx.clone(),
        }
    }

    /// Runs the job to completion
    ///
    /// Seeds the queue with the configured target, installs the signal
    /// handler, then drains the queue: every queued target gets a full
    /// wordlist pass unless a stop condition or skip intervenes. Output is
    /// finalized exactly once on the way out.
    pub async fn start(&mut self) {
        let ctx = self.ctx.clone();
        ctx.queue.append(QueueTarget {
            url: ctx.config.target.url.clone(),
            depth: 0,
        });
        ctx.total.store(self.input.total(), Ordering::SeqCst);
        ctx.running.store(true, Ordering::SeqCst);

        if !ctx.config.output.quiet {
            ctx.output.banner();
        }
        install_signal_handler(ctx.clone());

        while ctx.running.load(Ordering::SeqCst) {
            let Some(target) = ctx.queue.advance() else {
                break;
            };
            self.reset_target(&target);
            if ctx.config.calibration.auto && ctx.queue.cursor() == 1 {
                self.auto_calibrate().await;
            }
            self.run_target().await;
        }

        ctx.stop();
        if let Err(e) = ctx.output.finalize() {
            ctx.output.error(&e.to_string());
        }
    }

    /// Resets per-target state before a wordlist pass
    fn reset_target(&mut self, target: &QueueTarget) {
        let ctx = &self.ctx;
        self.input.reset();
        {
            let mut counters = ctx.counters.lock().expect("counter lock poisoned");
            counters.dispatched = 0;
        }
        ctx.skip_target.store(false, Ordering::SeqCst);
        ctx.running_target.store(true, Ordering::SeqCst);
        ctx.current_depth.store(target.depth, Ordering::SeqCst);
        *ctx.current_url.write().expect("url lock poisoned") = target.url.clone();
        *ctx
            .start_time_target
            .lock()
            .expect("start time lock poisoned") = Instant::now();
        ctx.output.cycle();
    }

    /// Processes the current target to completion
    ///
    /// Dispatch order follows input position; completion order is up to the
    /// scheduler. All outstanding workers are joined before returning so the
    /// counters are consistent when the next target starts.
    async fn run_target(&mut self) {
        let ctx = self.ctx.clone();
        let monitor = tokio::spawn(progress_monitor(ctx.clone()));

        if ctx.queue.cursor() > 1 {
            let url = ctx.current_url.read().expect("url lock poisoned").clone();
            ctx.output
                .info(&format!("Starting queued job on target: {url}"));
        }

        let semaphore = Arc::new(Semaphore::new(ctx.config.fuzzer.threads));
        let mut workers = JoinSet::new();
        let mut aborted = false;

        while self.input.next() && !ctx.skip_target.load(Ordering::SeqCst) {
            ctx.check_stop();
            if !ctx.running.load(Ordering::SeqCst) {
                aborted = true;
                break;
            }
            ctx.pause_gate.wait().await;

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let value = self.input.value();
            let position = self.input.position();
            {
                let mut counters = ctx.counters.lock().expect("counter lock poisoned");
                counters.dispatched += 1;
            }

            let worker_ctx = ctx.clone();
            workers.spawn(async move {
                let thread_start = Instant::now();
                run_task(&worker_ctx, value, position).await;
                worker_ctx.delay.sleep(&worker_ctx.cancel).await;
                worker_ctx.rate.throttle(&worker_ctx.cancel).await;
                let thread_end = Instant::now();
                worker_ctx.rate.tick(thread_start, thread_end);
                drop(permit);
            });

            if !ctx.running_target.load(Ordering::SeqCst) {
                aborted = true;
                break;
            }
        }

        while workers.join_next().await.is_some() {}
        let _ = monitor.await;

        ctx.update_progress();
        if aborted {
            let message = ctx.error_message();
            if !message.is_empty() {
                ctx.output.warning(&message);
            }
        }
    }

    /// Probes the target with synthetic inputs and derives auto-filters
    /// from the baseline responses
    async fn auto_calibrate(&self) {
        let (responses, error) = self.calibrate_responses().await;
        if let Some(e) = error {
            self.ctx
                .output
                .warning(&format!("Auto-calibration aborted: {e}"));
        }
        let filters = calibration_filters(&responses);
        if filters.is_empty() {
            return;
        }
        let mut matcher = self.ctx.matcher.write().expect("matcher lock poisoned");
        for filter in filters {
            matcher.add_filter(filter);
        }
    }

    /// Runs the calibration probes and collects the responses that would
    /// have been reported as results
    ///
    /// An execute error aborts calibration; everything collected up to that
    /// point is still returned, together with the error.
    async fn calibrate_responses(&self) -> (Vec<Response>, Option<RunnerError>) {
        let ctx = &self.ctx;
        let probes: Vec<String> = if ctx.config.calibration.strings.is_empty() {
            vec![
                format!("admin{}/", random_string(16)),
                format!(".htaccess{}", random_string(16)),
                format!("{}/", random_string(16)),
                random_string(16),
            ]
        } else {
            ctx.config.calibration.strings.clone()
        };
        let base_url = ctx.current_url.read().expect("url lock poisoned").clone();
        let keywords: Vec<&str> = ctx
            .config
            .wordlists
            .iter()
            .map(|w| w.keyword.as_str())
            .collect();

        let mut results = Vec::new();
        for probe in probes {
            let mut input = InputMap::new();
            for keyword in &keywords {
                input.insert(keyword.to_string(), probe.clone().into_bytes());
            }

            let mut request = match ctx.runner.prepare(&input, &base_url) {
                Ok(request) => request,
                Err(e) => {
                    ctx.output
                        .error(&format!("Encountered an error while preparing request: {e}"));
                    ctx.inc_error();
                    return (results, Some(e));
                }
            };
            match ctx.runner.execute(&mut request).await {
                Ok(mut response) => {
                    let accepted = ctx
                        .matcher
                        .read()
                        .expect("matcher lock poisoned")
                        .is_match(&response);
                    response.release_body();
                    if accepted {
                        results.push(response);
                    }
                }
                Err(e) => return (results, Some(e)),
            }
        }
        (results, None)
    }
}

/// One worker pass: prepare, execute with a single retry, classify, emit,
/// and extend the recursion frontier
async fn run_task(ctx: &Arc<EngineContext>, input: InputMap, position: usize) {
    let base_url = ctx.current_url.read().expect("url lock poisoned").clone();

    let mut retried = false;
    let mut response = loop {
        let mut request = match ctx.runner.prepare(&input, &base_url) {
            Ok(request) => request,
            Err(e) => {
                ctx.output
                    .error(&format!("Encountered an error while preparing request: {e}"));
                ctx.inc_error();
                return;
            }
        };
        request.position = position;

        match ctx.runner.execute(&mut request).await {
            Ok(response) => break response,
            Err(_) if ctx.cancel.is_cancelled() => {
                // Shutdown in flight; not a request failure
                return;
            }
            Err(e) => {
                if retried {
                    tracing::debug!("request failed after retry: {e}");
                    ctx.inc_error();
                    return;
                }
                retried = true;
            }
        }
    };

    // A successful execute clears the consecutive-failure signal
    ctx.reset_spurious_errors();

    let safety = ctx.config.safety;
    if (safety.stop_on_403 || safety.stop_on_all) && response.status == 403 {
        ctx.inc_forbidden();
    }
    if safety.stop_on_all && response.status == 429 {
        ctx.inc_rate_limited();
    }

    ctx.pause_gate.wait().await;

    let matched = ctx
        .matcher
        .read()
        .expect("matcher lock poisoned")
        .is_match(&response);
    if matched {
        if let Some(replay) = &ctx.replay_runner {
            replay_request(ctx, replay, &input, &base_url, position).await;
        }
        ctx.output.result(&response);
        ctx.update_progress();
        if ctx.config.recursion.enabled
            && ctx.config.recursion.strategy == RecursionStrategy::Greedy
        {
            handle_greedy_recursion(ctx, &response);
        }
    }

    response.release_body();

    if ctx.config.recursion.enabled
        && ctx.config.recursion.strategy == RecursionStrategy::Default
        && !response.redirect_location(false).is_empty()
    {
        handle_default_recursion(ctx, &response);
    }
}

/// Re-sends a matched request through the replay runner
///
/// Replay failures count as errors but never suppress the result.
async fn replay_request(
    ctx: &EngineContext,
    replay: &Arc<dyn RunnerProvider>,
    input: &InputMap,
    base_url: &str,
    position: usize,
) {
    let mut request = match replay.prepare(input, base_url) {
        Ok(request) => request,
        Err(e) => {
            ctx.output.error(&format!(
                "Encountered an error while preparing replay request: {e}"
            ));
            ctx.inc_error();
            return;
        }
    };
    request.position = position;
    match replay.execute(&mut request).await {
        Ok(mut response) => response.release_body(),
        Err(e) => {
            if !ctx.cancel.is_cancelled() {
                tracing::debug!("replay request failed: {e}");
                ctx.inc_error();
            }
        }
    }
}

/// Queues a recursion target for every match
fn handle_greedy_recursion(ctx: &EngineContext, response: &Response) {
    let depth_limit = ctx.config.recursion.depth;
    let current = ctx.current_depth.load(Ordering::SeqCst);
    if depth_limit == 0 || current < depth_limit {
        let url = format!("{}/FUZZ", response.request_url);
        ctx.queue.append(QueueTarget {
            url: url.clone(),
            depth: current + 1,
        });
        ctx.output
            .info(&format!("Adding a new job to the queue: {url}"));
    } else {
        ctx.output.warning(&format!(
            "Maximum recursion depth reached. Ignoring: {}",
            response.request_url
        ));
    }
}

/// Queues a recursion target when the server redirected the request URL to
/// its trailing-slash form, which is how directories announce themselves
fn handle_default_recursion(ctx: &EngineContext, response: &Response) {
    let absolute = response.redirect_location(true);
    if format!("{}/", response.request_url) != absolute {
        // Not a directory redirect
        return;
    }
    let depth_limit = ctx.config.recursion.depth;
    let current = ctx.current_depth.load(Ordering::SeqCst);
    if depth_limit == 0 || current < depth_limit {
        let url = format!("{}/FUZZ", response.request_url);
        ctx.queue.append(QueueTarget {
            url: url.clone(),
            depth: current + 1,
        });
        ctx.output
            .info(&format!("Adding a new job to the queue: {url}"));
    } else {
        ctx.output.warning(&format!(
            "Directory found, but recursion depth exceeded. Ignoring: {absolute}"
        ));
    }
}

/// Periodically refreshes the progress display and re-centers the rate
/// window while a target is being processed
async fn progress_monitor(ctx: Arc<EngineContext>) {
    let frequency = Duration::from_millis(ctx.config.fuzzer.progress_frequency);
    loop {
        let total = ctx.total.load(Ordering::SeqCst);
        let dispatched = ctx
            .counters
            .lock()
            .expect("counter lock poisoned")
            .dispatched;
        if dispatched > total || ctx.skip_target.load(Ordering::SeqCst) {
            break;
        }
        ctx.pause_gate.wait().await;
        if !ctx.running.load(Ordering::SeqCst) {
            break;
        }
        ctx.update_progress();
        if dispatched == total {
            break;
        }
        if !ctx.running_target.load(Ordering::SeqCst) {
            break;
        }
        ctx.rate.adjust();
        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = tokio::time::sleep(frequency) => {}
        }
    }
}

/// Installs the interrupt/termination handler
///
/// The first signal records the shutdown diagnostic, releases any pause
/// barrier, and stops the run; the handler task itself exits with the
/// cancellation token.
fn install_signal_handler(ctx: Arc<EngineContext>) {
    tokio::spawn(async move {
        if wait_for_signal(&ctx.cancel).await {
            ctx.interrupt();
        }
    });
}

#[cfg(unix)]
async fn wait_for_signal(cancel: &CancellationToken) -> bool {
    use tokio::signal::unix::{signal, SignalKind};
    let Ok(mut terminate) = signal(SignalKind::terminate()) else {
        return false;
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => true,
        _ = terminate.recv() => true,
        _ = cancel.cancelled() => false,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal(cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => true,
        _ = cancel.cancelled() => false,
    }
}

/// Uniformly random alphanumeric string, used for calibration probes
fn random_string(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_string_length_and_charset() {
        let value = random_string(16);
        assert_eq!(value.len(), 16);
        assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_random_strings_differ() {
        assert_ne!(random_string(16), random_string(16));
    }
}
