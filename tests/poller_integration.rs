//! Poller behaviour against scripted and HTTP status sources

use futures::future::{BoxFuture, FutureExt};
use landsnap::progress::{
    PollOutcome, PollState, Poller, ProgressRecord, ProgressSink, StatusSource,
};
use landsnap::{Error, PollerConfig, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Replays a fixed list of responses, then keeps reporting 50%
struct Scripted {
    replies: Mutex<VecDeque<Result<ProgressRecord>>>,
    calls: AtomicUsize,
}

impl Scripted {
    fn new(replies: Vec<Result<ProgressRecord>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl StatusSource for Scripted {
    fn fetch(&self) -> BoxFuture<'_, Result<ProgressRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ProgressRecord::running(50)));
        async move { next }.boxed()
    }
}

#[derive(Default)]
struct Recorder {
    progress: Mutex<Vec<u8>>,
    navigations: Mutex<Vec<String>>,
    alerts: Mutex<Vec<String>>,
}

impl ProgressSink for Recorder {
    fn progress(&self, percentage: u8) {
        self.progress.lock().unwrap().push(percentage);
    }

    fn navigate(&self, target: &str) {
        self.navigations.lock().unwrap().push(target.to_string());
    }

    fn alert(&self, message: &str) {
        self.alerts.lock().unwrap().push(message.to_string());
    }
}

fn fast() -> PollerConfig {
    PollerConfig {
        interval_ms: 10,
        ..Default::default()
    }
}

fn net_err() -> Result<ProgressRecord> {
    Err(Error::NetworkError("connection refused".into()))
}

#[tokio::test]
async fn complete_navigates_once_and_stops() {
    let source = Scripted::new(vec![
        Ok(ProgressRecord::running(10)),
        Ok(ProgressRecord::running(60)),
        Ok(ProgressRecord::complete("/results/7/")),
    ]);
    let sink = Arc::new(Recorder::default());
    let handle = Poller::new(source.clone(), sink.clone(), fast()).spawn();

    let outcome = handle.join().await.unwrap();
    assert_eq!(
        outcome,
        PollOutcome::Complete {
            redirect: Some("/results/7/".into())
        }
    );
    assert_eq!(*sink.progress.lock().unwrap(), vec![10, 60, 100]);
    assert_eq!(*sink.navigations.lock().unwrap(), vec!["/results/7/".to_string()]);
    assert!(sink.alerts.lock().unwrap().is_empty());

    let calls = source.calls();
    assert_eq!(calls, 3);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(source.calls(), calls);
}

#[tokio::test]
async fn failure_alerts_once_and_stops() {
    let source = Scripted::new(vec![
        Ok(ProgressRecord::running(20)),
        Ok(ProgressRecord::failed("Invalid image file")),
    ]);
    let sink = Arc::new(Recorder::default());
    let mut handle = Poller::new(source.clone(), sink.clone(), fast()).spawn();

    assert_eq!(handle.wait_terminal().await, PollState::Failed);
    assert_eq!(handle.state(), PollState::Failed);
    assert!(!handle.cancel(), "terminal state already stopped the poller");

    let outcome = handle.join().await.unwrap();
    assert_eq!(
        outcome,
        PollOutcome::Failed {
            message: "Invalid image file".into()
        }
    );
    assert_eq!(*sink.alerts.lock().unwrap(), vec!["Invalid image file".to_string()]);
    assert!(sink.navigations.lock().unwrap().is_empty());
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn transport_errors_keep_polling() {
    let source = Scripted::new(vec![
        net_err(),
        net_err(),
        Ok(ProgressRecord::running(30)),
        net_err(),
        Ok(ProgressRecord::complete("/done/")),
    ]);
    let sink = Arc::new(Recorder::default());
    let handle = Poller::new(source.clone(), sink.clone(), fast()).spawn();

    let outcome = handle.join().await.unwrap();
    assert!(matches!(outcome, PollOutcome::Complete { .. }));
    assert_eq!(source.calls(), 5);
    assert_eq!(*sink.progress.lock().unwrap(), vec![30, 100]);
}

#[tokio::test]
async fn consecutive_failure_limit_is_opt_in() {
    let source = Scripted::new(vec![
        net_err(),
        Ok(ProgressRecord::running(5)),
        net_err(),
        net_err(),
        net_err(),
    ]);
    let sink = Arc::new(Recorder::default());
    let config = PollerConfig {
        max_consecutive_failures: Some(3),
        ..fast()
    };
    let handle = Poller::new(source.clone(), sink.clone(), config).spawn();

    let outcome = handle.join().await.unwrap();
    assert_eq!(outcome, PollOutcome::GaveUp { failures: 3 });
    assert_eq!(source.calls(), 5);
    assert!(sink.navigations.lock().unwrap().is_empty());
    assert!(sink.alerts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cancel_is_idempotent() {
    let source = Scripted::new(vec![]);
    let sink = Arc::new(Recorder::default());
    let handle = Poller::new(source.clone(), sink.clone(), fast()).spawn();

    tokio::time::sleep(Duration::from_millis(35)).await;
    assert!(handle.cancel());
    assert!(!handle.cancel());

    let outcome = handle.join().await.unwrap();
    assert_eq!(outcome, PollOutcome::Cancelled);

    let calls = source.calls();
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(source.calls(), calls);
    assert!(sink.navigations.lock().unwrap().is_empty());
}

#[tokio::test]
async fn dropping_handle_stops_polling() {
    let source = Scripted::new(vec![]);
    let handle = Poller::new(source.clone(), Arc::new(Recorder::default()), fast()).spawn();
    tokio::time::sleep(Duration::from_millis(25)).await;
    drop(handle);

    tokio::time::sleep(Duration::from_millis(20)).await;
    let calls = source.calls();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(source.calls(), calls);
}

#[tokio::test]
async fn complete_without_target_uses_fallback() {
    let mut done = ProgressRecord::complete("");
    done.redirect_target = None;
    let source = Scripted::new(vec![Ok(done)]);
    let sink = Arc::new(Recorder::default());
    let config = PollerConfig {
        fallback_redirect: Some("/results/".into()),
        ..fast()
    };
    let outcome = Poller::new(source, sink.clone(), config)
        .spawn()
        .join()
        .await
        .unwrap();
    assert_eq!(
        outcome,
        PollOutcome::Complete {
            redirect: Some("/results/".into())
        }
    );
    assert_eq!(*sink.navigations.lock().unwrap(), vec!["/results/".to_string()]);
}

#[cfg(feature = "http")]
mod http {
    use super::*;
    use landsnap::progress::HttpStatusSource;
    use std::sync::atomic::AtomicUsize;

    /// Serves `/api/analysis-progress/`: one 500, then 40%, then complete
    fn start_status_server() -> (String, Arc<AtomicUsize>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        std::thread::spawn(move || {
            for request in server.incoming_requests() {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let response = match n {
                    0 => tiny_http::Response::from_string("oops").with_status_code(500),
                    1 => tiny_http::Response::from_string(r#"{"progress": 40}"#),
                    _ => tiny_http::Response::from_string(
                        r#"{"progress": 100, "complete": true, "redirect_url": "/results/abc/"}"#,
                    ),
                };
                let response = response.with_header(
                    "Content-Type: application/json"
                        .parse::<tiny_http::Header>()
                        .unwrap(),
                );
                let _ = request.respond(response);
            }
        });

        (format!("http://{}/api/analysis-progress/", addr), hits)
    }

    #[tokio::test]
    async fn http_source_follows_endpoint_to_completion() {
        let (url, hits) = start_status_server();
        let source = HttpStatusSource::new(&url, Duration::from_secs(5)).unwrap();
        let sink = Arc::new(Recorder::default());

        let outcome = Poller::new(source, sink.clone(), fast())
            .spawn()
            .join()
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PollOutcome::Complete {
                redirect: Some("/results/abc/".into())
            }
        );
        assert_eq!(*sink.progress.lock().unwrap(), vec![40, 100]);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn http_source_reports_status_errors() {
        let (url, _) = start_status_server();
        let source = HttpStatusSource::new(&url, Duration::from_secs(5)).unwrap();
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, Error::NetworkError(_)));
        assert_eq!(source.fetch().await.unwrap(), ProgressRecord::running(40));
    }

    #[tokio::test]
    async fn slow_status_endpoint_times_out() {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr();
        std::thread::spawn(move || {
            for request in server.incoming_requests() {
                std::thread::sleep(Duration::from_millis(500));
                let _ = request.respond(tiny_http::Response::from_string("{}"));
            }
        });

        let url = format!("http://{}/api/analysis-progress/", addr);
        let source = HttpStatusSource::new(&url, Duration::from_millis(50)).unwrap();
        assert!(matches!(source.fetch().await, Err(Error::Timeout(50))));
    }
}
