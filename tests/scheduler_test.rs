//! End-to-end crawl scenarios, driven through the real `Scheduler` against
//! a mocked HTTP host.

use std::time::Duration;

use docscrawl::clock::CancelSignal;
use docscrawl::config::ConfigBuilder;
use docscrawl::scheduler::Scheduler;
use url::Url;

fn page_html(title: &str, body: &str) -> String {
    format!("<html><head><title>{title}</title></head><body><main><h1>{title}</h1><p>{body}</p></main></body></html>")
}

#[tokio::test]
async fn success_writes_exactly_one_page() {
    let mut server = mockito::Server::new_async().await;
    let _robots = server
        .mock("GET", "/robots.txt")
        .with_status(200)
        .with_body("User-agent: *\nAllow: /\n")
        .create_async()
        .await;
    let _page = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(page_html("Home", "hello world"))
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = ConfigBuilder::new()
        .seed_url(Url::parse(&server.url()).unwrap())
        .max_depth(0)
        .output_dir(dir.path())
        .build()
        .unwrap();

    let mut scheduler = Scheduler::default();
    let init = scheduler.initialize_crawling(config).unwrap();
    let execution = scheduler.execute_crawling_with_state(init).await.unwrap();

    assert_eq!(execution.write_results.len(), 1);
    assert_eq!(execution.total_assets, 0);
}

#[tokio::test]
async fn a_page_with_no_heading_aborts_the_run_as_fatal() {
    let mut server = mockito::Server::new_async().await;
    let _robots = server
        .mock("GET", "/robots.txt")
        .with_status(200)
        .with_body("User-agent: *\nAllow: /\n")
        .create_async()
        .await;
    let _page = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<html><body><main><p>no heading here</p></main></body></html>")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = ConfigBuilder::new()
        .seed_url(Url::parse(&server.url()).unwrap())
        .max_depth(0)
        .output_dir(dir.path())
        .build()
        .unwrap();

    let mut scheduler = Scheduler::default();
    let init = scheduler.initialize_crawling(config).unwrap();
    let err = scheduler
        .execute_crawling_with_state(init)
        .await
        .unwrap_err();
    assert_eq!(err.stage, "normalize");
}

#[tokio::test]
async fn recoverable_fetch_failure_counts_an_error_and_backs_off() {
    let mut server = mockito::Server::new_async().await;
    let _robots = server
        .mock("GET", "/robots.txt")
        .with_status(404)
        .create_async()
        .await;
    let _page = server
        .mock("GET", "/")
        .with_status(503)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = ConfigBuilder::new()
        .seed_url(Url::parse(&server.url()).unwrap())
        .max_depth(0)
        .output_dir(dir.path())
        .build()
        .unwrap();

    let mut scheduler = Scheduler::default();
    let init = scheduler.initialize_crawling(config).unwrap();
    let execution = scheduler.execute_crawling_with_state(init).await.unwrap();

    assert!(execution.write_results.is_empty());
}

#[tokio::test]
async fn robots_disallow_skips_the_page_without_an_error() {
    let mut server = mockito::Server::new_async().await;
    let _robots = server
        .mock("GET", "/robots.txt")
        .with_status(200)
        .with_body("User-agent: *\nDisallow: /\n")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = ConfigBuilder::new()
        .seed_url(Url::parse(&server.url()).unwrap())
        .max_depth(0)
        .output_dir(dir.path())
        .build()
        .unwrap();

    let mut scheduler = Scheduler::default();
    let init = scheduler.initialize_crawling(config).unwrap();
    let execution = scheduler.execute_crawling_with_state(init).await.unwrap();

    assert!(execution.write_results.is_empty());
}

#[tokio::test]
async fn crawl_delay_is_honored_between_two_pages() {
    let mut server = mockito::Server::new_async().await;
    let _robots = server
        .mock("GET", "/robots.txt")
        .with_status(200)
        .with_body("User-agent: *\nAllow: /\nCrawl-delay: 1\n")
        .create_async()
        .await;
    let _home = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(format!(
            "<html><head><title>Home</title></head><body><main><h1>Home</h1><p>see <a href=\"{}/second\">next</a></p></main></body></html>",
            server.url()
        ))
        .create_async()
        .await;
    let _second = server
        .mock("GET", "/second")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(page_html("Second", "more text"))
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = ConfigBuilder::new()
        .seed_url(Url::parse(&server.url()).unwrap())
        .max_depth(1)
        .output_dir(dir.path())
        .build()
        .unwrap();

    let mut scheduler = Scheduler::default();
    let init = scheduler.initialize_crawling(config).unwrap();
    let started = std::time::Instant::now();
    let execution = scheduler.execute_crawling_with_state(init).await.unwrap();

    assert_eq!(execution.write_results.len(), 2);
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn cancelling_before_any_dequeue_still_finalizes() {
    let server = mockito::Server::new_async().await;
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigBuilder::new()
        .seed_url(Url::parse(&server.url()).unwrap())
        .output_dir(dir.path())
        .build()
        .unwrap();

    let cancel = CancelSignal::new();
    cancel.cancel();
    let mut scheduler = Scheduler::new(
        std::sync::Arc::new(docscrawl::clock::SystemClock),
        cancel,
        Box::new(docscrawl::metadata::TracingMetadataSink::default()),
    );
    let init = scheduler.initialize_crawling(config).unwrap();
    let err = scheduler
        .execute_crawling_with_state(init)
        .await
        .unwrap_err();
    assert_eq!(err.stage, "scheduler");
    drop(server);
}
